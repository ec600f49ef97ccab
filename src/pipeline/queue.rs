//! Shared list of triangles ready to rasterize.
//!
//! Setup jobs publish into atomically reserved slots; the raster stage reads
//! the list after the setup drain barrier. The list lives for one frame and
//! is reset before the next frame's setup runs.

use crate::shader::{PixelProgram, Varyings};
use glam::Vec4;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One rasterizer work item: three screen-space vertices
/// (x, y, affine z, reciprocal-w) with their varying records, and the
/// program of the draw call that produced it.
#[derive(Clone)]
pub struct QueuedTriangle {
    pub pos: [Vec4; 3],
    pub varyings: [Varyings; 3],
    pub program: Arc<dyn PixelProgram>,
}

/// Fixed-capacity publish list with a monotonically increasing reservation
/// counter.
///
/// Phase contract: `push` only between `reset` and the setup drain;
/// `get`/`len` only after it. Reservations past capacity are counted and
/// dropped rather than aborting the frame.
pub struct TriangleQueue {
    slots: Box<[UnsafeCell<MaybeUninit<QueuedTriangle>>]>,
    reserved: AtomicUsize,
}

unsafe impl Sync for TriangleQueue {}
unsafe impl Send for TriangleQueue {}

impl TriangleQueue {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        Self {
            slots,
            reserved: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Reserve a slot and publish a triangle. Returns false when the list is
    /// full; the triangle is dropped and counted.
    pub fn push(&self, triangle: QueuedTriangle) -> bool {
        let slot = self.reserved.fetch_add(1, Ordering::Relaxed);
        if slot >= self.slots.len() {
            return false;
        }
        unsafe { (*self.slots[slot].get()).write(triangle) };
        true
    }

    /// Published triangle count. Meaningful after the setup drain.
    pub fn len(&self) -> usize {
        self.reserved.load(Ordering::Relaxed).min(self.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reservations that did not fit this frame.
    pub fn dropped(&self) -> usize {
        self.reserved
            .load(Ordering::Relaxed)
            .saturating_sub(self.slots.len())
    }

    /// Triangle at `index`. Valid after the setup drain, for `index < len()`.
    pub fn get(&self, index: usize) -> &QueuedTriangle {
        debug_assert!(index < self.len());
        unsafe { (*self.slots[index].get()).assume_init_ref() }
    }

    /// Drop this frame's triangles and zero the reservation counter. Must
    /// not run while any job is in flight.
    pub fn reset(&self) {
        let live = self.len();
        for slot in &self.slots[..live] {
            unsafe { (*slot.get()).assume_init_drop() };
        }
        self.reserved.store(0, Ordering::Relaxed);
    }
}

impl Drop for TriangleQueue {
    fn drop(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{Rgba, VertexOutput};

    struct NullProgram;
    impl PixelProgram for NullProgram {
        fn process_vertex(&self, _vertex: &[f32]) -> VertexOutput {
            VertexOutput {
                clip: Vec4::ZERO,
                varyings: Varyings::ZERO,
            }
        }
        fn shade_fragment(&self, _varyings: &Varyings) -> Rgba {
            Rgba::default()
        }
    }

    fn dummy(z: f32) -> QueuedTriangle {
        QueuedTriangle {
            pos: [Vec4::new(0.0, 0.0, z, 1.0); 3],
            varyings: [Varyings::ZERO; 3],
            program: Arc::new(NullProgram),
        }
    }

    #[test]
    fn publishes_in_reservation_order() {
        let queue = TriangleQueue::new(8);
        assert!(queue.push(dummy(0.1)));
        assert!(queue.push(dummy(0.2)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.get(0).pos[0].z, 0.1);
        assert_eq!(queue.get(1).pos[0].z, 0.2);
    }

    #[test]
    fn counts_overflow_as_dropped() {
        let queue = TriangleQueue::new(2);
        assert!(queue.push(dummy(0.0)));
        assert!(queue.push(dummy(0.0)));
        assert!(!queue.push(dummy(0.0)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn reset_starts_a_new_frame() {
        let queue = TriangleQueue::new(4);
        queue.push(dummy(0.0));
        queue.push(dummy(0.0));
        queue.reset();
        assert!(queue.is_empty());
        assert_eq!(queue.dropped(), 0);
        assert!(queue.push(dummy(0.5)));
        assert_eq!(queue.get(0).pos[0].z, 0.5);
    }
}
