//! Bounded lock-free MPMC ring for jobs.
//!
//! Circular buffer with power-of-2 capacity, atomic head (consumer) and tail
//! (producer) cursors, and a per-slot sequence counter that publishes a
//! slot's value before consumers may claim it. Cursors wrap monotonically;
//! the ring is empty whenever head == tail.
//!
//! The claim path is a single compare-exchange per side: no locks, no
//! allocation after construction. A full ring is reported to the caller
//! rather than overwriting or aborting.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pad to a cache line to keep producer and consumer cursors from false
/// sharing.
#[repr(align(64))]
struct CachePadded<T>(T);

struct Slot<T> {
    /// Publish sequence. `index` means empty and writable for the producer
    /// of generation `index`; `index + 1` means the value is published.
    seq: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Fixed-capacity multi-producer multi-consumer queue.
pub struct Ring<T> {
    slots: Box<[Slot<T>]>,
    mask: usize,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    /// Create a ring. Capacity is rounded up to the next power of two.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two();
        let slots = (0..capacity)
            .map(|i| Slot {
                seq: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        Self {
            slots,
            mask: capacity - 1,
            head: CachePadded(AtomicUsize::new(0)),
            tail: CachePadded(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Push a value; returns it back if the ring is full.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let mut tail = self.tail.0.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[tail & self.mask];
            let seq = slot.seq.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(tail) as isize;

            if diff == 0 {
                // Slot is free for this generation; claim it.
                match self.tail.0.compare_exchange_weak(
                    tail,
                    tail.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe { (*slot.value.get()).write(value) };
                        slot.seq.store(tail.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => tail = current,
                }
            } else if diff < 0 {
                // The consumer of the previous generation has not freed the
                // slot yet: the ring is full.
                return Err(value);
            } else {
                tail = self.tail.0.load(Ordering::Relaxed);
            }
        }
    }

    /// Pop a value; `None` if the ring is empty.
    pub fn try_pop(&self) -> Option<T> {
        let mut head = self.head.0.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[head & self.mask];
            let seq = slot.seq.load(Ordering::Acquire);
            let published = head.wrapping_add(1);
            let diff = seq.wrapping_sub(published) as isize;

            if diff == 0 {
                match self.head.0.compare_exchange_weak(
                    head,
                    published,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        // Free the slot for the producer one generation ahead.
                        slot.seq
                            .store(head.wrapping_add(self.mask + 1), Ordering::Release);
                        return Some(value);
                    }
                    Err(current) => head = current,
                }
            } else if diff < 0 {
                return None;
            } else {
                head = self.head.0.load(Ordering::Relaxed);
            }
        }
    }

    /// Approximate occupancy (racy under concurrent use).
    pub fn len(&self) -> usize {
        let head = self.head.0.load(Ordering::Relaxed);
        let tail = self.tail.0.load(Ordering::Relaxed);
        tail.wrapping_sub(head)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        while self.try_pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn single_thread_fifo() {
        let ring = Ring::new(4);
        assert!(ring.try_push(1).is_ok());
        assert!(ring.try_push(2).is_ok());
        assert_eq!(ring.try_pop(), Some(1));
        assert_eq!(ring.try_pop(), Some(2));
        assert_eq!(ring.try_pop(), None);
    }

    #[test]
    fn reports_full() {
        let ring = Ring::new(4);
        for i in 0..4 {
            assert!(ring.try_push(i).is_ok());
        }
        assert_eq!(ring.try_push(99), Err(99));
        assert_eq!(ring.try_pop(), Some(0));
        assert!(ring.try_push(99).is_ok());
    }

    #[test]
    fn wrap_around() {
        let ring = Ring::new(4);
        for round in 0..10 {
            assert!(ring.try_push(round * 10 + 1).is_ok());
            assert!(ring.try_push(round * 10 + 2).is_ok());
            assert_eq!(ring.try_pop(), Some(round * 10 + 1));
            assert_eq!(ring.try_pop(), Some(round * 10 + 2));
        }
    }

    #[test]
    fn drops_remaining_values() {
        let ring = Ring::new(8);
        let counter = Arc::new(AtomicUsize::new(0));
        struct Probe(Arc<AtomicUsize>);
        impl Drop for Probe {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }
        for _ in 0..3 {
            assert!(ring.try_push(Probe(counter.clone())).is_ok());
        }
        drop(ring);
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn mpmc_stress() {
        let ring = Arc::new(Ring::new(64));
        let popped = Arc::new(AtomicUsize::new(0));

        let mut producers = Vec::new();
        for p in 0..4 {
            let ring = Arc::clone(&ring);
            producers.push(thread::spawn(move || {
                for i in 0..1000 {
                    let mut v = p * 1000 + i;
                    loop {
                        match ring.try_push(v) {
                            Ok(()) => break,
                            Err(back) => {
                                v = back;
                                std::hint::spin_loop();
                            }
                        }
                    }
                }
            }));
        }

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let ring = Arc::clone(&ring);
            let popped = Arc::clone(&popped);
            consumers.push(thread::spawn(move || {
                while popped.load(Ordering::Relaxed) < 4000 {
                    if ring.try_pop().is_some() {
                        popped.fetch_add(1, Ordering::Relaxed);
                    } else {
                        std::hint::spin_loop();
                    }
                }
            }));
        }

        for p in producers {
            p.join().unwrap();
        }
        for c in consumers {
            c.join().unwrap();
        }
        assert_eq!(popped.load(Ordering::Relaxed), 4000);
        assert!(ring.is_empty());
    }
}
