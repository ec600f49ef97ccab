//! Four-wide lane types for the rasterizer hot loops.
//!
//! Two backends share one API: a portable scalar fallback and an SSE4.1
//! implementation selected at compile time. The lane width is a performance
//! parameter, not a correctness requirement; both backends produce the same
//! pixels.
//!
//! Masks are represented as [`I32x4`] lanes holding all-ones (`-1`) for true
//! and `0` for false, so the same blend/select machinery serves coverage
//! masks, depth masks and color stores.

#[cfg(all(target_arch = "x86_64", target_feature = "sse4.1"))]
mod x86;
#[cfg(all(target_arch = "x86_64", target_feature = "sse4.1"))]
pub use x86::{F32x4, I32x4};

#[cfg(not(all(target_arch = "x86_64", target_feature = "sse4.1")))]
mod scalar;
#[cfg(not(all(target_arch = "x86_64", target_feature = "sse4.1")))]
pub use scalar::{F32x4, I32x4};

/// Number of lanes processed per group.
pub const LANES: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_arithmetic() {
        let a = F32x4::splat(4.0);
        let b = F32x4::from_array([1.0, 2.0, 4.0, 8.0]);
        assert_eq!((a + b).to_array(), [5.0, 6.0, 8.0, 12.0]);
        assert_eq!((a - b).to_array(), [3.0, 2.0, 0.0, -4.0]);
        assert_eq!((a * b).to_array(), [4.0, 8.0, 16.0, 32.0]);
    }

    #[test]
    fn f32_recip() {
        let v = F32x4::from_array([1.0, 2.0, 4.0, 0.5]);
        let r = v.recip().to_array();
        assert!((r[0] - 1.0).abs() < 1e-6);
        assert!((r[1] - 0.5).abs() < 1e-6);
        assert!((r[2] - 0.25).abs() < 1e-6);
        assert!((r[3] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn f32_min_max_clamp() {
        let a = F32x4::from_array([1.0, 5.0, -3.0, 7.0]);
        let b = F32x4::splat(2.0);
        assert_eq!(a.min(b).to_array(), [1.0, 2.0, -3.0, 2.0]);
        assert_eq!(a.max(b).to_array(), [2.0, 5.0, 2.0, 7.0]);
    }

    #[test]
    fn f32_cmp_and_select() {
        let a = F32x4::from_array([1.0, 2.0, 3.0, 4.0]);
        let b = F32x4::splat(2.5);
        let m = a.cmp_lt(b);
        assert_eq!(m.to_array(), [-1, -1, 0, 0]);
        let sel = F32x4::select(m, F32x4::splat(1.0), F32x4::splat(0.0));
        assert_eq!(sel.to_array(), [1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn f32_round_to_int() {
        // Ties round to even, matching the SSE cvtps behavior.
        let v = F32x4::from_array([10.5, 11.5, -0.4, 2.6]);
        assert_eq!(v.to_i32_round().to_array(), [10, 12, 0, 3]);
    }

    #[test]
    fn i32_arithmetic_and_shift() {
        let a = I32x4::from_array([1, 2, 3, 4]);
        let b = I32x4::splat(3);
        assert_eq!((a + b).to_array(), [4, 5, 6, 7]);
        assert_eq!((a - b).to_array(), [-2, -1, 0, 1]);
        assert_eq!((a * b).to_array(), [3, 6, 9, 12]);
        assert_eq!((a << 2).to_array(), [4, 8, 12, 16]);
    }

    #[test]
    fn i32_masks() {
        let a = I32x4::from_array([-1, 0, 1, 2]);
        let z = I32x4::splat(0);
        assert_eq!(a.cmp_gt(z).to_array(), [0, 0, -1, -1]);
        assert_eq!(a.cmp_lt(z).to_array(), [-1, 0, 0, 0]);
        assert_eq!(a.cmp_eq(z).to_array(), [0, -1, 0, 0]);

        let m = a.cmp_gt(z);
        assert!(m.any());
        assert!(!z.cmp_gt(z).any());
    }

    #[test]
    fn i32_select_blends_bits() {
        let m = I32x4::from_array([-1, 0, -1, 0]);
        let t = I32x4::splat(0x11);
        let f = I32x4::splat(0x22);
        assert_eq!(I32x4::select(m, t, f).to_array(), [0x11, 0x22, 0x11, 0x22]);
    }

    #[test]
    fn iota_and_conversion() {
        assert_eq!(I32x4::iota().to_array(), [0, 1, 2, 3]);
        assert_eq!(I32x4::iota().to_f32().to_array(), [0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn load_store_roundtrip() {
        let src = [1.5f32, 2.5, 3.5, 4.5];
        let mut dst = [0.0f32; 4];
        unsafe {
            let v = F32x4::load(src.as_ptr());
            v.store(dst.as_mut_ptr());
        }
        assert_eq!(src, dst);
    }
}
