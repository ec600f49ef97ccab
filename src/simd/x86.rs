//! SSE4.1 backend (4 lanes).
//!
//! Selected when the crate is built with `sse4.1` enabled
//! (e.g. `-C target-cpu=native`). Mirrors the scalar backend's API exactly.

use core::arch::x86_64::*;
use core::fmt::{Debug, Formatter};
use core::ops::{Add, BitAnd, BitOr, Mul, Not, Shl, Sub};

/// Four f32 lanes.
#[derive(Copy, Clone)]
#[repr(transparent)]
pub struct F32x4(__m128);

/// Four i32 lanes. Doubles as the mask type (all-ones per true lane).
#[derive(Copy, Clone)]
#[repr(transparent)]
pub struct I32x4(__m128i);

impl Debug for F32x4 {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "F32x4({:?})", self.to_array())
    }
}

impl Debug for I32x4 {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "I32x4({:?})", self.to_array())
    }
}

impl F32x4 {
    #[inline(always)]
    pub fn splat(v: f32) -> Self {
        Self(unsafe { _mm_set1_ps(v) })
    }

    #[inline(always)]
    pub fn from_array(a: [f32; 4]) -> Self {
        Self(unsafe { _mm_setr_ps(a[0], a[1], a[2], a[3]) })
    }

    #[inline(always)]
    pub fn to_array(self) -> [f32; 4] {
        unsafe { core::mem::transmute(self.0) }
    }

    /// Full-precision reciprocal (div, not the approximate rcpps).
    #[inline(always)]
    pub fn recip(self) -> Self {
        Self(unsafe { _mm_div_ps(_mm_set1_ps(1.0), self.0) })
    }

    #[inline(always)]
    pub fn min(self, rhs: Self) -> Self {
        Self(unsafe { _mm_min_ps(self.0, rhs.0) })
    }

    #[inline(always)]
    pub fn max(self, rhs: Self) -> Self {
        Self(unsafe { _mm_max_ps(self.0, rhs.0) })
    }

    #[inline(always)]
    pub fn cmp_lt(self, rhs: Self) -> I32x4 {
        I32x4(unsafe { _mm_castps_si128(_mm_cmplt_ps(self.0, rhs.0)) })
    }

    /// Lane-wise blend: `if_true` where the mask lane is set.
    #[inline(always)]
    pub fn select(m: I32x4, if_true: Self, if_false: Self) -> Self {
        Self(unsafe { _mm_blendv_ps(if_false.0, if_true.0, _mm_castsi128_ps(m.0)) })
    }

    /// Round-to-nearest conversion, ties to even.
    #[inline(always)]
    pub fn to_i32_round(self) -> I32x4 {
        I32x4(unsafe { _mm_cvtps_epi32(self.0) })
    }

    /// # Safety
    /// `ptr` must be valid for reading four consecutive f32 values.
    #[inline(always)]
    pub unsafe fn load(ptr: *const f32) -> Self {
        Self(unsafe { _mm_loadu_ps(ptr) })
    }

    /// # Safety
    /// `ptr` must be valid for writing four consecutive f32 values.
    #[inline(always)]
    pub unsafe fn store(self, ptr: *mut f32) {
        unsafe { _mm_storeu_ps(ptr, self.0) }
    }
}

impl I32x4 {
    #[inline(always)]
    pub fn splat(v: i32) -> Self {
        Self(unsafe { _mm_set1_epi32(v) })
    }

    #[inline(always)]
    pub fn from_array(a: [i32; 4]) -> Self {
        Self(unsafe { _mm_setr_epi32(a[0], a[1], a[2], a[3]) })
    }

    #[inline(always)]
    pub fn to_array(self) -> [i32; 4] {
        unsafe { core::mem::transmute(self.0) }
    }

    /// Lane indices 0, 1, 2, 3.
    #[inline(always)]
    pub fn iota() -> Self {
        Self(unsafe { _mm_setr_epi32(0, 1, 2, 3) })
    }

    #[inline(always)]
    pub fn cmp_gt(self, rhs: Self) -> Self {
        Self(unsafe { _mm_cmpgt_epi32(self.0, rhs.0) })
    }

    #[inline(always)]
    pub fn cmp_lt(self, rhs: Self) -> Self {
        Self(unsafe { _mm_cmplt_epi32(self.0, rhs.0) })
    }

    #[inline(always)]
    pub fn cmp_eq(self, rhs: Self) -> Self {
        Self(unsafe { _mm_cmpeq_epi32(self.0, rhs.0) })
    }

    // No cmp_le in SSE; lhs <= rhs is !(lhs > rhs).
    #[inline(always)]
    pub fn cmp_le(self, rhs: Self) -> Self {
        !self.cmp_gt(rhs)
    }

    /// True if any lane is non-zero.
    #[inline(always)]
    pub fn any(self) -> bool {
        unsafe { _mm_testz_si128(self.0, self.0) == 0 }
    }

    #[inline(always)]
    pub fn to_f32(self) -> F32x4 {
        F32x4(unsafe { _mm_cvtepi32_ps(self.0) })
    }

    /// Lane-wise bit blend (used for masked color stores).
    #[inline(always)]
    pub fn select(m: Self, if_true: Self, if_false: Self) -> Self {
        Self(unsafe {
            _mm_or_si128(_mm_and_si128(m.0, if_true.0), _mm_andnot_si128(m.0, if_false.0))
        })
    }

    /// # Safety
    /// `ptr` must be valid for reading four consecutive i32 values.
    #[inline(always)]
    pub unsafe fn load(ptr: *const i32) -> Self {
        Self(unsafe { _mm_loadu_si128(ptr as *const __m128i) })
    }

    /// # Safety
    /// `ptr` must be valid for writing four consecutive i32 values.
    #[inline(always)]
    pub unsafe fn store(self, ptr: *mut i32) {
        unsafe { _mm_storeu_si128(ptr as *mut __m128i, self.0) }
    }
}

impl Add for F32x4 {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        Self(unsafe { _mm_add_ps(self.0, rhs.0) })
    }
}

impl Sub for F32x4 {
    type Output = Self;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self {
        Self(unsafe { _mm_sub_ps(self.0, rhs.0) })
    }
}

impl Mul for F32x4 {
    type Output = Self;
    #[inline(always)]
    fn mul(self, rhs: Self) -> Self {
        Self(unsafe { _mm_mul_ps(self.0, rhs.0) })
    }
}

impl Add for I32x4 {
    type Output = Self;
    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        Self(unsafe { _mm_add_epi32(self.0, rhs.0) })
    }
}

impl Sub for I32x4 {
    type Output = Self;
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self {
        Self(unsafe { _mm_sub_epi32(self.0, rhs.0) })
    }
}

impl Mul for I32x4 {
    type Output = Self;
    #[inline(always)]
    fn mul(self, rhs: Self) -> Self {
        Self(unsafe { _mm_mullo_epi32(self.0, rhs.0) })
    }
}

impl Shl<i32> for I32x4 {
    type Output = Self;
    #[inline(always)]
    fn shl(self, rhs: i32) -> Self {
        Self(unsafe { _mm_sll_epi32(self.0, _mm_cvtsi32_si128(rhs)) })
    }
}

impl BitAnd for I32x4 {
    type Output = Self;
    #[inline(always)]
    fn bitand(self, rhs: Self) -> Self {
        Self(unsafe { _mm_and_si128(self.0, rhs.0) })
    }
}

impl BitOr for I32x4 {
    type Output = Self;
    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self {
        Self(unsafe { _mm_or_si128(self.0, rhs.0) })
    }
}

impl Not for I32x4 {
    type Output = Self;
    #[inline(always)]
    fn not(self) -> Self {
        Self(unsafe { _mm_xor_si128(self.0, _mm_set1_epi32(-1)) })
    }
}
