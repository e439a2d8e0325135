//! Floating-point environment helpers for the audio thread.

/// Enables flush-to-zero / denormals-are-zero for the lifetime of the guard
/// and restores the previous control register on drop.
#[cfg(feature = "no-denormals")]
pub struct NoDenormalsGuard {
    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    prev: u32,
}

#[cfg(feature = "no-denormals")]
impl NoDenormalsGuard {
    #[inline]
    pub fn new() -> Self {
        #[cfg(all(feature = "simd", target_arch = "x86_64"))]
        #[allow(deprecated)]
        {
            use core::arch::x86_64::{_mm_getcsr, _mm_setcsr};
            const DAZ_FTZ: u32 = 0x8040;
            // SAFETY: reading and writing MXCSR only changes float rounding flags.
            let prev = unsafe { _mm_getcsr() };
            unsafe { _mm_setcsr(prev | DAZ_FTZ) };
            Self { prev }
        }
        #[cfg(not(all(feature = "simd", target_arch = "x86_64")))]
        {
            Self {}
        }
    }
}

#[cfg(feature = "no-denormals")]
impl Drop for NoDenormalsGuard {
    fn drop(&mut self) {
        #[cfg(all(feature = "simd", target_arch = "x86_64"))]
        #[allow(deprecated)]
        {
            use core::arch::x86_64::_mm_setcsr;
            // SAFETY: restores the value read in `new`.
            unsafe { _mm_setcsr(self.prev) };
        }
    }
}

#[cfg(not(feature = "no-denormals"))]
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDenormalsGuard;

#[cfg(not(feature = "no-denormals"))]
impl NoDenormalsGuard {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

/// Replaces non-finite samples with silence.
#[inline]
pub fn sanitize(sample: f32) -> f32 {
    if sample.is_finite() {
        sample
    } else {
        0.0
    }
}
