//! SIMD-aware `f32` dot products used by the native kernels.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DotEngine {
    Scalar,
    #[cfg(target_arch = "x86_64")]
    Avx2Fma,
}

impl DotEngine {
    /// Widest engine the running CPU supports.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if std::is_x86_feature_detected!("avx2") && std::is_x86_feature_detected!("fma") {
                return DotEngine::Avx2Fma;
            }
        }

        DotEngine::Scalar
    }

    pub fn is_simd(self) -> bool {
        self != DotEngine::Scalar
    }
}

/// Dot product over the common prefix of `a` and `b`.
#[inline(always)]
pub fn dot(engine: DotEngine, a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    match engine {
        DotEngine::Scalar => dot_scalar(&a[..len], &b[..len]),
        // SAFETY: the variant is only constructed after runtime feature detection.
        #[cfg(target_arch = "x86_64")]
        DotEngine::Avx2Fma => unsafe { x86_64::dot_avx2_fma(a.as_ptr(), b.as_ptr(), len) },
    }
}

#[inline(always)]
fn dot_scalar(a: &[f32], b: &[f32]) -> f32 {
    let mut sums = [0.0f32; 4];
    let mut a_chunks = a.chunks_exact(4);
    let mut b_chunks = b.chunks_exact(4);

    for (ca, cb) in (&mut a_chunks).zip(&mut b_chunks) {
        sums[0] = ca[0].mul_add(cb[0], sums[0]);
        sums[1] = ca[1].mul_add(cb[1], sums[1]);
        sums[2] = ca[2].mul_add(cb[2], sums[2]);
        sums[3] = ca[3].mul_add(cb[3], sums[3]);
    }

    let mut sum = (sums[0] + sums[1]) + (sums[2] + sums[3]);
    for (&av, &bv) in a_chunks.remainder().iter().zip(b_chunks.remainder()) {
        sum = av.mul_add(bv, sum);
    }

    sum
}

#[cfg(target_arch = "x86_64")]
mod x86_64 {
    use core::arch::x86_64::*;

    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn dot_avx2_fma(a: *const f32, b: *const f32, len: usize) -> f32 {
        unsafe fn hsum256(v: __m256) -> f32 {
            let mut tmp = [0.0f32; 8];
            unsafe { _mm256_storeu_ps(tmp.as_mut_ptr(), v) };
            tmp[0] + tmp[1] + tmp[2] + tmp[3] + tmp[4] + tmp[5] + tmp[6] + tmp[7]
        }

        let mut acc0 = _mm256_setzero_ps();
        let mut acc1 = _mm256_setzero_ps();
        let mut i = 0usize;

        // Two accumulators cover one full quantization block per iteration.
        while i + 16 <= len {
            let va0 = unsafe { _mm256_loadu_ps(a.add(i)) };
            let vb0 = unsafe { _mm256_loadu_ps(b.add(i)) };
            let va1 = unsafe { _mm256_loadu_ps(a.add(i + 8)) };
            let vb1 = unsafe { _mm256_loadu_ps(b.add(i + 8)) };
            acc0 = _mm256_fmadd_ps(va0, vb0, acc0);
            acc1 = _mm256_fmadd_ps(va1, vb1, acc1);
            i += 16;
        }

        let mut sum = unsafe { hsum256(_mm256_add_ps(acc0, acc1)) };
        while i < len {
            let av = unsafe { *a.add(i) };
            let bv = unsafe { *b.add(i) };
            sum = av.mul_add(bv, sum);
            i += 1;
        }

        sum
    }
}
