//! Vectorized kernels for the accumulator and forward pass.
//!
//! AVX2 paths are used on `x86_64`, NEON on aarch64, with scalar fallbacks
//! elsewhere. The scalar forward pass reproduces the 16-bit wrapping
//! multiply of the vector forms exactly, so all paths give identical
//! scores.

use super::NETWORK_QA;

/// `acc[i] += weights[i]` over one hidden vector.
#[inline]
pub fn add_weights(acc: &mut [i16], weights: &[i16]) {
    #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
    {
        unsafe { add_weights_avx2(acc, weights) }
    }

    #[cfg(target_arch = "aarch64")]
    {
        unsafe { add_weights_neon(acc, weights) }
    }

    #[cfg(not(any(
        all(target_arch = "x86_64", target_feature = "avx2"),
        target_arch = "aarch64"
    )))]
    {
        add_weights_scalar(acc, weights);
    }
}

/// `acc[i] -= weights[i]` over one hidden vector.
#[inline]
pub fn sub_weights(acc: &mut [i16], weights: &[i16]) {
    #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
    {
        unsafe { sub_weights_avx2(acc, weights) }
    }

    #[cfg(target_arch = "aarch64")]
    {
        unsafe { sub_weights_neon(acc, weights) }
    }

    #[cfg(not(any(
        all(target_arch = "x86_64", target_feature = "avx2"),
        target_arch = "aarch64"
    )))]
    {
        sub_weights_scalar(acc, weights);
    }
}

/// One perspective's half of the output layer: pairwise clipped product of
/// the two hidden halves against the output weights.
///
/// `lo`, `hi` and `weights` all have length `HIDDEN_WIDTH / 2`.
#[inline]
#[must_use]
pub fn clipped_pairwise_dot(lo: &[i16], hi: &[i16], weights: &[i16]) -> i32 {
    #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
    {
        unsafe { clipped_pairwise_dot_avx2(lo, hi, weights) }
    }

    #[cfg(not(all(target_arch = "x86_64", target_feature = "avx2")))]
    {
        clipped_pairwise_dot_scalar(lo, hi, weights)
    }
}

#[allow(dead_code)]
fn add_weights_scalar(acc: &mut [i16], weights: &[i16]) {
    for (a, w) in acc.iter_mut().zip(weights) {
        *a = a.wrapping_add(*w);
    }
}

#[allow(dead_code)]
fn sub_weights_scalar(acc: &mut [i16], weights: &[i16]) {
    for (a, w) in acc.iter_mut().zip(weights) {
        *a = a.wrapping_sub(*w);
    }
}

#[allow(dead_code)]
fn clipped_pairwise_dot_scalar(lo: &[i16], hi: &[i16], weights: &[i16]) -> i32 {
    let qa = NETWORK_QA;
    let mut sum = 0i32;
    for i in 0..lo.len() {
        let c0 = i32::from(lo[i]).clamp(0, qa);
        let c1 = i32::from(hi[i]).clamp(0, qa);
        // The vector form multiplies c0 by the weight in 16-bit lanes; keep
        // the same wrap-around here so scalar and SIMD agree bit for bit.
        let partial = (c0 * i32::from(weights[i])) as i16;
        sum += i32::from(partial) * c1;
    }
    sum
}

#[cfg(target_arch = "aarch64")]
unsafe fn add_weights_neon(acc: &mut [i16], weights: &[i16]) {
    use std::arch::aarch64::{vaddq_s16, vld1q_s16, vst1q_s16};

    let acc_ptr = acc.as_mut_ptr();
    let w_ptr = weights.as_ptr();
    for i in (0..acc.len()).step_by(8) {
        let a = vld1q_s16(acc_ptr.add(i));
        let w = vld1q_s16(w_ptr.add(i));
        vst1q_s16(acc_ptr.add(i), vaddq_s16(a, w));
    }
}

#[cfg(target_arch = "aarch64")]
unsafe fn sub_weights_neon(acc: &mut [i16], weights: &[i16]) {
    use std::arch::aarch64::{vld1q_s16, vst1q_s16, vsubq_s16};

    let acc_ptr = acc.as_mut_ptr();
    let w_ptr = weights.as_ptr();
    for i in (0..acc.len()).step_by(8) {
        let a = vld1q_s16(acc_ptr.add(i));
        let w = vld1q_s16(w_ptr.add(i));
        vst1q_s16(acc_ptr.add(i), vsubq_s16(a, w));
    }
}

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
unsafe fn add_weights_avx2(acc: &mut [i16], weights: &[i16]) {
    use std::arch::x86_64::*;

    let acc_ptr = acc.as_mut_ptr();
    let w_ptr = weights.as_ptr();
    for i in (0..acc.len()).step_by(16) {
        let a = _mm256_loadu_si256(acc_ptr.add(i) as *const __m256i);
        let w = _mm256_loadu_si256(w_ptr.add(i) as *const __m256i);
        _mm256_storeu_si256(acc_ptr.add(i) as *mut __m256i, _mm256_add_epi16(a, w));
    }
}

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
unsafe fn sub_weights_avx2(acc: &mut [i16], weights: &[i16]) {
    use std::arch::x86_64::*;

    let acc_ptr = acc.as_mut_ptr();
    let w_ptr = weights.as_ptr();
    for i in (0..acc.len()).step_by(16) {
        let a = _mm256_loadu_si256(acc_ptr.add(i) as *const __m256i);
        let w = _mm256_loadu_si256(w_ptr.add(i) as *const __m256i);
        _mm256_storeu_si256(acc_ptr.add(i) as *mut __m256i, _mm256_sub_epi16(a, w));
    }
}

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
unsafe fn clipped_pairwise_dot_avx2(lo: &[i16], hi: &[i16], weights: &[i16]) -> i32 {
    use std::arch::x86_64::*;

    let zero = _mm256_setzero_si256();
    let qa = _mm256_set1_epi16(NETWORK_QA as i16);
    let mut sum = _mm256_setzero_si256();

    let lo_ptr = lo.as_ptr();
    let hi_ptr = hi.as_ptr();
    let w_ptr = weights.as_ptr();

    for i in (0..lo.len()).step_by(16) {
        let c0 = _mm256_min_epi16(
            _mm256_max_epi16(_mm256_loadu_si256(lo_ptr.add(i) as *const __m256i), zero),
            qa,
        );
        let c1 = _mm256_min_epi16(
            _mm256_max_epi16(_mm256_loadu_si256(hi_ptr.add(i) as *const __m256i), zero),
            qa,
        );
        let w = _mm256_loadu_si256(w_ptr.add(i) as *const __m256i);
        let prod = _mm256_madd_epi16(_mm256_mullo_epi16(c0, w), c1);
        sum = _mm256_add_epi32(sum, prod);
    }

    let mut lanes = [0i32; 8];
    _mm256_storeu_si256(lanes.as_mut_ptr() as *mut __m256i, sum);
    lanes.iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nnue::HIDDEN_WIDTH;

    #[test]
    fn add_then_sub_roundtrips() {
        let mut acc = vec![3i16; HIDDEN_WIDTH];
        let weights: Vec<i16> = (0..HIDDEN_WIDTH).map(|i| (i % 251) as i16 - 125).collect();
        add_weights(&mut acc, &weights);
        sub_weights(&mut acc, &weights);
        assert!(acc.iter().all(|&v| v == 3));
    }

    #[test]
    fn dot_matches_scalar() {
        let n = HIDDEN_WIDTH / 2;
        let lo: Vec<i16> = (0..n).map(|i| (i as i16 % 700) - 150).collect();
        let hi: Vec<i16> = (0..n).map(|i| (i as i16 % 311) - 40).collect();
        let w: Vec<i16> = (0..n).map(|i| (i as i16 % 127) - 63).collect();
        assert_eq!(
            clipped_pairwise_dot(&lo, &hi, &w),
            clipped_pairwise_dot_scalar(&lo, &hi, &w)
        );
    }
}
