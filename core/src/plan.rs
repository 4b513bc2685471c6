//! Transform sizing and plan caching for the real FFT
//!
//! `realfft` plans are expensive to build and cheap to run, so plans are built
//! once per transform length and shared through [`PlanCache`]. Lengths are
//! always even (the complex-to-real transform needs a Nyquist bin) and only
//! contain the prime factors in [`FAST_SIZE_FACTORS`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use log::trace;
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::error::{Result, XcorrError};
use crate::FAST_SIZE_FACTORS;

/// Smallest even transform length `>= n` whose only prime factors are 2, 3 and 5
///
/// A length is even and 5-smooth exactly when its half is 5-smooth, so the
/// search runs over halves. `0` is treated as `1`.
pub fn next_fast_size(n: usize) -> usize {
    let mut half = n.div_ceil(2).max(1);
    while !is_fast_size(half) {
        half += 1;
    }
    2 * half
}

fn is_fast_size(mut n: usize) -> bool {
    for factor in FAST_SIZE_FACTORS {
        while n % factor == 0 {
            n /= factor;
        }
    }
    n == 1
}

/// Forward and inverse real FFT plans for one transform length
pub struct TransformPlans {
    len: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
}

impl TransformPlans {
    pub fn new(len: usize) -> Self {
        debug_assert!(len >= 2 && len % 2 == 0, "transform length must be even and non-zero");

        let mut planner = RealFftPlanner::<f32>::new();
        Self {
            len,
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
        }
    }

    /// Number of real samples in the time domain
    pub fn transform_len(&self) -> usize {
        self.len
    }

    /// Number of complex bins in the spectrum (`len / 2 + 1`)
    pub fn spectrum_len(&self) -> usize {
        self.len / 2 + 1
    }

    pub fn make_time_vec(&self) -> Vec<f32> {
        self.forward.make_input_vec()
    }

    pub fn make_spectrum_vec(&self) -> Vec<Complex<f32>> {
        self.forward.make_output_vec()
    }

    /// Real-to-complex transform. `input` is used as scratch and left undefined.
    pub fn forward(&self, input: &mut [f32], output: &mut [Complex<f32>]) -> Result<()> {
        self.forward
            .process(input, output)
            .map_err(|e| XcorrError::Fft(format!("forward transform (len {}) failed: {}", self.len, e)))
    }

    /// Complex-to-real transform, unnormalized: a forward/inverse pair scales
    /// the signal by the transform length. `input` is left undefined.
    pub fn inverse(&self, input: &mut [Complex<f32>], output: &mut [f32]) -> Result<()> {
        self.inverse
            .process(input, output)
            .map_err(|e| XcorrError::Fft(format!("inverse transform (len {}) failed: {}", self.len, e)))
    }
}

/// Shared, build-once cache of [`TransformPlans`] keyed by transform length
///
/// The map lock only guards lookup of the per-length cell. Plans are built
/// inside that cell's `OnceLock`, so concurrent first callers for one length
/// wait for a single construction while other lengths proceed. Published plans
/// are never replaced.
#[derive(Default)]
pub struct PlanCache {
    entries: Mutex<HashMap<usize, Arc<OnceLock<Arc<TransformPlans>>>>>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plans(&self, len: usize) -> Arc<TransformPlans> {
        let cell = {
            // A panic while holding the lock cannot leave a half-inserted entry
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(len).or_default())
        };

        Arc::clone(cell.get_or_init(|| {
            trace!("building real FFT plans for len {}", len);
            Arc::new(TransformPlans::new(len))
        }))
    }

    /// Number of transform lengths that have a cache entry
    pub fn cached_lengths(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_fast_size_known_values() {
        assert_eq!(next_fast_size(0), 2);
        assert_eq!(next_fast_size(1), 2);
        assert_eq!(next_fast_size(2), 2);
        assert_eq!(next_fast_size(3), 4);
        assert_eq!(next_fast_size(14), 16);
        assert_eq!(next_fast_size(22), 24);
        // 26 / 2 = 13 is prime, 15 = 3 * 5 is the next smooth half
        assert_eq!(next_fast_size(26), 30);
        assert_eq!(next_fast_size(2000), 2000);
        assert_eq!(next_fast_size(2002), 2048);
    }

    #[test]
    fn test_next_fast_size_is_minimal_even_and_smooth() {
        for n in 0..2000 {
            let m = next_fast_size(n);
            assert!(m >= n, "next_fast_size({}) = {} is too small", n, m);
            assert_eq!(m % 2, 0, "next_fast_size({}) = {} is odd", n, m);
            assert!(is_fast_size(m), "next_fast_size({}) = {} is not 5-smooth", n, m);

            // No smaller even smooth length fits
            for candidate in (n.max(2)..m).filter(|c| c % 2 == 0) {
                assert!(!is_fast_size(candidate), "{} fits {} but {} was returned", candidate, n, m);
            }
        }
    }

    #[test]
    fn test_is_fast_size() {
        assert!(is_fast_size(1));
        assert!(is_fast_size(2 * 3 * 5 * 16));
        assert!(!is_fast_size(7));
        assert!(!is_fast_size(2 * 11));
    }

    #[test]
    fn test_forward_inverse_scales_by_length() {
        let plans = TransformPlans::new(12);
        assert_eq!(plans.spectrum_len(), 7);

        let original: Vec<f32> = (0..12).map(|i| (i as f32 * 0.7).sin() * 100.0).collect();
        let mut time = original.clone();
        let mut spectrum = plans.make_spectrum_vec();
        plans.forward(&mut time, &mut spectrum).unwrap();

        let mut restored = plans.make_time_vec();
        plans.inverse(&mut spectrum, &mut restored).unwrap();

        for (i, (&x, &y)) in original.iter().zip(restored.iter()).enumerate() {
            assert!((x * 12.0 - y).abs() < 1e-2, "sample {}: expected {}, got {}", i, x * 12.0, y);
        }
    }

    #[test]
    fn test_forward_rejects_wrong_buffer_size() {
        let plans = TransformPlans::new(8);
        let mut time = vec![0.0; 6];
        let mut spectrum = plans.make_spectrum_vec();
        let err = plans.forward(&mut time, &mut spectrum).unwrap_err();
        assert!(matches!(err, XcorrError::Fft(_)));
    }

    #[test]
    fn test_plan_cache_reuses_plans() {
        let cache = PlanCache::new();
        let first = cache.plans(64);
        let second = cache.plans(64);
        let other = cache.plans(96);

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(other.transform_len(), 96);
        assert_eq!(cache.cached_lengths(), 2);
    }

    #[test]
    fn test_plan_cache_concurrent_first_use_builds_once() {
        let cache = PlanCache::new();

        let plans: Vec<Arc<TransformPlans>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| cache.plans(480))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for p in &plans[1..] {
            assert!(Arc::ptr_eq(&plans[0], p), "every thread must share one plan set");
        }
        assert_eq!(cache.cached_lengths(), 1);
    }
}
