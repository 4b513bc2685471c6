//! FFT-based lag estimation between two 1D signals
//!
//! Finds the shift at which two signals line up best and scores how unique
//! that alignment is. Typical use is synchronising two recordings of the same
//! acoustic event.
//!
//! # Method
//!
//! Both signals are zero-padded to a fast transform length of at least twice
//! the longer signal, so the circular correlation computed by the FFT does not
//! wrap onto the linear correlation near the peak. The correlation is
//! `IFFT(A * conj(B))`, read on a circular lag axis:
//!
//! - index `n <= nfft / 2` is lag `+n`
//! - index `n > nfft / 2` is lag `n - nfft`
//!
//! A positive lag means `a` lags behind (follows) `b`.
//!
//! # Score
//!
//! The strongest correlation magnitude (positive or negative) is the primary
//! peak. The secondary peak is the strongest magnitude more than `peak_width`
//! samples away from it. The distance is `n - max_offset`, plus `nfft` when
//! that falls below `-nfft / 2`. `score = secondary / primary`,
//! so `0.0` is an unambiguous match and `1.0` means another lag fits equally
//! well.

use std::sync::OnceLock;

use log::debug;
use realfft::num_complex::Complex;

use crate::error::{Result, XcorrError};
use crate::plan::{next_fast_size, PlanCache};
use crate::sample::{widen_into, Sample};

/// Best alignment between two signals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XcorrMatch {
    /// Signed offset in samples; positive when `a` follows `b`
    pub lag: isize,
    /// Secondary peak over primary peak, in `[0, 1]`
    pub score: f32,
    /// Transform length the correlation was computed with
    pub nfft: usize,
}

impl XcorrMatch {
    pub fn lag_seconds(&self, sample_rate: u32) -> f64 {
        self.lag as f64 / f64::from(sample_rate)
    }
}

/// Cross-correlator with its own transform plan cache
///
/// Calls only take `&self`; one correlator can be shared between threads and
/// every call allocates its own buffers.
#[derive(Default)]
pub struct CrossCorrelator {
    plans: PlanCache,
}

impl CrossCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lag at which `a` and `b` correlate most strongly, with a uniqueness score
    ///
    /// `peak_width` is the number of samples on each side of the primary peak
    /// left out of the secondary peak search. Widths of `nfft` or more leave
    /// nothing to search and yield a score of `0.0`.
    ///
    /// # Errors
    ///
    /// - `XcorrError::InvalidInput` if either signal is empty or has a
    ///   non-finite sample
    /// - `XcorrError::DegenerateCorrelation` if the correlation is zero
    ///   everywhere (silent input)
    /// - `XcorrError::Fft` if the transform engine rejects a buffer
    pub fn compute_lag<S: Sample>(&self, a: &[S], b: &[S], peak_width: usize) -> Result<XcorrMatch> {
        if a.is_empty() || b.is_empty() {
            return Err(XcorrError::InvalidInput(format!(
                "signals must not be empty (a={} samples, b={} samples)",
                a.len(),
                b.len()
            )));
        }
        S::validate(a)?;
        S::validate(b)?;

        let nfft = next_fast_size(2 * a.len().max(b.len()));
        debug!("correlating a={} b={} samples with nfft={}", a.len(), b.len(), nfft);

        let plans = self.plans.plans(nfft);

        let mut a_time = plans.make_time_vec();
        let mut b_time = plans.make_time_vec();
        widen_into(a, &mut a_time);
        widen_into(b, &mut b_time);

        let mut a_freq = plans.make_spectrum_vec();
        let mut b_freq = plans.make_spectrum_vec();
        plans.forward(&mut a_time, &mut a_freq)?;
        plans.forward(&mut b_time, &mut b_freq)?;

        cross_power_in_place(&mut a_freq, &b_freq);

        // a_time was consumed as forward scratch; reuse it for the correlation
        let correlation = &mut a_time;
        plans.inverse(&mut a_freq, correlation)?;

        let (max_offset, max_value) = primary_peak(correlation);
        if max_value == 0.0 {
            return Err(XcorrError::DegenerateCorrelation);
        }
        if !max_value.is_finite() {
            return Err(XcorrError::InvalidInput(
                "correlation overflowed f32; sample magnitudes are too large".to_string(),
            ));
        }

        let second_value = secondary_peak(correlation, max_offset, peak_width);
        let lag = unwrap_lag(max_offset, nfft);
        let score = second_value / max_value;

        debug!(
            "peak at index {} (lag {}), primary={} secondary={} score={}",
            max_offset, lag, max_value, second_value, score
        );

        Ok(XcorrMatch { lag, score, nfft })
    }
}

/// [`CrossCorrelator::compute_lag`] on a process-wide correlator
///
/// Transform plans are shared between all callers of this function.
pub fn compute_lag<S: Sample>(a: &[S], b: &[S], peak_width: usize) -> Result<XcorrMatch> {
    static SHARED: OnceLock<CrossCorrelator> = OnceLock::new();
    SHARED.get_or_init(CrossCorrelator::new).compute_lag(a, b, peak_width)
}

/// `a[k] = a[k] * conj(b[k])` for every bin
fn cross_power_in_place(a: &mut [Complex<f32>], b: &[Complex<f32>]) {
    for (x, y) in a.iter_mut().zip(b) {
        *x *= y.conj();
    }

    // DC and Nyquist bins of a real spectrum are real; the inverse transform
    // rejects any imaginary residue there
    if let Some(first) = a.first_mut() {
        first.im = 0.0;
    }
    if let Some(last) = a.last_mut() {
        last.im = 0.0;
    }
}

/// Index and magnitude of the largest `|r[n]|`, first index on ties
fn primary_peak(correlation: &[f32]) -> (usize, f32) {
    let mut max_value = 0.0f32;
    let mut max_offset = 0;
    for (n, value) in correlation.iter().enumerate() {
        let magnitude = value.abs();
        if magnitude > max_value {
            max_value = magnitude;
            max_offset = n;
        }
    }
    (max_offset, max_value)
}

/// Largest `|r[n]|` more than `peak_width` samples from `max_offset`
fn secondary_peak(correlation: &[f32], max_offset: usize, peak_width: usize) -> f32 {
    let nfft = correlation.len();
    correlation
        .iter()
        .enumerate()
        .filter(|&(n, _)| peak_distance(n, max_offset, nfft) > peak_width)
        .map(|(_, value)| value.abs())
        .fold(0.0, f32::max)
}

/// `|n - max_offset|`, with only differences below `-nfft/2` wrapped by `nfft`.
/// Bins just under `nfft` stay far from a peak near index 0.
fn peak_distance(n: usize, max_offset: usize, nfft: usize) -> usize {
    let mut d = n as isize - max_offset as isize;
    if d < -(nfft as isize / 2) {
        d += nfft as isize;
    }
    d.unsigned_abs()
}

/// Map a circular correlation index to a signed lag in `(-nfft/2, nfft/2]`
fn unwrap_lag(offset: usize, nfft: usize) -> isize {
    if offset > nfft / 2 {
        offset as isize - nfft as isize
    } else {
        offset as isize
    }
}
