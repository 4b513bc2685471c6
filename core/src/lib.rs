//! Time-lag estimation between two sampled signals
//!
//! Cross-correlates two signals in the frequency domain (real FFT, cross-power
//! spectrum, inverse FFT), picks the lag with the strongest correlation and
//! scores how unique that match is against the next-best peak.

pub mod error;
pub mod plan;
pub mod sample;
pub mod xcorr;

pub use error::{XcorrError, Result};
pub use plan::{next_fast_size, PlanCache, TransformPlans};
pub use sample::Sample;
pub use xcorr::{compute_lag, CrossCorrelator, XcorrMatch};

/// Samples on either side of the primary peak ignored when looking for the
/// secondary peak, unless the caller picks another width
pub const DEFAULT_PEAK_WIDTH: usize = 16;

/// Prime factors a transform length may contain to count as a fast size
pub const FAST_SIZE_FACTORS: [usize; 3] = [2, 3, 5];
