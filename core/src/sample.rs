//! Sample types accepted by the correlator
//!
//! Samples are widened to `f32` before the transform. `i16` widens exactly
//! (every 16-bit integer is representable in an `f32` mantissa). `f32` passes
//! through unchanged but must be finite, since a single NaN or infinity would
//! spread to every bin of the spectrum.

use crate::error::{Result, XcorrError};

pub trait Sample: Copy {
    fn to_f32(self) -> f32;

    /// Reject sample values the transform cannot handle
    fn validate(samples: &[Self]) -> Result<()> {
        let _ = samples;
        Ok(())
    }
}

impl Sample for i16 {
    fn to_f32(self) -> f32 {
        f32::from(self)
    }
}

impl Sample for f32 {
    fn to_f32(self) -> f32 {
        self
    }

    fn validate(samples: &[Self]) -> Result<()> {
        match samples.iter().position(|s| !s.is_finite()) {
            Some(index) => Err(XcorrError::InvalidInput(format!(
                "non-finite sample {} at index {}",
                samples[index], index
            ))),
            None => Ok(()),
        }
    }
}

/// Copy `samples` into the front of `buffer` as `f32` and zero the rest
pub(crate) fn widen_into<S: Sample>(samples: &[S], buffer: &mut [f32]) {
    debug_assert!(samples.len() <= buffer.len(), "buffer shorter than signal");

    let (head, tail) = buffer.split_at_mut(samples.len());
    for (slot, &sample) in head.iter_mut().zip(samples) {
        *slot = sample.to_f32();
    }
    tail.fill(0.0);
}
