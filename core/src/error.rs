use thiserror::Error;

#[derive(Debug, Error)]
pub enum XcorrError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Degenerate correlation: primary peak is zero (silent input)")]
    DegenerateCorrelation,

    #[error("FFT error: {0}")]
    Fft(String),
}

pub type Result<T> = std::result::Result<T, XcorrError>;
