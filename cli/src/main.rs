use clap::Parser;
use log::info;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xcorrlag_core::{compute_lag, XcorrMatch, DEFAULT_PEAK_WIDTH};

#[derive(Parser)]
#[command(name = "xcorrlag")]
#[command(about = "Find the time lag between two recordings using FFT cross-correlation")]
struct Cli {
    /// First recording; a positive lag means it starts later than B
    #[arg(value_name = "A.WAV")]
    a: PathBuf,

    /// Second (reference) recording
    #[arg(value_name = "B.WAV")]
    b: PathBuf,

    /// Samples on each side of the peak ignored when scoring the match
    #[arg(short, long, default_value_t = DEFAULT_PEAK_WIDTH)]
    peak_width: usize,

    /// Print the result as a JSON object
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{path}: expected a mono recording, found {channels} channels")]
    NotMono { path: String, channels: u16 },

    #[error("{path}: unsupported sample format ({bits}-bit {format})")]
    UnsupportedFormat { path: String, bits: u16, format: &'static str },

    #[error("sample rates differ: {a} Hz vs {b} Hz")]
    SampleRateMismatch { a: u32, b: u32 },
}

enum Samples {
    Int(Vec<i16>),
    Float(Vec<f32>),
}

impl Samples {
    fn len(&self) -> usize {
        match self {
            Samples::Int(s) => s.len(),
            Samples::Float(s) => s.len(),
        }
    }

    /// Float view; 16-bit samples are scaled to [-1.0, 1.0)
    fn into_f32(self) -> Vec<f32> {
        match self {
            Samples::Int(s) => s.into_iter().map(|x| x as f32 / 32768.0).collect(),
            Samples::Float(s) => s,
        }
    }
}

struct Recording {
    sample_rate: u32,
    samples: Samples,
}

#[derive(Serialize)]
struct LagReport {
    lag: isize,
    lag_seconds: f64,
    score: f32,
    nfft: usize,
    sample_rate: u32,
}

impl LagReport {
    fn new(m: &XcorrMatch, sample_rate: u32) -> Self {
        Self {
            lag: m.lag,
            lag_seconds: m.lag_seconds(sample_rate),
            score: m.score,
            nfft: m.nfft,
            sample_rate,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let a = read_recording(&cli.a)?;
    let b = read_recording(&cli.b)?;

    if a.sample_rate != b.sample_rate {
        return Err(CliError::SampleRateMismatch { a: a.sample_rate, b: b.sample_rate }.into());
    }
    let sample_rate = a.sample_rate;

    // Mixed formats are compared as float; scaling one side does not move the peak
    let m = match (a.samples, b.samples) {
        (Samples::Int(a), Samples::Int(b)) => compute_lag(&a, &b, cli.peak_width)?,
        (a, b) => compute_lag(&a.into_f32(), &b.into_f32(), cli.peak_width)?,
    };

    let report = LagReport::new(&m, sample_rate);
    if cli.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("Lag: {} samples ({:.6} s at {} Hz)", report.lag, report.lag_seconds, sample_rate);
        println!("Score: {:.4} (0 = unique match, 1 = ambiguous)", report.score);
        println!("FFT size: {}", report.nfft);
    }

    Ok(())
}

fn read_recording(path: &Path) -> Result<Recording, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let mut reader = hound::WavReader::new(file)?;

    let spec = reader.spec();
    info!(
        "Read WAV {}: {} Hz, {} channels, {} bits",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    if spec.channels != 1 {
        return Err(CliError::NotMono { path: path.display().to_string(), channels: spec.channels }.into());
    }

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => {
            let int_samples: Result<Vec<i16>, _> = reader.samples::<i16>().collect();
            Samples::Int(int_samples?)
        }
        (hound::SampleFormat::Float, 32) => {
            let float_samples: Result<Vec<f32>, _> = reader.samples::<f32>().collect();
            Samples::Float(float_samples?)
        }
        (format, bits) => {
            let format = match format {
                hound::SampleFormat::Int => "integer",
                hound::SampleFormat::Float => "float",
            };
            return Err(CliError::UnsupportedFormat { path: path.display().to_string(), bits, format }.into());
        }
    };

    info!("Extracted {} samples from {}", samples.len(), path.display());

    Ok(Recording { sample_rate: spec.sample_rate, samples })
}
