use wasm_bindgen::prelude::*;
use xcorrlag_core::{CrossCorrelator, XcorrMatch, DEFAULT_PEAK_WIDTH};

/// Result of a lag search, as seen from JavaScript
#[wasm_bindgen]
pub struct LagMatch {
    inner: XcorrMatch,
}

#[wasm_bindgen]
impl LagMatch {
    #[wasm_bindgen(getter)]
    pub fn lag(&self) -> isize {
        self.inner.lag
    }

    #[wasm_bindgen(getter)]
    pub fn score(&self) -> f32 {
        self.inner.score
    }

    #[wasm_bindgen(getter)]
    pub fn nfft(&self) -> usize {
        self.inner.nfft
    }

    #[wasm_bindgen(js_name = lagSeconds)]
    pub fn lag_seconds(&self, sample_rate: u32) -> f64 {
        self.inner.lag_seconds(sample_rate)
    }
}

/// Correlator that keeps its FFT plans between calls
#[wasm_bindgen]
pub struct WasmCorrelator {
    inner: CrossCorrelator,
}

#[wasm_bindgen]
impl WasmCorrelator {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmCorrelator {
        WasmCorrelator { inner: CrossCorrelator::new() }
    }

    /// Lag between two Int16Array recordings
    #[wasm_bindgen(js_name = computeLag)]
    pub fn compute_lag(&self, a: &[i16], b: &[i16], peak_width: Option<usize>) -> Result<LagMatch, JsValue> {
        self.inner
            .compute_lag(a, b, peak_width.unwrap_or(DEFAULT_PEAK_WIDTH))
            .map(|inner| LagMatch { inner })
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Lag between two Float32Array recordings (e.g. Web Audio buffers)
    #[wasm_bindgen(js_name = computeLagF32)]
    pub fn compute_lag_f32(&self, a: &[f32], b: &[f32], peak_width: Option<usize>) -> Result<LagMatch, JsValue> {
        self.inner
            .compute_lag(a, b, peak_width.unwrap_or(DEFAULT_PEAK_WIDTH))
            .map(|inner| LagMatch { inner })
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

impl Default for WasmCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_lag_through_binding() {
        let correlator = WasmCorrelator::new();
        let mut a = vec![0i16; 50_000];
        let mut b = vec![0i16; 50_000];
        a[10] = 100;
        b[40_010] = 100;

        let m = correlator.compute_lag(&a, &b, None).unwrap();
        assert_eq!(m.lag(), -40_000);

        let m = correlator.compute_lag_f32(&[0.5, 0.0, 0.0], &[0.0, 0.0, 0.5], Some(0)).unwrap();
        assert_eq!(m.lag(), -2);
    }

    #[test]
    fn test_compute_lag_through_binding() {
        let correlator = WasmCorrelator::new();
        let m = correlator.compute_lag(&[0, 0, 0, 100], &[100, 0, 0, 0], Some(0)).unwrap();
        assert_eq!(m.lag(), 3);
        assert_eq!(m.nfft(), 8);
        assert!(m.score() < 1e-3);
        assert!((m.lag_seconds(8000) - 0.000375).abs() < 1e-9);
    }
}
