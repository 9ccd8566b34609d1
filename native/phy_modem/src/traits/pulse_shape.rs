//! PulseShape trait - Spectral shaping / ISI control
//!
//! The same real filter is used for transmit shaping and receive matched
//! filtering.

use num_complex::Complex64;

/// Pulse shaping filter trait
pub trait PulseShape: Send + Sync + std::fmt::Debug {
    /// Length of the filter in samples
    fn filter_len(&self) -> usize;

    /// Get the filter coefficients
    fn coefficients(&self) -> &[f64];

    /// Filter span in symbols (each side of center)
    fn span_symbols(&self) -> usize;

    /// Full linear convolution of a complex sequence with the filter
    ///
    /// The output holds `input.len() + filter_len() - 1` samples.
    fn convolve(&self, input: &[Complex64]) -> Vec<Complex64> {
        if input.is_empty() {
            return Vec::new();
        }

        let coeffs = self.coefficients();
        let mut output = vec![Complex64::new(0.0, 0.0); input.len() + coeffs.len() - 1];
        for (n, x) in input.iter().enumerate() {
            if x.norm_sqr() == 0.0 {
                continue;
            }
            for (k, c) in coeffs.iter().enumerate() {
                output[n + k] += x * c;
            }
        }
        output
    }
}
