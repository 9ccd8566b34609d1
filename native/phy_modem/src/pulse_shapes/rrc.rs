//! Root Raised Cosine (RRC) pulse shaping filter
//!
//! When convolved with itself (TX then RX), produces zero ISI at symbol
//! centers. The taps are normalized to unit energy, so a transmit pulse
//! followed by the matched filter peaks at exactly the transmitted symbol.

use num_complex::Complex64;
use sim_core::{SimError, SimResult};
use std::f64::consts::PI;

use crate::traits::PulseShape;

/// Root Raised Cosine filter
#[derive(Debug, Clone, PartialEq)]
pub struct RootRaisedCosine {
    coeffs: Vec<f64>,
    span: usize,
    samples_per_symbol: usize,
    roll_off: f64,
}

impl RootRaisedCosine {
    /// Create a new RRC filter
    ///
    /// # Arguments
    /// * `samples_per_symbol` - Oversampling factor, at least one
    /// * `roll_off` - Excess bandwidth in `[0, 1]`
    /// * `span` - Filter span in symbols (each side of center)
    pub fn new(samples_per_symbol: usize, roll_off: f64, span: usize) -> SimResult<Self> {
        if samples_per_symbol < 1 {
            return Err(SimError::config("samples per symbol must be at least one"));
        }
        if !(0.0..=1.0).contains(&roll_off) {
            return Err(SimError::config(format!("roll-off must lie in [0, 1], got {}", roll_off)));
        }

        Ok(Self {
            coeffs: rrc_taps(samples_per_symbol, roll_off, span),
            span,
            samples_per_symbol,
            roll_off,
        })
    }

    /// Create with default roll-off and span
    pub fn default_for_sps(samples_per_symbol: usize) -> SimResult<Self> {
        Self::new(samples_per_symbol, super::DEFAULT_ROLL_OFF, super::DEFAULT_SPAN)
    }

    pub fn samples_per_symbol(&self) -> usize {
        self.samples_per_symbol
    }

    pub fn roll_off(&self) -> f64 {
        self.roll_off
    }

    /// Group delay of one filter pass in samples
    pub fn delay(&self) -> usize {
        (self.coeffs.len() - 1) / 2
    }

    /// Upsample symbols to impulses and shape them
    ///
    /// Returns `symbols.len() * samples_per_symbol + filter_len - 1` samples,
    /// symbol `k` peaking at `k * samples_per_symbol + delay()`.
    pub fn shape(&self, symbols: &[Complex64]) -> Vec<Complex64> {
        let mut impulses = vec![Complex64::new(0.0, 0.0); symbols.len() * self.samples_per_symbol];
        for (k, symbol) in symbols.iter().enumerate() {
            impulses[k * self.samples_per_symbol] = *symbol;
        }
        self.convolve(&impulses)
    }

    /// Matched-filter samples and pick `num_symbols` symbol-spaced decisions
    ///
    /// Symbol `k` is read at `k * samples_per_symbol + 2 * delay()` of the
    /// filtered stream; instants beyond the stream read as zero.
    pub fn matched_symbols(&self, samples: &[Complex64], num_symbols: usize) -> Vec<Complex64> {
        let filtered = self.convolve(samples);
        (0..num_symbols)
            .map(|k| {
                filtered
                    .get(k * self.samples_per_symbol + 2 * self.delay())
                    .copied()
                    .unwrap_or_default()
            })
            .collect()
    }
}

impl PulseShape for RootRaisedCosine {
    fn filter_len(&self) -> usize {
        self.coeffs.len()
    }

    fn coefficients(&self) -> &[f64] {
        &self.coeffs
    }

    fn span_symbols(&self) -> usize {
        self.span
    }
}

/// RRC impulse response with the singular points handled explicitly
fn rrc_taps(samples_per_symbol: usize, roll_off: f64, span: usize) -> Vec<f64> {
    let filter_len = 2 * span * samples_per_symbol + 1;
    let center = (filter_len - 1) as f64 / 2.0;

    let mut taps: Vec<f64> = (0..filter_len)
        .map(|i| {
            // Time in symbol periods, centered at 0
            let t = (i as f64 - center) / samples_per_symbol as f64;

            if t.abs() < 1e-10 {
                1.0 + roll_off * (4.0 / PI - 1.0)
            } else if roll_off > 0.0 && (t.abs() - 1.0 / (4.0 * roll_off)).abs() < 1e-10 {
                let sin_term = (1.0 + 2.0 / PI) * (PI / (4.0 * roll_off)).sin();
                let cos_term = (1.0 - 2.0 / PI) * (PI / (4.0 * roll_off)).cos();
                roll_off / 2.0_f64.sqrt() * (sin_term + cos_term)
            } else {
                let num = (PI * t * (1.0 - roll_off)).sin()
                    + 4.0 * roll_off * t * (PI * t * (1.0 + roll_off)).cos();
                let den = PI * t * (1.0 - (4.0 * roll_off * t).powi(2));
                num / den
            }
        })
        .collect();

    let norm = taps.iter().map(|x| x * x).sum::<f64>().sqrt();
    taps.iter_mut().for_each(|c| *c /= norm);
    taps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rrc_filter_length() {
        let rrc = RootRaisedCosine::new(4, 0.35, 6).unwrap();
        // 2 * 6 * 4 + 1 = 49 taps
        assert_eq!(rrc.filter_len(), 49);
        assert_eq!(rrc.delay(), 24);
    }

    #[test]
    fn test_rrc_symmetry_and_unit_energy() {
        let rrc = RootRaisedCosine::new(4, 0.35, 6).unwrap();
        let coeffs = rrc.coefficients();
        let len = coeffs.len();

        for i in 0..len / 2 {
            assert!(
                (coeffs[i] - coeffs[len - 1 - i]).abs() < 1e-10,
                "Asymmetric at index {}: {} vs {}",
                i,
                coeffs[i],
                coeffs[len - 1 - i]
            );
        }

        let energy: f64 = coeffs.iter().map(|x| x * x).sum();
        assert!((energy - 1.0).abs() < 1e-10, "Filter energy: {}", energy);
    }

    #[test]
    fn test_rrc_rejects_invalid_parameters() {
        assert!(RootRaisedCosine::new(0, 0.35, 6).is_err());
        assert!(RootRaisedCosine::new(4, 1.5, 6).is_err());
        assert!(RootRaisedCosine::new(4, -0.1, 6).is_err());
    }

    #[test]
    fn test_singular_taps_are_finite() {
        // t = ±1/(4·roll_off) falls on a tap for roll_off 0.25 at 4 samples per symbol
        let rrc = RootRaisedCosine::new(4, 0.25, 4).unwrap();
        assert!(rrc.coefficients().iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_shape_then_match_recovers_symbols() {
        let rrc = RootRaisedCosine::new(8, 0.35, 8).unwrap();
        let symbols: Vec<Complex64> = (0..32)
            .map(|k| Complex64::from_polar(1.0, 0.7 * k as f64))
            .collect();

        let shaped = rrc.shape(&symbols);
        assert_eq!(shaped.len(), 32 * 8 + rrc.filter_len() - 1);

        let recovered = rrc.matched_symbols(&shaped, symbols.len());
        for (k, (tx, rx)) in symbols.iter().zip(recovered.iter()).enumerate() {
            assert!((tx - rx).norm() < 0.05, "Symbol {} recovered as {} instead of {}", k, rx, tx);
        }
    }
}
