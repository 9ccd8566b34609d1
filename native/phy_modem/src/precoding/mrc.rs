//! Maximum ratio combining of receive streams

use ndarray::{Array2, Array3};
use num_complex::Complex64;
use sim_core::{SimError, SimResult};

use super::{StatedSymbols, SymbolPrecoder};

/// Coherently combines all receive streams of a single transmitted stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaximumRatioCombining;

impl SymbolPrecoder for MaximumRatioCombining {
    fn encode(&self, _symbols: Array2<Complex64>) -> SimResult<Array2<Complex64>> {
        Err(SimError::state(
            "maximum ratio combining can only be applied to received symbols",
        ))
    }

    fn decode(&self, stated: StatedSymbols) -> SimResult<StatedSymbols> {
        let (num_rx, num_tx, num_symbols) = stated.responses.dim();
        if num_tx != 1 {
            return Err(SimError::validation("combined transmit streams", 1, num_tx));
        }

        let mut symbols = Array2::zeros((1, num_symbols));
        let mut noise = Array2::zeros((1, num_symbols));
        for k in 0..num_symbols {
            let gain: f64 = (0..num_rx).map(|r| stated.responses[[r, 0, k]].norm_sqr()).sum();
            if gain <= 0.0 {
                noise[[0, k]] = f64::INFINITY;
                continue;
            }

            let combined: Complex64 = (0..num_rx)
                .map(|r| stated.responses[[r, 0, k]].conj() * stated.symbols[[r, k]])
                .sum();
            let variance: f64 = (0..num_rx)
                .map(|r| stated.responses[[r, 0, k]].norm_sqr() * stated.noise[[r, k]])
                .sum();

            symbols[[0, k]] = combined / gain;
            noise[[0, k]] = variance / (gain * gain);
        }

        let responses = Array3::from_elem((1, 1, num_symbols), Complex64::new(1.0, 0.0));
        StatedSymbols::new(symbols, responses, noise)
    }
}
