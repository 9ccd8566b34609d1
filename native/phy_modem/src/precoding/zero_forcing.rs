//! Zero-forcing channel equalization

use nalgebra::DMatrix;
use ndarray::{s, Array2, Array3};
use num_complex::Complex64;
use sim_core::{SimError, SimResult};

use super::{StatedSymbols, SymbolPrecoder};

/// Applies the per-symbol pseudo-inverse of the channel response
///
/// Only meaningful at the receiver; encoding is a state error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZeroForcingEqualizer;

impl SymbolPrecoder for ZeroForcingEqualizer {
    fn encode(&self, _symbols: Array2<Complex64>) -> SimResult<Array2<Complex64>> {
        Err(SimError::state(
            "zero-forcing equalization can only be applied to received symbols",
        ))
    }

    fn decode(&self, stated: StatedSymbols) -> SimResult<StatedSymbols> {
        let (num_rx, num_tx, num_symbols) = stated.responses.dim();

        let mut symbols = Array2::zeros((num_tx, num_symbols));
        let mut responses = Array3::zeros((num_tx, num_tx, num_symbols));
        let mut noise = Array2::zeros((num_tx, num_symbols));

        for k in 0..num_symbols {
            let h = stated.responses.slice(s![.., .., k]);
            let matrix = DMatrix::from_fn(num_rx, num_tx, |r, t| h[[r, t]]);
            let equalizer = matrix
                .pseudo_inverse(1e-12)
                .map_err(|e| SimError::state(format!("channel response has no pseudo-inverse: {}", e)))?;

            for t in 0..num_tx {
                let mut symbol = Complex64::new(0.0, 0.0);
                let mut variance = 0.0;
                for r in 0..num_rx {
                    symbol += equalizer[(t, r)] * stated.symbols[[r, k]];
                    variance += equalizer[(t, r)].norm_sqr() * stated.noise[[r, k]];
                }
                symbols[[t, k]] = symbol;
                noise[[t, k]] = variance;

                for u in 0..num_tx {
                    responses[[t, u, k]] = (0..num_rx).map(|r| equalizer[(t, r)] * h[[r, u]]).sum();
                }
            }
        }

        StatedSymbols::new(symbols, responses, noise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_zero_forcing_inverts_mimo_channel() {
        let h = [[c(1.0, 0.5), c(0.2, 0.0)], [c(-0.3, 0.1), c(0.8, -0.4)]];
        let x = [[c(1.0, 0.0), c(0.0, 1.0), c(-1.0, 0.0)], [c(0.0, -1.0), c(1.0, 0.0), c(0.5, 0.5)]];

        let responses = Array3::from_shape_fn((2, 2, 3), |(r, t, _)| h[r][t]);
        let received = Array2::from_shape_fn((2, 3), |(r, k)| h[r][0] * x[0][k] + h[r][1] * x[1][k]);
        let stated = StatedSymbols::new(received, responses, Array2::from_elem((2, 3), 0.1)).unwrap();

        let equalized = ZeroForcingEqualizer.decode(stated).unwrap();
        for t in 0..2 {
            for k in 0..3 {
                assert!(
                    (equalized.symbols[[t, k]] - x[t][k]).norm() < 1e-9,
                    "Stream {} symbol {} not recovered",
                    t,
                    k
                );
                assert!(equalized.noise[[t, k]] > 0.0);
            }
            assert!((equalized.responses[[t, t, 0]] - c(1.0, 0.0)).norm() < 1e-9);
        }
    }

    #[test]
    fn test_zero_forcing_combines_simo_to_single_stream() {
        let responses = Array3::from_shape_fn((3, 1, 4), |(r, _, _)| c(1.0 + r as f64, 0.0));
        let received = Array2::from_shape_fn((3, 4), |(r, _)| c(1.0 + r as f64, 0.0) * c(0.0, 1.0));
        let stated = StatedSymbols::new(received, responses, Array2::from_elem((3, 4), 1.0)).unwrap();

        let equalized = ZeroForcingEqualizer.decode(stated).unwrap();
        assert_eq!(equalized.num_streams(), 1);
        assert!((equalized.symbols[[0, 2]] - c(0.0, 1.0)).norm() < 1e-9);
        // Row energy of pinv([1, 2, 3]ᵀ) is 1/14
        assert!((equalized.noise[[0, 0]] - 1.0 / 14.0).abs() < 1e-9);
    }
}
