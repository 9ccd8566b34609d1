//! Channel equalization routines

use num_complex::Complex64;
use sim_core::{SimError, SimResult};

use super::routines::{Attachment, Routine};
use crate::precoding::StatedSymbols;

pub trait ChannelEqualization: Routine {
    /// Equalize the data symbols of one frame
    fn equalize(&self, symbols: StatedSymbols) -> SimResult<StatedSymbols>;
}

/// Default routine, passes symbols through untouched
#[derive(Debug, Default)]
pub struct NoEqualization {
    attachment: Attachment,
}

impl NoEqualization {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Routine for NoEqualization {
    fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    fn attachment_mut(&mut self) -> &mut Attachment {
        &mut self.attachment
    }
}

impl ChannelEqualization for NoEqualization {
    fn equalize(&self, symbols: StatedSymbols) -> SimResult<StatedSymbols> {
        self.attachment.require("channel equalization")?;
        Ok(symbols)
    }
}

/// Per-stream zero-forcing division by the channel response
///
/// Stream `s` is divided by the response of transmit stream 0 for a single
/// transmitted stream, or by the diagonal entry `(s, s)` for square channels.
/// Equalized responses are set to one.
#[derive(Debug, Default)]
pub struct ZeroForcingChannelEqualization {
    attachment: Attachment,
}

impl ZeroForcingChannelEqualization {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Routine for ZeroForcingChannelEqualization {
    fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    fn attachment_mut(&mut self) -> &mut Attachment {
        &mut self.attachment
    }
}

impl ChannelEqualization for ZeroForcingChannelEqualization {
    fn equalize(&self, mut stated: StatedSymbols) -> SimResult<StatedSymbols> {
        self.attachment.require("channel equalization")?;

        let (num_rx, num_tx, num_symbols) = stated.responses.dim();
        if num_tx != 1 && num_tx != num_rx {
            return Err(SimError::validation("equalized transmit streams", num_rx, num_tx));
        }

        for s in 0..num_rx {
            let t = if num_tx == 1 { 0 } else { s };
            for k in 0..num_symbols {
                let h = stated.responses[[s, t, k]];
                let gain = h.norm_sqr();
                if gain > 0.0 {
                    stated.symbols[[s, k]] /= h;
                    stated.noise[[s, k]] /= gain;
                } else {
                    stated.noise[[s, k]] = f64::INFINITY;
                }
                stated.responses[[s, t, k]] = Complex64::new(1.0, 0.0);
            }
        }

        Ok(stated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::WaveformRoutines;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_default_equalization_is_noop() {
        let routines = WaveformRoutines::new();
        let stated = StatedSymbols::new(
            Array2::from_elem((1, 2), Complex64::new(2.0, 0.0)),
            Array3::from_elem((1, 1, 2), Complex64::new(2.0, 0.0)),
            Array2::from_elem((1, 2), 0.1),
        )
        .unwrap();
        assert_eq!(routines.equalization().equalize(stated.clone()).unwrap(), stated);
    }

    #[test]
    fn test_zero_forcing_divides_per_stream() {
        let mut routines = WaveformRoutines::new();
        routines
            .set_equalization(Box::new(ZeroForcingChannelEqualization::new()))
            .unwrap();

        let h = [Complex64::new(0.0, 2.0), Complex64::new(0.5, 0.0)];
        let x = Complex64::new(1.0, -1.0);
        let stated = StatedSymbols::new(
            Array2::from_shape_fn((2, 3), |(s, _)| h[s] * x),
            Array3::from_shape_fn((2, 1, 3), |(s, _, _)| h[s]),
            Array2::from_elem((2, 3), 1.0),
        )
        .unwrap();

        let equalized = routines.equalization().equalize(stated).unwrap();
        for s in 0..2 {
            assert!((equalized.symbols[[s, 1]] - x).norm() < 1e-12);
            assert_eq!(equalized.responses[[s, 0, 1]], Complex64::new(1.0, 0.0));
        }
        assert!((equalized.noise[[0, 0]] - 0.25).abs() < 1e-12);
        assert!((equalized.noise[[1, 0]] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_floating_equalization_fails() {
        let floating = ZeroForcingChannelEqualization::new();
        let stated = StatedSymbols::new(Array2::zeros((1, 1)), Array3::zeros((1, 1, 1)), Array2::zeros((1, 1))).unwrap();
        assert!(matches!(floating.equalize(stated), Err(SimError::State(_))));
    }
}
