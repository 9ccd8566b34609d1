//! Discrete channel state
//!
//! A [`ChannelState`] is the tap-gain tensor of a channel realization sampled
//! for one device pair, sampling rate and time window. It is derived on demand
//! and never persisted.

use std::ops::Range;

use ndarray::{s, Array2, Array4};
use num_complex::Complex64;
use sim_core::{SimError, SimResult, Signal};

/// Time-variant tap gains, shape `(num_rx, num_tx, num_samples, num_delay_taps)`
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    dense: Array4<Complex64>,
}

impl ChannelState {
    pub fn from_dense(dense: Array4<Complex64>) -> Self {
        Self { dense }
    }

    /// Distortion-free single-tap state with unit gain between equal stream indices
    pub fn ideal(num_rx: usize, num_tx: usize, num_samples: usize) -> Self {
        let mut dense = Array4::zeros((num_rx, num_tx, num_samples, 1));
        for stream in 0..num_rx.min(num_tx) {
            dense
                .slice_mut(s![stream, stream, .., 0])
                .fill(Complex64::new(1.0, 0.0));
        }
        Self { dense }
    }

    pub fn dense(&self) -> &Array4<Complex64> {
        &self.dense
    }

    pub fn into_dense(self) -> Array4<Complex64> {
        self.dense
    }

    pub fn num_receive_streams(&self) -> usize {
        self.dense.shape()[0]
    }

    pub fn num_transmit_streams(&self) -> usize {
        self.dense.shape()[1]
    }

    pub fn num_samples(&self) -> usize {
        self.dense.shape()[2]
    }

    pub fn num_delay_taps(&self) -> usize {
        self.dense.shape()[3]
    }

    /// Copy of the state restricted to a range of sample instants
    ///
    /// The range is clamped to the available samples.
    pub fn slice_samples(&self, range: Range<usize>) -> ChannelState {
        let end = range.end.min(self.num_samples());
        let start = range.start.min(end);
        Self {
            dense: self.dense.slice(s![.., .., start..end, ..]).to_owned(),
        }
    }

    /// Sparse view: `(tap, rx, tx, sample, gain)` for every non-zero entry
    pub fn nonzero_taps(&self) -> Vec<(usize, usize, usize, usize, Complex64)> {
        self.dense
            .indexed_iter()
            .filter(|(_, gain)| gain.norm_sqr() > 0.0)
            .map(|((rx, tx, k, tap), gain)| (tap, rx, tx, k, *gain))
            .collect()
    }

    /// Per-sample flat response, summing all delay taps, shape `(num_rx, num_tx)` at sample `k`
    pub fn flat_response(&self, k: usize) -> Array2<Complex64> {
        self.dense
            .slice(s![.., .., k, ..])
            .sum_axis(ndarray::Axis(2))
    }

    /// Apply the tap gains to a signal
    ///
    /// The output holds `num_samples + num_delay_taps - 1` samples.
    pub fn propagate(&self, signal: &Signal) -> SimResult<Signal> {
        if signal.num_streams() != self.num_transmit_streams() {
            return Err(SimError::validation(
                "transmitted streams",
                self.num_transmit_streams(),
                signal.num_streams(),
            ));
        }
        if signal.num_samples() > self.num_samples() {
            return Err(SimError::validation(
                "signal samples covered by channel state",
                self.num_samples(),
                signal.num_samples(),
            ));
        }

        let num_samples = signal.num_samples();
        let num_taps = self.num_delay_taps();
        let input = signal.samples();
        let mut output =
            Array2::zeros((self.num_receive_streams(), num_samples + num_taps.max(1) - 1));

        for ((rx, tx, k, tap), gain) in self.dense.indexed_iter() {
            if k >= num_samples {
                continue;
            }
            output[[rx, k + tap]] += gain * input[[tx, k]];
        }

        Signal::new(output, signal.sampling_rate(), signal.carrier_frequency())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ideal_state_passes_signal() {
        let state = ChannelState::ideal(2, 2, 8);
        let samples = Array2::from_shape_fn((2, 8), |(i, k)| Complex64::new(i as f64, k as f64));
        let signal = Signal::new(samples.clone(), 1e3, 0.0).unwrap();

        let propagated = state.propagate(&signal).unwrap();
        assert_eq!(propagated.samples(), &samples);
    }

    #[test]
    fn test_delay_tap_shifts_output() {
        let mut dense = Array4::zeros((1, 1, 4, 3));
        dense.slice_mut(s![0, 0, .., 2]).fill(Complex64::new(0.5, 0.0));
        let state = ChannelState::from_dense(dense);

        let signal = Signal::from_stream(vec![Complex64::new(1.0, 0.0); 4], 1.0, 0.0).unwrap();
        let propagated = state.propagate(&signal).unwrap();

        assert_eq!(propagated.num_samples(), 6);
        let expected = [0.0, 0.0, 0.5, 0.5, 0.5, 0.5];
        for (k, &e) in expected.iter().enumerate() {
            assert_eq!(propagated.samples()[[0, k]].re, e, "Sample {} mismatch", k);
        }
    }

    #[test]
    fn test_stream_mismatch_rejected() {
        let state = ChannelState::ideal(1, 2, 4);
        let signal = Signal::from_stream(vec![Complex64::new(1.0, 0.0); 4], 1.0, 0.0).unwrap();
        assert!(matches!(
            state.propagate(&signal),
            Err(SimError::Validation { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn test_slice_and_sparse_view() {
        let state = ChannelState::ideal(1, 1, 10);
        let sliced = state.slice_samples(4..20);
        assert_eq!(sliced.num_samples(), 6);
        assert_eq!(sliced.num_delay_taps(), 1);

        let sparse = sliced.nonzero_taps();
        assert_eq!(sparse.len(), 6);
        assert!(sparse.iter().all(|&(tap, rx, tx, _, gain)| tap == 0
            && rx == 0
            && tx == 0
            && gain == Complex64::new(1.0, 0.0)));
    }

    #[test]
    fn test_flat_response_sums_taps() {
        let mut dense = Array4::zeros((1, 1, 2, 2));
        dense[[0, 0, 1, 0]] = Complex64::new(1.0, 0.0);
        dense[[0, 0, 1, 1]] = Complex64::new(0.0, 1.0);
        let state = ChannelState::from_dense(dense);
        assert_eq!(state.flat_response(1)[[0, 0]], Complex64::new(1.0, 1.0));
    }
}
