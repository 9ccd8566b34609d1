//! Channel estimation routines
//!
//! Estimators turn the matched-filtered symbols of one frame (preamble
//! followed by data) into per-data-symbol channel responses of shape
//! `(num_rx, num_tx, num_data_symbols)`.

use ndarray::{Array2, Array3};
use num_complex::Complex64;
use channel_physics::ChannelState;
use sim_core::{SimError, SimResult};

use super::routines::{Attachment, Routine};
use crate::traits::FrameContext;

pub trait ChannelEstimation: Routine {
    /// Estimate the channel seen by the data symbols of one frame
    ///
    /// # Arguments
    /// * `context` - Frame layout of the owning waveform
    /// * `symbols` - Received symbols, `(num_rx, num_preamble + num_data)`
    /// * `csi` - Ideal channel state of the frame, if known
    fn estimate(
        &self,
        context: &FrameContext,
        symbols: &Array2<Complex64>,
        csi: Option<&ChannelState>,
    ) -> SimResult<Array3<Complex64>>;
}

/// Reads the channel from ideal channel state information
#[derive(Debug, Default)]
pub struct IdealChannelEstimation {
    attachment: Attachment,
}

impl IdealChannelEstimation {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Routine for IdealChannelEstimation {
    fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    fn attachment_mut(&mut self) -> &mut Attachment {
        &mut self.attachment
    }
}

impl ChannelEstimation for IdealChannelEstimation {
    fn estimate(
        &self,
        context: &FrameContext,
        symbols: &Array2<Complex64>,
        csi: Option<&ChannelState>,
    ) -> SimResult<Array3<Complex64>> {
        self.attachment.require("channel estimation")?;
        let csi = csi.ok_or_else(|| {
            SimError::state("ideal channel estimation requires channel state information")
        })?;

        if csi.num_receive_streams() != symbols.nrows() {
            return Err(SimError::validation(
                "channel state receive streams",
                symbols.nrows(),
                csi.num_receive_streams(),
            ));
        }
        if csi.num_samples() == 0 {
            return Err(SimError::validation("channel state samples", context.samples_in_frame, 0));
        }

        let num_preamble = context.num_preamble_symbols();
        let num_data = symbols.ncols().saturating_sub(num_preamble);
        let last = csi.num_samples() - 1;

        let mut responses = Array3::zeros((csi.num_receive_streams(), csi.num_transmit_streams(), num_data));
        for k in 0..num_data {
            let instant = context.symbol_sample(num_preamble + k).min(last);
            let flat = csi.flat_response(instant);
            for ((rx, tx), h) in flat.indexed_iter() {
                responses[[rx, tx, k]] = *h;
            }
        }
        Ok(responses)
    }
}

/// Flat least-squares estimate from the frame preamble
///
/// Assumes a single transmitted stream and a channel that is constant over
/// the frame.
#[derive(Debug, Default)]
pub struct LeastSquaresChannelEstimation {
    attachment: Attachment,
}

impl LeastSquaresChannelEstimation {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Routine for LeastSquaresChannelEstimation {
    fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    fn attachment_mut(&mut self) -> &mut Attachment {
        &mut self.attachment
    }
}

impl ChannelEstimation for LeastSquaresChannelEstimation {
    fn estimate(
        &self,
        context: &FrameContext,
        symbols: &Array2<Complex64>,
        _csi: Option<&ChannelState>,
    ) -> SimResult<Array3<Complex64>> {
        self.attachment.require("channel estimation")?;

        let pilots = &context.preamble;
        if pilots.is_empty() {
            return Err(SimError::state("least-squares estimation requires preamble symbols"));
        }
        if symbols.ncols() < pilots.len() {
            return Err(SimError::validation("received symbols", pilots.len(), symbols.ncols()));
        }

        let pilot_energy: f64 = pilots.iter().map(|p| p.norm_sqr()).sum();
        if pilot_energy <= 0.0 {
            return Err(SimError::state("least-squares estimation requires non-zero pilots"));
        }

        let num_data = symbols.ncols() - pilots.len();
        let mut responses = Array3::zeros((symbols.nrows(), 1, num_data));
        for (rx, row) in symbols.rows().into_iter().enumerate() {
            let estimate: Complex64 = row
                .iter()
                .zip(pilots.iter())
                .map(|(y, p)| y * p.conj())
                .sum::<Complex64>()
                / pilot_energy;
            responses.slice_mut(ndarray::s![rx, 0, ..]).fill(estimate);
        }
        Ok(responses)
    }
}
