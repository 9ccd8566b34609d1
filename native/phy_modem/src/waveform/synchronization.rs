//! Frame synchronization
//!
//! Slices a received sample stream and the channel state it experienced into
//! frame-sized pieces. The stream must hold exactly
//! `state.num_samples() + state.num_delay_taps() - 1` samples. Frames are
//! contiguous and never overlap; a trailing partial frame is dropped.

use ndarray::{s, Array2};
use num_complex::Complex64;
use channel_physics::ChannelState;
use sim_core::fft::correlate_valid;
use sim_core::{SimError, SimResult};
use tracing::debug;

use super::routines::{Attachment, Routine};
use crate::traits::FrameContext;

/// Samples and channel state of one synchronized frame
#[derive(Debug, Clone, PartialEq)]
pub struct SynchronizedFrame {
    /// Shape `(num_streams, samples_in_frame)`
    pub samples: Array2<Complex64>,
    pub state: ChannelState,
}

/// Ordered, single-pass sequence of synchronized frames
pub type SynchronizedFrames = std::vec::IntoIter<SynchronizedFrame>;

/// Time synchronization routine
///
/// Implementations estimate where frame zero starts; the slicing contract is
/// shared.
pub trait Synchronization: Routine {
    /// Sample index of the first frame within the received stream
    fn frame_offset(&self, context: &FrameContext, samples: &Array2<Complex64>) -> usize;

    fn synchronize(
        &self,
        context: &FrameContext,
        samples: &Array2<Complex64>,
        state: &ChannelState,
    ) -> SimResult<SynchronizedFrames> {
        self.attachment().require("synchronization")?;

        let expected = state.num_samples() + state.num_delay_taps().max(1) - 1;
        if samples.ncols() != expected {
            return Err(SimError::validation("received samples", expected, samples.ncols()));
        }

        let offset = self.frame_offset(context, samples);
        Ok(slice_frames(context.samples_in_frame, samples, state, offset))
    }
}

fn slice_frames(
    samples_in_frame: usize,
    samples: &Array2<Complex64>,
    state: &ChannelState,
    offset: usize,
) -> SynchronizedFrames {
    let available = samples.ncols().saturating_sub(offset);
    let num_frames = if samples_in_frame == 0 { 0 } else { available / samples_in_frame };
    let dropped = available - num_frames * samples_in_frame;
    if dropped > 0 {
        debug!(dropped, num_frames, "dropping trailing partial frame");
    }

    let frames: Vec<SynchronizedFrame> = (0..num_frames)
        .map(|f| {
            let start = f * samples_in_frame;
            let end = start + samples_in_frame;
            SynchronizedFrame {
                samples: samples.slice(s![.., offset + start..offset + end]).to_owned(),
                state: state.slice_samples(start..end),
            }
        })
        .collect();

    frames.into_iter()
}

/// Default synchronization: frame zero starts at the first received sample
#[derive(Debug, Default)]
pub struct FrameSynchronization {
    attachment: Attachment,
}

impl FrameSynchronization {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Routine for FrameSynchronization {
    fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    fn attachment_mut(&mut self) -> &mut Attachment {
        &mut self.attachment
    }
}

impl Synchronization for FrameSynchronization {
    fn frame_offset(&self, _context: &FrameContext, _samples: &Array2<Complex64>) -> usize {
        0
    }
}

/// Preamble correlation synchronization
///
/// Correlates every receive stream with the modulated preamble and takes the
/// strongest lag within one frame length as the start of frame zero.
#[derive(Debug, Default)]
pub struct CorrelationSynchronization {
    attachment: Attachment,
}

impl CorrelationSynchronization {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Routine for CorrelationSynchronization {
    fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    fn attachment_mut(&mut self) -> &mut Attachment {
        &mut self.attachment
    }
}

impl Synchronization for CorrelationSynchronization {
    fn frame_offset(&self, context: &FrameContext, samples: &Array2<Complex64>) -> usize {
        let template: Vec<Complex64> = context.preamble_samples.iter().copied().collect();
        if template.is_empty() {
            return 0;
        }

        let mut energy: Vec<f64> = Vec::new();
        for stream in samples.rows() {
            let stream: Vec<Complex64> = stream.iter().copied().collect();
            let correlation = correlate_valid(&stream, &template);
            if energy.len() < correlation.len() {
                energy.resize(correlation.len(), 0.0);
            }
            for (e, c) in energy.iter_mut().zip(correlation.iter()) {
                *e += c.norm_sqr();
            }
        }

        let search = energy.len().min(context.samples_in_frame.max(1));
        let offset = energy[..search]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(lag, _)| lag)
            .unwrap_or(0);
        debug!(offset, "correlation synchronization");
        offset
    }
}
