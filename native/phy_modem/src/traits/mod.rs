//! Core traits of the waveform engine
//!
//! Each trait is one orthogonal axis of a waveform: symbol geometry, pulse
//! shaping and the frame-level generator contract consumed by the modem.

mod constellation;
mod pulse_shape;
mod waveform;

pub use constellation::Constellation;
pub use pulse_shape::PulseShape;
pub use waveform::{FrameContext, WaveformGenerator};
