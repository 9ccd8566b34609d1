//! Waveform generators and their receive routines

mod equalization;
mod estimation;
mod pilots;
mod psk_qam;
mod routines;
mod synchronization;

pub use equalization::{ChannelEqualization, NoEqualization, ZeroForcingChannelEqualization};
pub use estimation::{ChannelEstimation, IdealChannelEstimation, LeastSquaresChannelEstimation};
pub use pilots::{CustomPilotSequence, PilotSequence, UniformPilotSequence};
pub use psk_qam::PskQamWaveform;
pub use routines::{Attachment, Routine, WaveformId, WaveformRoutines};
pub use synchronization::{
    CorrelationSynchronization, FrameSynchronization, SynchronizedFrame, SynchronizedFrames,
    Synchronization,
};
