//! Pulse shaping filter implementations
//!
//! Currently only Root Raised Cosine (RRC), used as transmit pulse and
//! receive matched filter of the single-carrier PSK/QAM waveform.

mod rrc;

pub use rrc::RootRaisedCosine;

/// Default roll-off factor
pub const DEFAULT_ROLL_OFF: f64 = 0.35;

/// Default filter span in symbols (each side)
pub const DEFAULT_SPAN: usize = 6;
