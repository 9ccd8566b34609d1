//! PHY modem - waveforms, precoding, beamforming and link evaluation
//!
//! Builds the communication side of the link-level simulator on top of the
//! channel engine: PSK/QAM frame waveforms with pluggable synchronization,
//! estimation and equalization routines, symbol precoding, conventional
//! beamforming, the modem operator, matched-filter sensing, error-rate
//! evaluators and the scenario driving Monte Carlo drops.

pub mod beamforming;
pub mod config;
pub mod constellations;
pub mod evaluators;
pub mod jcas;
pub mod modem;
pub mod precoding;
pub mod pulse_shapes;
pub mod scenario;
pub mod traits;
pub mod waveform;

// Re-export core types for convenience
pub use beamforming::{CaponBeamformer, ConventionalBeamformer, FocusAngle};
pub use config::{ScenarioConfig, WaveformConfig};
pub use constellations::{Modulation, Psk, Qam};
pub use evaluators::{
    BitErrorEvaluator, BlockErrorEvaluator, ErrorEvaluation, Evaluator, FrameErrorEvaluator,
    ThroughputEvaluator,
};
pub use jcas::{MatchedFilterJcas, RadarCube};
pub use modem::{Modem, ModemReception, ModemTransmission, TransmitBeam};
pub use precoding::{MaximumRatioCombining, StatedSymbols, SymbolPrecoding, ZeroForcingEqualizer};
pub use pulse_shapes::RootRaisedCosine;
pub use scenario::{ScenarioDrop, SimulationScenario};
pub use traits::{Constellation, FrameContext, PulseShape, WaveformGenerator};
pub use waveform::PskQamWaveform;
