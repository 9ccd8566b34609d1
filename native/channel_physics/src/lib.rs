//! Multipath fading channel engine
//!
//! Links two devices through a set of delayed Rice/Rayleigh fading paths
//! with optional Kronecker antenna correlation. Channels draw
//! [`MultipathFadingRealization`]s from their own seeded generator; a
//! realization propagates signals in either direction and samples into a
//! dense [`ChannelState`] for channel state information. A
//! [`ClusterDelayLine`] draws its paths per realization from cluster
//! statistics and feeds the same realization type.

pub mod cdl;
pub mod channel;
pub mod config;
pub mod correlation;
pub mod fading;
pub mod noise;
pub mod realization;
pub mod state;
pub mod templates;

pub use cdl::{
    ClusterDelayLine, DEFAULT_CLUSTER_SHADOWING_STD, DEFAULT_RICE_FACTOR_MEAN, DEFAULT_RICE_FACTOR_STD,
};
pub use channel::{ChannelParams, ChannelPropagation, MultipathFadingChannel, DEFAULT_NUM_SINUSOIDS};
pub use config::{ChannelConfig, CorrelationConfig, RiceFactor};
pub use correlation::{
    AntennaCorrelation, CorrelationLevel, CustomAntennaCorrelation, DeviceRole,
    StandardAntennaCorrelation,
};
pub use fading::{PathProfile, PathRealization};
pub use noise::AwgnNoise;
pub use realization::{Direction, LinkEnd, MultipathFadingRealization};
pub use state::ChannelState;
pub use templates::{Cost259Model, TdlModel, DEFAULT_RMS_DELAY};
