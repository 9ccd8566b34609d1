//! Core building blocks for link-level simulation
//!
//! Signal containers, reproducible random streams, the device/operator arena,
//! FFT helpers, hierarchical persistence groups and logging setup shared by
//! the channel engine and the modem crates.

pub mod constants;
pub mod device;
pub mod error;
pub mod fft;
pub mod group;
pub mod logging;
pub mod random;
pub mod signal;
pub mod slab;

pub use constants::SPEED_OF_LIGHT;
pub use device::{AntennaArray, Device, DeviceBinding, DeviceId, Operator, OperatorId};
pub use error::{SimError, SimResult};
pub use group::Group;
pub use random::{RandomStreams, StreamKind};
pub use signal::Signal;
pub use slab::Slab;
