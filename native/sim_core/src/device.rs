//! Devices, antenna arrays and operator binding
//!
//! A [`Device`] owns the identifiers of the operators bound to it, while each
//! operator keeps a single [`DeviceBinding`] back-reference. Both sides change
//! only through [`Device::bind_operator`] and [`Device::unbind_operator`];
//! rebinding requires an explicit unbind first.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SimError, SimResult};

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique device identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(u64);

impl DeviceId {
    fn next() -> Self {
        Self(NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Identifier of an operator inside its owning arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperatorId(pub u64);

/// Antenna port positions in meters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntennaArray {
    positions: Vec<[f64; 3]>,
    reference: [f64; 3],
}

impl AntennaArray {
    /// Create an array from explicit port positions
    ///
    /// # Arguments
    /// * `positions` - Cartesian port positions, at least one
    /// * `reference` - Phase reference position of the array
    pub fn new(positions: Vec<[f64; 3]>, reference: [f64; 3]) -> SimResult<Self> {
        if positions.is_empty() {
            return Err(SimError::config("antenna array requires at least one port"));
        }
        if positions.iter().flatten().chain(reference.iter()).any(|c| !c.is_finite()) {
            return Err(SimError::config("antenna positions must be finite"));
        }
        Ok(Self {
            positions,
            reference,
        })
    }

    /// Single isotropic port at the origin
    pub fn single() -> Self {
        Self {
            positions: vec![[0.0; 3]],
            reference: [0.0; 3],
        }
    }

    /// Uniform rectangular grid along x, y and z with the reference at the origin
    ///
    /// # Arguments
    /// * `spacing` - Distance between neighbouring ports in meters
    /// * `dimensions` - Number of ports along each axis
    pub fn uniform(spacing: f64, dimensions: [usize; 3]) -> SimResult<Self> {
        if !(spacing > 0.0) || !spacing.is_finite() {
            return Err(SimError::config("antenna spacing must be greater than zero"));
        }
        if dimensions.iter().any(|&d| d == 0) {
            return Err(SimError::config("antenna grid dimensions must be at least one"));
        }

        let mut positions = Vec::with_capacity(dimensions.iter().product());
        for x in 0..dimensions[0] {
            for y in 0..dimensions[1] {
                for z in 0..dimensions[2] {
                    positions.push([
                        x as f64 * spacing,
                        y as f64 * spacing,
                        z as f64 * spacing,
                    ]);
                }
            }
        }
        Self::new(positions, [0.0; 3])
    }

    pub fn num_antennas(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[[f64; 3]] {
        &self.positions
    }

    pub fn reference(&self) -> [f64; 3] {
        self.reference
    }

    /// Port offsets relative to the reference position
    pub fn topology(&self) -> Vec<[f64; 3]> {
        self.positions
            .iter()
            .map(|p| {
                [
                    p[0] - self.reference[0],
                    p[1] - self.reference[1],
                    p[2] - self.reference[2],
                ]
            })
            .collect()
    }

    /// Whether all ports lie on the x axis through the reference
    pub fn is_linear(&self) -> bool {
        let off_axis: f64 = self
            .topology()
            .iter()
            .map(|offset| offset[1].abs() + offset[2].abs())
            .sum();
        off_axis < 1e-10
    }

    /// Hash of the exact port geometry
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for coordinate in self.positions.iter().flatten().chain(self.reference.iter()) {
            coordinate.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// Back-reference from an operator to the device it is bound to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceBinding {
    device: Option<DeviceId>,
}

impl DeviceBinding {
    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    /// The bound device, or a state error for floating operators
    pub fn require(&self) -> SimResult<DeviceId> {
        self.device
            .ok_or_else(|| SimError::state("operator is floating and not bound to any device"))
    }
}

/// Anything that transmits or receives through a device
pub trait Operator {
    fn binding(&self) -> &DeviceBinding;

    fn binding_mut(&mut self) -> &mut DeviceBinding;

    fn device(&self) -> Option<DeviceId> {
        self.binding().device()
    }
}

/// Simulated radio device
#[derive(Debug)]
pub struct Device {
    id: DeviceId,
    antennas: AntennaArray,
    sampling_rate: f64,
    carrier_frequency: f64,
    operators: Vec<OperatorId>,
}

impl Device {
    pub fn new(antennas: AntennaArray, sampling_rate: f64, carrier_frequency: f64) -> SimResult<Self> {
        if !(sampling_rate > 0.0) || !sampling_rate.is_finite() {
            return Err(SimError::config("sampling rate must be greater than zero"));
        }
        if !(carrier_frequency >= 0.0) || !carrier_frequency.is_finite() {
            return Err(SimError::config("carrier frequency must be non-negative"));
        }

        Ok(Self {
            id: DeviceId::next(),
            antennas,
            sampling_rate,
            carrier_frequency,
            operators: Vec::new(),
        })
    }

    pub fn single_antenna(sampling_rate: f64, carrier_frequency: f64) -> SimResult<Self> {
        Self::new(AntennaArray::single(), sampling_rate, carrier_frequency)
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn antennas(&self) -> &AntennaArray {
        &self.antennas
    }

    pub fn num_antennas(&self) -> usize {
        self.antennas.num_antennas()
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn carrier_frequency(&self) -> f64 {
        self.carrier_frequency
    }

    /// Operators currently bound to this device
    pub fn operators(&self) -> &[OperatorId] {
        &self.operators
    }

    /// Bind a floating operator to this device
    pub fn bind_operator<O: Operator + ?Sized>(
        &mut self,
        operator_id: OperatorId,
        operator: &mut O,
    ) -> SimResult<()> {
        if let Some(current) = operator.device() {
            return Err(SimError::state(format!(
                "operator {:?} is already bound to device {:?}, unbind it first",
                operator_id, current
            )));
        }

        operator.binding_mut().device = Some(self.id);
        self.operators.push(operator_id);
        debug!(device = self.id.raw(), operator = operator_id.0, "operator bound");
        Ok(())
    }

    /// Release an operator bound to this device
    pub fn unbind_operator<O: Operator + ?Sized>(
        &mut self,
        operator_id: OperatorId,
        operator: &mut O,
    ) -> SimResult<()> {
        if operator.device() != Some(self.id) {
            return Err(SimError::state(format!(
                "operator {:?} is not bound to device {:?}",
                operator_id, self.id
            )));
        }

        operator.binding_mut().device = None;
        self.operators.retain(|id| *id != operator_id);
        debug!(device = self.id.raw(), operator = operator_id.0, "operator unbound");
        Ok(())
    }
}
