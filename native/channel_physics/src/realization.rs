//! Multipath fading channel realizations
//!
//! A [`MultipathFadingRealization`] freezes one random draw of every path of a
//! channel, bound to the alpha/beta device pair it was drawn for. It can be
//! propagated in either direction, sampled into a [`ChannelState`], and
//! persisted to a [`Group`] for exact recall.

use ndarray::{Array2, Array3, Array4};
use num_complex::Complex64;
use sim_core::{Device, DeviceId, Group, SimError, SimResult, Signal};
use tracing::trace;

use crate::fading::PathRealization;
use crate::state::ChannelState;

/// One end of a channel link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkEnd {
    pub device: DeviceId,
    pub num_antennas: usize,
}

impl LinkEnd {
    pub fn of(device: &Device) -> Self {
        Self {
            device: device.id(),
            num_antennas: device.num_antennas(),
        }
    }
}

/// Propagation direction through a realization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Alpha transmits, beta receives
    Forward,
    /// Beta transmits, alpha receives, using the conjugate transposed response
    Reverse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultipathFadingRealization {
    alpha: LinkEnd,
    beta: LinkEnd,
    gain: f64,
    paths: Vec<PathRealization>,
    /// Cholesky factors of the alpha and beta antenna covariances
    alpha_factor: Option<Array2<Complex64>>,
    beta_factor: Option<Array2<Complex64>>,
}

impl MultipathFadingRealization {
    pub(crate) fn new(
        alpha: LinkEnd,
        beta: LinkEnd,
        gain: f64,
        paths: Vec<PathRealization>,
        alpha_factor: Option<Array2<Complex64>>,
        beta_factor: Option<Array2<Complex64>>,
    ) -> Self {
        Self {
            alpha,
            beta,
            gain,
            paths,
            alpha_factor,
            beta_factor,
        }
    }

    pub fn alpha(&self) -> LinkEnd {
        self.alpha
    }

    pub fn beta(&self) -> LinkEnd {
        self.beta
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn path_realizations(&self) -> &[PathRealization] {
        &self.paths
    }

    pub fn alpha_correlation_factor(&self) -> Option<&Array2<Complex64>> {
        self.alpha_factor.as_ref()
    }

    pub fn beta_correlation_factor(&self) -> Option<&Array2<Complex64>> {
        self.beta_factor.as_ref()
    }

    /// Largest delay tap index at a sampling rate
    pub fn max_delay_tap(&self, sampling_rate: f64) -> usize {
        self.paths
            .iter()
            .map(|path| path.delay_tap(sampling_rate))
            .max()
            .unwrap_or(0)
    }

    /// Resolve the propagation direction for an optional transmitter/receiver pair
    ///
    /// Missing devices default to the realization's binding. Devices outside
    /// the binding are a configuration error.
    pub fn direction(
        &self,
        transmitter: Option<&Device>,
        receiver: Option<&Device>,
    ) -> SimResult<Direction> {
        let alpha = self.alpha.device;
        let beta = self.beta.device;

        let direction = match (transmitter.map(Device::id), receiver.map(Device::id)) {
            (None, None) => Some(Direction::Forward),
            (Some(tx), None) if tx == alpha => Some(Direction::Forward),
            (Some(tx), None) if tx == beta => Some(Direction::Reverse),
            (None, Some(rx)) if rx == beta => Some(Direction::Forward),
            (None, Some(rx)) if rx == alpha => Some(Direction::Reverse),
            (Some(tx), Some(rx)) if tx == alpha && rx == beta => Some(Direction::Forward),
            (Some(tx), Some(rx)) if tx == beta && rx == alpha => Some(Direction::Reverse),
            _ => None,
        };

        direction.ok_or_else(|| {
            SimError::config(format!(
                "devices are not part of the realization binding {:?} <-> {:?}",
                alpha, beta
            ))
        })
    }

    fn dimensions(&self, direction: Direction) -> (usize, usize) {
        match direction {
            Direction::Forward => (self.beta.num_antennas, self.alpha.num_antennas),
            Direction::Reverse => (self.alpha.num_antennas, self.beta.num_antennas),
        }
    }

    /// Spatially colored response of one path, shape `(num_rx, num_tx, timestamps.len())`
    fn path_response(
        &self,
        path: &PathRealization,
        timestamps: &[f64],
        direction: Direction,
    ) -> Array3<Complex64> {
        let mut response = path.impulse_response(timestamps);

        if self.alpha_factor.is_some() || self.beta_factor.is_some() {
            for k in 0..timestamps.len() {
                let mut h = response.slice(ndarray::s![.., .., k]).to_owned();
                if let Some(ref beta_factor) = self.beta_factor {
                    h = beta_factor.dot(&h);
                }
                if let Some(ref alpha_factor) = self.alpha_factor {
                    h = h.dot(&alpha_factor.t());
                }
                response.slice_mut(ndarray::s![.., .., k]).assign(&h);
            }
        }

        match direction {
            Direction::Forward => response,
            Direction::Reverse => {
                let mut reversed = response.permuted_axes([1, 0, 2]).to_owned();
                reversed.mapv_inplace(|h| h.conj());
                reversed
            }
        }
    }

    /// Propagate a signal through the realization
    ///
    /// The output holds `num_samples + max_delay_tap` samples, where the
    /// delay taps are resolved at the signal's sampling rate.
    pub fn propagate(
        &self,
        signal: &Signal,
        transmitter: Option<&Device>,
        receiver: Option<&Device>,
    ) -> SimResult<Signal> {
        let direction = self.direction(transmitter, receiver)?;
        let (num_rx, num_tx) = self.dimensions(direction);

        if signal.num_streams() != num_tx {
            return Err(SimError::validation(
                "transmitted streams",
                num_tx,
                signal.num_streams(),
            ));
        }

        let sampling_rate = signal.sampling_rate();
        let num_samples = signal.num_samples();
        let max_tap = self.max_delay_tap(sampling_rate);
        let timestamps = signal.timestamps();
        let input = signal.samples();

        let mut output = Array2::<Complex64>::zeros((num_rx, num_samples + max_tap));
        for path in &self.paths {
            let tap = path.delay_tap(sampling_rate);
            let response = self.path_response(path, &timestamps, direction);

            for rx in 0..num_rx {
                for tx in 0..num_tx {
                    for k in 0..num_samples {
                        output[[rx, k + tap]] += response[[rx, tx, k]] * input[[tx, k]];
                    }
                }
            }
        }

        let amplitude = self.gain.sqrt();
        output.mapv_inplace(|y| y * amplitude);

        trace!(
            ?direction,
            num_rx,
            num_tx,
            num_samples,
            max_tap,
            "propagated signal through realization"
        );
        Signal::new(output, sampling_rate, signal.carrier_frequency())
    }

    /// Sample the realization into a dense tap tensor
    ///
    /// # Arguments
    /// * `transmitter` / `receiver` - Device pair selecting the direction
    /// * `timestamp` - Time of the first sample in seconds
    /// * `sampling_rate` - Rate resolving delays into taps
    /// * `num_samples` - Number of sample instants
    /// * `num_delay_taps` - Taps kept; paths beyond the last tap are dropped
    pub fn state(
        &self,
        transmitter: &Device,
        receiver: &Device,
        timestamp: f64,
        sampling_rate: f64,
        num_samples: usize,
        num_delay_taps: usize,
    ) -> SimResult<ChannelState> {
        let direction = self.direction(Some(transmitter), Some(receiver))?;
        self.sample(direction, timestamp, sampling_rate, num_samples, num_delay_taps)
    }

    /// Sample the realization into a dense tap tensor in a fixed direction
    pub fn sample(
        &self,
        direction: Direction,
        timestamp: f64,
        sampling_rate: f64,
        num_samples: usize,
        num_delay_taps: usize,
    ) -> SimResult<ChannelState> {
        if !(sampling_rate > 0.0) {
            return Err(SimError::config("sampling rate must be greater than zero"));
        }

        let (num_rx, num_tx) = self.dimensions(direction);
        let timestamps: Vec<f64> = (0..num_samples)
            .map(|k| timestamp + k as f64 / sampling_rate)
            .collect();
        let amplitude = self.gain.sqrt();

        let mut dense = Array4::<Complex64>::zeros((num_rx, num_tx, num_samples, num_delay_taps));
        for path in &self.paths {
            let tap = path.delay_tap(sampling_rate);
            if tap >= num_delay_taps {
                continue;
            }

            let response = self.path_response(path, &timestamps, direction);
            for ((rx, tx, k), h) in response.indexed_iter() {
                dense[[rx, tx, k, tap]] += *h * amplitude;
            }
        }

        Ok(ChannelState::from_dense(dense))
    }

    /// Store every realization field in a group
    pub fn to_group(&self, group: &mut Group) {
        group.set_f64("gain", self.gain);
        group.set_u64("alpha_device", self.alpha.device.raw());
        group.set_u64("alpha_antennas", self.alpha.num_antennas as u64);
        group.set_u64("beta_device", self.beta.device.raw());
        group.set_u64("beta_antennas", self.beta.num_antennas as u64);
        group.set_u64("num_paths", self.paths.len() as u64);

        for (idx, path) in self.paths.iter().enumerate() {
            path.to_group(group.create_group(&format!("path_{}", idx)));
        }
        if let Some(ref factor) = self.alpha_factor {
            group.write_complex("alpha_correlation", factor);
        }
        if let Some(ref factor) = self.beta_factor {
            group.write_complex("beta_correlation", factor);
        }
    }

    /// Rebind to another device pair with matching antenna counts
    ///
    /// Device identifiers are process-local, so a recalled realization is
    /// matched to its link by antenna counts and by whether both ends are
    /// the same device.
    pub fn rebind(mut self, alpha: LinkEnd, beta: LinkEnd) -> SimResult<Self> {
        if alpha.num_antennas != self.alpha.num_antennas || beta.num_antennas != self.beta.num_antennas {
            return Err(SimError::config(format!(
                "realization was drawn for a {}x{} antenna link, not {}x{}",
                self.alpha.num_antennas, self.beta.num_antennas, alpha.num_antennas, beta.num_antennas
            )));
        }
        if (self.alpha.device == self.beta.device) != (alpha.device == beta.device) {
            return Err(SimError::config(
                "self-link realizations can only be rebound to a single device",
            ));
        }
        self.alpha = alpha;
        self.beta = beta;
        Ok(self)
    }

    /// Recall a realization stored with [`Self::to_group`] without redrawing
    ///
    /// The stored device identifiers are those of the storing process; use
    /// [`Self::rebind`] to attach the realization to local devices.
    pub fn from_group(group: &Group) -> SimResult<Self> {
        let alpha = LinkEnd {
            device: DeviceId::from_raw(group.get_u64("alpha_device")?),
            num_antennas: group.get_u64("alpha_antennas")? as usize,
        };
        let beta = LinkEnd {
            device: DeviceId::from_raw(group.get_u64("beta_device")?),
            num_antennas: group.get_u64("beta_antennas")? as usize,
        };

        let num_paths = group.get_u64("num_paths")? as usize;
        let mut paths = Vec::with_capacity(num_paths);
        for idx in 0..num_paths {
            let path = PathRealization::from_group(group.group(&format!("path_{}", idx))?)?;
            if path.num_receive_antennas() != beta.num_antennas
                || path.num_transmit_antennas() != alpha.num_antennas
            {
                return Err(SimError::persistence(format!(
                    "path {} phases do not match the {}x{} antenna binding",
                    idx, beta.num_antennas, alpha.num_antennas
                )));
            }
            paths.push(path);
        }

        let alpha_factor = if group.has_dataset("alpha_correlation") {
            Some(group.read_complex("alpha_correlation")?)
        } else {
            None
        };
        let beta_factor = if group.has_dataset("beta_correlation") {
            Some(group.read_complex("beta_correlation")?)
        } else {
            None
        };

        Ok(Self {
            alpha,
            beta,
            gain: group.get_f64("gain")?,
            paths,
            alpha_factor,
            beta_factor,
        })
    }
}
