//! Multipath fading channel model
//!
//! A channel links an alpha and a beta device (possibly the same device) over
//! a set of delayed paths. Every path fades according to its Rice factor and
//! Doppler frequency, see [`crate::fading`]. Each call to
//! [`MultipathFadingChannel::realize`] advances the channel's own generator
//! and freezes one draw into a [`MultipathFadingRealization`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use sim_core::random::fallback_seed;
use sim_core::{Device, Group, SimError, SimResult, Signal};
use tracing::debug;

use crate::correlation::{cholesky_factor, AntennaCorrelation};
use crate::fading::{PathProfile, PathRealization};
use crate::realization::{LinkEnd, MultipathFadingRealization};

/// Sinusoids per path unless configured otherwise
pub const DEFAULT_NUM_SINUSOIDS: usize = 20;

/// Validated multipath fading parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelParams {
    delays: Vec<f64>,
    power_profile: Vec<f64>,
    rice_factors: Vec<f64>,
    doppler_frequency: f64,
    los_doppler_frequency: Option<f64>,
    num_sinusoids: usize,
    los_angle: Option<f64>,
    gain: f64,
}

impl ChannelParams {
    /// Create parameters for a set of paths
    ///
    /// # Arguments
    /// * `delays` - Path delays in seconds, non-negative
    /// * `power_profile` - Linear path powers, non-negative
    /// * `rice_factors` - Linear Rice factors, non-negative or `f64::INFINITY`
    pub fn new(delays: Vec<f64>, power_profile: Vec<f64>, rice_factors: Vec<f64>) -> SimResult<Self> {
        if delays.is_empty() {
            return Err(SimError::config("a multipath channel requires at least one path"));
        }
        if power_profile.len() != delays.len() || rice_factors.len() != delays.len() {
            return Err(SimError::config(format!(
                "delays ({}), power profile ({}) and rice factors ({}) must have equal length",
                delays.len(),
                power_profile.len(),
                rice_factors.len()
            )));
        }
        if delays.iter().any(|d| !(*d >= 0.0) || !d.is_finite()) {
            return Err(SimError::config("path delays must be non-negative"));
        }
        if power_profile.iter().any(|p| !(*p >= 0.0) || !p.is_finite()) {
            return Err(SimError::config("path powers must be non-negative"));
        }
        if rice_factors.iter().any(|k| !(*k >= 0.0)) {
            return Err(SimError::config("rice factors must be non-negative"));
        }

        Ok(Self {
            delays,
            power_profile,
            rice_factors,
            doppler_frequency: 0.0,
            los_doppler_frequency: None,
            num_sinusoids: DEFAULT_NUM_SINUSOIDS,
            los_angle: None,
            gain: 1.0,
        })
    }

    /// Single static path without delay
    pub fn flat(rice_factor: f64) -> SimResult<Self> {
        Self::new(vec![0.0], vec![1.0], vec![rice_factor])
    }

    pub fn with_doppler_frequency(mut self, doppler_frequency: f64) -> SimResult<Self> {
        if !(doppler_frequency >= 0.0) || !doppler_frequency.is_finite() {
            return Err(SimError::config("doppler frequency must be non-negative"));
        }
        self.doppler_frequency = doppler_frequency;
        Ok(self)
    }

    pub fn with_los_doppler_frequency(mut self, los_doppler_frequency: f64) -> SimResult<Self> {
        if !(los_doppler_frequency >= 0.0) || !los_doppler_frequency.is_finite() {
            return Err(SimError::config("line of sight doppler frequency must be non-negative"));
        }
        self.los_doppler_frequency = Some(los_doppler_frequency);
        Ok(self)
    }

    pub fn with_num_sinusoids(mut self, num_sinusoids: usize) -> SimResult<Self> {
        if num_sinusoids < 1 {
            return Err(SimError::config("number of sinusoids must be at least one"));
        }
        self.num_sinusoids = num_sinusoids;
        Ok(self)
    }

    pub fn with_los_angle(mut self, los_angle: f64) -> SimResult<Self> {
        if !los_angle.is_finite() {
            return Err(SimError::config("line of sight angle must be finite"));
        }
        self.los_angle = Some(los_angle);
        Ok(self)
    }

    pub fn with_gain(mut self, gain: f64) -> SimResult<Self> {
        if !(gain >= 0.0) || !gain.is_finite() {
            return Err(SimError::config("channel gain must be non-negative"));
        }
        self.gain = gain;
        Ok(self)
    }

    pub fn delays(&self) -> &[f64] {
        &self.delays
    }

    pub fn power_profile(&self) -> &[f64] {
        &self.power_profile
    }

    pub fn rice_factors(&self) -> &[f64] {
        &self.rice_factors
    }

    pub fn doppler_frequency(&self) -> f64 {
        self.doppler_frequency
    }

    /// Line of sight Doppler, falling back to the scattered Doppler
    pub fn los_doppler_frequency(&self) -> f64 {
        self.los_doppler_frequency.unwrap_or(self.doppler_frequency)
    }

    pub fn num_sinusoids(&self) -> usize {
        self.num_sinusoids
    }

    pub fn los_angle(&self) -> Option<f64> {
        self.los_angle
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn num_paths(&self) -> usize {
        self.delays.len()
    }

    /// Largest path delay in seconds
    pub fn max_delay(&self) -> f64 {
        self.delays.iter().copied().fold(0.0, f64::max)
    }

    /// Number of distinct delay taps at a sampling rate
    pub fn num_resolvable_paths(&self, sampling_rate: f64) -> usize {
        let mut taps: Vec<u64> = self
            .delays
            .iter()
            .map(|d| (d * sampling_rate).round() as u64)
            .collect();
        taps.sort_unstable();
        taps.dedup();
        taps.len()
    }

    pub(crate) fn path_profiles(&self) -> impl Iterator<Item = PathProfile> + '_ {
        let los_doppler = self.los_doppler_frequency();
        self.delays
            .iter()
            .zip(self.power_profile.iter())
            .zip(self.rice_factors.iter())
            .map(move |((&delay, &power), &rice_factor)| PathProfile {
                delay,
                power,
                rice_factor,
                doppler_frequency: self.doppler_frequency,
                los_doppler_frequency: los_doppler,
                num_sinusoids: self.num_sinusoids,
                los_angle: self.los_angle,
            })
    }
}

/// Signal and realization produced by one propagation
#[derive(Debug, Clone)]
pub struct ChannelPropagation {
    pub signal: Signal,
    pub realization: MultipathFadingRealization,
}

/// Stochastic multipath fading channel between two devices
#[derive(Debug)]
pub struct MultipathFadingChannel {
    params: ChannelParams,
    alpha: LinkEnd,
    beta: LinkEnd,
    alpha_correlation: Option<Box<dyn AntennaCorrelation>>,
    beta_correlation: Option<Box<dyn AntennaCorrelation>>,
    rng: ChaCha8Rng,
}

impl MultipathFadingChannel {
    /// Create a channel between two devices
    ///
    /// Without a seed the generator is seeded from the global fallback.
    pub fn new(params: ChannelParams, alpha: &Device, beta: &Device, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(fallback_seed);
        Self {
            params,
            alpha: LinkEnd::of(alpha),
            beta: LinkEnd::of(beta),
            alpha_correlation: None,
            beta_correlation: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn params(&self) -> &ChannelParams {
        &self.params
    }

    pub fn set_params(&mut self, params: ChannelParams) {
        self.params = params;
    }

    pub fn alpha(&self) -> LinkEnd {
        self.alpha
    }

    pub fn beta(&self) -> LinkEnd {
        self.beta
    }

    /// Restart the channel generator from a seed
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    pub fn set_alpha_correlation(&mut self, correlation: Option<Box<dyn AntennaCorrelation>>) {
        self.alpha_correlation = correlation;
    }

    pub fn set_beta_correlation(&mut self, correlation: Option<Box<dyn AntennaCorrelation>>) {
        self.beta_correlation = correlation;
    }

    /// Draw the next realization from the channel's own generator
    pub fn realize(&mut self) -> SimResult<MultipathFadingRealization> {
        let mut rng = self.rng.clone();
        let realization = self.realize_with(&mut rng);
        self.rng = rng;
        realization
    }

    /// Draw a realization from an external generator
    pub fn realize_with<R: Rng + ?Sized>(&self, rng: &mut R) -> SimResult<MultipathFadingRealization> {
        let alpha_factor = factor_for(self.alpha_correlation.as_deref(), self.alpha)?;
        let beta_factor = factor_for(self.beta_correlation.as_deref(), self.beta)?;

        let paths: Vec<PathRealization> = self
            .params
            .path_profiles()
            .map(|profile| {
                PathRealization::realize(&profile, self.beta.num_antennas, self.alpha.num_antennas, rng)
            })
            .collect();

        debug!(
            num_paths = paths.len(),
            alpha = self.alpha.device.raw(),
            beta = self.beta.device.raw(),
            correlated = alpha_factor.is_some() || beta_factor.is_some(),
            "realized multipath fading channel"
        );

        Ok(MultipathFadingRealization::new(
            self.alpha,
            self.beta,
            self.params.gain,
            paths,
            alpha_factor,
            beta_factor,
        ))
    }

    /// Realize and propagate a signal transmitted by the alpha device
    pub fn propagate(&mut self, signal: &Signal) -> SimResult<ChannelPropagation> {
        let realization = self.realize()?;
        let signal = realization.propagate(signal, None, None)?;
        Ok(ChannelPropagation {
            signal,
            realization,
        })
    }

    /// Recall a persisted realization onto this channel's devices
    ///
    /// The realization may come from another process; it must have been
    /// drawn for a link with the same antenna counts.
    pub fn recall_realization(&self, group: &Group) -> SimResult<MultipathFadingRealization> {
        MultipathFadingRealization::from_group(group)?.rebind(self.alpha, self.beta)
    }
}

fn factor_for(
    correlation: Option<&dyn AntennaCorrelation>,
    end: LinkEnd,
) -> SimResult<Option<ndarray::Array2<num_complex::Complex64>>> {
    match correlation {
        Some(correlation) => {
            let covariance = correlation.covariance(end.num_antennas)?;
            Ok(Some(cholesky_factor(&covariance)?))
        }
        None => Ok(None),
    }
}
