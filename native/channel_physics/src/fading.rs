//! Per-path fading draws
//!
//! Each propagation path is a Rice-mixed sum-of-sinusoids process:
//!
//!   h(t) = √P · ( g_nlos · (1/√S) Σ_s exp(j(2π f_d cos θ_s t + φ_s))
//!               + g_los · exp(j 2π f_los cos θ_los t) )
//!
//! with g_los² = K/(K+1), g_nlos² = 1/(K+1) for Rice factor K. A pure
//! line-of-sight path (K = ∞) has no scattered component and a Rayleigh path
//! (K = 0) has no specular component. Arrival angles θ_s are shared by all
//! antenna pairs while the phases φ_s are drawn per antenna pair, so pairs
//! fade independently before any spatial correlation is applied.

use ndarray::{Array1, Array3};
use num_complex::Complex64;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sim_core::{Group, SimResult};
use std::f64::consts::PI;

/// Statistical description of one path before it is drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathProfile {
    pub delay: f64,
    pub power: f64,
    pub rice_factor: f64,
    pub doppler_frequency: f64,
    pub los_doppler_frequency: f64,
    pub num_sinusoids: usize,
    /// Fixed line-of-sight angle, drawn per realization when unset
    pub los_angle: Option<f64>,
}

/// Split of a path's power into line-of-sight and scattered amplitude factors
pub fn rice_gains(rice_factor: f64) -> (f64, f64) {
    if rice_factor.is_infinite() {
        (1.0, 0.0)
    } else {
        (
            (rice_factor / (1.0 + rice_factor)).sqrt(),
            (1.0 / (1.0 + rice_factor)).sqrt(),
        )
    }
}

/// One concrete draw of a fading path
#[derive(Debug, Clone, PartialEq)]
pub struct PathRealization {
    power: f64,
    delay: f64,
    los_gain: f64,
    nlos_gain: f64,
    los_doppler: f64,
    nlos_doppler: f64,
    los_angle: f64,
    nlos_angles: Array1<f64>,
    /// Sinusoid phases, shape `(num_rx, num_tx, num_sinusoids)`
    nlos_phases: Array3<f64>,
}

impl PathRealization {
    /// Draw a path for a `num_rx x num_tx` antenna pairing
    ///
    /// Consumes exactly one `u64` from `rng`; the remaining draws come from a
    /// per-path generator seeded with it.
    pub fn realize<R: Rng + ?Sized>(
        profile: &PathProfile,
        num_rx: usize,
        num_tx: usize,
        rng: &mut R,
    ) -> Self {
        let path_seed: u64 = rng.gen();
        let mut path_rng = ChaCha8Rng::seed_from_u64(path_seed);

        let los_angle = match profile.los_angle {
            Some(angle) => angle,
            None => path_rng.gen::<f64>() * 2.0 * PI,
        };

        let num_sinusoids = profile.num_sinusoids.max(1);
        let nlos_angles: Array1<f64> = (0..num_sinusoids)
            .map(|_| path_rng.gen::<f64>() * 2.0 * PI)
            .collect();
        let nlos_phases =
            Array3::from_shape_fn((num_rx, num_tx, num_sinusoids), |_| path_rng.gen::<f64>() * 2.0 * PI);

        let (los_gain, nlos_gain) = rice_gains(profile.rice_factor);

        Self {
            power: profile.power,
            delay: profile.delay,
            los_gain,
            nlos_gain,
            los_doppler: profile.los_doppler_frequency,
            nlos_doppler: profile.doppler_frequency,
            los_angle,
            nlos_angles,
            nlos_phases,
        }
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn los_gain(&self) -> f64 {
        self.los_gain
    }

    pub fn nlos_gain(&self) -> f64 {
        self.nlos_gain
    }

    pub fn los_doppler(&self) -> f64 {
        self.los_doppler
    }

    pub fn nlos_doppler(&self) -> f64 {
        self.nlos_doppler
    }

    pub fn los_angle(&self) -> f64 {
        self.los_angle
    }

    pub fn nlos_angles(&self) -> &Array1<f64> {
        &self.nlos_angles
    }

    pub fn nlos_phases(&self) -> &Array3<f64> {
        &self.nlos_phases
    }

    pub fn num_receive_antennas(&self) -> usize {
        self.nlos_phases.shape()[0]
    }

    pub fn num_transmit_antennas(&self) -> usize {
        self.nlos_phases.shape()[1]
    }

    /// Delay tap index at a sampling rate
    pub fn delay_tap(&self, sampling_rate: f64) -> usize {
        (self.delay * sampling_rate).round() as usize
    }

    /// Complex gains at the given instants, shape `(num_rx, num_tx, timestamps.len())`
    pub fn impulse_response(&self, timestamps: &[f64]) -> Array3<Complex64> {
        let (num_rx, num_tx, num_sinusoids) = self.nlos_phases.dim();
        let amplitude = self.power.sqrt();
        let nlos_scale = amplitude * self.nlos_gain / (num_sinusoids as f64).sqrt();

        let nlos_rates: Vec<f64> = self
            .nlos_angles
            .iter()
            .map(|theta| 2.0 * PI * self.nlos_doppler * theta.cos())
            .collect();
        let los_rate = 2.0 * PI * self.los_doppler * self.los_angle.cos();

        let mut response = Array3::zeros((num_rx, num_tx, timestamps.len()));
        for (k, &t) in timestamps.iter().enumerate() {
            let los = if self.los_gain > 0.0 {
                Complex64::from_polar(amplitude * self.los_gain, los_rate * t)
            } else {
                Complex64::new(0.0, 0.0)
            };

            for rx in 0..num_rx {
                for tx in 0..num_tx {
                    let mut nlos = Complex64::new(0.0, 0.0);
                    if self.nlos_gain > 0.0 {
                        for (s, rate) in nlos_rates.iter().enumerate() {
                            nlos += Complex64::from_polar(1.0, rate * t + self.nlos_phases[[rx, tx, s]]);
                        }
                    }
                    response[[rx, tx, k]] = nlos * nlos_scale + los;
                }
            }
        }
        response
    }

    pub(crate) fn to_group(&self, group: &mut Group) {
        group.set_f64("power", self.power);
        group.set_f64("delay", self.delay);
        group.set_f64("los_gain", self.los_gain);
        group.set_f64("nlos_gain", self.nlos_gain);
        group.set_f64("los_doppler", self.los_doppler);
        group.set_f64("nlos_doppler", self.nlos_doppler);
        group.set_f64("los_angle", self.los_angle);
        group.write_real("nlos_angles", &self.nlos_angles);
        group.write_real("nlos_phases", &self.nlos_phases);
    }

    pub(crate) fn from_group(group: &Group) -> SimResult<Self> {
        Ok(Self {
            power: group.get_f64("power")?,
            delay: group.get_f64("delay")?,
            los_gain: group.get_f64("los_gain")?,
            nlos_gain: group.get_f64("nlos_gain")?,
            los_doppler: group.get_f64("los_doppler")?,
            nlos_doppler: group.get_f64("nlos_doppler")?,
            los_angle: group.get_f64("los_angle")?,
            nlos_angles: group.read_real("nlos_angles")?,
            nlos_phases: group.read_real("nlos_phases")?,
        })
    }
}
