//! Additive white Gaussian noise
//!
//! Complex circular noise with per-component variance `power / 2`, drawn from
//! an explicitly supplied generator.

use ndarray::Array2;
use num_complex::Complex64;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use sim_core::{SimError, SimResult, Signal};

/// AWGN source with configurable power
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AwgnNoise {
    power: f64,
}

impl AwgnNoise {
    pub fn new(power: f64) -> SimResult<Self> {
        if !(power >= 0.0) || !power.is_finite() {
            return Err(SimError::config("noise power must be non-negative"));
        }
        Ok(Self { power })
    }

    /// Noise power for a target SNR given the signal power
    pub fn from_snr_db(signal_power: f64, snr_db: f64) -> SimResult<Self> {
        Self::new(signal_power * 10.0_f64.powf(-snr_db / 10.0))
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    /// Draw a `num_streams x num_samples` noise matrix
    pub fn realize<R: Rng + ?Sized>(
        &self,
        num_streams: usize,
        num_samples: usize,
        rng: &mut R,
    ) -> Array2<Complex64> {
        if self.power == 0.0 {
            return Array2::zeros((num_streams, num_samples));
        }

        let std_dev = (self.power / 2.0).sqrt();
        let normal = match Normal::new(0.0, std_dev) {
            Ok(normal) => normal,
            Err(_) => return Array2::zeros((num_streams, num_samples)),
        };

        Array2::from_shape_fn((num_streams, num_samples), |_| {
            Complex64::new(normal.sample(&mut *rng), normal.sample(&mut *rng))
        })
    }

    /// Add noise to every stream of a signal in place
    pub fn add_to<R: Rng + ?Sized>(&self, signal: &mut Signal, rng: &mut R) {
        let noise = self.realize(signal.num_streams(), signal.num_samples(), rng);
        *signal.samples_mut() += &noise;
    }
}
