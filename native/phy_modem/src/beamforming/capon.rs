//! Capon (minimum variance distortionless response) beamforming

use nalgebra::{DMatrix, DVector};
use ndarray::Array2;
use num_complex::Complex64;
use sim_core::{AntennaArray, SimError, SimResult, Signal};
use tracing::debug;

use super::{steering_vector, FocusAngle};

/// Receive beamformer minimizing output power under a unit gain constraint
///
/// Toward a steering vector `a` the weights are `R^-1 a / (a^H R^-1 a)`,
/// where `R` is the sample covariance of the received streams with
/// `loading` added to its diagonal. Capon beamforming is receive-only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaponBeamformer {
    loading: f64,
}

impl CaponBeamformer {
    /// # Arguments
    /// * `loading` - Diagonal loading of the sample covariance, non-negative
    pub fn new(loading: f64) -> SimResult<Self> {
        let mut beamformer = Self { loading: 0.0 };
        beamformer.set_loading(loading)?;
        Ok(beamformer)
    }

    pub fn loading(&self) -> f64 {
        self.loading
    }

    pub fn set_loading(&mut self, loading: f64) -> SimResult<()> {
        if !(loading >= 0.0) || !loading.is_finite() {
            return Err(SimError::config("diagonal loading must be non-negative"));
        }
        self.loading = loading;
        Ok(())
    }

    /// Loaded sample covariance of `(num_antennas, num_samples)` samples
    pub fn covariance(&self, samples: &Array2<Complex64>) -> DMatrix<Complex64> {
        let (num_antennas, num_samples) = samples.dim();
        let x = DMatrix::from_fn(num_antennas, num_samples, |r, c| samples[[r, c]]);
        let scale = 1.0 / num_samples.max(1) as f64;

        let mut covariance = (&x * x.adjoint()).map(|v| v * scale);
        for i in 0..num_antennas {
            covariance[(i, i)] += Complex64::new(self.loading, 0.0);
        }
        covariance
    }

    /// Combine all port streams into one minimum variance stream per angle
    pub fn decode(
        &self,
        signal: &Signal,
        carrier_frequency: f64,
        angles: &[FocusAngle],
        array: &AntennaArray,
    ) -> SimResult<Signal> {
        let num_antennas = array.num_antennas();
        if signal.num_streams() != num_antennas {
            return Err(SimError::validation(
                "beamformer input streams",
                num_antennas,
                signal.num_streams(),
            ));
        }
        let num_samples = signal.num_samples();
        if num_samples == 0 {
            return Err(SimError::validation("covariance samples", 1, 0));
        }

        let inverse = self
            .covariance(signal.samples())
            .try_inverse()
            .ok_or_else(|| SimError::state("sample covariance is singular, increase the diagonal loading"))?;
        let x = DMatrix::from_fn(num_antennas, num_samples, |r, c| signal.samples()[[r, c]]);

        let mut beams = Array2::zeros((angles.len(), num_samples));
        for (mut beam, angle) in beams.rows_mut().into_iter().zip(angles.iter()) {
            let response = steering_vector(carrier_frequency, *angle, array);
            let a = DVector::from_iterator(num_antennas, response.iter().copied());

            let filtered = &inverse * &a;
            let gain = a.dotc(&filtered);
            if gain.norm() < f64::EPSILON {
                return Err(SimError::state(format!(
                    "no distortionless response toward {:?}",
                    angle
                )));
            }
            let weights = filtered.map(|w| w / gain);

            let output = weights.adjoint() * &x;
            for (dst, src) in beam.iter_mut().zip(output.iter()) {
                *dst = *src;
            }
        }

        debug!(angles = angles.len(), antennas = num_antennas, loading = self.loading, "capon beams formed");
        Signal::new(beams, signal.sampling_rate(), signal.carrier_frequency())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beamforming::ConventionalBeamformer;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use sim_core::SPEED_OF_LIGHT;
    use std::f64::consts::PI;

    const CARRIER: f64 = 1e9;
    const NUM_SAMPLES: usize = 64;

    fn array() -> AntennaArray {
        let wavelength = SPEED_OF_LIGHT / CARRIER;
        AntennaArray::uniform(0.5 * wavelength, [5, 5, 1]).unwrap()
    }

    fn candidate_angles() -> Vec<FocusAngle> {
        [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, -1.0], [1.0, 2.0], [1.0, -2.0]]
            .iter()
            .map(|[az, ze]| [0.25 * PI * az, 0.25 * PI * ze])
            .collect()
    }

    fn stream(rate: f64) -> Vec<Complex64> {
        (0..NUM_SAMPLES)
            .map(|k| Complex64::from_polar(1.0, rate * k as f64 + 0.01 * (k * k) as f64))
            .collect()
    }

    /// Plane waves from each `(angle, amplitude, stream)` plus uniform noise
    fn impinging(waves: &[(FocusAngle, f64, &[Complex64])], noise: f64, seed: u64) -> Signal {
        let array = array();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut samples = Array2::from_shape_fn((25, NUM_SAMPLES), |_| {
            Complex64::new(rng.gen::<f64>() - 0.5, rng.gen::<f64>() - 0.5) * noise
        });
        for (angle, amplitude, stream) in waves {
            let response = steering_vector(CARRIER, *angle, &array);
            for ((n, k), x) in samples.indexed_iter_mut() {
                *x += response[n] * stream[k] * *amplitude;
            }
        }
        Signal::new(samples, 1e6, CARRIER).unwrap()
    }

    fn mean_error(beam: ndarray::ArrayView1<Complex64>, expected: &[Complex64]) -> f64 {
        beam.iter().zip(expected.iter()).map(|(y, s)| (y - s).norm_sqr()).sum::<f64>() / expected.len() as f64
    }

    #[test]
    fn test_loading_validation() {
        assert!(CaponBeamformer::new(-1.0).is_err());
        assert!(CaponBeamformer::new(f64::NAN).is_err());

        let mut beamformer = CaponBeamformer::new(1e-4).unwrap();
        beamformer.set_loading(1.234).unwrap();
        assert_eq!(beamformer.loading(), 1.234);

        assert!(matches!(beamformer.set_loading(-1.0), Err(SimError::Configuration(_))));
        assert_eq!(beamformer.loading(), 1.234, "Rejected loading must not be stored");
    }

    #[test]
    fn test_decode_recovers_and_discriminates() {
        let beamformer = CaponBeamformer::new(1e-4).unwrap();
        let candidates = candidate_angles();
        let expected = stream(0.7);

        for (index, arrival) in candidates.iter().enumerate() {
            let noiseless = impinging(&[(*arrival, 1.0, &expected[..])], 0.0, 1);
            let beams = beamformer.decode(&noiseless, CARRIER, &candidates, &array()).unwrap();
            assert_eq!(beams.num_streams(), candidates.len());
            let error = mean_error(beams.samples().row(index), &expected);
            assert!(error < 1e-10, "Angle {:?} not recovered, error {}", arrival, error);

            let noisy = impinging(&[(*arrival, 1.0, &expected[..])], 2e-2, 2 + index as u64);
            let powers = beamformer.decode(&noisy, CARRIER, &candidates, &array()).unwrap().power();
            for (other, power) in powers.iter().enumerate() {
                if other != index {
                    assert!(*power < powers[index], "Beam {} outshines the true arrival {}", other, index);
                }
            }
        }
    }

    #[test]
    fn test_suppresses_interferer_better_than_conventional() {
        let desired_angle = [0.0, 0.0];
        let interferer_angle = [0.0, 0.3];
        let desired = stream(0.4);
        let interference = stream(1.9);
        let received = impinging(
            &[(desired_angle, 1.0, &desired[..]), (interferer_angle, 10.0, &interference[..])],
            1e-2,
            7,
        );

        let capon = CaponBeamformer::new(1e-4)
            .unwrap()
            .decode(&received, CARRIER, &[desired_angle], &array())
            .unwrap();
        let conventional = ConventionalBeamformer::new()
            .decode(&received, CARRIER, &[desired_angle], &array())
            .unwrap();

        let capon_error = mean_error(capon.samples().row(0), &desired);
        let conventional_error = mean_error(conventional.samples().row(0), &desired);
        assert!(
            capon_error < 0.01 * conventional_error,
            "Capon error {} not well below conventional error {}",
            capon_error,
            conventional_error
        );
    }

    #[test]
    fn test_stream_count_must_match_ports() {
        let beamformer = CaponBeamformer::new(0.0).unwrap();
        let single = Signal::from_stream(stream(0.1), 1e6, CARRIER).unwrap();
        assert!(matches!(
            beamformer.decode(&single, CARRIER, &[[0.0, 0.0]], &array()),
            Err(SimError::Validation { .. })
        ));

        let empty = Signal::empty(1e6, 25).unwrap();
        assert!(beamformer.decode(&empty, CARRIER, &[[0.0, 0.0]], &array()).is_err());
    }
}
