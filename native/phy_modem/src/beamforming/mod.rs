//! Conventional (delay-and-sum) beamforming
//!
//! Steering vectors follow the far-field plane wave model
//!
//! ```text
//! a_n(az, ze) = exp(j * 2pi * f / c * (p_n - p_ref) . d(az, ze))
//! d(az, ze)   = (cos(az) sin(ze), sin(az) sin(ze), cos(ze))
//! ```
//!
//! The codebook holds `a / N` per angle of interest. Transmission weights the
//! single input stream with `a`, reception combines with the conjugated
//! codebook, so both directions toward the same angle recover the stream.
//! [`CaponBeamformer`] replaces the fixed codebook at the receiver with
//! minimum variance weights derived from the received streams.

mod cache;
mod capon;

pub use cache::{CodebookCache, CodebookKey, DEFAULT_CACHE_CAPACITY};
pub use capon::CaponBeamformer;

use std::f64::consts::PI;

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use sim_core::{AntennaArray, SimError, SimResult, Signal, SPEED_OF_LIGHT};
use tracing::debug;

/// Angle of interest as `[azimuth, zenith]` in radians
pub type FocusAngle = [f64; 2];

/// Unit vector pointing toward an angle of interest
pub fn direction(angle: FocusAngle) -> [f64; 3] {
    let [azimuth, zenith] = angle;
    [
        azimuth.cos() * zenith.sin(),
        azimuth.sin() * zenith.sin(),
        zenith.cos(),
    ]
}

/// Far-field response of `array` toward `angle`
pub fn steering_vector(carrier_frequency: f64, angle: FocusAngle, array: &AntennaArray) -> Array1<Complex64> {
    let d = direction(angle);
    let wavenumber = 2.0 * PI * carrier_frequency / SPEED_OF_LIGHT;
    array
        .topology()
        .iter()
        .map(|p| Complex64::from_polar(1.0, wavenumber * (p[0] * d[0] + p[1] * d[1] + p[2] * d[2])))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct ConventionalBeamformer {
    cache: CodebookCache,
}

impl ConventionalBeamformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self {
            cache: CodebookCache::new(capacity),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Codebook of shape `(num_angles, num_antennas)`, normalized by the port count
    pub fn codebook(
        &mut self,
        carrier_frequency: f64,
        angles: &[FocusAngle],
        array: &AntennaArray,
    ) -> Array2<Complex64> {
        let key = CodebookKey::new(carrier_frequency, angles, array.fingerprint());
        if let Some(book) = self.cache.get(&key) {
            return book.clone();
        }

        let num_antennas = array.num_antennas();
        let mut book = Array2::zeros((angles.len(), num_antennas));
        for (mut row, angle) in book.rows_mut().into_iter().zip(angles.iter()) {
            row.assign(&steering_vector(carrier_frequency, *angle, array));
        }
        book /= Complex64::new(num_antennas as f64, 0.0);

        debug!(angles = angles.len(), antennas = num_antennas, "codebook computed");
        self.cache.insert(key, book.clone());
        book
    }

    /// Steer a single stream toward one focus angle, one output stream per port
    pub fn encode(
        &mut self,
        signal: &Signal,
        carrier_frequency: f64,
        focus: &[FocusAngle],
        array: &AntennaArray,
    ) -> SimResult<Signal> {
        if focus.len() != 1 {
            return Err(SimError::config(format!(
                "conventional beamformer transmits toward exactly one focus point, got {}",
                focus.len()
            )));
        }
        if signal.num_streams() != 1 {
            return Err(SimError::validation("beamformer input streams", 1, signal.num_streams()));
        }

        let book = self.codebook(carrier_frequency, focus, array);
        let num_antennas = array.num_antennas() as f64;
        let stream = signal.samples().row(0);

        let mut samples = Array2::zeros((array.num_antennas(), signal.num_samples()));
        for (mut port, weight) in samples.rows_mut().into_iter().zip(book.row(0).iter()) {
            let weight = *weight * num_antennas;
            port.zip_mut_with(&stream, |out, x| *out = weight * x);
        }

        Signal::new(samples, signal.sampling_rate(), signal.carrier_frequency())
    }

    /// Combine all port streams into one steered stream per focus angle
    pub fn decode(
        &mut self,
        signal: &Signal,
        carrier_frequency: f64,
        angles: &[FocusAngle],
        array: &AntennaArray,
    ) -> SimResult<Signal> {
        if signal.num_streams() != array.num_antennas() {
            return Err(SimError::validation(
                "beamformer input streams",
                array.num_antennas(),
                signal.num_streams(),
            ));
        }

        let book = self.codebook(carrier_frequency, angles, array).mapv(|w| w.conj());
        let samples = book.dot(signal.samples());
        Signal::new(samples, signal.sampling_rate(), signal.carrier_frequency())
    }
}
