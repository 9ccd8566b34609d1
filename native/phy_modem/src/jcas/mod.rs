//! Joint communication and sensing
//!
//! [`MatchedFilterJcas`] reuses a communication transmission as a radar
//! pulse. Every transmission is cached at the sensing sampling rate; a
//! reception is decoded as usual and additionally correlated against the
//! cached pulse to form a range profile.

mod cube;

pub use cube::RadarCube;

use ndarray::{Array1, Array3};
use num_complex::Complex64;
use rand::Rng;
use channel_physics::ChannelState;
use sim_core::fft::correlate_valid;
use sim_core::{Device, DeviceBinding, Operator, SimError, SimResult, Signal, SPEED_OF_LIGHT};
use tracing::debug;

use crate::modem::{Modem, ModemReception, ModemTransmission};

/// Communication reception plus the sensing result
#[derive(Debug, Clone, PartialEq)]
pub struct JcasReception {
    pub communication: ModemReception,
    pub cube: RadarCube,
}

#[derive(Debug)]
pub struct MatchedFilterJcas {
    modem: Modem,
    max_range: f64,
    sampling_rate: Option<f64>,
    transmission: Option<Signal>,
}

impl Operator for MatchedFilterJcas {
    fn binding(&self) -> &DeviceBinding {
        self.modem.binding()
    }

    fn binding_mut(&mut self) -> &mut DeviceBinding {
        self.modem.binding_mut()
    }
}

impl MatchedFilterJcas {
    /// # Arguments
    /// * `modem` - Communication operator whose transmissions double as radar pulses
    /// * `max_range` - Maximally detectable range in meters, strictly positive
    pub fn new(modem: Modem, max_range: f64) -> SimResult<Self> {
        let mut jcas = Self {
            modem,
            max_range: 1.0,
            sampling_rate: None,
            transmission: None,
        };
        jcas.set_max_range(max_range)?;
        Ok(jcas)
    }

    pub fn modem(&self) -> &Modem {
        &self.modem
    }

    pub fn modem_mut(&mut self) -> &mut Modem {
        &mut self.modem
    }

    /// Sensing rate, never below the waveform rate
    pub fn sampling_rate(&self) -> f64 {
        let waveform_rate = self.modem.waveform().sampling_rate();
        match self.sampling_rate {
            Some(rate) => rate.max(waveform_rate),
            None => waveform_rate,
        }
    }

    /// Request a sensing rate, `None` to follow the waveform
    pub fn set_sampling_rate(&mut self, sampling_rate: Option<f64>) -> SimResult<()> {
        if let Some(rate) = sampling_rate {
            if !(rate > 0.0) || !rate.is_finite() {
                return Err(SimError::config("sampling rate must be greater than zero"));
            }
        }
        self.sampling_rate = sampling_rate;
        Ok(())
    }

    /// Range resolution in meters
    pub fn range_resolution(&self) -> f64 {
        SPEED_OF_LIGHT / self.sampling_rate()
    }

    pub fn set_range_resolution(&mut self, resolution: f64) -> SimResult<()> {
        if !(resolution > 0.0) || !resolution.is_finite() {
            return Err(SimError::config("range resolution must be greater than zero"));
        }
        self.set_sampling_rate(Some(SPEED_OF_LIGHT / resolution))
    }

    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    pub fn set_max_range(&mut self, max_range: f64) -> SimResult<()> {
        if !(max_range > 0.0) || !max_range.is_finite() {
            return Err(SimError::config("maximum range must be greater than zero"));
        }
        self.max_range = max_range;
        Ok(())
    }

    /// The cached pulse of the most recent transmission
    pub fn transmission(&self) -> Option<&Signal> {
        self.transmission.as_ref()
    }

    pub fn transmit<R: Rng + ?Sized>(
        &mut self,
        device: &Device,
        num_frames: usize,
        rng: &mut R,
    ) -> SimResult<ModemTransmission> {
        let transmission = self.modem.transmit(device, num_frames, rng)?;
        self.transmission = Some(transmission.signal.resample(self.sampling_rate())?);
        Ok(transmission)
    }

    /// Decode a reception and correlate it against the cached pulse
    pub fn receive(
        &mut self,
        device: &Device,
        signal: &Signal,
        csi: Option<&ChannelState>,
        noise_variance: f64,
    ) -> SimResult<JcasReception> {
        let pulse = self
            .transmission
            .as_ref()
            .ok_or_else(|| SimError::state("transmission required before reception"))?;

        let sensing_rate = self.sampling_rate();
        let echo = signal.resample(sensing_rate)?;
        if echo.num_streams() != pulse.num_streams() {
            return Err(SimError::validation("echo streams", pulse.num_streams(), echo.num_streams()));
        }

        // Streams are correlated individually and their complex lags summed
        let mut correlation: Vec<Complex64> = Vec::new();
        for (received, sent) in echo.samples().rows().into_iter().zip(pulse.samples().rows()) {
            let lags = correlate_valid(&received.to_vec(), &sent.to_vec());
            if correlation.len() < lags.len() {
                correlation.resize(lags.len(), Complex64::new(0.0, 0.0));
            }
            for (acc, lag) in correlation.iter_mut().zip(lags.iter()) {
                *acc += lag;
            }
        }
        let pulse_len = pulse.num_samples().max(1) as f64;
        let mut profile: Vec<f64> = correlation.iter().map(|c| c.norm() / pulse_len).collect();

        let depth = (2.0 * self.max_range / SPEED_OF_LIGHT * sensing_rate) as usize;
        if profile.len() < depth {
            profile.resize(depth, 0.0);
        }

        let num_bins = profile.len();
        let range_bins: Array1<f64> = (0..num_bins)
            .map(|k| 0.5 * k as f64 * SPEED_OF_LIGHT / sensing_rate)
            .collect();
        let data = Array3::from_shape_vec((1, 1, num_bins), profile)
            .map_err(|e| SimError::state(format!("radar cube shape: {}", e)))?;
        let cube = RadarCube::new(data, Array1::zeros(1), Array1::zeros(1), range_bins)?;

        let communication = self.modem.receive(device, signal, csi, noise_variance)?;
        debug!(bins = num_bins, peak = ?cube.peak_range(), "jcas reception");
        Ok(JcasReception { communication, cube })
    }
}
