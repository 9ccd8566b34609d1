//! Complex baseband signal model
//!
//! A [`Signal`] holds `num_streams x num_samples` complex samples together
//! with the sampling rate and carrier frequency they were generated at.
//! Whichever stage holds a signal owns it; resampling and slicing return new
//! owned instances.

use std::ops::Range;

use ndarray::{s, Array2, Axis};
use num_complex::Complex64;

use crate::error::{SimError, SimResult};
use crate::fft::{fft_in_place, ifft_in_place};

/// Multi-stream complex baseband samples
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    samples: Array2<Complex64>,
    sampling_rate: f64,
    carrier_frequency: f64,
}

impl Signal {
    /// Create a new signal
    ///
    /// # Arguments
    /// * `samples` - Sample matrix of shape `(num_streams, num_samples)`
    /// * `sampling_rate` - Sampling rate in Hz, strictly positive
    /// * `carrier_frequency` - Carrier frequency in Hz, non-negative
    pub fn new(
        samples: Array2<Complex64>,
        sampling_rate: f64,
        carrier_frequency: f64,
    ) -> SimResult<Self> {
        if !(sampling_rate > 0.0) || !sampling_rate.is_finite() {
            return Err(SimError::config("sampling rate must be greater than zero"));
        }
        if !(carrier_frequency >= 0.0) || !carrier_frequency.is_finite() {
            return Err(SimError::config("carrier frequency must be non-negative"));
        }

        Ok(Self {
            samples,
            sampling_rate,
            carrier_frequency,
        })
    }

    /// Create a single-stream signal
    pub fn from_stream(
        stream: Vec<Complex64>,
        sampling_rate: f64,
        carrier_frequency: f64,
    ) -> SimResult<Self> {
        let len = stream.len();
        let samples = Array2::from_shape_vec((1, len), stream)
            .map_err(|e| SimError::config(format!("invalid stream shape: {}", e)))?;
        Self::new(samples, sampling_rate, carrier_frequency)
    }

    /// Create a signal without samples
    pub fn empty(sampling_rate: f64, num_streams: usize) -> SimResult<Self> {
        Self::new(Array2::zeros((num_streams, 0)), sampling_rate, 0.0)
    }

    pub fn num_streams(&self) -> usize {
        self.samples.nrows()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.ncols()
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn carrier_frequency(&self) -> f64 {
        self.carrier_frequency
    }

    pub fn samples(&self) -> &Array2<Complex64> {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut Array2<Complex64> {
        &mut self.samples
    }

    pub fn into_samples(self) -> Array2<Complex64> {
        self.samples
    }

    /// Duration covered by the samples in seconds
    pub fn duration(&self) -> f64 {
        self.num_samples() as f64 / self.sampling_rate
    }

    /// Sample instants relative to the first sample
    pub fn timestamps(&self) -> Vec<f64> {
        (0..self.num_samples())
            .map(|n| n as f64 / self.sampling_rate)
            .collect()
    }

    /// Per-stream energy `sum |x[k]|^2`
    pub fn energy(&self) -> Vec<f64> {
        self.samples
            .axis_iter(Axis(0))
            .map(|stream| stream.iter().map(|x| x.norm_sqr()).sum())
            .collect()
    }

    /// Per-stream mean power, zero for signals without samples
    pub fn power(&self) -> Vec<f64> {
        let n = self.num_samples();
        self.energy()
            .into_iter()
            .map(|e| if n > 0 { e / n as f64 } else { 0.0 })
            .collect()
    }

    /// Fourier-domain resampling to a new sampling rate
    ///
    /// The resampled signal holds `round(N * new_rate / old_rate)` samples
    /// and preserves sample amplitudes of band-limited content.
    pub fn resample(&self, sampling_rate: f64) -> SimResult<Signal> {
        if !(sampling_rate > 0.0) || !sampling_rate.is_finite() {
            return Err(SimError::config("sampling rate must be greater than zero"));
        }
        if sampling_rate == self.sampling_rate || self.num_samples() == 0 {
            let mut resampled = self.clone();
            resampled.sampling_rate = sampling_rate;
            return Ok(resampled);
        }

        let old_len = self.num_samples();
        let new_len =
            ((old_len as f64 * sampling_rate / self.sampling_rate).round() as usize).max(1);
        let shared = old_len.min(new_len);
        let negative = shared / 2;
        let positive = shared - negative;
        let scale = new_len as f64 / old_len as f64;

        let mut resampled = Array2::zeros((self.num_streams(), new_len));
        for (stream, mut out) in self
            .samples
            .axis_iter(Axis(0))
            .zip(resampled.axis_iter_mut(Axis(0)))
        {
            let mut spectrum: Vec<Complex64> = stream.to_vec();
            fft_in_place(&mut spectrum);

            let mut target = vec![Complex64::new(0.0, 0.0); new_len];
            target[..positive].copy_from_slice(&spectrum[..positive]);
            for k in 1..=negative {
                target[new_len - k] = spectrum[old_len - k];
            }
            // An even shared band has a single Nyquist bin that is split
            // across both sides when upsampling and folded when downsampling
            if shared % 2 == 0 {
                let nyquist = shared / 2;
                if new_len > old_len {
                    let half = spectrum[nyquist] * 0.5;
                    target[nyquist] = half;
                    target[new_len - nyquist] = half;
                } else if new_len < old_len {
                    target[nyquist] = spectrum[nyquist] + spectrum[old_len - nyquist];
                }
            }
            ifft_in_place(&mut target);

            for (dst, src) in out.iter_mut().zip(target.into_iter()) {
                *dst = src * scale;
            }
        }

        Signal::new(resampled, sampling_rate, self.carrier_frequency)
    }

    /// Copy a contiguous range of samples from every stream
    pub fn slice(&self, range: Range<usize>) -> SimResult<Signal> {
        if range.start > range.end || range.end > self.num_samples() {
            return Err(SimError::validation(
                "slice end within signal",
                self.num_samples(),
                range.end,
            ));
        }
        Signal::new(
            self.samples.slice(s![.., range]).to_owned(),
            self.sampling_rate,
            self.carrier_frequency,
        )
    }

    /// Append the samples of another signal to the end of this one
    pub fn append_samples(&mut self, other: &Signal) -> SimResult<()> {
        self.check_compatible(other)?;
        self.samples
            .append(Axis(1), other.samples.view())
            .map_err(|e| SimError::config(format!("cannot append samples: {}", e)))
    }

    /// Add another signal sample by sample, zero-extending the shorter one
    pub fn superimpose(&mut self, other: &Signal) -> SimResult<()> {
        self.check_compatible(other)?;

        if other.num_samples() > self.num_samples() {
            let mut extended = Array2::zeros((self.num_streams(), other.num_samples()));
            extended
                .slice_mut(s![.., ..self.num_samples()])
                .assign(&self.samples);
            self.samples = extended;
        }

        let n = other.num_samples();
        let mut head = self.samples.slice_mut(s![.., ..n]);
        head += &other.samples;
        Ok(())
    }

    fn check_compatible(&self, other: &Signal) -> SimResult<()> {
        if self.num_streams() != other.num_streams() {
            return Err(SimError::validation(
                "signal streams",
                self.num_streams(),
                other.num_streams(),
            ));
        }
        if self.sampling_rate != other.sampling_rate {
            return Err(SimError::config(format!(
                "sampling rates differ: {} Hz vs {} Hz",
                self.sampling_rate, other.sampling_rate
            )));
        }
        Ok(())
    }
}
