//! WaveformGenerator trait - bits ↔ frames of baseband samples
//!
//! A generator maps bits to data symbols, modulates one frame at a time and
//! owns the synchronization, estimation and equalization routines applied
//! to received frames.

use ndarray::{Array1, ArrayView1};
use num_complex::Complex64;
use sim_core::{SimResult, Signal};

use crate::waveform::WaveformRoutines;

/// Frame layout a waveform exposes to its receive routines
#[derive(Debug, Clone, PartialEq)]
pub struct FrameContext {
    /// Samples per modulated frame
    pub samples_in_frame: usize,
    pub oversampling_factor: usize,
    /// Sample index of the first symbol peak within a frame
    pub symbol_offset: usize,
    /// Known preamble symbols leading every frame
    pub preamble: Array1<Complex64>,
    /// Modulated preamble used as a correlation reference
    pub preamble_samples: Array1<Complex64>,
}

impl FrameContext {
    pub fn num_preamble_symbols(&self) -> usize {
        self.preamble.len()
    }

    /// Transmit sample index at which symbol `k` of a frame peaks
    pub fn symbol_sample(&self, k: usize) -> usize {
        self.symbol_offset + k * self.oversampling_factor
    }
}

/// Frame-based communication waveform
pub trait WaveformGenerator: Send + std::fmt::Debug {
    /// The number of discrete samples per generated frame
    fn samples_in_frame(&self) -> usize;

    fn oversampling_factor(&self) -> usize;

    /// Set the oversampling factor, at least one
    fn set_oversampling_factor(&mut self, factor: usize) -> SimResult<()>;

    /// Cardinality of the symbol alphabet
    fn modulation_order(&self) -> usize;

    /// Set the modulation order, a positive power of two the waveform supports
    fn set_modulation_order(&mut self, order: usize) -> SimResult<()>;

    fn bits_per_symbol(&self) -> usize {
        self.modulation_order().trailing_zeros() as usize
    }

    /// Data symbols carried per frame
    fn symbols_per_frame(&self) -> usize;

    fn bits_per_frame(&self) -> usize {
        self.symbols_per_frame() * self.bits_per_symbol()
    }

    fn sampling_rate(&self) -> f64;

    /// Duration of a single frame in seconds
    fn frame_duration(&self) -> f64 {
        self.samples_in_frame() as f64 / self.sampling_rate()
    }

    fn symbol_energy(&self) -> f64;

    fn bit_energy(&self) -> f64 {
        self.symbol_energy() / self.bits_per_symbol() as f64
    }

    /// Mean sample power of a modulated frame
    fn power(&self) -> f64;

    /// Occupied bandwidth in Hz
    fn bandwidth(&self) -> f64;

    /// Data bits per second
    fn data_rate(&self) -> f64 {
        self.bits_per_frame() as f64 / self.frame_duration()
    }

    /// Map exactly `bits_per_frame` bits to the data symbols of one frame
    fn map(&self, bits: &[u8]) -> SimResult<Array1<Complex64>>;

    /// Hard-decide data symbols back into bits
    fn unmap(&self, symbols: ArrayView1<Complex64>) -> Vec<u8>;

    /// Modulate the data symbols of one frame into a single-stream signal
    fn modulate(&self, data_symbols: ArrayView1<Complex64>) -> SimResult<Signal>;

    /// Matched-filter one received frame stream into preamble and data symbols
    fn demodulate(&self, frame: ArrayView1<Complex64>) -> SimResult<Array1<Complex64>>;

    fn frame_context(&self) -> FrameContext;

    fn routines(&self) -> &WaveformRoutines;

    fn routines_mut(&mut self) -> &mut WaveformRoutines;
}
