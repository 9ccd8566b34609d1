//! Single-carrier PSK/QAM waveform
//!
//! One concrete waveform with the constellation held as a runtime enum, so
//! the modulation order can change without rebuilding the pulse or the
//! receive routines. Every frame carries a pilot preamble followed by the
//! data symbols, shaped by a root raised cosine pulse:
//!
//! ```text
//! | preamble (P symbols) | data (D symbols) |  -> upsample by os -> RRC
//! samples_in_frame = (P + D) * os + filter_len - 1
//! ```

use ndarray::{Array1, ArrayView1};
use num_complex::Complex64;
use sim_core::{SimError, SimResult, Signal};

use super::pilots::{PilotSequence, UniformPilotSequence};
use super::routines::WaveformRoutines;
use crate::constellations::{map_bits, unmap_symbols, Modulation};
use crate::pulse_shapes::{RootRaisedCosine, DEFAULT_ROLL_OFF, DEFAULT_SPAN};
use crate::traits::{Constellation, FrameContext, PulseShape, WaveformGenerator};

#[derive(Debug)]
pub struct PskQamWaveform {
    symbol_rate: f64,
    modulation: Modulation,
    num_data_symbols: usize,
    pilots: Box<dyn PilotSequence>,
    preamble: Array1<Complex64>,
    pulse: RootRaisedCosine,
    routines: WaveformRoutines,
}

impl PskQamWaveform {
    /// Create a waveform with the default pulse and a uniform pilot preamble
    ///
    /// # Arguments
    /// * `symbol_rate` - Symbols per second, strictly positive
    /// * `oversampling_factor` - Samples per symbol, at least one
    /// * `modulation_order` - 2, 4, 8 (PSK) or 16, 64, 256 (QAM)
    /// * `num_preamble_symbols` - Pilot symbols leading each frame
    /// * `num_data_symbols` - Data symbols per frame, at least one
    pub fn new(
        symbol_rate: f64,
        oversampling_factor: usize,
        modulation_order: usize,
        num_preamble_symbols: usize,
        num_data_symbols: usize,
    ) -> SimResult<Self> {
        if !(symbol_rate > 0.0) || !symbol_rate.is_finite() {
            return Err(SimError::config("symbol rate must be greater than zero"));
        }
        if num_data_symbols < 1 {
            return Err(SimError::config("a frame must carry at least one data symbol"));
        }

        let pilots: Box<dyn PilotSequence> = Box::new(UniformPilotSequence::default());
        let preamble = pilots.pilots(num_preamble_symbols)?;

        Ok(Self {
            symbol_rate,
            modulation: Modulation::for_order(modulation_order)?,
            num_data_symbols,
            pilots,
            preamble,
            pulse: RootRaisedCosine::new(oversampling_factor, DEFAULT_ROLL_OFF, DEFAULT_SPAN)?,
            routines: WaveformRoutines::new(),
        })
    }

    pub fn symbol_rate(&self) -> f64 {
        self.symbol_rate
    }

    pub fn set_symbol_rate(&mut self, symbol_rate: f64) -> SimResult<()> {
        if !(symbol_rate > 0.0) || !symbol_rate.is_finite() {
            return Err(SimError::config("symbol rate must be greater than zero"));
        }
        self.symbol_rate = symbol_rate;
        Ok(())
    }

    pub fn modulation(&self) -> Modulation {
        self.modulation
    }

    pub fn roll_off(&self) -> f64 {
        self.pulse.roll_off()
    }

    pub fn pulse(&self) -> &RootRaisedCosine {
        &self.pulse
    }

    /// Replace the pulse roll-off and span, keeping the oversampling factor
    pub fn set_pulse(&mut self, roll_off: f64, span: usize) -> SimResult<()> {
        self.pulse = RootRaisedCosine::new(self.pulse.samples_per_symbol(), roll_off, span)?;
        Ok(())
    }

    pub fn num_preamble_symbols(&self) -> usize {
        self.preamble.len()
    }

    pub fn set_num_preamble_symbols(&mut self, num_symbols: usize) -> SimResult<()> {
        self.preamble = self.pilots.pilots(num_symbols)?;
        Ok(())
    }

    pub fn num_data_symbols(&self) -> usize {
        self.num_data_symbols
    }

    pub fn set_num_data_symbols(&mut self, num_symbols: usize) -> SimResult<()> {
        if num_symbols < 1 {
            return Err(SimError::config("a frame must carry at least one data symbol"));
        }
        self.num_data_symbols = num_symbols;
        Ok(())
    }

    pub fn pilots(&self) -> &dyn PilotSequence {
        self.pilots.as_ref()
    }

    /// Replace the pilot sequence, redrawing the current preamble from it
    pub fn set_pilots(&mut self, pilots: Box<dyn PilotSequence>) -> SimResult<()> {
        self.preamble = pilots.pilots(self.preamble.len())?;
        self.pilots = pilots;
        Ok(())
    }

    pub fn preamble(&self) -> ArrayView1<'_, Complex64> {
        self.preamble.view()
    }

    fn num_frame_symbols(&self) -> usize {
        self.preamble.len() + self.num_data_symbols
    }
}

impl WaveformGenerator for PskQamWaveform {
    fn samples_in_frame(&self) -> usize {
        self.num_frame_symbols() * self.pulse.samples_per_symbol() + self.pulse.filter_len() - 1
    }

    fn oversampling_factor(&self) -> usize {
        self.pulse.samples_per_symbol()
    }

    fn set_oversampling_factor(&mut self, factor: usize) -> SimResult<()> {
        self.pulse = RootRaisedCosine::new(factor, self.pulse.roll_off(), self.pulse.span_symbols())?;
        Ok(())
    }

    fn modulation_order(&self) -> usize {
        self.modulation.order()
    }

    fn set_modulation_order(&mut self, order: usize) -> SimResult<()> {
        self.modulation = Modulation::for_order(order)?;
        Ok(())
    }

    fn symbols_per_frame(&self) -> usize {
        self.num_data_symbols
    }

    fn sampling_rate(&self) -> f64 {
        self.symbol_rate * self.pulse.samples_per_symbol() as f64
    }

    fn symbol_energy(&self) -> f64 {
        1.0
    }

    fn power(&self) -> f64 {
        1.0 / self.pulse.samples_per_symbol() as f64
    }

    fn bandwidth(&self) -> f64 {
        self.symbol_rate * (1.0 + self.pulse.roll_off())
    }

    fn map(&self, bits: &[u8]) -> SimResult<Array1<Complex64>> {
        let expected = self.bits_per_frame();
        if bits.len() != expected {
            return Err(SimError::validation("bits per frame", expected, bits.len()));
        }
        Ok(Array1::from(map_bits(&self.modulation, bits)))
    }

    fn unmap(&self, symbols: ArrayView1<Complex64>) -> Vec<u8> {
        unmap_symbols(&self.modulation, symbols.iter().copied())
    }

    fn modulate(&self, data_symbols: ArrayView1<Complex64>) -> SimResult<Signal> {
        if data_symbols.len() != self.num_data_symbols {
            return Err(SimError::validation(
                "data symbols per frame",
                self.num_data_symbols,
                data_symbols.len(),
            ));
        }

        let frame: Vec<Complex64> = self
            .preamble
            .iter()
            .chain(data_symbols.iter())
            .copied()
            .collect();
        Signal::from_stream(self.pulse.shape(&frame), self.sampling_rate(), 0.0)
    }

    fn demodulate(&self, frame: ArrayView1<Complex64>) -> SimResult<Array1<Complex64>> {
        let samples = frame.to_vec();
        Ok(Array1::from(
            self.pulse.matched_symbols(&samples, self.num_frame_symbols()),
        ))
    }

    fn frame_context(&self) -> FrameContext {
        let preamble_samples = self.pulse.shape(self.preamble.as_slice().unwrap_or(&[]));
        FrameContext {
            samples_in_frame: self.samples_in_frame(),
            oversampling_factor: self.pulse.samples_per_symbol(),
            symbol_offset: self.pulse.delay(),
            preamble: self.preamble.clone(),
            preamble_samples: Array1::from(preamble_samples),
        }
    }

    fn routines(&self) -> &WaveformRoutines {
        &self.routines
    }

    fn routines_mut(&mut self) -> &mut WaveformRoutines {
        &mut self.routines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::CustomPilotSequence;
    use approx::assert_relative_eq;

    fn waveform() -> PskQamWaveform {
        PskQamWaveform::new(1e6, 4, 16, 4, 40).unwrap()
    }

    #[test]
    fn test_frame_dimensions() {
        let wf = waveform();
        let filter_len = 2 * DEFAULT_SPAN * 4 + 1;
        assert_eq!(wf.samples_in_frame(), 44 * 4 + filter_len - 1);
        assert_eq!(wf.bits_per_frame(), 160);
        assert_eq!(wf.sampling_rate(), 4e6);
        assert_relative_eq!(wf.bandwidth(), 1.35e6, epsilon = 1e-6);
        assert_relative_eq!(wf.power(), 0.25);
        assert_relative_eq!(wf.bit_energy(), 0.25);
        assert_relative_eq!(wf.frame_duration(), wf.samples_in_frame() as f64 / 4e6);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(matches!(PskQamWaveform::new(0.0, 4, 4, 0, 10), Err(SimError::Configuration(_))));
        assert!(matches!(PskQamWaveform::new(1e6, 0, 4, 0, 10), Err(SimError::Configuration(_))));
        assert!(matches!(PskQamWaveform::new(1e6, 4, 32, 0, 10), Err(SimError::Configuration(_))));
        assert!(matches!(PskQamWaveform::new(1e6, 4, 4, 0, 0), Err(SimError::Configuration(_))));

        let mut wf = waveform();
        assert!(wf.set_modulation_order(3).is_err());
        assert!(wf.set_oversampling_factor(0).is_err());
        assert_eq!(wf.modulation_order(), 16, "Failed setters must leave the waveform untouched");
    }

    #[test]
    fn test_map_requires_exact_frame_bits() {
        let wf = waveform();
        assert!(matches!(
            wf.map(&[0u8; 10]),
            Err(SimError::Validation { expected: 160, actual: 10, .. })
        ));
    }

    #[test]
    fn test_modulate_demodulate_recovers_bits() {
        for order in [2usize, 4, 8, 16, 64] {
            let wf = PskQamWaveform::new(1e6, 4, order, 2, 32).unwrap();
            let bits: Vec<u8> = (0..wf.bits_per_frame()).map(|i| ((i * 7 + i / 3) % 2) as u8).collect();

            let symbols = wf.map(&bits).unwrap();
            let signal = wf.modulate(symbols.view()).unwrap();
            assert_eq!(signal.num_samples(), wf.samples_in_frame());

            let received = wf.demodulate(signal.samples().row(0)).unwrap();
            assert_eq!(received.len(), 34);
            for (rx, pilot) in received.iter().zip(wf.preamble().iter()) {
                assert!((rx - pilot).norm() < 0.05, "Preamble symbol distorted: {}", rx);
            }

            let decoded = wf.unmap(received.slice(ndarray::s![2..]));
            assert_eq!(decoded, bits, "Order {} failed to round-trip", order);
        }
    }

    #[test]
    fn test_frame_context_matches_layout() {
        let wf = waveform();
        let ctx = wf.frame_context();
        assert_eq!(ctx.samples_in_frame, wf.samples_in_frame());
        assert_eq!(ctx.symbol_offset, wf.pulse().delay());
        assert_eq!(ctx.preamble.len(), 4);
        assert_eq!(ctx.preamble_samples.len(), 4 * 4 + wf.pulse().filter_len() - 1);
    }

    #[test]
    fn test_non_repeating_pilots_bound_preamble() {
        let mut wf = waveform();
        let pilots = CustomPilotSequence::new(vec![Complex64::new(1.0, 0.0); 4], false).unwrap();
        wf.set_pilots(Box::new(pilots)).unwrap();
        assert!(matches!(wf.set_num_preamble_symbols(5), Err(SimError::State(_))));
        assert_eq!(wf.num_preamble_symbols(), 4);
    }
}
