//! Modem operator
//!
//! Composes a waveform, symbol precoding chains and an optional transmit
//! beam into a device operator:
//!
//! ```text
//! TX: bits -> map -> precode -> modulate -> [beamform] -> device streams
//! RX: device streams -> synchronize -> demodulate -> estimate -> equalize
//!     -> precoding decode -> unmap -> bits
//! ```
//!
//! Transmit precoders run in insertion order, receive precoders decode in
//! reverse. Receive-only stages such as zero-forcing or maximum ratio
//! combining belong to the receive chain.

use ndarray::{s, Array1, Array2, Axis};
use num_complex::Complex64;
use rand::Rng;
use channel_physics::ChannelState;
use sim_core::{Device, DeviceBinding, Operator, SimError, SimResult, Signal};
use tracing::{debug, trace};

use crate::beamforming::{ConventionalBeamformer, FocusAngle};
use crate::precoding::{StatedSymbols, SymbolPrecoding};
use crate::traits::WaveformGenerator;

/// Transmit beamformer and the direction it steers toward
#[derive(Debug, Clone)]
pub struct TransmitBeam {
    pub beamformer: ConventionalBeamformer,
    pub focus: FocusAngle,
}

/// Everything a modem emitted during one transmission
#[derive(Debug, Clone, PartialEq)]
pub struct ModemTransmission {
    /// Device-rate signal, one stream per transmit antenna
    pub signal: Signal,
    /// Data symbols per frame, shape `(num_frames, symbols_per_frame)`
    pub symbols: Array2<Complex64>,
    pub bits: Vec<u8>,
}

/// Everything a modem recovered during one reception
#[derive(Debug, Clone, PartialEq)]
pub struct ModemReception {
    pub signal: Signal,
    /// Decoded data symbols per frame, shape `(num_frames, symbols_per_frame)`
    pub symbols: Array2<Complex64>,
    pub bits: Vec<u8>,
}

impl ModemReception {
    pub fn num_frames(&self) -> usize {
        self.symbols.nrows()
    }
}

#[derive(Debug)]
pub struct Modem {
    binding: DeviceBinding,
    waveform: Box<dyn WaveformGenerator>,
    transmit_precoding: SymbolPrecoding,
    receive_precoding: SymbolPrecoding,
    transmit_beam: Option<TransmitBeam>,
}

impl Operator for Modem {
    fn binding(&self) -> &DeviceBinding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut DeviceBinding {
        &mut self.binding
    }
}

impl Modem {
    /// Create a floating modem around a waveform
    pub fn new(waveform: Box<dyn WaveformGenerator>) -> Self {
        Self {
            binding: DeviceBinding::default(),
            waveform,
            transmit_precoding: SymbolPrecoding::new(),
            receive_precoding: SymbolPrecoding::new(),
            transmit_beam: None,
        }
    }

    pub fn waveform(&self) -> &dyn WaveformGenerator {
        self.waveform.as_ref()
    }

    pub fn waveform_mut(&mut self) -> &mut dyn WaveformGenerator {
        self.waveform.as_mut()
    }

    pub fn transmit_precoding(&self) -> &SymbolPrecoding {
        &self.transmit_precoding
    }

    pub fn transmit_precoding_mut(&mut self) -> &mut SymbolPrecoding {
        &mut self.transmit_precoding
    }

    pub fn receive_precoding(&self) -> &SymbolPrecoding {
        &self.receive_precoding
    }

    pub fn receive_precoding_mut(&mut self) -> &mut SymbolPrecoding {
        &mut self.receive_precoding
    }

    pub fn transmit_beam(&self) -> Option<&TransmitBeam> {
        self.transmit_beam.as_ref()
    }

    pub fn set_transmit_beam(&mut self, beam: Option<TransmitBeam>) {
        self.transmit_beam = beam;
    }

    /// The bound device, which must be `device`
    fn require_device(&self, device: &Device) -> SimResult<()> {
        let bound = self.binding.require()?;
        if bound != device.id() {
            return Err(SimError::state(format!(
                "modem is bound to device {}, not {}",
                bound.raw(),
                device.id().raw()
            )));
        }
        Ok(())
    }

    /// Per-antenna weights applied to the single modulated stream
    ///
    /// `None` for single-antenna devices transmitting without a beam.
    pub fn transmit_weights(&mut self, device: &Device) -> SimResult<Option<Array1<Complex64>>> {
        match self.transmit_beam.as_mut() {
            Some(beam) => {
                let book = beam.beamformer.codebook(
                    device.carrier_frequency(),
                    &[beam.focus],
                    device.antennas(),
                );
                let scale = Complex64::new(device.num_antennas() as f64, 0.0);
                Ok(Some(book.row(0).mapv(|w| w * scale)))
            }
            None if device.num_antennas() > 1 => Err(SimError::config(format!(
                "transmitting over {} antennas requires a transmit beamformer",
                device.num_antennas()
            ))),
            None => Ok(None),
        }
    }

    /// Generate `num_frames` frames of random data bits and modulate them
    pub fn transmit<R: Rng + ?Sized>(
        &mut self,
        device: &Device,
        num_frames: usize,
        rng: &mut R,
    ) -> SimResult<ModemTransmission> {
        self.require_device(device)?;
        if device.num_antennas() > 1 && self.transmit_beam.is_none() {
            return Err(SimError::config(format!(
                "transmitting over {} antennas requires a transmit beamformer",
                device.num_antennas()
            )));
        }

        let bits_per_frame = self.waveform.bits_per_frame();
        let symbols_per_frame = self.waveform.symbols_per_frame();
        let waveform_rate = self.waveform.sampling_rate();

        let bits: Vec<u8> = (0..num_frames * bits_per_frame)
            .map(|_| rng.gen_range(0..2u8))
            .collect();
        let mut symbols = Array2::zeros((num_frames, symbols_per_frame));
        let mut stream = Signal::empty(waveform_rate, 1)?;

        for (frame, frame_bits) in bits.chunks(bits_per_frame.max(1)).enumerate().take(num_frames) {
            let data = self.waveform.map(frame_bits)?;
            symbols.row_mut(frame).assign(&data);

            let precoded = self.transmit_precoding.encode(data.insert_axis(Axis(0)))?;
            if precoded.nrows() != 1 {
                return Err(SimError::validation("precoded transmit streams", 1, precoded.nrows()));
            }
            stream.append_samples(&self.waveform.modulate(precoded.row(0))?)?;
        }

        let mut signal = Signal::new(stream.into_samples(), waveform_rate, device.carrier_frequency())?;
        if signal.sampling_rate() != device.sampling_rate() {
            signal = signal.resample(device.sampling_rate())?;
        }

        if let Some(beam) = self.transmit_beam.as_mut() {
            signal = beam.beamformer.encode(
                &signal,
                device.carrier_frequency(),
                &[beam.focus],
                device.antennas(),
            )?;
        }

        debug!(
            frames = num_frames,
            streams = signal.num_streams(),
            samples = signal.num_samples(),
            "modem transmitted"
        );
        Ok(ModemTransmission {
            signal,
            symbols,
            bits,
        })
    }

    /// Recover frames from a device reception
    ///
    /// # Arguments
    /// * `device` - The device this modem is bound to
    /// * `signal` - Received streams, one per device antenna
    /// * `csi` - Channel state the reception experienced, an ideal channel if unknown
    /// * `noise_variance` - Noise variance per received sample
    pub fn receive(
        &mut self,
        device: &Device,
        signal: &Signal,
        csi: Option<&ChannelState>,
        noise_variance: f64,
    ) -> SimResult<ModemReception> {
        self.require_device(device)?;
        if signal.num_streams() != device.num_antennas() {
            return Err(SimError::validation(
                "received streams",
                device.num_antennas(),
                signal.num_streams(),
            ));
        }

        let waveform_rate = self.waveform.sampling_rate();
        let baseband = if signal.sampling_rate() != waveform_rate {
            signal.resample(waveform_rate)?
        } else {
            signal.clone()
        };

        let context = self.waveform.frame_context();
        let ideal;
        let state = match csi {
            Some(state) => state,
            None => {
                ideal = ChannelState::ideal(baseband.num_streams(), 1, baseband.num_samples());
                &ideal
            }
        };

        let routines = self.waveform.routines();
        let frames = routines
            .synchronization()
            .synchronize(&context, baseband.samples(), state)?;

        let num_preamble = context.num_preamble_symbols();
        let symbols_per_frame = self.waveform.symbols_per_frame();
        let mut decoded_frames: Vec<Array1<Complex64>> = Vec::new();

        for frame in frames {
            let mut frame_symbols = Array2::zeros((frame.samples.nrows(), num_preamble + symbols_per_frame));
            for (mut row, stream) in frame_symbols.rows_mut().into_iter().zip(frame.samples.rows()) {
                row.assign(&self.waveform.demodulate(stream)?);
            }

            let responses = routines
                .estimation()
                .estimate(&context, &frame_symbols, Some(&frame.state))?;

            let data = frame_symbols.slice(s![.., num_preamble..]).to_owned();
            let noise = Array2::from_elem(data.dim(), noise_variance);
            let stated = StatedSymbols::new(data, responses, noise)?;

            let equalized = routines.equalization().equalize(stated)?;
            let decoded = self.receive_precoding.decode(equalized)?;
            if decoded.num_streams() != 1 {
                return Err(SimError::validation("decoded receive streams", 1, decoded.num_streams()));
            }
            decoded_frames.push(decoded.symbols.row(0).to_owned());
        }

        let mut symbols = Array2::zeros((decoded_frames.len(), symbols_per_frame));
        let mut bits = Vec::with_capacity(decoded_frames.len() * self.waveform.bits_per_frame());
        for (index, frame) in decoded_frames.iter().enumerate() {
            symbols.row_mut(index).assign(frame);
            bits.extend(self.waveform.unmap(frame.view()));
        }

        trace!(frames = decoded_frames.len(), "modem received");
        Ok(ModemReception {
            signal: baseband,
            symbols,
            bits,
        })
    }
}
