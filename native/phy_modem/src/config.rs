//! Tagged configuration registry for modems and scenarios
//!
//! Every configurable kind is a closed `#[serde(tag = "type")]` enum decoded
//! from a generic `serde_json::Value`. Building a configuration always goes
//! through the validated constructors, so invalid values surface as
//! [`SimError::Configuration`].

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use channel_physics::{ChannelConfig, CorrelationConfig};
use sim_core::logging::LogConfig;
use sim_core::{AntennaArray, Device, SimError, SimResult};

use crate::beamforming::{ConventionalBeamformer, FocusAngle, DEFAULT_CACHE_CAPACITY};
use crate::modem::{Modem, TransmitBeam};
use crate::precoding::{MaximumRatioCombining, SymbolPrecoder, ZeroForcingEqualizer};
use crate::pulse_shapes::{DEFAULT_ROLL_OFF, DEFAULT_SPAN};
use crate::traits::WaveformGenerator;
use crate::waveform::{
    CorrelationSynchronization, CustomPilotSequence, LeastSquaresChannelEstimation, PilotSequence,
    PskQamWaveform, UniformPilotSequence, ZeroForcingChannelEqualization,
};

fn decode<T: for<'de> Deserialize<'de>>(value: &serde_json::Value, what: &str) -> SimResult<T> {
    T::deserialize(value).map_err(|e| SimError::config(format!("invalid {} config: {}", what, e)))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PilotConfig {
    Uniform {
        #[serde(default = "default_pilot_real")]
        real: f64,
        #[serde(default)]
        imag: f64,
    },
    Custom {
        real: Vec<f64>,
        #[serde(default)]
        imag: Option<Vec<f64>>,
        #[serde(default = "default_true")]
        allow_repetition: bool,
    },
}

fn default_pilot_real() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl PilotConfig {
    pub fn build(&self) -> SimResult<Box<dyn PilotSequence>> {
        match self {
            Self::Uniform { real, imag } => Ok(Box::new(UniformPilotSequence::new(Complex64::new(*real, *imag)))),
            Self::Custom { real, imag, allow_repetition } => {
                if let Some(imag) = imag {
                    if imag.len() != real.len() {
                        return Err(SimError::config("custom pilot imaginary parts must match the real parts"));
                    }
                }
                let symbols = real
                    .iter()
                    .enumerate()
                    .map(|(k, re)| Complex64::new(*re, imag.as_ref().map_or(0.0, |imag| imag[k])))
                    .collect();
                Ok(Box::new(CustomPilotSequence::new(symbols, *allow_repetition)?))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynchronizationKind {
    #[default]
    Frame,
    Correlation,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationKind {
    #[default]
    Ideal,
    LeastSquares,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualizationKind {
    #[default]
    None,
    ZeroForcing,
}

fn default_oversampling() -> usize {
    4
}

fn default_modulation_order() -> usize {
    4
}

fn default_roll_off() -> f64 {
    DEFAULT_ROLL_OFF
}

fn default_span() -> usize {
    DEFAULT_SPAN
}

/// Waveform selection
///
/// ```json
/// {"type": "psk_qam", "symbol_rate": 1e6, "num_data_symbols": 100, "estimation": "least_squares"}
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaveformConfig {
    PskQam {
        symbol_rate: f64,
        #[serde(default = "default_oversampling")]
        oversampling_factor: usize,
        #[serde(default = "default_modulation_order")]
        modulation_order: usize,
        #[serde(default)]
        num_preamble_symbols: usize,
        num_data_symbols: usize,
        #[serde(default = "default_roll_off")]
        roll_off: f64,
        #[serde(default = "default_span")]
        span: usize,
        #[serde(default)]
        pilots: Option<PilotConfig>,
        #[serde(default)]
        synchronization: SynchronizationKind,
        #[serde(default)]
        estimation: EstimationKind,
        #[serde(default)]
        equalization: EqualizationKind,
    },
}

impl WaveformConfig {
    pub fn decode(value: &serde_json::Value) -> SimResult<Self> {
        decode(value, "waveform")
    }

    pub fn build(&self) -> SimResult<Box<dyn WaveformGenerator>> {
        match self {
            Self::PskQam {
                symbol_rate,
                oversampling_factor,
                modulation_order,
                num_preamble_symbols,
                num_data_symbols,
                roll_off,
                span,
                pilots,
                synchronization,
                estimation,
                equalization,
            } => {
                let mut waveform = PskQamWaveform::new(
                    *symbol_rate,
                    *oversampling_factor,
                    *modulation_order,
                    0,
                    *num_data_symbols,
                )?;
                waveform.set_pulse(*roll_off, *span)?;
                if let Some(pilots) = pilots {
                    waveform.set_pilots(pilots.build()?)?;
                }
                waveform.set_num_preamble_symbols(*num_preamble_symbols)?;

                let routines = waveform.routines_mut();
                if *synchronization == SynchronizationKind::Correlation {
                    routines.set_synchronization(Box::new(CorrelationSynchronization::new()))?;
                }
                if *estimation == EstimationKind::LeastSquares {
                    routines.set_estimation(Box::new(LeastSquaresChannelEstimation::new()))?;
                }
                if *equalization == EqualizationKind::ZeroForcing {
                    routines.set_equalization(Box::new(ZeroForcingChannelEqualization::new()))?;
                }
                Ok(Box::new(waveform))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrecoderConfig {
    ZeroForcing,
    MaximumRatioCombining,
}

impl PrecoderConfig {
    pub fn build(&self) -> Box<dyn SymbolPrecoder> {
        match self {
            Self::ZeroForcing => Box::new(ZeroForcingEqualizer),
            Self::MaximumRatioCombining => Box::new(MaximumRatioCombining),
        }
    }
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BeamformerConfig {
    Conventional {
        #[serde(default = "default_cache_capacity")]
        cache_capacity: usize,
    },
}

impl BeamformerConfig {
    pub fn decode(value: &serde_json::Value) -> SimResult<Self> {
        decode(value, "beamformer")
    }

    pub fn build(&self) -> ConventionalBeamformer {
        match self {
            Self::Conventional { cache_capacity } => ConventionalBeamformer::with_cache_capacity(*cache_capacity),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransmitBeamConfig {
    pub beamformer: BeamformerConfig,
    /// `[azimuth, zenith]` in radians
    pub focus: FocusAngle,
}

fn default_dimensions() -> [usize; 3] {
    [1, 1, 1]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub sampling_rate: f64,
    #[serde(default)]
    pub carrier_frequency: f64,
    /// Ports along x, y and z
    #[serde(default = "default_dimensions")]
    pub dimensions: [usize; 3],
    /// Port spacing in meters, half a wavelength if omitted
    #[serde(default)]
    pub spacing: Option<f64>,
}

impl DeviceConfig {
    pub fn build(&self) -> SimResult<Device> {
        let spacing = match self.spacing {
            Some(spacing) => spacing,
            None if self.carrier_frequency > 0.0 => 0.5 * sim_core::SPEED_OF_LIGHT / self.carrier_frequency,
            None if self.dimensions.iter().product::<usize>() == 1 => 1.0,
            None => {
                return Err(SimError::config(
                    "antenna spacing is required for arrays at zero carrier frequency",
                ))
            }
        };
        let antennas = AntennaArray::uniform(spacing, self.dimensions)?;
        Device::new(antennas, self.sampling_rate, self.carrier_frequency)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModemConfig {
    /// Index into the scenario's devices
    pub device: usize,
    pub waveform: WaveformConfig,
    #[serde(default)]
    pub transmit_precoding: Vec<PrecoderConfig>,
    #[serde(default)]
    pub receive_precoding: Vec<PrecoderConfig>,
    #[serde(default)]
    pub transmit_beam: Option<TransmitBeamConfig>,
}

impl ModemConfig {
    /// A floating modem described by this configuration
    pub fn build(&self) -> SimResult<Modem> {
        let mut modem = Modem::new(self.waveform.build()?);
        for precoder in &self.transmit_precoding {
            modem.transmit_precoding_mut().push(precoder.build());
        }
        for precoder in &self.receive_precoding {
            modem.receive_precoding_mut().push(precoder.build());
        }
        if let Some(beam) = &self.transmit_beam {
            modem.set_transmit_beam(Some(TransmitBeam {
                beamformer: beam.beamformer.build(),
                focus: beam.focus,
            }));
        }
        Ok(modem)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Device indices of both link ends, may coincide
    pub alpha: usize,
    pub beta: usize,
    pub channel: ChannelConfig,
    #[serde(default)]
    pub alpha_correlation: Option<CorrelationConfig>,
    #[serde(default)]
    pub beta_correlation: Option<CorrelationConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Root seed of all random streams, drawn from the fallback generator if omitted
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub logging: Option<LogConfig>,
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
    #[serde(default)]
    pub modems: Vec<ModemConfig>,
}

impl ScenarioConfig {
    pub fn decode(value: &serde_json::Value) -> SimResult<Self> {
        decode(value, "scenario")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_waveform_config_selects_routines() {
        let config = WaveformConfig::decode(&json!({
            "type": "psk_qam",
            "symbol_rate": 1e6,
            "modulation_order": 16,
            "num_preamble_symbols": 8,
            "num_data_symbols": 64,
            "estimation": "least_squares",
            "equalization": "zero_forcing",
        }))
        .unwrap();
        let waveform = config.build().unwrap();

        assert_eq!(waveform.modulation_order(), 16);
        assert_eq!(waveform.oversampling_factor(), 4);
        assert_eq!(waveform.frame_context().num_preamble_symbols(), 8);
        assert!(format!("{:?}", waveform.routines().estimation()).contains("LeastSquares"));
        assert!(waveform.routines().equalization().is_attached());
    }

    #[test]
    fn test_invalid_waveform_values_are_configuration_errors() {
        let config = WaveformConfig::decode(&json!({
            "type": "psk_qam", "symbol_rate": 1e6, "modulation_order": 32, "num_data_symbols": 10,
        }))
        .unwrap();
        assert!(matches!(config.build(), Err(SimError::Configuration(_))));

        assert!(matches!(
            WaveformConfig::decode(&json!({"type": "ofdm", "symbol_rate": 1e6})),
            Err(SimError::Configuration(_))
        ));
    }

    #[test]
    fn test_non_repeating_pilots_limit_preamble() {
        let config = WaveformConfig::decode(&json!({
            "type": "psk_qam",
            "symbol_rate": 1e6,
            "num_preamble_symbols": 3,
            "num_data_symbols": 10,
            "pilots": {"type": "custom", "real": [1.0, -1.0], "allow_repetition": false},
        }))
        .unwrap();
        assert!(matches!(config.build(), Err(SimError::State(_))));
    }

    #[test]
    fn test_modem_config_builds_chains_and_beam() {
        let config: ModemConfig = serde_json::from_value(json!({
            "device": 0,
            "waveform": {"type": "psk_qam", "symbol_rate": 1e6, "num_data_symbols": 16},
            "receive_precoding": [{"type": "maximum_ratio_combining"}],
            "transmit_beam": {"beamformer": {"type": "conventional"}, "focus": [0.0, 0.5]},
        }))
        .unwrap();
        let modem = config.build().unwrap();

        assert_eq!(modem.receive_precoding().len(), 1);
        assert!(modem.transmit_precoding().is_empty());
        let beam = modem.transmit_beam().unwrap();
        assert_eq!(beam.beamformer.cache_capacity(), DEFAULT_CACHE_CAPACITY);
        assert_eq!(beam.focus, [0.0, 0.5]);
    }

    #[test]
    fn test_device_config_defaults_to_half_wavelength() {
        let config: DeviceConfig =
            serde_json::from_value(json!({"sampling_rate": 1e6, "carrier_frequency": 3e9, "dimensions": [4, 1, 1]}))
                .unwrap();
        let device = config.build().unwrap();
        assert_eq!(device.num_antennas(), 4);
        let spacing = device.antennas().positions()[1][0];
        assert!((spacing - 0.5 * sim_core::SPEED_OF_LIGHT / 3e9).abs() < 1e-12);
        assert!(device.antennas().is_linear());
    }
}
