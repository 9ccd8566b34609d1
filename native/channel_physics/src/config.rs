//! Serde configuration surface for channels
//!
//! Configurations decode from a generic `serde_json::Value` and always end in
//! the validated constructors, so a decoded channel satisfies the same
//! invariants as one built in code.

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use sim_core::{SimError, SimResult};

use crate::channel::{ChannelParams, DEFAULT_NUM_SINUSOIDS};
use crate::correlation::{
    AntennaCorrelation, CorrelationLevel, CustomAntennaCorrelation, DeviceRole,
    StandardAntennaCorrelation,
};
use crate::templates::{Cost259Model, TdlModel, DEFAULT_RMS_DELAY};

/// Rice factor as a number or the string `"inf"` for pure line of sight
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RiceFactor {
    Linear(f64),
    Named(String),
}

impl RiceFactor {
    pub fn value(&self) -> SimResult<f64> {
        match self {
            Self::Linear(k) => Ok(*k),
            Self::Named(name) => match name.to_ascii_lowercase().as_str() {
                "inf" | "infinity" => Ok(f64::INFINITY),
                other => Err(SimError::config(format!("unknown rice factor '{}'", other))),
            },
        }
    }
}

fn default_gain() -> f64 {
    1.0
}

fn default_num_sinusoids() -> usize {
    DEFAULT_NUM_SINUSOIDS
}

fn default_rms_delay() -> f64 {
    DEFAULT_RMS_DELAY
}

/// Channel model selection
///
/// ```json
/// {"type": "tdl", "model": "C", "rms_delay": 3e-7, "doppler_frequency": 20.0}
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelConfig {
    MultipathFading {
        delays: Vec<f64>,
        power_profile: Vec<f64>,
        rice_factors: Vec<RiceFactor>,
        #[serde(default)]
        doppler_frequency: f64,
        #[serde(default)]
        los_doppler_frequency: Option<f64>,
        #[serde(default = "default_num_sinusoids")]
        num_sinusoids: usize,
        #[serde(default)]
        los_angle: Option<f64>,
        #[serde(default = "default_gain")]
        gain: f64,
    },
    Cost259 {
        model: Cost259Model,
        #[serde(default)]
        doppler_frequency: f64,
        #[serde(default)]
        los_angle: Option<f64>,
        #[serde(default = "default_gain")]
        gain: f64,
    },
    Tdl {
        model: TdlModel,
        #[serde(default = "default_rms_delay")]
        rms_delay: f64,
        #[serde(default)]
        doppler_frequency: f64,
        #[serde(default)]
        los_doppler_frequency: Option<f64>,
        #[serde(default = "default_gain")]
        gain: f64,
    },
}

impl ChannelConfig {
    /// Decode a configuration from a generic key-value mapping
    pub fn decode(value: &serde_json::Value) -> SimResult<Self> {
        Self::deserialize(value).map_err(|e| SimError::config(format!("invalid channel config: {}", e)))
    }

    /// Validated channel parameters described by this configuration
    pub fn to_params(&self) -> SimResult<ChannelParams> {
        match self {
            Self::MultipathFading {
                delays,
                power_profile,
                rice_factors,
                doppler_frequency,
                los_doppler_frequency,
                num_sinusoids,
                los_angle,
                gain,
            } => {
                let rice_factors = rice_factors
                    .iter()
                    .map(RiceFactor::value)
                    .collect::<SimResult<Vec<_>>>()?;
                let mut params = ChannelParams::new(delays.clone(), power_profile.clone(), rice_factors)?
                    .with_doppler_frequency(*doppler_frequency)?
                    .with_num_sinusoids(*num_sinusoids)?
                    .with_gain(*gain)?;
                if let Some(los_doppler) = los_doppler_frequency {
                    params = params.with_los_doppler_frequency(*los_doppler)?;
                }
                if let Some(angle) = los_angle {
                    params = params.with_los_angle(*angle)?;
                }
                Ok(params)
            }
            Self::Cost259 {
                model,
                doppler_frequency,
                los_angle,
                gain,
            } => model.channel_params(*doppler_frequency, *los_angle)?.with_gain(*gain),
            Self::Tdl {
                model,
                rms_delay,
                doppler_frequency,
                los_doppler_frequency,
                gain,
            } => model
                .channel_params(*rms_delay, *doppler_frequency, *los_doppler_frequency)?
                .with_gain(*gain),
        }
    }
}

/// Antenna correlation selection for one side of a link
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CorrelationConfig {
    Standard {
        level: CorrelationLevel,
        role: DeviceRole,
    },
    /// Row-major covariance, imaginary part optional
    Custom {
        real: Vec<Vec<f64>>,
        #[serde(default)]
        imag: Option<Vec<Vec<f64>>>,
    },
}

impl CorrelationConfig {
    pub fn build(&self) -> SimResult<Box<dyn AntennaCorrelation>> {
        match self {
            Self::Standard { level, role } => Ok(Box::new(StandardAntennaCorrelation::new(*level, *role))),
            Self::Custom { real, imag } => {
                let n = real.len();
                if real.iter().any(|row| row.len() != n) {
                    return Err(SimError::config("custom covariance rows must all have length equal to the row count"));
                }
                if let Some(imag) = imag {
                    if imag.len() != n || imag.iter().any(|row| row.len() != n) {
                        return Err(SimError::config("custom covariance imaginary part must match the real part"));
                    }
                }

                let covariance = Array2::from_shape_fn((n, n), |(i, j)| {
                    let im = imag.as_ref().map_or(0.0, |imag| imag[i][j]);
                    Complex64::new(real[i][j], im)
                });
                Ok(Box::new(CustomAntennaCorrelation::new(covariance)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_multipath_with_infinite_rice() {
        let config = ChannelConfig::decode(&json!({
            "type": "multipath_fading",
            "delays": [0.0, 1e-6],
            "power_profile": [1.0, 0.5],
            "rice_factors": ["inf", 0.0],
            "doppler_frequency": 10.0,
        }))
        .unwrap();

        let params = config.to_params().unwrap();
        assert!(params.rice_factors()[0].is_infinite());
        assert_eq!(params.num_sinusoids(), DEFAULT_NUM_SINUSOIDS);
        assert_eq!(params.gain(), 1.0);
        assert_eq!(params.los_doppler_frequency(), 10.0);
    }

    #[test]
    fn test_decode_templates() {
        let cost = ChannelConfig::decode(&json!({"type": "cost259", "model": "RuralArea"})).unwrap();
        assert_eq!(cost.to_params().unwrap().num_paths(), 10);

        let tdl = ChannelConfig::decode(&json!({"type": "tdl", "model": "E", "gain": 0.5})).unwrap();
        let params = tdl.to_params().unwrap();
        assert_eq!(params.gain(), 0.5);
        assert!(params.rice_factors()[0].is_infinite());
    }

    #[test]
    fn test_invalid_values_surface_as_configuration_errors() {
        let bad_rice = ChannelConfig::decode(&json!({
            "type": "multipath_fading",
            "delays": [0.0],
            "power_profile": [1.0],
            "rice_factors": ["huge"],
        }))
        .unwrap();
        assert!(matches!(bad_rice.to_params(), Err(SimError::Configuration(_))));

        let negative = ChannelConfig::decode(&json!({
            "type": "multipath_fading",
            "delays": [-1.0],
            "power_profile": [1.0],
            "rice_factors": [0.0],
        }))
        .unwrap();
        assert!(matches!(negative.to_params(), Err(SimError::Configuration(_))));

        assert!(matches!(
            ChannelConfig::decode(&json!({"type": "cdl", "model": "A"})),
            Err(SimError::Configuration(_))
        ));
        let hilly = ChannelConfig::decode(&json!({"type": "cost259", "model": "HillyTerrain", "los_angle": 0.3})).unwrap();
        assert!(hilly.to_params().is_err());
    }

    #[test]
    fn test_correlation_configs_build() {
        let standard: CorrelationConfig =
            serde_json::from_value(json!({"type": "standard", "level": "medium", "role": "terminal"})).unwrap();
        let covariance = standard.build().unwrap().covariance(2).unwrap();
        assert!((covariance[[0, 1]].re - 0.9).abs() < 1e-12);

        let custom: CorrelationConfig =
            serde_json::from_value(json!({"type": "custom", "real": [[1.0, 0.2], [0.2, 1.0]]})).unwrap();
        assert!(custom.build().is_ok());

        let ragged: CorrelationConfig =
            serde_json::from_value(json!({"type": "custom", "real": [[1.0, 0.2], [0.2]]})).unwrap();
        assert!(ragged.build().is_err());
    }
}
