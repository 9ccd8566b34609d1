//! Standardized tapped delay line parameter sets
//!
//! COST-259 models follow 3GPP TR 25.943, TDL models follow the normalized
//! delay tables of 3GPP TR 38.901 section 7.7.2. Both produce plain
//! [`ChannelParams`], so a template channel is an ordinary
//! [`crate::MultipathFadingChannel`].

use serde::{Deserialize, Serialize};
use sim_core::{SimError, SimResult};

use crate::channel::ChannelParams;

/// Default TDL rms delay spread in seconds
pub const DEFAULT_RMS_DELAY: f64 = 100e-9;

fn db_to_linear(db: &[f64]) -> Vec<f64> {
    db.iter().map(|p| 10f64.powf(p / 10.0)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cost259Model {
    TypicalUrban,
    RuralArea,
    HillyTerrain,
}

const TU_DELAYS_US: [f64; 20] = [
    0.0, 0.217, 0.512, 0.514, 0.517, 0.674, 0.882, 1.230, 1.287, 1.311, 1.349, 1.533, 1.535, 1.622,
    1.818, 1.836, 1.884, 1.943, 2.048, 2.140,
];
const TU_POWERS_DB: [f64; 20] = [
    -5.7, -7.6, -10.1, -10.2, -10.2, -11.5, -13.4, -16.3, -16.9, -17.1, -17.4, -19.0, -19.0, -19.8,
    -21.5, -21.6, -22.1, -22.6, -23.5, -24.3,
];

const RA_DELAYS_US: [f64; 10] = [0.0, 0.042, 0.101, 0.129, 0.149, 0.245, 0.312, 0.410, 0.469, 0.528];
const RA_POWERS_DB: [f64; 10] = [-5.2, -6.4, -8.4, -9.3, -10.0, -13.1, -15.3, -18.5, -20.4, -22.4];

const HT_DELAYS_US: [f64; 20] = [
    0.0, 0.356, 0.441, 0.528, 0.546, 0.609, 0.625, 0.842, 0.916, 0.941, 15.0, 16.172, 16.492,
    16.876, 16.882, 16.978, 17.615, 17.827, 17.849, 18.016,
];
const HT_POWERS_DB: [f64; 20] = [
    -3.6, -8.9, -10.2, -11.5, -11.8, -12.7, -13.0, -16.2, -17.3, -17.7, -17.6, -22.7, -24.1, -25.8,
    -25.8, -26.2, -29.0, -29.9, -30.0, -30.7,
];

impl Cost259Model {
    pub const ALL: [Cost259Model; 3] = [Self::TypicalUrban, Self::RuralArea, Self::HillyTerrain];

    /// Fixed line-of-sight angle of the hilly terrain specular tap
    pub fn hilly_los_angle() -> f64 {
        0.7f64.acos()
    }

    /// Build the parameter set for this model
    ///
    /// Hilly terrain fixes its own line-of-sight angle, so a user angle is rejected.
    pub fn channel_params(self, doppler_frequency: f64, los_angle: Option<f64>) -> SimResult<ChannelParams> {
        let (delays_us, powers_db): (&[f64], &[f64]) = match self {
            Self::TypicalUrban => (&TU_DELAYS_US, &TU_POWERS_DB),
            Self::RuralArea => (&RA_DELAYS_US, &RA_POWERS_DB),
            Self::HillyTerrain => (&HT_DELAYS_US, &HT_POWERS_DB),
        };

        let delays = delays_us.iter().map(|d| d * 1e-6).collect();
        let mut rice_factors = vec![0.0; delays_us.len()];
        if self == Self::HillyTerrain {
            rice_factors[0] = f64::INFINITY;
        }

        let params = ChannelParams::new(delays, db_to_linear(powers_db), rice_factors)?
            .with_doppler_frequency(doppler_frequency)?;

        match (self, los_angle) {
            (Self::HillyTerrain, Some(_)) => Err(SimError::config(
                "hilly terrain fixes its line of sight angle, a custom angle is not supported",
            )),
            (Self::HillyTerrain, None) => params.with_los_angle(Self::hilly_los_angle()),
            (_, Some(angle)) => params.with_los_angle(angle),
            (_, None) => Ok(params),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TdlModel {
    A,
    B,
    C,
    D,
    E,
}

const TDL_A_DELAYS: [f64; 23] = [
    0.0000, 0.3819, 0.4025, 0.5868, 0.4610, 0.5375, 0.6708, 0.5750, 0.7618, 1.5375, 1.8978, 2.2242,
    2.1718, 2.4942, 2.5119, 3.0582, 4.0810, 4.4579, 4.5695, 4.7966, 5.0066, 5.3043, 9.6586,
];
const TDL_A_POWERS_DB: [f64; 23] = [
    -13.4, 0.0, -2.2, -4.0, -6.0, -8.2, -9.9, -10.5, -7.5, -15.9, -6.6, -16.7, -12.4, -15.2, -10.8,
    -11.3, -12.7, -16.2, -18.3, -18.9, -16.6, -19.9, -29.7,
];

const TDL_B_DELAYS: [f64; 23] = [
    0.0000, 0.1072, 0.2155, 0.2095, 0.2870, 0.2986, 0.3752, 0.5055, 0.3681, 0.3697, 0.5700, 0.5283,
    1.1021, 1.2756, 1.5474, 1.7842, 2.0169, 2.8294, 3.0219, 3.6187, 4.1067, 4.2790, 4.7834,
];
const TDL_B_POWERS_DB: [f64; 23] = [
    0.0, -2.2, -4.0, -3.2, -9.8, -1.2, -3.4, -5.2, -7.6, -3.0, -8.9, -9.0, -4.8, -5.7, -7.5, -1.9,
    -7.6, -12.2, -9.8, -11.4, -14.9, -9.2, -11.3,
];

const TDL_C_DELAYS: [f64; 24] = [
    0.0, 0.2099, 0.2219, 0.2329, 0.2176, 0.6366, 0.6448, 0.6560, 0.6584, 0.7935, 0.8213, 0.9336,
    1.2285, 1.3083, 2.1704, 2.7105, 4.2589, 4.6003, 5.4902, 5.6077, 6.3065, 6.6374, 7.0427, 8.6523,
];
const TDL_C_POWERS_DB: [f64; 24] = [
    -4.4, -1.2, -3.5, -5.2, -2.5, 0.0, -2.2, -3.9, -7.4, -7.1, -10.7, -11.1, -5.1, -6.8, -8.7,
    -13.2, -13.9, -13.9, -15.8, -17.1, -16.0, -15.7, -21.6, -22.8,
];

// The first entry of D and E is the specular component of the first tap
const TDL_D_DELAYS: [f64; 14] = [
    0.0, 0.0, 0.035, 0.612, 1.363, 1.405, 1.804, 2.596, 1.775, 4.042, 7.937, 9.424, 9.708, 12.525,
];
const TDL_D_POWERS_DB: [f64; 14] = [
    -0.2, -13.5, -18.8, -21.0, -22.8, -17.9, -20.1, -21.9, -22.9, -27.8, -23.6, -24.8, -30.0, -27.7,
];

const TDL_E_DELAYS: [f64; 15] = [
    0.0, 0.0, 0.5133, 0.5440, 0.5630, 0.5440, 0.7112, 1.9092, 1.9293, 1.9589, 2.6426, 3.7136,
    5.4524, 12.0034, 20.6519,
];
const TDL_E_POWERS_DB: [f64; 15] = [
    -0.03, -22.03, -15.8, -18.1, -19.8, -22.9, -22.4, -18.6, -20.8, -22.6, -22.3, -25.6, -20.2,
    -29.8, -29.2,
];

impl TdlModel {
    pub const ALL: [TdlModel; 5] = [Self::A, Self::B, Self::C, Self::D, Self::E];

    /// Whether the model carries a specular first tap
    pub fn has_line_of_sight(self) -> bool {
        matches!(self, Self::D | Self::E)
    }

    /// Build the parameter set for this model
    ///
    /// # Arguments
    /// * `rms_delay` - Delay spread scaling the normalized delays, non-negative
    /// * `doppler_frequency` - Scattered Doppler frequency
    /// * `los_doppler_frequency` - Specular Doppler override, rejected by D and E
    pub fn channel_params(
        self,
        rms_delay: f64,
        doppler_frequency: f64,
        los_doppler_frequency: Option<f64>,
    ) -> SimResult<ChannelParams> {
        if !(rms_delay >= 0.0) || !rms_delay.is_finite() {
            return Err(SimError::config("rms delay spread must be non-negative"));
        }
        if self.has_line_of_sight() && los_doppler_frequency.is_some() {
            return Err(SimError::config(
                "TDL-D and TDL-E derive the line of sight doppler, an override is not supported",
            ));
        }

        let (normalized, powers_db): (&[f64], &[f64]) = match self {
            Self::A => (&TDL_A_DELAYS, &TDL_A_POWERS_DB),
            Self::B => (&TDL_B_DELAYS, &TDL_B_POWERS_DB),
            Self::C => (&TDL_C_DELAYS, &TDL_C_POWERS_DB),
            Self::D => (&TDL_D_DELAYS, &TDL_D_POWERS_DB),
            Self::E => (&TDL_E_DELAYS, &TDL_E_POWERS_DB),
        };

        let delays = normalized.iter().map(|d| d * rms_delay).collect();
        let mut rice_factors = vec![0.0; normalized.len()];
        if self.has_line_of_sight() {
            rice_factors[0] = f64::INFINITY;
        }

        let params = ChannelParams::new(delays, db_to_linear(powers_db), rice_factors)?
            .with_doppler_frequency(doppler_frequency)?;
        match los_doppler_frequency {
            Some(los_doppler) => params.with_los_doppler_frequency(los_doppler),
            None => Ok(params),
        }
    }
}
