//! Radar cube produced by sensing receptions

use ndarray::{Array1, Array3, Axis};
use sim_core::{SimError, SimResult};

/// Power over angle, velocity and range bins
#[derive(Debug, Clone, PartialEq)]
pub struct RadarCube {
    /// Shape `(angles, velocities, ranges)`
    pub data: Array3<f64>,
    pub angle_bins: Array1<f64>,
    pub velocity_bins: Array1<f64>,
    /// Range of each bin in meters
    pub range_bins: Array1<f64>,
}

impl RadarCube {
    pub fn new(
        data: Array3<f64>,
        angle_bins: Array1<f64>,
        velocity_bins: Array1<f64>,
        range_bins: Array1<f64>,
    ) -> SimResult<Self> {
        let (angles, velocities, ranges) = data.dim();
        if angle_bins.len() != angles {
            return Err(SimError::validation("radar cube angle bins", angles, angle_bins.len()));
        }
        if velocity_bins.len() != velocities {
            return Err(SimError::validation("radar cube velocity bins", velocities, velocity_bins.len()));
        }
        if range_bins.len() != ranges {
            return Err(SimError::validation("radar cube range bins", ranges, range_bins.len()));
        }

        Ok(Self {
            data,
            angle_bins,
            velocity_bins,
            range_bins,
        })
    }

    /// Power per range bin, summed over angles and velocities
    pub fn range_profile(&self) -> Array1<f64> {
        self.data.sum_axis(Axis(0)).sum_axis(Axis(0))
    }

    /// Range of the strongest bin, `None` for an empty cube
    pub fn peak_range(&self) -> Option<f64> {
        let profile = self.range_profile();
        let (index, _) = profile
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (k, &p)| match best {
                Some((_, q)) if q >= p => best,
                _ => Some((k, p)),
            })?;
        self.range_bins.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_range() {
        let data = Array3::from_shape_vec((1, 1, 4), vec![0.1, 0.3, 0.9, 0.2]).unwrap();
        let cube = RadarCube::new(
            data,
            Array1::zeros(1),
            Array1::zeros(1),
            Array1::from(vec![0.0, 10.0, 20.0, 30.0]),
        )
        .unwrap();
        assert_eq!(cube.peak_range(), Some(20.0));
        assert_eq!(cube.range_profile().len(), 4);
    }

    #[test]
    fn test_bin_mismatch_rejected() {
        let result = RadarCube::new(Array3::zeros((1, 1, 3)), Array1::zeros(1), Array1::zeros(1), Array1::zeros(2));
        assert!(matches!(result, Err(SimError::Validation { expected: 3, actual: 2, .. })));
    }
}
