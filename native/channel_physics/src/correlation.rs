//! Antenna correlation models
//!
//! Correlation is applied as a Kronecker model: the uncorrelated per-path
//! response `H` of an alpha-to-beta link becomes `L_β · H · L_αᵀ`, where `L`
//! is the lower Cholesky factor of the respective covariance matrix.

use nalgebra::DMatrix;
use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use sim_core::{SimError, SimResult};

/// Source of an antenna covariance matrix for one side of a link
pub trait AntennaCorrelation: std::fmt::Debug {
    /// Covariance for a device with `num_antennas` ports
    ///
    /// A model that cannot describe `num_antennas` ports returns a state error.
    fn covariance(&self, num_antennas: usize) -> SimResult<Array2<Complex64>>;
}

/// Lower Cholesky factor of a Hermitian positive definite matrix
pub fn cholesky_factor(covariance: &Array2<Complex64>) -> SimResult<Array2<Complex64>> {
    let (rows, cols) = covariance.dim();
    if rows != cols || rows == 0 {
        return Err(SimError::config(format!(
            "antenna covariance must be a non-empty square matrix, got {}x{}",
            rows, cols
        )));
    }

    let matrix = DMatrix::from_fn(rows, cols, |i, j| covariance[[i, j]]);
    let cholesky = matrix.cholesky().ok_or_else(|| {
        SimError::config("antenna covariance must be positive definite")
    })?;
    let lower = cholesky.l();

    Ok(Array2::from_shape_fn((rows, cols), |(i, j)| lower[(i, j)]))
}

fn is_hermitian(matrix: &Array2<Complex64>) -> bool {
    let n = matrix.nrows();
    (0..n).all(|i| (0..n).all(|j| (matrix[[i, j]] - matrix[[j, i]].conj()).norm() < 1e-10))
}

/// User-provided covariance matrix
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAntennaCorrelation {
    covariance: Array2<Complex64>,
}

impl CustomAntennaCorrelation {
    pub fn new(covariance: Array2<Complex64>) -> SimResult<Self> {
        let mut correlation = Self {
            covariance: Array2::eye(1),
        };
        correlation.set_covariance(covariance)?;
        Ok(correlation)
    }

    /// Replace the covariance after checking it is square, Hermitian and positive definite
    pub fn set_covariance(&mut self, covariance: Array2<Complex64>) -> SimResult<()> {
        let (rows, cols) = covariance.dim();
        if rows != cols {
            return Err(SimError::config(format!(
                "antenna covariance must be square, got {}x{}",
                rows, cols
            )));
        }
        if !is_hermitian(&covariance) {
            return Err(SimError::config("antenna covariance must be Hermitian"));
        }
        cholesky_factor(&covariance)?;

        self.covariance = covariance;
        Ok(())
    }

    pub fn matrix(&self) -> &Array2<Complex64> {
        &self.covariance
    }
}

impl AntennaCorrelation for CustomAntennaCorrelation {
    fn covariance(&self, num_antennas: usize) -> SimResult<Array2<Complex64>> {
        if self.covariance.nrows() != num_antennas {
            return Err(SimError::state(format!(
                "covariance describes {} antennas but the device has {}",
                self.covariance.nrows(),
                num_antennas
            )));
        }
        Ok(self.covariance.clone())
    }
}

/// Correlation levels of 3GPP TS 36.101 Annex B.2.3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationLevel {
    Low,
    Medium,
    High,
}

/// Which end of the link a standard correlation describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    BaseStation,
    Terminal,
}

/// Standardized exponential correlation for 1, 2 or 4 antennas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardAntennaCorrelation {
    pub level: CorrelationLevel,
    pub role: DeviceRole,
}

impl StandardAntennaCorrelation {
    pub fn new(level: CorrelationLevel, role: DeviceRole) -> Self {
        Self { level, role }
    }

    /// Correlation coefficient between the outermost ports
    pub fn coefficient(&self) -> f64 {
        match (self.level, self.role) {
            (CorrelationLevel::Low, _) => 0.0,
            (CorrelationLevel::Medium, DeviceRole::BaseStation) => 0.3,
            (CorrelationLevel::Medium, DeviceRole::Terminal) => 0.9,
            (CorrelationLevel::High, _) => 0.9,
        }
    }
}

impl AntennaCorrelation for StandardAntennaCorrelation {
    fn covariance(&self, num_antennas: usize) -> SimResult<Array2<Complex64>> {
        let a = self.coefficient();
        let exponents: &[f64] = match num_antennas {
            1 => &[0.0],
            2 => &[0.0, 1.0],
            4 => &[0.0, 1.0 / 9.0, 4.0 / 9.0, 1.0],
            n => {
                return Err(SimError::state(format!(
                    "standard antenna correlation is defined for 1, 2 or 4 antennas, not {}",
                    n
                )))
            }
        };

        Ok(Array2::from_shape_fn((num_antennas, num_antennas), |(i, j)| {
            let distance = i.abs_diff(j);
            let value = if distance == 0 { 1.0 } else { a.powf(exponents[distance]) };
            Complex64::new(value, 0.0)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn test_custom_rejects_invalid_matrices() {
        assert!(CustomAntennaCorrelation::new(Array2::zeros((2, 2))).is_err(), "Zero matrix is not PD");
        assert!(CustomAntennaCorrelation::new(Array2::zeros((2, 3))).is_err(), "Non-square rejected");
        let skewed = array![[c(1.0, 0.0), c(0.5, 0.5)], [c(0.5, 0.5), c(1.0, 0.0)]];
        assert!(CustomAntennaCorrelation::new(skewed).is_err(), "Non-Hermitian rejected");
    }

    #[test]
    fn test_custom_size_checked_at_read() {
        let correlation = CustomAntennaCorrelation::new(Array2::eye(2)).unwrap();
        assert!(correlation.covariance(2).is_ok());
        assert!(matches!(correlation.covariance(3), Err(SimError::State(_))));
    }

    #[test]
    fn test_cholesky_reconstructs_covariance() {
        let covariance = array![
            [c(2.0, 0.0), c(0.5, -0.5)],
            [c(0.5, 0.5), c(1.0, 0.0)]
        ];
        let lower = cholesky_factor(&covariance).unwrap();
        let reconstructed = lower.dot(&lower.t().mapv(|x| x.conj()));
        for (a, b) in reconstructed.iter().zip(covariance.iter()) {
            assert!((a - b).norm() < 1e-12, "L·Lᴴ {} differs from {}", a, b);
        }
        assert_eq!(lower[[0, 1]], c(0.0, 0.0), "Factor must be lower triangular");
    }

    #[test]
    fn test_identity_factor_is_exact() {
        let lower = cholesky_factor(&Array2::eye(3)).unwrap();
        assert_eq!(lower, Array2::eye(3));
    }

    #[test]
    fn test_standard_correlation_matrices() {
        let high = StandardAntennaCorrelation::new(CorrelationLevel::High, DeviceRole::Terminal);
        let cov = high.covariance(4).unwrap();
        assert!((cov[[0, 3]].re - 0.9).abs() < 1e-12);
        assert!((cov[[0, 1]].re - 0.9f64.powf(1.0 / 9.0)).abs() < 1e-12);
        assert_eq!(cov[[2, 2]], c(1.0, 0.0));
        assert!(cholesky_factor(&cov).is_ok(), "Standard matrices are positive definite");

        let low = StandardAntennaCorrelation::new(CorrelationLevel::Low, DeviceRole::BaseStation);
        assert_eq!(low.covariance(2).unwrap(), Array2::eye(2));

        assert!(high.covariance(3).is_err());
    }
}
