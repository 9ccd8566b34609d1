//! Gray-coded M-PSK constellation
//!
//! Points sit on the unit circle. BPSK uses ±1, higher orders are rotated by
//! half a sector so QPSK lands on the diagonals.

use num_complex::Complex64;
use sim_core::{SimError, SimResult};
use std::f64::consts::PI;

use super::{gray_decode, gray_encode};
use crate::traits::Constellation;

/// Phase Shift Keying constellation of order 2, 4 or 8
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Psk {
    order: usize,
}

impl Psk {
    pub fn new(order: usize) -> SimResult<Self> {
        match order {
            2 | 4 | 8 => Ok(Self { order }),
            other => Err(SimError::config(format!("PSK supports orders 2, 4 and 8, not {}", other))),
        }
    }

    fn sector(&self) -> f64 {
        2.0 * PI / self.order as f64
    }

    fn rotation(&self) -> f64 {
        if self.order == 2 {
            0.0
        } else {
            self.sector() / 2.0
        }
    }
}

impl Constellation for Psk {
    fn order(&self) -> usize {
        self.order
    }

    fn point(&self, index: usize) -> Complex64 {
        let position = gray_decode(index & (self.order - 1));
        Complex64::from_polar(1.0, position as f64 * self.sector() + self.rotation())
    }

    fn decide(&self, symbol: Complex64) -> usize {
        let angle = (symbol.arg() - self.rotation()).rem_euclid(2.0 * PI);
        // Add half-sector offset for rounding to nearest
        let position = ((angle + self.sector() / 2.0) / self.sector()).floor() as usize % self.order;
        gray_encode(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psk_roundtrip() {
        for order in [2, 4, 8] {
            let psk = Psk::new(order).unwrap();
            for index in 0..order {
                assert_eq!(psk.decide(psk.point(index)), index, "Order {} index {} roundtrip failed", order, index);
            }
        }
    }

    #[test]
    fn test_psk_unit_power() {
        let psk = Psk::new(8).unwrap();
        for index in 0..8 {
            let power = psk.point(index).norm_sqr();
            assert!((power - 1.0).abs() < 1e-10, "Symbol {} power: {}", index, power);
        }
    }

    #[test]
    fn test_psk_gray_neighbours() {
        let psk = Psk::new(8).unwrap();
        let mut by_angle: Vec<usize> = (0..8).collect();
        by_angle.sort_by(|a, b| {
            psk.point(*a).arg().rem_euclid(2.0 * PI).total_cmp(&psk.point(*b).arg().rem_euclid(2.0 * PI))
        });
        for pair in by_angle.windows(2) {
            assert_eq!((pair[0] ^ pair[1]).count_ones(), 1, "Adjacent points {:?} differ in more than one bit", pair);
        }
    }

    #[test]
    fn test_qpsk_on_diagonals() {
        let qpsk = Psk::new(4).unwrap();
        let p = qpsk.point(0);
        assert!((p.re - p.im).abs() < 1e-12);
        assert!(p.re > 0.0);
    }

    #[test]
    fn test_psk_slicer_noise_tolerance() {
        let psk = Psk::new(8).unwrap();
        for index in 0..8 {
            let noisy = psk.point(index) * Complex64::from_polar(0.9, 0.2);
            assert_eq!(psk.decide(noisy), index, "Symbol {} failed with small noise", index);
        }
    }

    #[test]
    fn test_psk_rejects_other_orders() {
        assert!(Psk::new(16).is_err());
        assert!(Psk::new(1).is_err());
    }
}
