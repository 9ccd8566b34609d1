//! Square Gray-coded QAM constellation
//!
//! The upper half of the index bits select the in-phase level, the lower
//! half the quadrature level; each axis is a Gray-coded PAM alphabet.

use num_complex::Complex64;
use sim_core::{SimError, SimResult};

use super::{gray_decode, gray_encode};
use crate::traits::Constellation;

/// Square QAM of order 16, 64 or 256
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qam {
    order: usize,
}

impl Qam {
    pub fn new(order: usize) -> SimResult<Self> {
        match order {
            16 | 64 | 256 => Ok(Self { order }),
            other => Err(SimError::config(format!(
                "square QAM supports orders 16, 64 and 256, not {}",
                other
            ))),
        }
    }

    fn side(&self) -> usize {
        1 << (self.order.trailing_zeros() / 2)
    }

    fn axis_bits(&self) -> usize {
        self.order.trailing_zeros() as usize / 2
    }

    /// Scale giving unit mean symbol energy
    fn norm(&self) -> f64 {
        (2.0 * (self.order as f64 - 1.0) / 3.0).sqrt()
    }

    fn level(&self, code: usize) -> f64 {
        let position = gray_decode(code) as f64;
        (2.0 * position - (self.side() as f64 - 1.0)) / self.norm()
    }

    fn slice(&self, value: f64) -> usize {
        let side = self.side() as f64;
        let position = ((value * self.norm() + side - 1.0) / 2.0).round().clamp(0.0, side - 1.0);
        gray_encode(position as usize)
    }
}

impl Constellation for Qam {
    fn order(&self) -> usize {
        self.order
    }

    fn point(&self, index: usize) -> Complex64 {
        let index = index & (self.order - 1);
        let mask = self.side() - 1;
        let i_code = (index >> self.axis_bits()) & mask;
        let q_code = index & mask;
        Complex64::new(self.level(i_code), self.level(q_code))
    }

    fn decide(&self, symbol: Complex64) -> usize {
        (self.slice(symbol.re) << self.axis_bits()) | self.slice(symbol.im)
    }
}
