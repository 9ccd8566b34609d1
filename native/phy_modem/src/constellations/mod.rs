//! Constellation implementations
//!
//! Gray-coded alphabets normalized to unit mean symbol energy:
//! - PSK of order 2, 4 and 8
//! - square QAM of order 16, 64 and 256

mod psk;
mod qam;

pub use psk::Psk;
pub use qam::Qam;

use num_complex::Complex64;
use sim_core::{SimError, SimResult};

use crate::traits::Constellation;

/// Binary reflected Gray code of `value`
pub(crate) fn gray_encode(value: usize) -> usize {
    value ^ (value >> 1)
}

/// Inverse of [`gray_encode`]
pub(crate) fn gray_decode(mut code: usize) -> usize {
    let mut value = code;
    while code > 1 {
        code >>= 1;
        value ^= code;
    }
    value
}

/// Constellation selected by modulation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    Psk(Psk),
    Qam(Qam),
}

impl Modulation {
    /// Pick the alphabet for a modulation order
    ///
    /// Orders 2, 4 and 8 are PSK, 16, 64 and 256 square QAM. Every other
    /// order is a configuration error.
    pub fn for_order(order: usize) -> SimResult<Self> {
        if order < 2 || !order.is_power_of_two() {
            return Err(SimError::config(format!(
                "modulation order must be a positive power of two, got {}",
                order
            )));
        }

        match order {
            2 | 4 | 8 => Ok(Self::Psk(Psk::new(order)?)),
            16 | 64 | 256 => Ok(Self::Qam(Qam::new(order)?)),
            other => Err(SimError::config(format!(
                "modulation order {} has no supported constellation",
                other
            ))),
        }
    }
}

impl Constellation for Modulation {
    fn order(&self) -> usize {
        match self {
            Self::Psk(psk) => psk.order(),
            Self::Qam(qam) => qam.order(),
        }
    }

    fn point(&self, index: usize) -> Complex64 {
        match self {
            Self::Psk(psk) => psk.point(index),
            Self::Qam(qam) => qam.point(index),
        }
    }

    fn decide(&self, symbol: Complex64) -> usize {
        match self {
            Self::Psk(psk) => psk.decide(symbol),
            Self::Qam(qam) => qam.decide(symbol),
        }
    }
}

/// Map bits to symbols, most significant bit first
///
/// A trailing incomplete symbol is zero-padded.
pub fn map_bits<C: Constellation + ?Sized>(constellation: &C, bits: &[u8]) -> Vec<Complex64> {
    let bps = constellation.bits_per_symbol();
    bits.chunks(bps)
        .map(|chunk| {
            let index = (0..bps).fold(0usize, |acc, b| {
                let bit = chunk.get(b).copied().unwrap_or(0) & 1;
                (acc << 1) | bit as usize
            });
            constellation.point(index)
        })
        .collect()
}

/// Hard-decide symbols and expand their indices into bits, most significant bit first
pub fn unmap_symbols<C: Constellation + ?Sized>(
    constellation: &C,
    symbols: impl IntoIterator<Item = Complex64>,
) -> Vec<u8> {
    let bps = constellation.bits_per_symbol();
    let mut bits = Vec::new();
    for symbol in symbols {
        let index = constellation.decide(symbol);
        for b in (0..bps).rev() {
            bits.push(((index >> b) & 1) as u8);
        }
    }
    bits
}
