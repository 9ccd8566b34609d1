//! Pilot symbol sequences filling the frame preamble

use ndarray::Array1;
use num_complex::Complex64;
use sim_core::{SimError, SimResult};

pub trait PilotSequence: Send + Sync + std::fmt::Debug {
    /// The base sequence of pilot symbols
    fn sequence(&self) -> &[Complex64];

    /// Whether the base sequence may be repeated to fill longer requests
    fn allow_repetition(&self) -> bool {
        true
    }

    /// Draw `num_symbols` pilots, cyclically repeating the base sequence
    fn pilots(&self, num_symbols: usize) -> SimResult<Array1<Complex64>> {
        let sequence = self.sequence();
        if num_symbols == 0 {
            return Ok(Array1::zeros(0));
        }
        if sequence.is_empty() {
            return Err(SimError::state("pilot sequence is empty"));
        }
        if num_symbols > sequence.len() && !self.allow_repetition() {
            return Err(SimError::state(format!(
                "{} pilots requested from a non-repeating sequence of {}",
                num_symbols,
                sequence.len()
            )));
        }
        Ok((0..num_symbols).map(|k| sequence[k % sequence.len()]).collect())
    }
}

/// Every pilot is the same symbol
#[derive(Debug, Clone, PartialEq)]
pub struct UniformPilotSequence {
    symbol: [Complex64; 1],
}

impl UniformPilotSequence {
    pub fn new(symbol: Complex64) -> Self {
        Self { symbol: [symbol] }
    }
}

impl Default for UniformPilotSequence {
    fn default() -> Self {
        Self::new(Complex64::new(1.0, 0.0))
    }
}

impl PilotSequence for UniformPilotSequence {
    fn sequence(&self) -> &[Complex64] {
        &self.symbol
    }
}

/// User-provided pilot symbols
#[derive(Debug, Clone, PartialEq)]
pub struct CustomPilotSequence {
    symbols: Vec<Complex64>,
    allow_repetition: bool,
}

impl CustomPilotSequence {
    pub fn new(symbols: Vec<Complex64>, allow_repetition: bool) -> SimResult<Self> {
        if symbols.is_empty() {
            return Err(SimError::config("custom pilot sequence requires at least one symbol"));
        }
        Ok(Self { symbols, allow_repetition })
    }
}

impl PilotSequence for CustomPilotSequence {
    fn sequence(&self) -> &[Complex64] {
        &self.symbols
    }

    fn allow_repetition(&self) -> bool {
        self.allow_repetition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_pilots() {
        let pilots = UniformPilotSequence::new(Complex64::new(0.0, 1.0)).pilots(5).unwrap();
        assert_eq!(pilots.len(), 5);
        assert!(pilots.iter().all(|p| *p == Complex64::new(0.0, 1.0)));
    }

    #[test]
    fn test_custom_pilots_repeat_cyclically() {
        let symbols = vec![Complex64::new(1.0, 0.0), Complex64::new(-1.0, 0.0)];
        let sequence = CustomPilotSequence::new(symbols.clone(), true).unwrap();
        let pilots = sequence.pilots(5).unwrap();
        assert_eq!(pilots[4], symbols[0]);
        assert_eq!(pilots[3], symbols[1]);
    }

    #[test]
    fn test_disallowed_repetition_is_state_error() {
        let sequence = CustomPilotSequence::new(vec![Complex64::new(1.0, 0.0); 3], false).unwrap();
        assert!(sequence.pilots(3).is_ok());
        assert!(matches!(sequence.pilots(4), Err(SimError::State(_))));
    }

    #[test]
    fn test_empty_custom_sequence_rejected() {
        assert!(matches!(CustomPilotSequence::new(vec![], true), Err(SimError::Configuration(_))));
    }
}
