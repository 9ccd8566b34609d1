//! Link performance evaluators
//!
//! Evaluators compare the bits of a transmission with the bits of the
//! matching reception. A reception shorter than its transmission is padded
//! with zero bits; transmitted bits missing from a longer reception count as
//! errors.

use sim_core::{SimError, SimResult};

use crate::modem::{ModemReception, ModemTransmission};
use crate::traits::WaveformGenerator;

/// Errors among a number of compared units (bits, blocks or frames)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorEvaluation {
    pub errors: usize,
    pub total: usize,
    /// `errors / total`, zero when nothing was compared
    pub rate: f64,
}

impl ErrorEvaluation {
    fn from_indicators(indicators: impl Iterator<Item = bool>) -> Self {
        let (errors, total) = indicators.fold((0, 0), |(e, t), error| (e + error as usize, t + 1));
        let rate = if total > 0 { errors as f64 / total as f64 } else { 0.0 };
        Self { errors, total, rate }
    }
}

pub trait Evaluator {
    type Output;

    fn evaluate(
        &self,
        transmission: &ModemTransmission,
        reception: &ModemReception,
    ) -> SimResult<Self::Output>;
}

/// Per-bit error indicators over `max(len)` bits, padded up to a multiple of `unit`
fn bit_errors(transmitted: &[u8], received: &[u8], unit: usize) -> Vec<bool> {
    let compared = transmitted.len().max(received.len());
    let padded = compared.div_ceil(unit) * unit;
    (0..padded)
        .map(|n| {
            let rx = received.get(n).copied().unwrap_or(0);
            match transmitted.get(n) {
                Some(&tx) => tx != rx,
                // Nothing was sent here, only padding may match
                None => n < received.len(),
            }
        })
        .collect()
}

fn unit_errors(transmitted: &[u8], received: &[u8], unit: usize) -> ErrorEvaluation {
    let bits = bit_errors(transmitted, received, unit);
    ErrorEvaluation::from_indicators(bits.chunks(unit).map(|chunk| chunk.iter().any(|&e| e)))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitErrorEvaluator;

impl Evaluator for BitErrorEvaluator {
    type Output = ErrorEvaluation;

    fn evaluate(&self, transmission: &ModemTransmission, reception: &ModemReception) -> SimResult<ErrorEvaluation> {
        Ok(ErrorEvaluation::from_indicators(
            bit_errors(&transmission.bits, &reception.bits, 1).into_iter(),
        ))
    }
}

/// A block is erroneous if any of its bits is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockErrorEvaluator {
    block_size: usize,
}

impl BlockErrorEvaluator {
    pub fn new(block_size: usize) -> SimResult<Self> {
        if block_size < 1 {
            return Err(SimError::config("block size must be at least one bit"));
        }
        Ok(Self { block_size })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl Evaluator for BlockErrorEvaluator {
    type Output = ErrorEvaluation;

    fn evaluate(&self, transmission: &ModemTransmission, reception: &ModemReception) -> SimResult<ErrorEvaluation> {
        Ok(unit_errors(&transmission.bits, &reception.bits, self.block_size))
    }
}

/// Blocks of one waveform frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameErrorEvaluator {
    bits_per_frame: usize,
}

impl FrameErrorEvaluator {
    pub fn new(waveform: &dyn WaveformGenerator) -> Self {
        Self {
            bits_per_frame: waveform.bits_per_frame(),
        }
    }
}

impl Evaluator for FrameErrorEvaluator {
    type Output = ErrorEvaluation;

    fn evaluate(&self, transmission: &ModemTransmission, reception: &ModemReception) -> SimResult<ErrorEvaluation> {
        if self.bits_per_frame < 1 {
            return Ok(ErrorEvaluation::from_indicators(std::iter::empty()));
        }
        Ok(unit_errors(&transmission.bits, &reception.bits, self.bits_per_frame))
    }
}

/// Correctly received data bits per second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputEvaluator {
    frames: FrameErrorEvaluator,
    frame_duration: f64,
}

impl ThroughputEvaluator {
    pub fn new(waveform: &dyn WaveformGenerator) -> Self {
        Self {
            frames: FrameErrorEvaluator::new(waveform),
            frame_duration: waveform.frame_duration(),
        }
    }
}

impl Evaluator for ThroughputEvaluator {
    type Output = f64;

    fn evaluate(&self, transmission: &ModemTransmission, reception: &ModemReception) -> SimResult<f64> {
        let frames = self.frames.evaluate(transmission, reception)?;
        if frames.total == 0 || !(self.frame_duration > 0.0) {
            return Ok(0.0);
        }
        let correct = (frames.total - frames.errors) as f64;
        Ok(correct * self.frames.bits_per_frame as f64 / (frames.total as f64 * self.frame_duration))
    }
}
