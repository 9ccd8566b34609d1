//! Symbol-level precoding
//!
//! Precoders transform stream-by-symbol matrices on the transmit side
//! (`encode`) and undo the channel or combine streams on the receive side
//! (`decode`). A [`SymbolPrecoding`] chain encodes in insertion order and
//! decodes in reverse.

mod mrc;
mod zero_forcing;

pub use mrc::MaximumRatioCombining;
pub use zero_forcing::ZeroForcingEqualizer;

use ndarray::{Array2, Array3};
use num_complex::Complex64;
use sim_core::{SimError, SimResult};
use tracing::trace;

/// Symbols together with the channel they experienced and their noise
#[derive(Debug, Clone, PartialEq)]
pub struct StatedSymbols {
    /// Shape `(num_streams, num_symbols)`
    pub symbols: Array2<Complex64>,
    /// Shape `(num_rx, num_tx, num_symbols)`
    pub responses: Array3<Complex64>,
    /// Noise variance per stream and symbol
    pub noise: Array2<f64>,
}

impl StatedSymbols {
    /// Check the three tensors agree on streams and symbol count
    pub fn new(
        symbols: Array2<Complex64>,
        responses: Array3<Complex64>,
        noise: Array2<f64>,
    ) -> SimResult<Self> {
        let (num_streams, num_symbols) = symbols.dim();
        if responses.shape()[0] != num_streams {
            return Err(SimError::validation("response receive streams", num_streams, responses.shape()[0]));
        }
        if responses.shape()[2] != num_symbols {
            return Err(SimError::validation("response symbols", num_symbols, responses.shape()[2]));
        }
        if noise.dim() != (num_streams, num_symbols) {
            return Err(SimError::validation("noise entries", num_streams * num_symbols, noise.len()));
        }

        Ok(Self {
            symbols,
            responses,
            noise,
        })
    }

    pub fn num_streams(&self) -> usize {
        self.symbols.nrows()
    }

    pub fn num_symbols(&self) -> usize {
        self.symbols.ncols()
    }

    pub fn num_transmit_streams(&self) -> usize {
        self.responses.shape()[1]
    }
}

/// One stage of a precoding chain
pub trait SymbolPrecoder: Send + std::fmt::Debug {
    /// Transmit-side transformation of `(streams, symbols)`
    fn encode(&self, symbols: Array2<Complex64>) -> SimResult<Array2<Complex64>>;

    /// Receive-side transformation
    fn decode(&self, symbols: StatedSymbols) -> SimResult<StatedSymbols>;
}

/// Ordered chain of symbol precoders
#[derive(Debug, Default)]
pub struct SymbolPrecoding {
    precoders: Vec<Box<dyn SymbolPrecoder>>,
}

impl SymbolPrecoding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, precoder: Box<dyn SymbolPrecoder>) {
        self.precoders.push(precoder);
    }

    pub fn len(&self) -> usize {
        self.precoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precoders.is_empty()
    }

    pub fn encode(&self, symbols: Array2<Complex64>) -> SimResult<Array2<Complex64>> {
        self.precoders
            .iter()
            .try_fold(symbols, |symbols, precoder| precoder.encode(symbols))
    }

    pub fn decode(&self, symbols: StatedSymbols) -> SimResult<StatedSymbols> {
        let decoded = self
            .precoders
            .iter()
            .rev()
            .try_fold(symbols, |symbols, precoder| precoder.decode(symbols))?;
        trace!(
            stages = self.precoders.len(),
            streams = decoded.num_streams(),
            "decoded symbol precoding"
        );
        Ok(decoded)
    }
}
