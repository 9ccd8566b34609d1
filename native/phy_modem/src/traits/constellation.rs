//! Constellation trait - bit index ↔ complex symbol mapping
//!
//! Defines how symbol indices map to complex baseband points.
//! This trait knows nothing about framing, pilots or precoding.

use num_complex::Complex64;

/// Symbol alphabet mapping trait
///
/// Implementations define the geometry of the constellation diagram and are
/// shared by the mapper (index → point) and the slicer (point → index).
pub trait Constellation: Send + Sync + std::fmt::Debug {
    /// Number of points in the constellation (2 for BPSK, 4 for QPSK, etc.)
    fn order(&self) -> usize;

    /// Bits per symbol (log2 of order)
    fn bits_per_symbol(&self) -> usize {
        self.order().trailing_zeros() as usize
    }

    /// Complex point of a symbol index, normalized to unit mean energy
    ///
    /// Index bits beyond `bits_per_symbol` are ignored.
    fn point(&self, index: usize) -> Complex64;

    /// Hard decision: index of the nearest constellation point
    fn decide(&self, symbol: Complex64) -> usize {
        let mut best_index = 0;
        let mut best_dist = f64::MAX;

        for index in 0..self.order() {
            let dist = (symbol - self.point(index)).norm_sqr();
            if dist < best_dist {
                best_dist = dist;
                best_index = index;
            }
        }

        best_index
    }
}
