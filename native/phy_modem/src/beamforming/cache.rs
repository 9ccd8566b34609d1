//! Bounded least-recently-used codebook cache

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use ndarray::Array2;
use num_complex::Complex64;
use tracing::trace;

/// Default number of codebooks kept per beamformer
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Identity of a codebook: carrier, angle set and array geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodebookKey {
    frequency_bits: u64,
    angles_hash: u64,
    array_fingerprint: u64,
}

impl CodebookKey {
    pub fn new(carrier_frequency: f64, angles: &[[f64; 2]], array_fingerprint: u64) -> Self {
        let mut hasher = DefaultHasher::new();
        angles.len().hash(&mut hasher);
        for angle in angles.iter().flatten() {
            angle.to_bits().hash(&mut hasher);
        }
        Self {
            frequency_bits: carrier_frequency.to_bits(),
            angles_hash: hasher.finish(),
            array_fingerprint,
        }
    }
}

/// Most recently used entries live at the front
#[derive(Debug, Clone)]
pub struct CodebookCache {
    capacity: usize,
    entries: VecDeque<(CodebookKey, Array2<Complex64>)>,
}

impl CodebookCache {
    /// A capacity of zero disables caching
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Look up a codebook, marking it as most recently used
    pub fn get(&mut self, key: &CodebookKey) -> Option<&Array2<Complex64>> {
        let position = self.entries.iter().position(|(k, _)| k == key)?;
        if position != 0 {
            let entry = self.entries.remove(position)?;
            self.entries.push_front(entry);
        }
        trace!(position, "codebook cache hit");
        self.entries.front().map(|(_, book)| book)
    }

    /// Insert a codebook, evicting the least recently used entry when full
    pub fn insert(&mut self, key: CodebookKey, codebook: Array2<Complex64>) {
        if self.capacity == 0 {
            return;
        }
        self.entries.retain(|(k, _)| *k != key);
        if self.entries.len() >= self.capacity {
            self.entries.pop_back();
            trace!(capacity = self.capacity, "codebook cache eviction");
        }
        self.entries.push_front((key, codebook));
    }
}

impl Default for CodebookCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
