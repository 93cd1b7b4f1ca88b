//! Bitset-backed column selection
//!
//! Used to restrict scanned columns, to pick the columns compared by
//! `jump`, and to detect whether an update touches indexed columns.
//! The legacy byte form packs column `i` into bit `i % 8` of byte `i / 8`.

use std::fmt;

/// Predicate over column positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ColumnSelector {
    words: Vec<u64>,
}

impl ColumnSelector {
    /// An empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects columns `0..n`
    pub fn all(n: usize) -> Self {
        Self::from_positions(0..n)
    }

    /// Selects the given positions
    pub fn from_positions(positions: impl IntoIterator<Item = usize>) -> Self {
        let mut selector = Self::new();
        for position in positions {
            selector.insert(position);
        }
        selector
    }

    /// Adds a column to the selection
    pub fn insert(&mut self, position: usize) {
        let word = position / 64;
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (position % 64);
    }

    /// True if `position` is selected
    pub fn includes(&self, position: usize) -> bool {
        self.words
            .get(position / 64)
            .is_some_and(|w| w & (1u64 << (position % 64)) != 0)
    }

    /// Selected positions, ascending
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, word)| {
            (0..64)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| i * 64 + bit)
        })
    }

    /// Number of selected columns
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True if nothing is selected
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// If the selection is exactly `0..m`, returns `m`
    pub fn prefix_len(&self) -> Option<usize> {
        let count = self.count();
        if (0..count).all(|p| self.includes(p)) {
            Some(count)
        } else {
            None
        }
    }

    /// Packs into the legacy byte bitmap
    pub fn pack_to_legacy(&self) -> Vec<u8> {
        let Some(max) = self.positions().last() else {
            return Vec::new();
        };
        let mut bytes = vec![0u8; max / 8 + 1];
        for position in self.positions() {
            bytes[position / 8] |= 1 << (position % 8);
        }
        bytes
    }

    /// Unpacks the legacy byte bitmap
    pub fn unpack_from_legacy(bytes: &[u8]) -> Self {
        let mut selector = Self::new();
        for (i, byte) in bytes.iter().enumerate() {
            for bit in 0..8 {
                if byte & (1 << bit) != 0 {
                    selector.insert(i * 8 + bit);
                }
            }
        }
        selector
    }
}

impl fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let positions: Vec<String> = self.positions().map(|p| p.to_string()).collect();
        write!(f, "[{}]", positions.join(", "))
    }
}
