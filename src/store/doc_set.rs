//! Immutable document sets.
//!
//! A [`DocSet`] is the base set every facet count is relative to. It is backed
//! by a compressed bitmap so that membership tests stay cheap while the
//! enumeration counter probes postings against it.

use std::fmt;

use roaring::RoaringBitmap;

use crate::error::{FacetryError, Result};

/// An immutable, finite set of document ordinals.
#[derive(Clone, Default, PartialEq)]
pub struct DocSet {
    bits: RoaringBitmap,
}

impl DocSet {
    /// Create an empty set.
    pub fn new() -> Self {
        DocSet {
            bits: RoaringBitmap::new(),
        }
    }

    /// Create a set holding every ordinal in `0..max_doc`.
    pub fn full(max_doc: u32) -> Self {
        let mut bits = RoaringBitmap::new();
        bits.insert_range(0..max_doc);
        DocSet { bits }
    }

    /// Create a set from strictly ascending ordinals.
    pub fn from_sorted_iter<I: IntoIterator<Item = u32>>(docs: I) -> Result<Self> {
        RoaringBitmap::from_sorted_iter(docs)
            .map(|bits| DocSet { bits })
            .map_err(|e| FacetryError::invalid_argument(format!("unsorted document ordinals: {e}")))
    }

    /// Create a set from a bitmap.
    pub fn from_bitmap(bits: RoaringBitmap) -> Self {
        DocSet { bits }
    }

    /// Check whether the document belongs to the set.
    pub fn contains(&self, doc: u32) -> bool {
        self.bits.contains(doc)
    }

    /// Number of documents in the set.
    pub fn len(&self) -> u64 {
        self.bits.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Iterate over the documents in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.bits.iter()
    }

    /// `|self ∩ other|`
    pub fn intersection_len(&self, other: &DocSet) -> u64 {
        self.bits.intersection_len(&other.bits)
    }

    /// `|self| - |self ∩ other|`
    pub fn diff_len(&self, other: &DocSet) -> u64 {
        self.len() - self.intersection_len(other)
    }

    /// Extract the documents in `base..base + max_doc`, renumbered so that
    /// `base` becomes ordinal 0.
    pub fn slice(&self, base: u32, max_doc: u32) -> DocSet {
        let start = base;
        let end = base.saturating_add(max_doc);
        if start >= end {
            return DocSet::new();
        }
        let mut window = RoaringBitmap::new();
        window.insert_range(start..end);
        window &= &self.bits;

        DocSet {
            bits: window.iter().map(|doc| doc - start).collect(),
        }
    }

    /// Borrow the underlying bitmap.
    pub fn as_bitmap(&self) -> &RoaringBitmap {
        &self.bits
    }
}

impl FromIterator<u32> for DocSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        DocSet {
            bits: iter.into_iter().collect(),
        }
    }
}

impl From<RoaringBitmap> for DocSet {
    fn from(bits: RoaringBitmap) -> Self {
        DocSet { bits }
    }
}

impl fmt::Debug for DocSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocSet").field("len", &self.len()).finish()
    }
}
