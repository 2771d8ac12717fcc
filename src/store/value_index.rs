//! Per-document ordinals for single-valued fields.
//!
//! A [`ValueIndex`] maps every document of a segment to the ordinal of its
//! value in the field's sorted dictionary. Ordinals are dense in
//! `0..num_ordinals()` and follow the byte order of the values, so counting
//! by ordinal and then walking the counts in order yields values in
//! dictionary order.

use std::ops::Range;

use crate::error::{FacetryError, Result};

/// Packed per-document ordinals.
///
/// Each slot stores `ordinal + 1`, with `0` reserved for documents that have
/// no value. The narrowest width able to hold `num_ordinals + 1` is picked
/// once at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrdinalArray {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl OrdinalArray {
    /// Pack `slots` (already shifted by one) using the narrowest width for
    /// `num_ordinals` distinct values.
    pub fn pack(slots: Vec<u32>, num_ordinals: u32) -> Self {
        let max_slot = num_ordinals as u64;
        if max_slot <= u8::MAX as u64 {
            OrdinalArray::U8(slots.into_iter().map(|s| s as u8).collect())
        } else if max_slot <= u16::MAX as u64 {
            OrdinalArray::U16(slots.into_iter().map(|s| s as u16).collect())
        } else {
            OrdinalArray::U32(slots)
        }
    }

    /// Raw slot for a document (`0` = no value).
    pub fn get(&self, doc: u32) -> u32 {
        let doc = doc as usize;
        match self {
            OrdinalArray::U8(slots) => slots.get(doc).map_or(0, |&s| s as u32),
            OrdinalArray::U16(slots) => slots.get(doc).map_or(0, |&s| s as u32),
            OrdinalArray::U32(slots) => slots.get(doc).copied().unwrap_or(0),
        }
    }

    /// Number of documents covered.
    pub fn len(&self) -> usize {
        match self {
            OrdinalArray::U8(slots) => slots.len(),
            OrdinalArray::U16(slots) => slots.len(),
            OrdinalArray::U32(slots) => slots.len(),
        }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Width in bits of a single slot.
    pub fn bits_per_doc(&self) -> u32 {
        match self {
            OrdinalArray::U8(_) => 8,
            OrdinalArray::U16(_) => 16,
            OrdinalArray::U32(_) => 32,
        }
    }
}

/// A dictionary value with its ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueEntry<'a> {
    pub value: &'a [u8],
    pub ordinal: u32,
}

/// Sorted value dictionary plus per-document ordinals of one field.
#[derive(Debug, Clone)]
pub struct ValueIndex {
    /// Distinct values in ascending byte order.
    values: Vec<Vec<u8>>,
    /// Per-document slots.
    ordinals: OrdinalArray,
}

impl ValueIndex {
    /// Build a value index over `max_doc` documents from `(doc, value)` pairs.
    ///
    /// Fails if a document appears twice, since the index only models
    /// single-valued fields.
    pub fn from_doc_values<I, V>(max_doc: u32, doc_values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, V)>,
        V: Into<Vec<u8>>,
    {
        let mut pairs: Vec<(u32, Vec<u8>)> = doc_values
            .into_iter()
            .map(|(doc, value)| (doc, value.into()))
            .collect();

        let mut values: Vec<Vec<u8>> = pairs.iter().map(|(_, v)| v.clone()).collect();
        values.sort_unstable();
        values.dedup();

        let mut slots = vec![0u32; max_doc as usize];
        pairs.sort_unstable_by_key(|(doc, _)| *doc);
        for (doc, value) in pairs {
            let slot = slots.get_mut(doc as usize).ok_or_else(|| {
                FacetryError::invalid_argument(format!(
                    "document {doc} is outside of 0..{max_doc}"
                ))
            })?;
            if *slot != 0 {
                return Err(FacetryError::invalid_argument(format!(
                    "document {doc} has more than one value"
                )));
            }
            // Every value came from `values`, the search cannot miss.
            let ord = values.binary_search(&value).unwrap_or_else(|ins| ins);
            *slot = ord as u32 + 1;
        }

        let num_ordinals = values.len() as u32;
        Ok(ValueIndex {
            values,
            ordinals: OrdinalArray::pack(slots, num_ordinals),
        })
    }

    /// Ordinal of the document's value, `None` if it has no value.
    pub fn ordinal(&self, doc: u32) -> Option<u32> {
        match self.ordinals.get(doc) {
            0 => None,
            slot => Some(slot - 1),
        }
    }

    /// Value bytes for an ordinal, `None` past the end of the dictionary.
    pub fn lookup(&self, ordinal: u32) -> Option<&[u8]> {
        self.values.get(ordinal as usize).map(Vec::as_slice)
    }

    /// Dictionary entries of an ordinal range, in order. The range is
    /// clamped to the dictionary.
    pub fn entries(&self, range: Range<u32>) -> impl Iterator<Item = ValueEntry<'_>> + '_ {
        let end = range.end.min(self.num_ordinals());
        let start = range.start.min(end);
        self.values[start as usize..end as usize]
            .iter()
            .zip(start..end)
            .map(|(value, ordinal)| ValueEntry { value, ordinal })
    }

    /// Number of distinct values.
    pub fn num_ordinals(&self) -> u32 {
        self.values.len() as u32
    }

    /// Number of documents covered.
    pub fn max_doc(&self) -> u32 {
        self.ordinals.len() as u32
    }

    /// `Ok(ordinal)` on an exact match, `Err(insertion_point)` otherwise.
    pub fn binary_search(&self, value: &[u8]) -> std::result::Result<u32, u32> {
        self.values
            .binary_search_by(|probe| probe.as_slice().cmp(value))
            .map(|ord| ord as u32)
            .map_err(|ins| ins as u32)
    }

    /// First ordinal whose value is `>= value`.
    pub fn lower_bound(&self, value: &[u8]) -> u32 {
        match self.binary_search(value) {
            Ok(ord) | Err(ord) => ord,
        }
    }

    /// Packed per-document slots.
    pub fn ordinals(&self) -> &OrdinalArray {
        &self.ordinals
    }
}

/// Smallest byte string sorting after every string starting with `prefix`.
///
/// Returns `None` when no such string exists (empty prefix or all `0xFF`).
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < u8::MAX {
            upper.push(last + 1);
            return Some(upper);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ValueIndex {
        ValueIndex::from_doc_values(
            7,
            vec![
                (0, "c"),
                (1, "a"),
                (2, "b"),
                (3, "c"),
                (5, "b"),
                (6, "c"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_ordinals_follow_sort_order() {
        let index = sample();

        assert_eq!(index.num_ordinals(), 3);
        assert_eq!(index.lookup(0), Some(&b"a"[..]));
        assert_eq!(index.lookup(2), Some(&b"c"[..]));
        assert_eq!(index.lookup(3), None);
        assert_eq!(index.ordinal(0), Some(2));
        assert_eq!(index.ordinal(1), Some(0));
        assert_eq!(index.ordinal(4), None);
        assert_eq!(index.max_doc(), 7);
    }

    #[test]
    fn test_binary_search() {
        let index = sample();

        assert_eq!(index.binary_search(b"b"), Ok(1));
        assert_eq!(index.binary_search(b"bb"), Err(2));
        assert_eq!(index.binary_search(b"z"), Err(3));
        assert_eq!(index.lower_bound(b""), 0);
    }

    #[test]
    fn test_entries_of_range() {
        let index = sample();
        let entries: Vec<_> = index.entries(1..9).collect();

        assert_eq!(
            entries,
            vec![
                ValueEntry {
                    value: b"b",
                    ordinal: 1
                },
                ValueEntry {
                    value: b"c",
                    ordinal: 2
                },
            ]
        );
        assert_eq!(index.entries(3..3).count(), 0);
    }

    #[test]
    fn test_rejects_multi_valued_docs() {
        let result = ValueIndex::from_doc_values(2, vec![(0, "a"), (0, "b")]);
        assert!(result.is_err());

        let result = ValueIndex::from_doc_values(2, vec![(5, "a")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_ordinal_array_width() {
        assert_eq!(OrdinalArray::pack(vec![0, 1], 255).bits_per_doc(), 8);
        assert_eq!(OrdinalArray::pack(vec![0, 256], 256).bits_per_doc(), 16);
        assert_eq!(OrdinalArray::pack(vec![0, 70_000], 70_000).bits_per_doc(), 32);

        let wide = OrdinalArray::pack(vec![0, 70_000], 70_000);
        assert_eq!(wide.get(1), 70_000);
        assert_eq!(wide.get(9), 0);
    }

    #[test]
    fn test_prefix_successor() {
        assert_eq!(prefix_successor(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_successor(&[b'a', 0xFF]), Some(b"b".to_vec()));
        assert_eq!(prefix_successor(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_successor(b""), None);
    }
}
