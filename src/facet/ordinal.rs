//! Counting by per-document ordinal.
//!
//! For a single-valued field every document maps to at most one ordinal, so a
//! pass over the base set with one array increment per document yields the
//! count of every value at once.

use std::ops::Range;

use crate::error::Result;
use crate::facet::executor::Cancellation;
use crate::facet::selector::CountSink;
use crate::store::doc_set::DocSet;
use crate::store::value_index::{OrdinalArray, ValueIndex, prefix_successor};

/// Documents scanned between two cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Counts of a contiguous ordinal range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdinalCounts {
    start: u32,
    counts: Vec<u64>,
}

impl OrdinalCounts {
    /// Ordinals covered.
    pub fn range(&self) -> Range<u32> {
        self.start..self.start + self.counts.len() as u32
    }

    /// Count of one ordinal; zero outside the range.
    pub fn get(&self, ordinal: u32) -> u64 {
        ordinal
            .checked_sub(self.start)
            .and_then(|i| self.counts.get(i as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Feed every counted value, zero counts included, to `sink` in
    /// ordinal order.
    pub fn emit(&self, index: &ValueIndex, sink: &mut dyn CountSink) {
        for (entry, &count) in index.entries(self.range()).zip(&self.counts) {
            if sink.is_saturated() {
                break;
            }
            sink.accept(entry.value, count);
        }
    }
}

/// Counts values of a single-valued field through its [`ValueIndex`].
#[derive(Debug, Clone, Copy)]
pub struct OrdinalCounter<'a> {
    index: &'a ValueIndex,
    prefix: Option<&'a [u8]>,
}

impl<'a> OrdinalCounter<'a> {
    pub fn new(index: &'a ValueIndex) -> Self {
        OrdinalCounter {
            index,
            prefix: None,
        }
    }

    /// Restrict counting to values starting with `prefix`.
    pub fn with_prefix(mut self, prefix: Option<&'a [u8]>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Ordinals whose values match the prefix.
    pub fn term_range(&self) -> Range<u32> {
        let Some(prefix) = self.prefix.filter(|p| !p.is_empty()) else {
            return 0..self.index.num_ordinals();
        };

        let start = self.index.lower_bound(prefix);
        let end = match prefix_successor(prefix) {
            Some(upper) => self.index.lower_bound(&upper),
            None => self.index.num_ordinals(),
        };
        start..end.max(start)
    }

    /// Count the base set.
    pub fn count(&self, base: &DocSet, cancel: &Cancellation) -> Result<OrdinalCounts> {
        let range = self.term_range();
        let mut counts = vec![0u64; (range.end - range.start) as usize];

        if !counts.is_empty() {
            match self.index.ordinals() {
                OrdinalArray::U8(slots) => tally(slots, base, &range, &mut counts, cancel)?,
                OrdinalArray::U16(slots) => tally(slots, base, &range, &mut counts, cancel)?,
                OrdinalArray::U32(slots) => tally(slots, base, &range, &mut counts, cancel)?,
            }
        }

        Ok(OrdinalCounts {
            start: range.start,
            counts,
        })
    }

    /// Count the base set and feed the counts to `sink`.
    pub fn count_into(
        &self,
        base: &DocSet,
        cancel: &Cancellation,
        sink: &mut dyn CountSink,
    ) -> Result<()> {
        let counts = self.count(base, cancel)?;
        counts.emit(self.index, sink);
        Ok(())
    }
}

fn tally<T>(
    slots: &[T],
    base: &DocSet,
    range: &Range<u32>,
    counts: &mut [u64],
    cancel: &Cancellation,
) -> Result<()>
where
    T: Copy + Into<u32>,
{
    for (i, doc) in base.iter().enumerate() {
        if i % CANCEL_CHECK_INTERVAL == 0 {
            cancel.check()?;
        }
        let Some(&slot) = slots.get(doc as usize) else {
            continue;
        };
        let slot: u32 = slot.into();
        if slot == 0 {
            continue;
        }
        let ordinal = slot - 1;
        if range.contains(&ordinal) {
            counts[(ordinal - range.start) as usize] += 1;
        }
    }
    Ok(())
}
