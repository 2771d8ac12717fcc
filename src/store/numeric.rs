//! Sortable numeric column used to answer range counts.
//!
//! Numbers are stored as-is, dates as milliseconds since the Unix epoch, so a
//! single `i64` column serves both numeric and date range facets.

use crate::store::doc_set::DocSet;

/// Per-document `i64` values of a single-valued field.
#[derive(Debug, Clone, Default)]
pub struct NumericColumn {
    values: Vec<Option<i64>>,
}

impl NumericColumn {
    /// Build a column over `max_doc` documents from `(doc, value)` pairs.
    /// Documents outside `0..max_doc` are ignored; a later pair for the same
    /// document overwrites an earlier one.
    pub fn from_doc_values<I>(max_doc: u32, doc_values: I) -> Self
    where
        I: IntoIterator<Item = (u32, i64)>,
    {
        let mut values = vec![None; max_doc as usize];
        for (doc, value) in doc_values {
            if let Some(slot) = values.get_mut(doc as usize) {
                *slot = Some(value);
            }
        }
        NumericColumn { values }
    }

    /// Value of a document, if any.
    pub fn get(&self, doc: u32) -> Option<i64> {
        self.values.get(doc as usize).copied().flatten()
    }

    /// Number of documents covered.
    pub fn max_doc(&self) -> u32 {
        self.values.len() as u32
    }

    /// Count documents of `base` whose value lies between `low` and `high`.
    ///
    /// `None` bounds are unbounded; `inc_low` / `inc_high` select inclusive
    /// bounds.
    pub fn range_count(
        &self,
        base: &DocSet,
        low: Option<i64>,
        high: Option<i64>,
        inc_low: bool,
        inc_high: bool,
    ) -> u64 {
        let above_low = |v: i64| match low {
            Some(l) if inc_low => v >= l,
            Some(l) => v > l,
            None => true,
        };
        let below_high = |v: i64| match high {
            Some(h) if inc_high => v <= h,
            Some(h) => v < h,
            None => true,
        };

        base.iter()
            .filter_map(|doc| self.get(doc))
            .filter(|&v| above_low(v) && below_high(v))
            .count() as u64
    }

    /// Documents that hold a value.
    pub fn docs_with_value(&self) -> DocSet {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some())
            .map(|(doc, _)| doc as u32)
            .collect()
    }
}
