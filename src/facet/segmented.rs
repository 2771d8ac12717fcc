//! Per-segment counting with a value-keyed merge.
//!
//! Each segment is counted on its own, with segment-local document and term
//! ordinals, and the partial counts are merged by value bytes. Ordinals are
//! never compared across segments.

use std::sync::Arc;

use ahash::AHashMap;
use tracing::trace;

use crate::error::Result;
use crate::facet::config::{FacetEngineConfig, below_ordinal_threshold};
use crate::facet::enumeration::EnumerationCounter;
use crate::facet::executor::{Cancellation, Task, WorkerPool};
use crate::facet::ordinal::OrdinalCounter;
use crate::facet::selector::CountSink;
use crate::store::doc_set::DocSet;
use crate::store::filter_cache::FilterCache;
use crate::store::segment::{IndexSnapshot, Segment};

/// Unordered value counts, summed on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountMap {
    counts: AHashMap<Vec<u8>, u64>,
}

impl CountMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, value: &[u8]) -> Option<u64> {
        self.counts.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Add every count of `other` into `self`.
    pub fn merge(&mut self, other: CountMap) {
        if self.counts.is_empty() {
            self.counts = other.counts;
            return;
        }
        for (value, count) in other.counts {
            *self.counts.entry(value).or_insert(0) += count;
        }
    }

    /// Entries in ascending value order.
    pub fn into_sorted(self) -> Vec<(Vec<u8>, u64)> {
        let mut entries: Vec<(Vec<u8>, u64)> = self.counts.into_iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Feed the entries to `sink` in ascending value order.
    pub fn emit(self, sink: &mut dyn CountSink) {
        for (value, count) in self.into_sorted() {
            if sink.is_saturated() {
                break;
            }
            sink.accept(&value, count);
        }
    }
}

impl CountSink for CountMap {
    fn accept(&mut self, value: &[u8], count: u64) {
        match self.counts.get_mut(value) {
            Some(total) => *total += count,
            None => {
                self.counts.insert(value.to_vec(), count);
            }
        }
    }
}

/// Thresholds that pick the counter used inside a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentCountOptions {
    pub ordinal_max_terms: u64,
    pub enum_cache_min_df: u64,
}

impl SegmentCountOptions {
    /// Whether a segment dictionary of `terms` values is counted by ordinal.
    pub fn counts_by_ordinal(&self, terms: u64) -> bool {
        below_ordinal_threshold(terms, self.ordinal_max_terms)
    }
}

impl From<&FacetEngineConfig> for SegmentCountOptions {
    fn from(config: &FacetEngineConfig) -> Self {
        SegmentCountOptions {
            ordinal_max_terms: config.ordinal_max_terms,
            enum_cache_min_df: config.enum_cache_min_df,
        }
    }
}

/// Count one segment's share of the base set.
///
/// `base` holds segment-local ordinals. A segment without the field
/// contributes nothing.
pub fn count_segment(
    segment: &Segment,
    field: &str,
    prefix: Option<&[u8]>,
    base: &DocSet,
    options: SegmentCountOptions,
    cache: &FilterCache,
    cancel: &Cancellation,
) -> Result<CountMap> {
    let mut counts = CountMap::new();
    let Some(reader) = segment.field(field) else {
        return Ok(counts);
    };

    match reader.value_index() {
        Some(values) if options.counts_by_ordinal(values.num_ordinals() as u64) => {
            OrdinalCounter::new(values)
                .with_prefix(prefix)
                .count_into(base, cancel, &mut counts)?;
        }
        _ => {
            EnumerationCounter::new(field, reader.terms().as_ref())
                .with_prefix(prefix)
                .with_filter_cache(cache, segment.id(), options.enum_cache_min_df)
                .count_into(base, cancel, &mut counts)?;
        }
    }

    trace!(
        segment = segment.id(),
        field,
        values = counts.len(),
        "segment counted"
    );
    Ok(counts)
}

/// Fans counting out over the segments of a snapshot.
pub struct SegmentParallelCounter<'a> {
    snapshot: &'a IndexSnapshot,
    pool: &'a WorkerPool,
    options: SegmentCountOptions,
}

impl<'a> SegmentParallelCounter<'a> {
    pub fn new(snapshot: &'a IndexSnapshot, pool: &'a WorkerPool, options: SegmentCountOptions) -> Self {
        SegmentParallelCounter {
            snapshot,
            pool,
            options,
        }
    }

    /// Count `base` (global ordinals) per segment and merge.
    ///
    /// `threads` caps the number of concurrent tasks; `Some(0)` counts every
    /// segment on the calling thread.
    pub fn count(
        &self,
        field: &str,
        prefix: Option<&[u8]>,
        base: &DocSet,
        threads: Option<u32>,
        cancel: &Cancellation,
    ) -> Result<CountMap> {
        let segments = self.snapshot.segments();
        let parts: Vec<(Arc<Segment>, DocSet)> = segments
            .iter()
            .map(|segment| {
                let local = base.slice(segment.doc_base(), segment.max_doc());
                (Arc::clone(segment), local)
            })
            .collect();

        let num_tasks = match threads {
            Some(0) => 1,
            Some(limit) => (limit as usize).min(parts.len()).max(1),
            None => parts.len().max(1),
        };
        let groups = split_round_robin(parts, num_tasks);

        let tasks: Vec<Task<CountMap>> = groups
            .into_iter()
            .map(|group| {
                let field = field.to_string();
                let prefix = prefix.map(<[u8]>::to_vec);
                let cache = Arc::clone(self.snapshot.filter_cache());
                let cancel = cancel.clone();
                let options = self.options;
                Box::new(move || {
                    let mut merged = CountMap::new();
                    for (segment, local) in group {
                        let counts = count_segment(
                            &segment,
                            &field,
                            prefix.as_deref(),
                            &local,
                            options,
                            &cache,
                            &cancel,
                        )?;
                        merged.merge(counts);
                    }
                    Ok(merged)
                }) as Task<CountMap>
            })
            .collect();

        let partials = if threads == Some(0) {
            tasks.into_iter().map(|task| task()).collect::<Result<Vec<_>>>()?
        } else {
            self.pool.run_all(tasks)?
        };

        let mut merged = CountMap::new();
        for partial in partials {
            merged.merge(partial);
        }
        Ok(merged)
    }

    /// Count and feed the merged counts to `sink` in ascending value order.
    pub fn count_into(
        &self,
        field: &str,
        prefix: Option<&[u8]>,
        base: &DocSet,
        threads: Option<u32>,
        cancel: &Cancellation,
        sink: &mut dyn CountSink,
    ) -> Result<()> {
        self.count(field, prefix, base, threads, cancel)?.emit(sink);
        Ok(())
    }
}

/// Deal `items` into `n` groups, item `i` going to group `i % n`.
fn split_round_robin<T>(items: Vec<T>, n: usize) -> Vec<Vec<T>> {
    let mut groups: Vec<Vec<T>> = (0..n).map(|_| Vec::new()).collect();
    for (i, item) in items.into_iter().enumerate() {
        groups[i % n].push(item);
    }
    groups.retain(|g| !g.is_empty());
    groups
}
