//! Bounded, deterministic selection of facet values.
//!
//! Counters push `(value, count)` pairs in ascending value order into a
//! [`CountSink`]. The [`TopNSelector`] sink keeps only what the requested page
//! needs. Under count sort the order is count descending with ties broken by
//! ascending value bytes, whichever counter produced the pairs.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::facet::types::{CountEntry, FacetSort, FacetSpec};

/// Receiver of per-value counts in ascending value order.
pub trait CountSink {
    /// Record the count of a value.
    fn accept(&mut self, value: &[u8], count: u64);

    /// Whether a value whose count cannot exceed `upper_bound` could still
    /// change the result. Counters use this to skip terms without counting.
    fn can_admit(&self, upper_bound: u64) -> bool {
        let _ = upper_bound;
        true
    }

    /// No further value can change the result.
    fn is_saturated(&self) -> bool {
        false
    }
}

/// A candidate under count ordering: `a > b` when `a` ranks first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ranked {
    count: u64,
    value: Vec<u8>,
}

impl Ranked {
    fn outranks(&self, count: u64, value: &[u8]) -> bool {
        count < self.count || (count == self.count && self.value.as_slice() < value)
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.count
            .cmp(&other.count)
            .then_with(|| other.value.cmp(&self.value))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
enum Selection {
    ByCount {
        /// Min-heap on rank; the top is the weakest admitted entry.
        heap: BinaryHeap<Reverse<Ranked>>,
        capacity: Option<usize>,
    },
    ByIndex {
        skipped: usize,
        entries: Vec<CountEntry>,
    },
}

/// Selects one page of facet values.
#[derive(Debug)]
pub struct TopNSelector {
    offset: usize,
    limit: Option<usize>,
    min_count: u64,
    selection: Selection,
}

impl TopNSelector {
    /// Create a selector. `limit` of `None` is unbounded.
    pub fn new(sort: FacetSort, offset: usize, limit: Option<usize>, min_count: u64) -> Self {
        let selection = match sort {
            FacetSort::Count => Selection::ByCount {
                heap: BinaryHeap::new(),
                capacity: limit.map(|l| if l == 0 { 0 } else { offset.saturating_add(l) }),
            },
            FacetSort::Index => Selection::ByIndex {
                skipped: 0,
                entries: Vec::new(),
            },
        };

        TopNSelector {
            offset,
            limit,
            min_count,
            selection,
        }
    }

    /// Create a selector for the paging parameters of a spec.
    pub fn for_spec(spec: &FacetSpec) -> Self {
        Self::new(spec.sort, spec.offset, spec.bounded_limit(), spec.min_count)
    }

    /// Zero counts never qualify under count sort.
    fn count_floor(&self) -> u64 {
        self.min_count.max(1)
    }

    /// Drain the selected page in result order.
    pub fn finish(self) -> Vec<CountEntry> {
        match self.selection {
            Selection::ByCount { heap, .. } => {
                let mut ranked: Vec<Ranked> = heap.into_iter().map(|Reverse(r)| r).collect();
                ranked.sort_unstable_by(|a, b| b.cmp(a));

                let page = ranked.into_iter().skip(self.offset);
                let page: Box<dyn Iterator<Item = Ranked>> = match self.limit {
                    Some(limit) => Box::new(page.take(limit)),
                    None => Box::new(page),
                };
                page.map(|r| CountEntry {
                    value: r.value,
                    count: r.count,
                })
                .collect()
            }
            Selection::ByIndex { entries, .. } => entries,
        }
    }
}

impl CountSink for TopNSelector {
    fn accept(&mut self, value: &[u8], count: u64) {
        let floor = self.count_floor();
        match &mut self.selection {
            Selection::ByCount { heap, capacity } => {
                if count < floor {
                    return;
                }
                match *capacity {
                    Some(0) => {}
                    Some(cap) if heap.len() >= cap => {
                        let replaces = heap
                            .peek()
                            .is_some_and(|Reverse(worst)| !worst.outranks(count, value));
                        if replaces {
                            heap.pop();
                            heap.push(Reverse(Ranked {
                                count,
                                value: value.to_vec(),
                            }));
                        }
                    }
                    _ => heap.push(Reverse(Ranked {
                        count,
                        value: value.to_vec(),
                    })),
                }
            }
            Selection::ByIndex { skipped, entries } => {
                if count < self.min_count {
                    return;
                }
                if *skipped < self.offset {
                    *skipped += 1;
                    return;
                }
                if self.limit.is_none_or(|limit| entries.len() < limit) {
                    entries.push(CountEntry::new(value, count));
                }
            }
        }
    }

    /// Values arrive in ascending order, so under count sort a later value
    /// tying the weakest admitted count always ranks after it.
    fn can_admit(&self, upper_bound: u64) -> bool {
        match &self.selection {
            Selection::ByCount { heap, capacity } => {
                if upper_bound < self.count_floor() {
                    return false;
                }
                match *capacity {
                    Some(0) => false,
                    Some(cap) if heap.len() >= cap => heap
                        .peek()
                        .is_some_and(|Reverse(worst)| upper_bound > worst.count),
                    _ => true,
                }
            }
            Selection::ByIndex { .. } => upper_bound >= self.min_count && !self.is_saturated(),
        }
    }

    fn is_saturated(&self) -> bool {
        match &self.selection {
            Selection::ByCount { capacity, .. } => *capacity == Some(0),
            Selection::ByIndex { entries, .. } => {
                self.limit.is_some_and(|limit| entries.len() >= limit)
            }
        }
    }
}
