//! Range facets: tiling `[start, end)` into gap-sized buckets.
//!
//! When the gap does not divide the span, the last bucket either stops at
//! `end` (`hard_end`) or runs a full gap and moves `end` with it. The moved
//! end is reported back as the effective end, and the after and between
//! buckets are computed against it.

use tracing::trace;

use crate::error::{FacetryError, Result};
use crate::facet::domain::RangeDomain;
use crate::facet::executor::Cancellation;
use crate::facet::types::{RangeBucket, RangeResult, RangeSpec};
use crate::store::doc_set::DocSet;
use crate::store::numeric::NumericColumn;

/// Counts base documents whose value falls in a range of sortable values.
pub trait RangeCounter {
    /// `None` bounds are unbounded.
    fn range_count(
        &self,
        low: Option<i64>,
        high: Option<i64>,
        inc_low: bool,
        inc_high: bool,
    ) -> Result<u64>;
}

/// [`RangeCounter`] over a numeric column restricted to a base set.
#[derive(Debug, Clone, Copy)]
pub struct ColumnRangeCounter<'a> {
    column: &'a NumericColumn,
    base: &'a DocSet,
}

impl<'a> ColumnRangeCounter<'a> {
    pub fn new(column: &'a NumericColumn, base: &'a DocSet) -> Self {
        ColumnRangeCounter { column, base }
    }
}

impl RangeCounter for ColumnRangeCounter<'_> {
    fn range_count(
        &self,
        low: Option<i64>,
        high: Option<i64>,
        inc_low: bool,
        inc_high: bool,
    ) -> Result<u64> {
        Ok(self.column.range_count(self.base, low, high, inc_low, inc_high))
    }
}

/// Validated range facet ready to count.
#[derive(Debug)]
pub struct RangeBucketer<'a, D: RangeDomain> {
    domain: &'a D,
    spec: &'a RangeSpec,
    start: D::Value,
    end: D::Value,
    gap: D::Gap,
    max_buckets: usize,
}

impl<'a, D: RangeDomain> RangeBucketer<'a, D> {
    /// Parse the bounds and gap of `spec`.
    ///
    /// Fails with [`FacetryError::InvalidRange`] when `end` comes before
    /// `start`.
    pub fn new(domain: &'a D, spec: &'a RangeSpec, max_buckets: usize) -> Result<Self> {
        let start = domain.parse_value(&spec.start)?;
        let end = domain.parse_value(&spec.end)?;
        let gap = domain.parse_gap(&spec.gap)?;

        if end < start {
            return Err(FacetryError::invalid_range(format!(
                "range facet on '{}': end {} is before start {}",
                spec.field,
                domain.format(&end),
                domain.format(&start)
            )));
        }

        Ok(RangeBucketer {
            domain,
            spec,
            start,
            end,
            gap,
            max_buckets,
        })
    }

    pub fn start(&self) -> &D::Value {
        &self.start
    }

    /// The requested end, before any extension.
    pub fn end(&self) -> &D::Value {
        &self.end
    }

    /// Count every bucket and the requested overflow buckets.
    pub fn compute(&self, counter: &dyn RangeCounter, cancel: &Cancellation) -> Result<RangeResult> {
        let domain = self.domain;
        let include = self.spec.include;
        let start = &self.start;
        let mut end = self.end.clone();
        let mut buckets = Vec::new();
        let mut tiles = 0usize;

        let mut low = start.clone();
        while low < end {
            cancel.check()?;

            let mut high = domain.advance(&low, &self.gap)?;
            if high <= low {
                return Err(FacetryError::non_progressing(format!(
                    "gap '{}' does not advance past {}",
                    self.spec.gap,
                    domain.format(&low)
                )));
            }
            if high > end {
                if self.spec.hard_end {
                    high = end.clone();
                } else {
                    end = high.clone();
                }
            }

            tiles += 1;
            if tiles > self.max_buckets {
                return Err(FacetryError::non_progressing(format!(
                    "range facet on '{}' needs more than {} buckets",
                    self.spec.field, self.max_buckets
                )));
            }

            let inc_low = include.lower || (include.edge && low == *start);
            let inc_high = include.upper || (include.edge && high == end);
            let count = counter.range_count(
                Some(domain.sortable(&low)),
                Some(domain.sortable(&high)),
                inc_low,
                inc_high,
            )?;

            if count >= self.spec.min_count {
                buckets.push(RangeBucket {
                    label: domain.format(&low),
                    high: domain.format(&high),
                    count,
                });
            }
            low = high;
        }

        let (lo, hi) = (domain.sortable(start), domain.sortable(&end));
        let other = self.spec.other;
        let before = if other.before {
            let inc = include.outer || !(include.lower || include.edge);
            Some(counter.range_count(None, Some(lo), false, inc)?)
        } else {
            None
        };
        let after = if other.after {
            let inc = include.outer || !(include.upper || include.edge);
            Some(counter.range_count(Some(hi), None, inc, false)?)
        } else {
            None
        };
        let between = if other.between {
            Some(counter.range_count(
                Some(lo),
                Some(hi),
                include.lower || include.edge,
                include.upper || include.edge,
            )?)
        } else {
            None
        };

        trace!(
            field = %self.spec.field,
            buckets = buckets.len(),
            tiles,
            "range facet computed"
        );

        Ok(RangeResult {
            buckets,
            gap: self.spec.gap.clone(),
            start: domain.format(start),
            effective_end: domain.format(&end),
            before,
            after,
            between,
        })
    }
}
