//! Request and result types for facet computation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::FacetryError;

/// Default number of values returned per field facet.
pub const DEFAULT_FACET_LIMIT: i64 = 100;

/// How facet values are ordered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetSort {
    /// Highest count first, ties broken by ascending value bytes.
    #[default]
    Count,
    /// Ascending value bytes (dictionary order).
    Index,
}

/// Counting strategy for a field facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountStrategy {
    /// Walk the term dictionary and intersect postings with the base set.
    Enumerate,
    /// Count per-document ordinals of a single-valued field.
    Ordinal,
    /// Count each segment separately and merge by value.
    PerSegment,
}

/// A field facet request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacetSpec {
    /// Field to facet on.
    pub field: String,
    /// Number of qualifying values to skip.
    pub offset: usize,
    /// Maximum number of values to return: negative means unbounded, zero
    /// means none.
    pub limit: i64,
    /// Values with a lower count are omitted.
    pub min_count: u64,
    pub sort: FacetSort,
    /// Only values starting with these bytes are counted.
    pub prefix: Option<Vec<u8>>,
    /// Report the number of base documents without a value.
    pub include_missing: bool,
    /// Worker threads for per-segment counting; `Some(0)` runs inline.
    pub threads: Option<u32>,
    /// Force a counting strategy.
    pub strategy: Option<CountStrategy>,
}

impl Default for FacetSpec {
    fn default() -> Self {
        FacetSpec {
            field: String::new(),
            offset: 0,
            limit: DEFAULT_FACET_LIMIT,
            min_count: 0,
            sort: FacetSort::Count,
            prefix: None,
            include_missing: false,
            threads: None,
            strategy: None,
        }
    }
}

impl FacetSpec {
    /// Create a spec for `field` with default paging.
    pub fn new<S: Into<String>>(field: S) -> Self {
        FacetSpec {
            field: field.into(),
            ..Default::default()
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Return every qualifying value.
    pub fn unbounded(self) -> Self {
        self.with_limit(-1)
    }

    pub fn with_min_count(mut self, min_count: u64) -> Self {
        self.min_count = min_count;
        self
    }

    pub fn with_sort(mut self, sort: FacetSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_prefix<P: Into<Vec<u8>>>(mut self, prefix: P) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_missing(mut self, include_missing: bool) -> Self {
        self.include_missing = include_missing;
        self
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_strategy(mut self, strategy: CountStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Limit as a count, `None` when unbounded.
    pub fn bounded_limit(&self) -> Option<usize> {
        usize::try_from(self.limit).ok()
    }
}

/// A value and the number of base documents holding it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountEntry {
    pub value: Vec<u8>,
    pub count: u64,
}

impl CountEntry {
    pub fn new<V: Into<Vec<u8>>>(value: V, count: u64) -> Self {
        CountEntry {
            value: value.into(),
            count,
        }
    }

    /// The value as text, with invalid UTF-8 replaced.
    pub fn value_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }
}

/// Ordered, paginated counts of one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetResult {
    pub entries: Vec<CountEntry>,
    /// Base documents without a value, when requested.
    pub missing: Option<u64>,
}

impl FacetResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `(value, count)` pairs as text, convenient in tests.
    pub fn pairs(&self) -> Vec<(String, u64)> {
        self.entries
            .iter()
            .map(|e| (e.value_str().into_owned(), e.count))
            .collect()
    }

    pub fn total_count(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }
}

/// Value domain of a range facet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeKind {
    /// Integers with integer gaps.
    #[default]
    Numeric,
    /// UTC timestamps with date-math gaps.
    Date,
}

/// Which bucket boundaries are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeInclude {
    /// Every bucket includes its lower bound.
    pub lower: bool,
    /// Every bucket includes its upper bound.
    pub upper: bool,
    /// The first bucket includes `start`, the last includes `end`.
    pub edge: bool,
    /// The before and after buckets include `start` and `end`.
    pub outer: bool,
}

impl Default for RangeInclude {
    fn default() -> Self {
        RangeInclude {
            lower: true,
            upper: false,
            edge: false,
            outer: false,
        }
    }
}

impl RangeInclude {
    pub fn all() -> Self {
        RangeInclude {
            lower: true,
            upper: true,
            edge: true,
            outer: true,
        }
    }

    pub fn none() -> Self {
        RangeInclude {
            lower: false,
            upper: false,
            edge: false,
            outer: false,
        }
    }
}

/// Overflow buckets to compute next to the regular ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtherBuckets {
    pub before: bool,
    pub after: bool,
    pub between: bool,
}

impl OtherBuckets {
    pub fn all() -> Self {
        OtherBuckets {
            before: true,
            after: true,
            between: true,
        }
    }

    pub fn any(&self) -> bool {
        self.before || self.after || self.between
    }
}

/// A range facet request. Bounds and gap are external strings parsed by the
/// field's [`RangeKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSpec {
    pub field: String,
    #[serde(default)]
    pub kind: RangeKind,
    pub start: String,
    pub end: String,
    pub gap: String,
    #[serde(default)]
    pub min_count: u64,
    /// Clamp the last bucket to `end` instead of extending `end`.
    #[serde(default)]
    pub hard_end: bool,
    #[serde(default)]
    pub include: RangeInclude,
    #[serde(default)]
    pub other: OtherBuckets,
}

impl RangeSpec {
    pub fn new<F, S, E, G>(field: F, start: S, end: E, gap: G) -> Self
    where
        F: Into<String>,
        S: Into<String>,
        E: Into<String>,
        G: Into<String>,
    {
        RangeSpec {
            field: field.into(),
            kind: RangeKind::Numeric,
            start: start.into(),
            end: end.into(),
            gap: gap.into(),
            min_count: 0,
            hard_end: false,
            include: RangeInclude::default(),
            other: OtherBuckets::default(),
        }
    }

    /// Same as [`new`](Self::new) for a date field.
    pub fn date<F, S, E, G>(field: F, start: S, end: E, gap: G) -> Self
    where
        F: Into<String>,
        S: Into<String>,
        E: Into<String>,
        G: Into<String>,
    {
        let mut spec = Self::new(field, start, end, gap);
        spec.kind = RangeKind::Date;
        spec
    }

    pub fn with_min_count(mut self, min_count: u64) -> Self {
        self.min_count = min_count;
        self
    }

    pub fn with_hard_end(mut self, hard_end: bool) -> Self {
        self.hard_end = hard_end;
        self
    }

    pub fn with_include(mut self, include: RangeInclude) -> Self {
        self.include = include;
        self
    }

    pub fn with_other(mut self, other: OtherBuckets) -> Self {
        self.other = other;
        self
    }
}

/// One tile of a range facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeBucket {
    /// Formatted lower bound, used as the bucket label.
    pub label: String,
    /// Formatted upper bound.
    pub high: String,
    pub count: u64,
}

/// Buckets of one range facet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeResult {
    pub buckets: Vec<RangeBucket>,
    pub gap: String,
    pub start: String,
    /// The end actually used, which grows past the requested end when the
    /// gap does not divide the span and `hard_end` is off.
    pub effective_end: String,
    pub before: Option<u64>,
    pub after: Option<u64>,
    pub between: Option<u64>,
}

impl RangeResult {
    /// `(label, count)` pairs, convenient in tests.
    pub fn pairs(&self) -> Vec<(String, u64)> {
        self.buckets
            .iter()
            .map(|b| (b.label.clone(), b.count))
            .collect()
    }
}

/// Everything computed for one request.
///
/// When `error` is set, the maps hold the facets completed before the
/// failure, in request order; nothing after the failing facet was computed.
#[derive(Debug, Default)]
pub struct FacetResponse {
    pub field_facets: IndexMap<String, FacetResult>,
    pub range_facets: IndexMap<String, RangeResult>,
    pub error: Option<FacetryError>,
}

impl FacetResponse {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a `Result`, dropping partial results on error.
    pub fn into_result(self) -> crate::error::Result<Self> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}
