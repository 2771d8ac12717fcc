//! Facet computation.
//!
//! A [`FacetEngine`] turns a base document set and a list of [`FacetSpec`]s
//! and [`RangeSpec`]s into a [`FacetResponse`]. Field facets are counted by
//! ordinal, by term enumeration or per segment; range facets tile a numeric
//! or date span into gap-sized buckets.

pub mod config;
pub mod date_math;
pub mod domain;
pub mod engine;
pub mod enumeration;
pub mod executor;
pub mod ordinal;
pub mod range;
pub mod segmented;
pub mod selector;
pub mod types;

pub use config::FacetEngineConfig;
pub use domain::{DateDomain, NumericDomain, RangeDomain};
pub use engine::FacetEngine;
pub use enumeration::EnumerationCounter;
pub use executor::{Cancellation, ExecutionMode, WorkerPool};
pub use ordinal::{OrdinalCounter, OrdinalCounts};
pub use range::{ColumnRangeCounter, RangeBucketer, RangeCounter};
pub use segmented::{CountMap, SegmentCountOptions, SegmentParallelCounter};
pub use selector::{CountSink, TopNSelector};
pub use types::{
    CountEntry, CountStrategy, FacetResponse, FacetResult, FacetSort, FacetSpec, OtherBuckets,
    RangeBucket, RangeInclude, RangeKind, RangeResult, RangeSpec,
};
