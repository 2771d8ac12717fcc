//! # Facetry
//!
//! Faceted count aggregation for search engines.
//!
//! ## Features
//!
//! - Field facets counted by per-document ordinal or by term enumeration
//! - Per-segment counting on a worker pool, merged by value
//! - Count and index ordering with offset, limit, min count and prefix
//! - Numeric and date range facets with date math gaps
//! - Missing counts and overflow buckets

pub mod error;
pub mod facet;
pub mod store;

pub mod prelude {
    pub use crate::error::{FacetryError, Result};
    pub use crate::facet::{
        CountStrategy, FacetEngine, FacetEngineConfig, FacetResponse, FacetResult, FacetSort,
        FacetSpec, RangeResult, RangeSpec,
    };
    pub use crate::store::{DocSet, IndexSnapshot, MemoryIndexBuilder};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
