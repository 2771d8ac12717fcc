//! Index-side collaborators of the facet engine.
//!
//! Everything here is read-only at query time: document sets, per-document
//! ordinals, term dictionaries, numeric columns and the filter cache, grouped
//! per segment inside an [`IndexSnapshot`](segment::IndexSnapshot).

pub mod doc_set;
pub mod filter_cache;
pub mod memory;
pub mod numeric;
pub mod segment;
pub mod terms;
pub mod value_index;

pub use doc_set::DocSet;
pub use filter_cache::{FilterCache, FilterKey};
pub use memory::MemoryIndexBuilder;
pub use numeric::NumericColumn;
pub use segment::{FieldReader, IndexSnapshot, Segment, TOP_LEVEL_SCOPE};
pub use terms::{MemoryTermDictionary, TermCursor, TermDictionary, TermInfo};
pub use value_index::{OrdinalArray, ValueEntry, ValueIndex, prefix_successor};
