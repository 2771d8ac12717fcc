//! Segment and snapshot views consumed by the facet engine.
//!
//! An [`IndexSnapshot`] is a read-only view of an index: a top-level composite
//! whose document ordinals span the whole index, plus the individual segments
//! with segment-local ordinals starting at zero. Segment `i` covers the global
//! ordinals `doc_base..doc_base + max_doc`.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::error::{FacetryError, Result};
use crate::store::doc_set::DocSet;
use crate::store::filter_cache::FilterCache;
use crate::store::numeric::NumericColumn;
use crate::store::terms::TermDictionary;
use crate::store::value_index::ValueIndex;

/// Cache scope used by the top-level composite view.
pub const TOP_LEVEL_SCOPE: u64 = u64::MAX;

/// Readers for one field within one segment (or the top-level view).
#[derive(Clone)]
pub struct FieldReader {
    name: String,
    multi_valued: bool,
    terms: Arc<dyn TermDictionary>,
    values: Option<Arc<ValueIndex>>,
    numbers: Option<Arc<NumericColumn>>,
    docs_with_value: Arc<DocSet>,
}

impl FieldReader {
    /// Create a reader from a term dictionary and the set of documents
    /// holding at least one value.
    pub fn new<S: Into<String>>(
        name: S,
        terms: Arc<dyn TermDictionary>,
        docs_with_value: DocSet,
    ) -> Self {
        FieldReader {
            name: name.into(),
            multi_valued: false,
            terms,
            values: None,
            numbers: None,
            docs_with_value: Arc::new(docs_with_value),
        }
    }

    /// Attach the per-document ordinals of a single-valued field.
    pub fn with_value_index(mut self, values: Arc<ValueIndex>) -> Self {
        self.values = Some(values);
        self
    }

    /// Attach a sortable numeric column.
    pub fn with_numeric(mut self, numbers: Arc<NumericColumn>) -> Self {
        self.numbers = Some(numbers);
        self
    }

    /// Mark the field as holding several values per document.
    pub fn multi_valued(mut self, multi_valued: bool) -> Self {
        self.multi_valued = multi_valued;
        self
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_multi_valued(&self) -> bool {
        self.multi_valued
    }

    pub fn terms(&self) -> &Arc<dyn TermDictionary> {
        &self.terms
    }

    /// Per-document ordinals; only single-valued fields have one.
    pub fn value_index(&self) -> Option<&Arc<ValueIndex>> {
        if self.multi_valued {
            None
        } else {
            self.values.as_ref()
        }
    }

    pub fn numeric(&self) -> Option<&Arc<NumericColumn>> {
        self.numbers.as_ref()
    }

    /// Documents with at least one indexed value.
    pub fn docs_with_value(&self) -> &DocSet {
        &self.docs_with_value
    }

    /// Size of the field dictionary, when known.
    pub fn num_terms(&self) -> Option<u64> {
        match self.value_index() {
            Some(values) => Some(values.num_ordinals() as u64),
            None => self.terms.num_terms(),
        }
    }
}

impl fmt::Debug for FieldReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldReader")
            .field("name", &self.name)
            .field("multi_valued", &self.multi_valued)
            .field("num_terms", &self.num_terms())
            .field("has_value_index", &self.value_index().is_some())
            .field("has_numeric", &self.numbers.is_some())
            .finish()
    }
}

/// A contiguous run of documents with its own field readers.
#[derive(Debug, Clone)]
pub struct Segment {
    id: u64,
    doc_base: u32,
    max_doc: u32,
    fields: AHashMap<String, Arc<FieldReader>>,
}

impl Segment {
    pub fn new(id: u64, doc_base: u32, max_doc: u32) -> Self {
        Segment {
            id,
            doc_base,
            max_doc,
            fields: AHashMap::new(),
        }
    }

    /// Register a field reader.
    pub fn add_field(&mut self, reader: FieldReader) {
        self.fields
            .insert(reader.name().to_string(), Arc::new(reader));
    }

    /// Segment identifier, also used as the filter cache scope.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Global ordinal of the segment's first document.
    pub fn doc_base(&self) -> u32 {
        self.doc_base
    }

    /// Number of documents in the segment.
    pub fn max_doc(&self) -> u32 {
        self.max_doc
    }

    pub fn field(&self, name: &str) -> Option<&Arc<FieldReader>> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}

/// Read-only view of an index for the duration of one or more requests.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    top_level: Arc<Segment>,
    segments: Vec<Arc<Segment>>,
    filter_cache: Arc<FilterCache>,
}

impl IndexSnapshot {
    /// Assemble a snapshot.
    ///
    /// The segments must tile the top-level document space in order: the
    /// first starts at 0, each starts where the previous ended, and together
    /// they cover exactly `top_level.max_doc()` documents.
    pub fn new(
        top_level: Segment,
        segments: Vec<Segment>,
        filter_cache: Arc<FilterCache>,
    ) -> Result<Self> {
        let mut next_base = 0u32;
        for segment in &segments {
            if segment.doc_base() != next_base {
                return Err(FacetryError::invalid_argument(format!(
                    "segment {} starts at {} but {} was expected",
                    segment.id(),
                    segment.doc_base(),
                    next_base
                )));
            }
            next_base = next_base
                .checked_add(segment.max_doc())
                .ok_or_else(|| FacetryError::invalid_argument("segments overflow u32"))?;
        }
        if !segments.is_empty() && next_base != top_level.max_doc() {
            return Err(FacetryError::invalid_argument(format!(
                "segments cover {} documents, the index has {}",
                next_base,
                top_level.max_doc()
            )));
        }

        Ok(IndexSnapshot {
            top_level: Arc::new(top_level),
            segments: segments.into_iter().map(Arc::new).collect(),
            filter_cache,
        })
    }

    /// Whole-index view.
    pub fn top_level(&self) -> &Arc<Segment> {
        &self.top_level
    }

    /// Top-level reader of a field.
    pub fn field(&self, name: &str) -> Option<&Arc<FieldReader>> {
        self.top_level.field(name)
    }

    pub fn segments(&self) -> &[Arc<Segment>] {
        &self.segments
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Total number of documents.
    pub fn max_doc(&self) -> u32 {
        self.top_level.max_doc()
    }

    pub fn filter_cache(&self) -> &Arc<FilterCache> {
        &self.filter_cache
    }
}
