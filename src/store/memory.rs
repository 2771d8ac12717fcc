//! In-memory index snapshots for testing and embedding.
//!
//! [`MemoryIndexBuilder`] takes per-document field values column by column and
//! produces an [`IndexSnapshot`] split into fixed-size segments, with every
//! reader (dictionary, ordinals, numeric column) built for both the segments
//! and the top-level view.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::error::Result;
use crate::store::doc_set::DocSet;
use crate::store::filter_cache::FilterCache;
use crate::store::numeric::NumericColumn;
use crate::store::segment::{FieldReader, IndexSnapshot, Segment, TOP_LEVEL_SCOPE};
use crate::store::terms::MemoryTermDictionary;
use crate::store::value_index::ValueIndex;

/// Values of one field, one entry per document.
#[derive(Debug, Clone)]
enum FieldColumn {
    Keyword(Vec<Option<Vec<u8>>>),
    MultiKeyword(Vec<Vec<Vec<u8>>>),
    Numeric(Vec<Option<i64>>),
}

impl FieldColumn {
    fn len(&self) -> usize {
        match self {
            FieldColumn::Keyword(values) => values.len(),
            FieldColumn::MultiKeyword(values) => values.len(),
            FieldColumn::Numeric(values) => values.len(),
        }
    }
}

/// Builder for in-memory snapshots.
#[derive(Debug, Clone)]
pub struct MemoryIndexBuilder {
    columns: IndexMap<String, FieldColumn>,
    segment_size: Option<u32>,
    filter_cache_capacity: usize,
}

impl Default for MemoryIndexBuilder {
    fn default() -> Self {
        MemoryIndexBuilder {
            columns: IndexMap::new(),
            segment_size: None,
            filter_cache_capacity: 1024,
        }
    }
}

impl MemoryIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split the documents into segments of at most `size` documents.
    /// Without it the index holds a single segment.
    pub fn segment_size(mut self, size: u32) -> Self {
        self.segment_size = Some(size.max(1));
        self
    }

    /// Capacity of the snapshot's filter cache.
    pub fn filter_cache_capacity(mut self, capacity: usize) -> Self {
        self.filter_cache_capacity = capacity;
        self
    }

    /// Add a single-valued keyword field.
    pub fn keyword<V: AsRef<[u8]>>(mut self, name: &str, values: &[Option<V>]) -> Self {
        let column = values
            .iter()
            .map(|v| v.as_ref().map(|v| v.as_ref().to_vec()))
            .collect();
        self.columns
            .insert(name.to_string(), FieldColumn::Keyword(column));
        self
    }

    /// Add a multi-valued keyword field.
    pub fn multi_keyword<V: AsRef<[u8]>>(mut self, name: &str, values: &[Vec<V>]) -> Self {
        let column = values
            .iter()
            .map(|vs| vs.iter().map(|v| v.as_ref().to_vec()).collect())
            .collect();
        self.columns
            .insert(name.to_string(), FieldColumn::MultiKeyword(column));
        self
    }

    /// Add a single-valued integer field.
    pub fn numeric(mut self, name: &str, values: &[Option<i64>]) -> Self {
        self.columns
            .insert(name.to_string(), FieldColumn::Numeric(values.to_vec()));
        self
    }

    /// Add a single-valued date field, stored as epoch milliseconds.
    pub fn date(self, name: &str, values: &[Option<DateTime<Utc>>]) -> Self {
        let millis: Vec<Option<i64>> = values
            .iter()
            .map(|v| v.map(|d| d.timestamp_millis()))
            .collect();
        self.numeric(name, &millis)
    }

    /// Build the snapshot.
    pub fn build(self) -> Result<IndexSnapshot> {
        let max_doc = self.columns.values().map(FieldColumn::len).max().unwrap_or(0) as u32;

        let mut top_level = Segment::new(TOP_LEVEL_SCOPE, 0, max_doc);
        for (name, column) in &self.columns {
            top_level.add_field(build_reader(name, column, 0, max_doc)?);
        }

        let size = self.segment_size.unwrap_or(max_doc.max(1));
        let mut segments = Vec::new();
        let mut doc_base = 0u32;
        while doc_base < max_doc {
            let seg_max_doc = size.min(max_doc - doc_base);
            let mut segment = Segment::new(segments.len() as u64, doc_base, seg_max_doc);
            for (name, column) in &self.columns {
                segment.add_field(build_reader(name, column, doc_base, seg_max_doc)?);
            }
            segments.push(segment);
            doc_base += seg_max_doc;
        }

        IndexSnapshot::new(
            top_level,
            segments,
            Arc::new(FilterCache::new(self.filter_cache_capacity)),
        )
    }
}

/// Build readers for documents `doc_base..doc_base + max_doc` of a column,
/// renumbered from zero.
fn build_reader(name: &str, column: &FieldColumn, doc_base: u32, max_doc: u32) -> Result<FieldReader> {
    let range = doc_base as usize..(doc_base + max_doc) as usize;

    let reader = match column {
        FieldColumn::Keyword(values) => {
            let pairs: Vec<(u32, Vec<u8>)> = slice(values, range)
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.clone().map(|v| (i as u32, v)))
                .collect();
            keyword_reader(name, max_doc, pairs)?
        }
        FieldColumn::MultiKeyword(values) => {
            let pairs: Vec<(u32, Vec<u8>)> = slice(values, range)
                .iter()
                .enumerate()
                .flat_map(|(i, vs)| vs.iter().map(move |v| (i as u32, v.clone())))
                .collect();
            let with_value: DocSet = pairs.iter().map(|(doc, _)| *doc).collect();
            let dict = MemoryTermDictionary::from_doc_values(pairs);
            FieldReader::new(name, Arc::new(dict), with_value).multi_valued(true)
        }
        FieldColumn::Numeric(values) => {
            let numbers: Vec<(u32, i64)> = slice(values, range)
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.map(|v| (i as u32, v)))
                .collect();
            let pairs = numbers
                .iter()
                .map(|(doc, v)| (*doc, v.to_string().into_bytes()))
                .collect();
            let column = NumericColumn::from_doc_values(max_doc, numbers);
            keyword_reader(name, max_doc, pairs)?.with_numeric(Arc::new(column))
        }
    };

    Ok(reader)
}

fn keyword_reader(name: &str, max_doc: u32, pairs: Vec<(u32, Vec<u8>)>) -> Result<FieldReader> {
    let with_value = DocSet::from_sorted_iter(pairs.iter().map(|(doc, _)| *doc))?;
    let values = ValueIndex::from_doc_values(max_doc, pairs.clone())?;
    let dict = MemoryTermDictionary::from_doc_values(pairs);
    Ok(FieldReader::new(name, Arc::new(dict), with_value).with_value_index(Arc::new(values)))
}

/// Columns may be shorter than the index; missing tail documents have no value.
fn slice<T>(values: &[T], range: std::ops::Range<usize>) -> &[T] {
    let end = range.end.min(values.len());
    let start = range.start.min(end);
    &values[start..end]
}
