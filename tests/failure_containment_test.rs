//! Errors abort the rest of a request but keep what was already computed.

use std::sync::Arc;

use facetry::facet::{Cancellation, CountStrategy, ExecutionMode};
use facetry::prelude::*;
use facetry::store::{
    FieldReader, FilterCache, MemoryTermDictionary, Segment, TOP_LEVEL_SCOPE, TermCursor,
    TermDictionary, TermInfo, ValueIndex,
};

/// A dictionary whose backend fails after the first term.
struct FailingDictionary;

struct FailingCursor {
    served: bool,
}

impl TermCursor for FailingCursor {
    fn seek(&mut self, _target: &[u8]) -> Result<()> {
        Ok(())
    }

    fn next(&mut self) -> Result<Option<TermInfo>> {
        if self.served {
            return Err(FacetryError::storage("postings block 7 is truncated"));
        }
        self.served = true;
        Ok(Some(TermInfo {
            term: b"first".to_vec(),
            doc_freq: 1,
        }))
    }

    fn postings(&self) -> Result<Box<dyn Iterator<Item = u32> + '_>> {
        Ok(Box::new(std::iter::once(0)))
    }
}

impl TermDictionary for FailingDictionary {
    fn cursor(&self) -> Result<Box<dyn TermCursor + '_>> {
        Ok(Box::new(FailingCursor { served: false }))
    }

    fn num_terms(&self) -> Option<u64> {
        None
    }
}

fn keyword(name: &str, docs: &[(u32, &str)], max_doc: u32) -> Result<FieldReader> {
    let dict = MemoryTermDictionary::from_doc_values(docs.iter().copied());
    let values = ValueIndex::from_doc_values(max_doc, docs.iter().copied())?;
    let with_value: DocSet = docs.iter().map(|(doc, _)| *doc).collect();
    Ok(FieldReader::new(name, Arc::new(dict), with_value).with_value_index(Arc::new(values)))
}

fn failing(name: &str) -> FieldReader {
    let with_value: DocSet = [0].into_iter().collect();
    FieldReader::new(name, Arc::new(FailingDictionary), with_value).multi_valued(true)
}

#[test]
fn test_storage_error_keeps_completed_facets() -> Result<()> {
    let mut top = Segment::new(TOP_LEVEL_SCOPE, 0, 4);
    top.add_field(keyword("color", &[(0, "red"), (1, "red"), (3, "blue")], 4)?);
    top.add_field(failing("flaky"));
    top.add_field(keyword("size", &[(2, "xl")], 4)?);
    let snapshot = IndexSnapshot::new(top, Vec::new(), Arc::new(FilterCache::default()))?;
    let engine = FacetEngine::new(snapshot, FacetEngineConfig::default())?;

    let fields = [
        FacetSpec::new("color"),
        FacetSpec::new("flaky"),
        FacetSpec::new("size"),
    ];
    let response = engine.compute_facets(&DocSet::full(4), &fields, &[]);

    assert!(matches!(response.error, Some(FacetryError::StorageIo(_))));
    assert_eq!(
        response.field_facets.keys().collect::<Vec<_>>(),
        vec!["color"]
    );
    assert_eq!(
        response.field_facets["color"].pairs(),
        vec![("red".to_string(), 2), ("blue".to_string(), 1)]
    );

    let err = response.into_result().unwrap_err();
    assert!(err.to_string().contains("truncated"));

    Ok(())
}

#[test]
fn test_segment_failure_fails_the_field() -> Result<()> {
    let mut top = Segment::new(TOP_LEVEL_SCOPE, 0, 4);
    top.add_field(keyword("color", &[(0, "red"), (3, "blue")], 4)?);

    let mut healthy = Segment::new(0, 0, 2);
    healthy.add_field(keyword("color", &[(0, "red")], 2)?);
    let mut broken = Segment::new(1, 2, 2);
    broken.add_field(failing("color"));

    let snapshot = IndexSnapshot::new(top, vec![healthy, broken], Arc::new(FilterCache::default()))?;

    for execution in [
        ExecutionMode::Inline,
        ExecutionMode::default(),
        ExecutionMode::Pooled {
            max_threads: Some(2),
        },
    ] {
        let config = FacetEngineConfig::default().with_execution(execution);
        let engine = FacetEngine::new(snapshot.clone(), config)?;

        let spec = FacetSpec::new("color")
            .with_threads(2)
            .with_strategy(CountStrategy::PerSegment);
        let err = engine.compute_field_facet(&DocSet::full(4), &spec).unwrap_err();
        assert!(matches!(err, FacetryError::StorageIo(_)), "{execution:?}");
    }

    Ok(())
}

#[test]
fn test_cancellation_stops_only_its_request() -> Result<()> {
    let snapshot = MemoryIndexBuilder::new()
        .segment_size(2)
        .keyword("color", &[Some("red"), Some("blue"), Some("red"), Some("green")])
        .numeric("price", &[Some(1), Some(2), Some(3), Some(4)])
        .build()?;
    let engine = FacetEngine::new(snapshot, FacetEngineConfig::default())?;

    let fields = [FacetSpec::new("color").with_threads(2)];
    let ranges = [RangeSpec::new("price", "0", "10", "5")];

    let abandoned = Cancellation::new();
    abandoned.cancel();
    let response = engine.compute_facets_cancellable(&DocSet::full(4), &fields, &ranges, &abandoned);

    assert!(response.error.as_ref().is_some_and(|e| e.is_cancelled()));
    assert!(response.field_facets.is_empty());
    assert!(response.range_facets.is_empty());

    // A later request on the same engine runs with its own handle.
    let live = Cancellation::new();
    let response = engine
        .compute_facets_cancellable(&DocSet::full(4), &fields, &ranges, &live)
        .into_result()?;
    assert_eq!(
        response.field_facets["color"].pairs(),
        vec![
            ("red".to_string(), 2),
            ("blue".to_string(), 1),
            ("green".to_string(), 1),
        ]
    );
    assert_eq!(
        response.range_facets["price"].pairs(),
        vec![("0".to_string(), 4), ("5".to_string(), 0)]
    );

    let response = engine.compute_facets(&DocSet::full(4), &fields, &ranges);
    assert!(response.is_ok());
    assert!(abandoned.is_cancelled());

    Ok(())
}

#[test]
fn test_concurrent_requests_cancel_independently() -> Result<()> {
    let snapshot = MemoryIndexBuilder::new()
        .segment_size(2)
        .keyword("color", &[Some("red"), Some("blue"), Some("red"), Some("green")])
        .build()?;
    let engine = FacetEngine::new(snapshot, FacetEngineConfig::default())?;
    let fields = [FacetSpec::new("color").with_threads(2)];

    let abandoned = Cancellation::new();
    abandoned.cancel();

    let (cancelled, completed) = std::thread::scope(|scope| {
        let first = scope.spawn(|| {
            engine.compute_facets_cancellable(&DocSet::full(4), &fields, &[], &abandoned)
        });
        let second = scope.spawn(|| engine.compute_field_facets(&DocSet::full(4), &fields));
        (first.join(), second.join())
    });

    let cancelled = cancelled.map_err(|_| FacetryError::internal("request thread panicked"))?;
    let completed = completed.map_err(|_| FacetryError::internal("request thread panicked"))?;
    assert!(cancelled.error.as_ref().is_some_and(|e| e.is_cancelled()));
    assert_eq!(completed.into_result()?.field_facets["color"].total_count(), 4);

    Ok(())
}
