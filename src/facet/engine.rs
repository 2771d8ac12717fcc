//! The facet engine: strategy selection and request orchestration.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{FacetryError, Result};
use crate::facet::config::FacetEngineConfig;
use crate::facet::domain::{DateDomain, NumericDomain};
use crate::facet::enumeration::EnumerationCounter;
use crate::facet::executor::{Cancellation, WorkerPool};
use crate::facet::ordinal::OrdinalCounter;
use crate::facet::range::{ColumnRangeCounter, RangeBucketer};
use crate::facet::segmented::{SegmentCountOptions, SegmentParallelCounter};
use crate::facet::selector::TopNSelector;
use crate::facet::types::{
    CountStrategy, FacetResponse, FacetResult, FacetSpec, RangeKind, RangeResult, RangeSpec,
};
use crate::store::doc_set::DocSet;
use crate::store::segment::{FieldReader, IndexSnapshot, TOP_LEVEL_SCOPE};

/// Computes field and range facets over one index snapshot.
///
/// # Example
///
/// ```
/// use facetry::facet::{FacetEngine, FacetEngineConfig, FacetSpec};
/// use facetry::store::{DocSet, MemoryIndexBuilder};
///
/// let snapshot = MemoryIndexBuilder::new()
///     .keyword("color", &[Some("red"), Some("blue"), Some("red")])
///     .build()
///     .unwrap();
/// let engine = FacetEngine::new(snapshot, FacetEngineConfig::default()).unwrap();
///
/// let response = engine.compute_field_facets(&DocSet::full(3), &[FacetSpec::new("color")]);
/// let colors = &response.field_facets["color"];
/// assert_eq!(colors.pairs(), vec![("red".to_string(), 2), ("blue".to_string(), 1)]);
/// ```
#[derive(Debug)]
pub struct FacetEngine {
    snapshot: IndexSnapshot,
    config: FacetEngineConfig,
    pool: WorkerPool,
    fixed_now: Option<DateTime<Utc>>,
}

impl FacetEngine {
    pub fn new(snapshot: IndexSnapshot, config: FacetEngineConfig) -> Result<Self> {
        let pool = WorkerPool::new(config.execution, config.pool_idle_timeout)?;
        Ok(FacetEngine {
            snapshot,
            config,
            pool,
            fixed_now: None,
        })
    }

    /// Resolve `NOW` in date ranges to `now` instead of the wall clock.
    pub fn with_fixed_now(mut self, now: DateTime<Utc>) -> Self {
        self.fixed_now = Some(now);
        self
    }

    pub fn snapshot(&self) -> &IndexSnapshot {
        &self.snapshot
    }

    pub fn config(&self) -> &FacetEngineConfig {
        &self.config
    }

    /// Pick the counting strategy for `spec`.
    pub fn choose_strategy(&self, spec: &FacetSpec) -> Result<CountStrategy> {
        let reader = self.field_reader(&spec.field)?;
        self.strategy_for(spec, reader)
    }

    fn strategy_for(&self, spec: &FacetSpec, reader: &FieldReader) -> Result<CountStrategy> {
        match spec.strategy {
            Some(CountStrategy::Ordinal) if reader.value_index().is_none() => {
                Err(FacetryError::strategy_unavailable(format!(
                    "ordinal counting needs a single-valued field with a value index, '{}' is not",
                    spec.field
                )))
            }
            Some(CountStrategy::PerSegment) if self.snapshot.num_segments() == 0 => {
                Err(FacetryError::strategy_unavailable(format!(
                    "per-segment counting of '{}' needs a segmented snapshot",
                    spec.field
                )))
            }
            Some(strategy) => Ok(strategy),
            None if spec.threads.is_some() && self.snapshot.num_segments() > 1 => {
                Ok(CountStrategy::PerSegment)
            }
            None => {
                let small = reader
                    .num_terms()
                    .is_some_and(|terms| self.config.counts_by_ordinal(terms));
                if reader.value_index().is_some() && small {
                    Ok(CountStrategy::Ordinal)
                } else {
                    Ok(CountStrategy::Enumerate)
                }
            }
        }
    }

    /// Compute one field facet.
    pub fn compute_field_facet(&self, base: &DocSet, spec: &FacetSpec) -> Result<FacetResult> {
        self.compute_field_facet_cancellable(base, spec, &Cancellation::new())
    }

    /// Compute one field facet, abandoned once `cancel` fires.
    pub fn compute_field_facet_cancellable(
        &self,
        base: &DocSet,
        spec: &FacetSpec,
        cancel: &Cancellation,
    ) -> Result<FacetResult> {
        let reader = self.field_reader(&spec.field)?;
        let strategy = self.strategy_for(spec, reader)?;

        let missing = spec
            .include_missing
            .then(|| base.diff_len(reader.docs_with_value()));
        if spec.limit == 0 {
            return Ok(FacetResult {
                entries: Vec::new(),
                missing,
            });
        }

        debug!(
            field = %spec.field,
            ?strategy,
            base = base.len(),
            hinted = spec.strategy.is_some(),
            "counting field facet"
        );

        let mut selector = TopNSelector::for_spec(spec);
        let prefix = spec.prefix.as_deref();
        match strategy {
            CountStrategy::Ordinal => {
                let values = reader.value_index().ok_or_else(|| {
                    FacetryError::strategy_unavailable(format!("'{}' has no value index", spec.field))
                })?;
                OrdinalCounter::new(values)
                    .with_prefix(prefix)
                    .count_into(base, cancel, &mut selector)?;
            }
            CountStrategy::Enumerate => {
                EnumerationCounter::new(&spec.field, reader.terms().as_ref())
                    .with_prefix(prefix)
                    .with_filter_cache(
                        self.snapshot.filter_cache(),
                        TOP_LEVEL_SCOPE,
                        self.config.enum_cache_min_df,
                    )
                    .count_into(base, cancel, &mut selector)?;
            }
            CountStrategy::PerSegment => {
                let options = SegmentCountOptions::from(&self.config);
                SegmentParallelCounter::new(&self.snapshot, &self.pool, options).count_into(
                    &spec.field,
                    prefix,
                    base,
                    spec.threads,
                    cancel,
                    &mut selector,
                )?;
            }
        }

        Ok(FacetResult {
            entries: selector.finish(),
            missing,
        })
    }

    /// Compute one range facet.
    pub fn compute_range_facet(&self, base: &DocSet, spec: &RangeSpec) -> Result<RangeResult> {
        self.compute_range_facet_cancellable(base, spec, &Cancellation::new())
    }

    /// Compute one range facet, abandoned once `cancel` fires.
    pub fn compute_range_facet_cancellable(
        &self,
        base: &DocSet,
        spec: &RangeSpec,
        cancel: &Cancellation,
    ) -> Result<RangeResult> {
        self.range_facet(base, spec, &self.date_domain(), cancel)
    }

    fn range_facet(
        &self,
        base: &DocSet,
        spec: &RangeSpec,
        dates: &DateDomain,
        cancel: &Cancellation,
    ) -> Result<RangeResult> {
        let reader = self.field_reader(&spec.field)?;
        let column = reader.numeric().ok_or_else(|| {
            FacetryError::field(format!("field '{}' has no numeric values", spec.field))
        })?;
        let counter = ColumnRangeCounter::new(column, base);
        let max_buckets = self.config.max_range_buckets;

        debug!(field = %spec.field, kind = ?spec.kind, gap = %spec.gap, "counting range facet");
        match spec.kind {
            RangeKind::Numeric => {
                RangeBucketer::new(&NumericDomain, spec, max_buckets)?.compute(&counter, cancel)
            }
            RangeKind::Date => {
                RangeBucketer::new(dates, spec, max_buckets)?.compute(&counter, cancel)
            }
        }
    }

    /// Compute field facets only.
    pub fn compute_field_facets(&self, base: &DocSet, specs: &[FacetSpec]) -> FacetResponse {
        self.compute_facets(base, specs, &[])
    }

    /// Compute range facets only.
    pub fn compute_range_facets(&self, base: &DocSet, specs: &[RangeSpec]) -> FacetResponse {
        self.compute_facets(base, &[], specs)
    }

    /// Compute every requested facet, field facets first, in request order.
    ///
    /// The first failure stops the request: the response then carries the
    /// facets completed so far together with the error.
    pub fn compute_facets(
        &self,
        base: &DocSet,
        field_specs: &[FacetSpec],
        range_specs: &[RangeSpec],
    ) -> FacetResponse {
        self.compute_facets_cancellable(base, field_specs, range_specs, &Cancellation::new())
    }

    /// Like [`compute_facets`](Self::compute_facets), but stops with
    /// [`FacetryError::Cancelled`] once `cancel` fires. The handle belongs to
    /// this request only; other requests on the same engine are unaffected.
    pub fn compute_facets_cancellable(
        &self,
        base: &DocSet,
        field_specs: &[FacetSpec],
        range_specs: &[RangeSpec],
        cancel: &Cancellation,
    ) -> FacetResponse {
        let mut response = FacetResponse::default();

        for spec in field_specs {
            match self.compute_field_facet_cancellable(base, spec, cancel) {
                Ok(result) => {
                    response.field_facets.insert(spec.field.clone(), result);
                }
                Err(error) => return abort(response, &spec.field, error),
            }
        }

        let dates = self.date_domain();
        for spec in range_specs {
            match self.range_facet(base, spec, &dates, cancel) {
                Ok(result) => {
                    response.range_facets.insert(spec.field.clone(), result);
                }
                Err(error) => return abort(response, &spec.field, error),
            }
        }

        response
    }

    fn field_reader(&self, field: &str) -> Result<&FieldReader> {
        self.snapshot
            .field(field)
            .map(|reader| &**reader)
            .ok_or_else(|| FacetryError::field(format!("unknown field '{field}'")))
    }

    fn date_domain(&self) -> DateDomain {
        match self.fixed_now {
            Some(now) => DateDomain::at(now),
            None => DateDomain::new(),
        }
    }
}

fn abort(mut response: FacetResponse, field: &str, error: FacetryError) -> FacetResponse {
    warn!(
        field,
        error = %error,
        completed = response.field_facets.len() + response.range_facets.len(),
        "facet request aborted"
    );
    response.error = Some(error);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    use crate::facet::executor::ExecutionMode;
    use crate::facet::types::FacetSort;
    use crate::store::memory::MemoryIndexBuilder;

    fn engine() -> FacetEngine {
        let snapshot = MemoryIndexBuilder::new()
            .segment_size(3)
            .keyword(
                "letter",
                &[Some("a"), Some("b"), Some("b"), Some("c"), Some("c"), Some("c"), None, None],
            )
            .multi_keyword(
                "tags",
                &[vec!["x", "y"], vec!["y"], vec![], vec!["x"], vec![], vec![], vec![], vec!["z"]],
            )
            .numeric("price", &[Some(5), Some(15), Some(25), None, Some(35), Some(45), None, None])
            .build()
            .unwrap();
        FacetEngine::new(snapshot, FacetEngineConfig::default().with_execution(ExecutionMode::Inline))
            .unwrap()
    }

    #[test]
    fn test_strategy_selection() {
        let engine = engine();

        let spec = FacetSpec::new("letter");
        assert_eq!(engine.choose_strategy(&spec).unwrap(), CountStrategy::Ordinal);

        let spec = FacetSpec::new("tags");
        assert_eq!(engine.choose_strategy(&spec).unwrap(), CountStrategy::Enumerate);

        let spec = FacetSpec::new("letter").with_threads(2);
        assert_eq!(engine.choose_strategy(&spec).unwrap(), CountStrategy::PerSegment);

        let spec = FacetSpec::new("letter").with_strategy(CountStrategy::Enumerate);
        assert_eq!(engine.choose_strategy(&spec).unwrap(), CountStrategy::Enumerate);

        let spec = FacetSpec::new("tags").with_strategy(CountStrategy::Ordinal);
        assert!(matches!(
            engine.choose_strategy(&spec),
            Err(FacetryError::StrategyUnavailable(_))
        ));

        let err = engine.choose_strategy(&FacetSpec::new("nope")).unwrap_err();
        assert!(matches!(err, FacetryError::Field(_)));
    }

    #[test]
    fn test_ordinal_threshold_matches_per_segment() {
        let snapshot = MemoryIndexBuilder::new()
            .segment_size(3)
            .keyword("letter", &[Some("a"), Some("b"), Some("c")])
            .build()
            .unwrap();
        let config = FacetEngineConfig::default().with_ordinal_max_terms(3);
        assert!(!config.counts_by_ordinal(3));
        assert!(config.counts_by_ordinal(2));

        let options = SegmentCountOptions::from(&config);
        assert_eq!(options.counts_by_ordinal(3), config.counts_by_ordinal(3));
        assert_eq!(options.counts_by_ordinal(2), config.counts_by_ordinal(2));

        let engine = FacetEngine::new(snapshot, config).unwrap();
        let spec = FacetSpec::new("letter");
        assert_eq!(engine.choose_strategy(&spec).unwrap(), CountStrategy::Enumerate);
    }

    #[test]
    fn test_large_dictionary_is_enumerated() {
        let snapshot = MemoryIndexBuilder::new()
            .keyword("letter", &[Some("a"), Some("b"), Some("c")])
            .build()
            .unwrap();
        let config = FacetEngineConfig::default().with_ordinal_max_terms(3);
        let engine = FacetEngine::new(snapshot, config).unwrap();

        let spec = FacetSpec::new("letter");
        assert_eq!(engine.choose_strategy(&spec).unwrap(), CountStrategy::Enumerate);
    }

    #[test]
    fn test_limit_zero_still_reports_missing() {
        let engine = engine();
        let spec = FacetSpec::new("letter").with_limit(0).with_missing(true);
        let result = engine.compute_field_facet(&DocSet::full(8), &spec).unwrap();

        assert!(result.entries.is_empty());
        assert_eq!(result.missing, Some(2));
    }

    #[test]
    fn test_every_strategy_agrees() {
        let engine = engine();
        let base: DocSet = [0, 1, 3, 4, 6, 7].into_iter().collect();

        for sort in [FacetSort::Count, FacetSort::Index] {
            let results: Vec<_> = [
                CountStrategy::Ordinal,
                CountStrategy::Enumerate,
                CountStrategy::PerSegment,
            ]
            .into_iter()
            .map(|strategy| {
                let spec = FacetSpec::new("letter")
                    .unbounded()
                    .with_sort(sort)
                    .with_missing(true)
                    .with_strategy(strategy);
                engine.compute_field_facet(&base, &spec).unwrap()
            })
            .collect();

            assert_eq!(results[0], results[1]);
            assert_eq!(results[0], results[2]);
            assert_eq!(results[0].missing, Some(2));
        }
    }

    #[test]
    fn test_range_facet_needs_numeric_field() {
        let engine = engine();
        let spec = RangeSpec::new("letter", "0", "10", "5");
        let err = engine.compute_range_facet(&DocSet::full(8), &spec).unwrap_err();
        assert!(matches!(err, FacetryError::Field(_)));

        let spec = RangeSpec::new("price", "0", "50", "20");
        let result = engine.compute_range_facet(&DocSet::full(8), &spec).unwrap();
        assert_eq!(
            result.pairs(),
            vec![("0".to_string(), 2), ("20".to_string(), 2), ("40".to_string(), 1)]
        );
        assert_eq!(result.effective_end, "60");
    }

    #[test]
    fn test_first_error_keeps_earlier_results() {
        let engine = engine();
        let fields = [
            FacetSpec::new("letter"),
            FacetSpec::new("missing_field"),
            FacetSpec::new("tags"),
        ];
        let ranges = [RangeSpec::new("price", "0", "50", "10")];

        let response = engine.compute_facets(&DocSet::full(8), &fields, &ranges);
        assert!(!response.is_ok());
        assert!(matches!(response.error, Some(FacetryError::Field(_))));
        assert_eq!(response.field_facets.len(), 1);
        assert!(response.field_facets.contains_key("letter"));
        assert!(response.range_facets.is_empty());
    }

    #[test]
    fn test_cancelled_request() {
        let engine = engine();
        let cancel = Cancellation::new();
        cancel.cancel();

        let fields = [FacetSpec::new("letter")];
        let response = engine.compute_facets_cancellable(&DocSet::full(8), &fields, &[], &cancel);
        assert!(response.error.as_ref().is_some_and(FacetryError::is_cancelled));
        assert!(response.field_facets.is_empty());

        let spec = RangeSpec::new("price", "0", "50", "10");
        let err = engine
            .compute_range_facet_cancellable(&DocSet::full(8), &spec, &cancel)
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_cancelling_one_request_spares_the_next() {
        let engine = engine();
        let abandoned = Cancellation::new();
        abandoned.cancel();

        let fields = [FacetSpec::new("letter").with_threads(2)];
        let response = engine.compute_facets_cancellable(&DocSet::full(8), &fields, &[], &abandoned);
        assert!(response.error.as_ref().is_some_and(FacetryError::is_cancelled));

        let response = engine.compute_field_facets(&DocSet::full(8), &fields);
        assert!(response.is_ok());
        assert_eq!(
            response.field_facets["letter"].pairs(),
            vec![("c".to_string(), 3), ("b".to_string(), 2), ("a".to_string(), 1)]
        );
    }

    #[test]
    fn test_date_range_uses_fixed_clock() {
        let day = 86_400_000i64;
        let now = Utc.with_ymd_and_hms(2002, 2, 4, 9, 30, 0).unwrap();
        let feb1 = Utc.with_ymd_and_hms(2002, 2, 1, 0, 0, 0).unwrap();
        let dates: Vec<_> = [0, day, day + 1, 2 * day]
            .iter()
            .map(|offset| Some(feb1 + chrono::TimeDelta::milliseconds(*offset)))
            .collect();

        let snapshot = MemoryIndexBuilder::new().date("published", &dates).build().unwrap();
        let engine = FacetEngine::new(snapshot, FacetEngineConfig::default())
            .unwrap()
            .with_fixed_now(now);

        let spec = RangeSpec::date("published", "NOW/DAY-3DAYS", "NOW/DAY", "+1DAY");
        let response = engine.compute_range_facets(&DocSet::full(4), &[spec]);
        let result = &response.range_facets["published"];

        assert_eq!(
            result.pairs(),
            vec![
                ("2002-02-01T00:00:00Z".to_string(), 1),
                ("2002-02-02T00:00:00Z".to_string(), 2),
                ("2002-02-03T00:00:00Z".to_string(), 1),
            ]
        );
        assert_eq!(result.effective_end, "2002-02-04T00:00:00Z");
    }
}
