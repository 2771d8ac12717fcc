//! Counting by term enumeration.
//!
//! Walks the field's term dictionary in order and, for each term, counts how
//! many of its documents belong to the base set. Works for multi-valued
//! fields and for dictionaries too large for an ordinal count array.

use crate::error::Result;
use crate::facet::executor::Cancellation;
use crate::facet::selector::CountSink;
use crate::store::doc_set::DocSet;
use crate::store::filter_cache::{FilterCache, FilterKey};
use crate::store::terms::TermDictionary;

/// Counts values by walking a [`TermDictionary`].
#[derive(Clone, Copy)]
pub struct EnumerationCounter<'a> {
    field: &'a str,
    dictionary: &'a dyn TermDictionary,
    prefix: Option<&'a [u8]>,
    cache: Option<(&'a FilterCache, u64)>,
    cache_min_df: u64,
}

impl<'a> EnumerationCounter<'a> {
    pub fn new(field: &'a str, dictionary: &'a dyn TermDictionary) -> Self {
        EnumerationCounter {
            field,
            dictionary,
            prefix: None,
            cache: None,
            cache_min_df: u64::MAX,
        }
    }

    /// Restrict counting to terms starting with `prefix`.
    pub fn with_prefix(mut self, prefix: Option<&'a [u8]>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    /// Intersect terms with at least `min_df` documents through `cache`,
    /// under the given cache scope.
    pub fn with_filter_cache(mut self, cache: &'a FilterCache, scope: u64, min_df: u64) -> Self {
        self.cache = Some((cache, scope));
        self.cache_min_df = min_df;
        self
    }

    /// Count the base set and feed `(term, count)` pairs to `sink` in term
    /// order.
    pub fn count_into(
        &self,
        base: &DocSet,
        cancel: &Cancellation,
        sink: &mut dyn CountSink,
    ) -> Result<()> {
        let mut cursor = self.dictionary.cursor()?;
        if let Some(prefix) = self.prefix {
            cursor.seek(prefix)?;
        }

        let base_len = base.len();
        while let Some(info) = cursor.next()? {
            if self.prefix.is_some_and(|p| !info.term.starts_with(p)) {
                break;
            }
            if sink.is_saturated() {
                break;
            }
            cancel.check()?;

            if !sink.can_admit(info.doc_freq.min(base_len)) {
                continue;
            }

            let count = match self.cache {
                Some((cache, scope)) if info.doc_freq >= self.cache_min_df => {
                    let key = FilterKey::new(scope, self.field, &info.term);
                    let docs = cache.get_or_insert_with(key, || {
                        Ok(cursor.postings()?.collect::<DocSet>())
                    })?;
                    base.intersection_len(&docs)
                }
                _ => cursor.postings()?.filter(|&doc| base.contains(doc)).count() as u64,
            };

            sink.accept(&info.term, count);
        }

        Ok(())
    }
}
