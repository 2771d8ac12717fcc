//! Term dictionary enumeration API.
//!
//! A [`TermDictionary`] gives sorted access to a field's distinct values with
//! their document frequency and postings, similar to Lucene's Terms and
//! TermsEnum. Multi-valued fields are counted through this API since they
//! have no per-document ordinal.

use std::collections::BTreeMap;

use crate::error::Result;

/// A term and the number of documents holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermInfo {
    /// The term bytes
    pub term: Vec<u8>,
    /// Number of documents containing this term
    pub doc_freq: u64,
}

/// Cursor over the terms of one field, in ascending byte order.
pub trait TermCursor: Send {
    /// Position the cursor so that the next call to [`next`](Self::next)
    /// returns the first term `>= target`.
    fn seek(&mut self, target: &[u8]) -> Result<()>;

    /// Advance to the next term.
    ///
    /// Returns `None` when there are no more terms.
    fn next(&mut self) -> Result<Option<TermInfo>>;

    /// Documents holding the term most recently returned by `next`, in
    /// ascending order.
    fn postings(&self) -> Result<Box<dyn Iterator<Item = u32> + '_>>;
}

/// Access to the term dictionary of a field.
pub trait TermDictionary: Send + Sync {
    /// Get a cursor positioned before the first term.
    fn cursor(&self) -> Result<Box<dyn TermCursor + '_>>;

    /// Get the number of unique terms in this field.
    ///
    /// Returns `None` if the count is not available or too expensive to compute.
    fn num_terms(&self) -> Option<u64>;
}

/// Term dictionary held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTermDictionary {
    /// Terms in ascending order with their sorted postings.
    terms: Vec<(Vec<u8>, Vec<u32>)>,
}

impl MemoryTermDictionary {
    /// Build a dictionary from `(doc, term)` pairs. A document may hold any
    /// number of terms; duplicates are collapsed.
    pub fn from_doc_values<I, V>(doc_values: I) -> Self
    where
        I: IntoIterator<Item = (u32, V)>,
        V: Into<Vec<u8>>,
    {
        let mut postings: BTreeMap<Vec<u8>, Vec<u32>> = BTreeMap::new();
        for (doc, term) in doc_values {
            postings.entry(term.into()).or_default().push(doc);
        }

        let terms = postings
            .into_iter()
            .map(|(term, mut docs)| {
                docs.sort_unstable();
                docs.dedup();
                (term, docs)
            })
            .collect();

        MemoryTermDictionary { terms }
    }

    /// Postings of an exact term.
    pub fn postings_of(&self, term: &[u8]) -> Option<&[u32]> {
        self.terms
            .binary_search_by(|(t, _)| t.as_slice().cmp(term))
            .ok()
            .map(|idx| self.terms[idx].1.as_slice())
    }
}

impl TermDictionary for MemoryTermDictionary {
    fn cursor(&self) -> Result<Box<dyn TermCursor + '_>> {
        Ok(Box::new(MemoryTermCursor {
            terms: &self.terms,
            position: 0,
            current: None,
        }))
    }

    fn num_terms(&self) -> Option<u64> {
        Some(self.terms.len() as u64)
    }
}

/// Cursor over a [`MemoryTermDictionary`].
struct MemoryTermCursor<'a> {
    terms: &'a [(Vec<u8>, Vec<u32>)],
    /// Index of the term the next call to `next` returns.
    position: usize,
    /// Index of the term last returned by `next`.
    current: Option<usize>,
}

impl TermCursor for MemoryTermCursor<'_> {
    fn seek(&mut self, target: &[u8]) -> Result<()> {
        self.position = self
            .terms
            .partition_point(|(term, _)| term.as_slice() < target);
        self.current = None;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<TermInfo>> {
        let Some((term, docs)) = self.terms.get(self.position) else {
            self.current = None;
            return Ok(None);
        };

        self.current = Some(self.position);
        self.position += 1;

        Ok(Some(TermInfo {
            term: term.clone(),
            doc_freq: docs.len() as u64,
        }))
    }

    fn postings(&self) -> Result<Box<dyn Iterator<Item = u32> + '_>> {
        let docs = match self.current {
            Some(idx) => self.terms[idx].1.as_slice(),
            None => &[],
        };
        Ok(Box::new(docs.iter().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryTermDictionary {
        MemoryTermDictionary::from_doc_values(vec![
            (0, "rust"),
            (0, "search"),
            (1, "rust"),
            (2, "facet"),
            (2, "rust"),
            (2, "rust"),
        ])
    }

    #[test]
    fn test_iterates_in_order() {
        let dict = sample();
        let mut cursor = dict.cursor().unwrap();

        let mut seen = Vec::new();
        while let Some(info) = cursor.next().unwrap() {
            seen.push((String::from_utf8(info.term).unwrap(), info.doc_freq));
        }

        assert_eq!(
            seen,
            vec![
                ("facet".to_string(), 1),
                ("rust".to_string(), 3),
                ("search".to_string(), 1)
            ]
        );
        assert_eq!(dict.num_terms(), Some(3));
    }

    #[test]
    fn test_seek_and_postings() {
        let dict = sample();
        let mut cursor = dict.cursor().unwrap();

        cursor.seek(b"r").unwrap();
        let info = cursor.next().unwrap().unwrap();
        assert_eq!(info.term, b"rust");
        assert_eq!(cursor.postings().unwrap().collect::<Vec<_>>(), vec![0, 1, 2]);

        cursor.seek(b"zzz").unwrap();
        assert!(cursor.next().unwrap().is_none());
        assert_eq!(cursor.postings().unwrap().count(), 0);
    }

    #[test]
    fn test_postings_of() {
        let dict = sample();
        assert_eq!(dict.postings_of(b"facet"), Some(&[2u32][..]));
        assert_eq!(dict.postings_of(b"missing"), None);
    }
}
