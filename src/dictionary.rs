//! In-memory term dictionaries.
//!
//! [`MemoryTermCursor`] walks a sorted list of terms and is the simplest
//! [`TermCursor`] a segment can hand to the merge queue. [`MemoryTermDictionary`]
//! collects the output of a [`TermMerger`](crate::term_merge::TermMerger).

use serde::{Deserialize, Serialize};

use crate::cursor::TermCursor;
use crate::error::Result;
use crate::term::Term;
use crate::term_merge::TermDictionaryWriter;

/// Cursor over an in-memory `(term, doc_freq)` list.
///
/// Positioned on the smallest term when created.
#[derive(Debug, Clone)]
pub struct MemoryTermCursor {
    entries: Vec<(Term, u64)>,
    position: usize,
}

impl MemoryTermCursor {
    /// Create a cursor. Entries are sorted by term; for duplicate terms the
    /// first entry wins.
    pub fn new(mut entries: Vec<(Term, u64)>) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|a, b| a.0 == b.0);
        MemoryTermCursor {
            entries,
            position: 0,
        }
    }

    /// Build a single-field cursor from `(text, doc_freq)` pairs.
    pub fn from_field(field: &str, terms: &[(&str, u64)]) -> Self {
        Self::new(
            terms
                .iter()
                .map(|&(text, df)| (Term::new(field, text), df))
                .collect(),
        )
    }

    /// Number of terms in the dictionary.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the dictionary has no terms.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TermCursor for MemoryTermCursor {
    fn term(&self) -> Option<&Term> {
        self.entries.get(self.position).map(|(t, _)| t)
    }

    fn doc_freq(&self) -> u64 {
        self.entries.get(self.position).map_or(0, |(_, df)| *df)
    }

    fn next_term(&mut self) -> Result<bool> {
        assert!(
            self.position < self.entries.len(),
            "next_term called on an exhausted term cursor"
        );
        self.position += 1;
        Ok(self.position < self.entries.len())
    }

    fn skip_to(&mut self, target: &Term) -> Result<bool> {
        match self.entries.get(self.position) {
            Some((current, _)) => assert!(
                target >= current,
                "skip_to({target}) behind current term {current}"
            ),
            None => panic!("skip_to called on an exhausted term cursor"),
        }
        let rest = &self.entries[self.position..];
        self.position += rest.partition_point(|(t, _)| t < target);
        Ok(self.position < self.entries.len())
    }
}

/// One entry of a merged dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedTerm {
    /// The term.
    pub term: Term,
    /// Sum of the per-segment document frequencies.
    pub doc_freq: u64,
    /// Origins of the segments that contained the term, ascending.
    pub origins: Vec<u64>,
}

/// A [`TermDictionaryWriter`] that keeps everything in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryTermDictionary {
    terms: Vec<MergedTerm>,
}

impl MemoryTermDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// The written terms, in write order.
    pub fn terms(&self) -> &[MergedTerm] {
        &self.terms
    }

    /// Look up a term.
    pub fn get(&self, term: &Term) -> Option<&MergedTerm> {
        self.terms
            .binary_search_by(|entry| entry.term.cmp(term))
            .ok()
            .map(|i| &self.terms[i])
    }

    /// Turn the dictionary back into a cursor, e.g. to merge it again.
    pub fn into_cursor(self) -> MemoryTermCursor {
        MemoryTermCursor::new(
            self.terms
                .into_iter()
                .map(|entry| (entry.term, entry.doc_freq))
                .collect(),
        )
    }
}

impl TermDictionaryWriter for MemoryTermDictionary {
    fn add_term(&mut self, term: &Term, doc_freq: u64, origins: &[u64]) -> Result<()> {
        self.terms.push(MergedTerm {
            term: term.clone(),
            doc_freq,
            origins: origins.to_vec(),
        });
        Ok(())
    }
}
