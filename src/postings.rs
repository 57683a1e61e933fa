//! In-memory posting lists and the leaf cursors built on them.

use crate::cursor::{DocCursor, DocId, NO_MORE_DOCS, ScoredCursor};
use crate::error::Result;
use crate::scoring::Bm25Weight;

/// A single posting in a posting list.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    /// Document ID.
    pub doc_id: DocId,
    /// Term frequency in the document.
    pub frequency: u32,
    /// Number of tokens in the document's field.
    pub field_length: u32,
}

impl Posting {
    /// Create a new posting.
    pub fn new(doc_id: DocId) -> Self {
        Posting {
            doc_id,
            frequency: 1,
            field_length: 1,
        }
    }

    /// Create a new posting with frequency.
    pub fn with_frequency(doc_id: DocId, frequency: u32) -> Self {
        Posting {
            doc_id,
            frequency,
            field_length: 1,
        }
    }

    /// Set the field length.
    pub fn field_length(mut self, field_length: u32) -> Self {
        self.field_length = field_length;
        self
    }
}

/// Cursor over an in-memory posting list.
///
/// Positioned on the first posting when created.
#[derive(Debug, Clone)]
pub struct PostingCursor {
    postings: Vec<Posting>,
    position: usize,
}

impl PostingCursor {
    /// Create a cursor. Postings are sorted by document and duplicates dropped.
    ///
    /// Panics if a posting uses the reserved [`NO_MORE_DOCS`] id.
    pub fn new(mut postings: Vec<Posting>) -> Self {
        assert!(
            postings.iter().all(|p| p.doc_id != NO_MORE_DOCS),
            "doc id {NO_MORE_DOCS} is reserved for exhausted cursors"
        );
        postings.sort_by_key(|p| p.doc_id);
        postings.dedup_by_key(|p| p.doc_id);
        PostingCursor {
            postings,
            position: 0,
        }
    }

    /// The posting under the cursor.
    pub fn current(&self) -> Option<&Posting> {
        self.postings.get(self.position)
    }

    /// Get the term frequency for the current document.
    pub fn term_freq(&self) -> u32 {
        self.current().map_or(0, |p| p.frequency)
    }
}

impl DocCursor for PostingCursor {
    fn doc_id(&self) -> DocId {
        self.current().map_or(NO_MORE_DOCS, |p| p.doc_id)
    }

    fn next_doc(&mut self) -> Result<DocId> {
        assert!(
            self.position < self.postings.len(),
            "next_doc called on an exhausted posting cursor"
        );
        self.position += 1;
        Ok(self.doc_id())
    }

    fn skip_to(&mut self, target: DocId) -> Result<DocId> {
        let current = self.doc_id();
        assert!(
            current != NO_MORE_DOCS,
            "skip_to called on an exhausted posting cursor"
        );
        assert!(
            target >= current,
            "skip_to({target}) behind current document {current}"
        );

        let rest = &self.postings[self.position..];
        self.position += rest.partition_point(|p| p.doc_id < target);
        Ok(self.doc_id())
    }

    fn cost(&self) -> u64 {
        self.postings.len() as u64
    }
}

/// A BM25-scored term leaf: one term's postings plus its weight.
#[derive(Debug, Clone)]
pub struct TermScorer {
    postings: PostingCursor,
    weight: Bm25Weight,
}

impl TermScorer {
    /// Create a term scorer.
    pub fn new(postings: PostingCursor, weight: Bm25Weight) -> Self {
        TermScorer { postings, weight }
    }

    /// Get the term frequency for the current document.
    pub fn term_freq(&self) -> u32 {
        self.postings.term_freq()
    }
}

impl DocCursor for TermScorer {
    fn doc_id(&self) -> DocId {
        self.postings.doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.postings.next_doc()
    }

    fn skip_to(&mut self, target: DocId) -> Result<DocId> {
        self.postings.skip_to(target)
    }

    fn cost(&self) -> u64 {
        self.postings.cost()
    }
}

impl ScoredCursor for TermScorer {
    fn score(&self) -> f32 {
        self.postings
            .current()
            .map_or(0.0, |p| self.weight.score(p.frequency, p.field_length))
    }
}
