//! Cursor traits shared by every merger in the crate.
//!
//! A cursor is a stateful, forward-only iterator positioned on a key inside a
//! strictly increasing sequence. It starts out already positioned on its first
//! key (or exhausted) and only ever moves forward:
//!
//! - [`DocCursor`] walks document ids and supports skipping ahead.
//! - [`ScoredCursor`] adds a score for the current document.
//! - [`TermCursor`] walks a term dictionary in [`Term`] order and exposes the
//!   document frequency of the current term.
//!
//! Once a cursor is exhausted it never comes back. For document cursors the
//! exhausted position is [`NO_MORE_DOCS`], which sorts after every real id;
//! term cursors report `None`.
//!
//! Cursors are single-writer: exactly one owner advances a given cursor. See
//! [`crate::sync::SharedCursor`] for callers that need to share one.

use std::fmt::Debug;

use crate::error::Result;
use crate::term::Term;

/// Document identifier within one index segment.
pub type DocId = u64;

/// Sentinel position of an exhausted document cursor.
pub const NO_MORE_DOCS: DocId = DocId::MAX;

/// Position cursor over document ids.
pub trait DocCursor: Send + Debug {
    /// Get the current document ID, or [`NO_MORE_DOCS`] once exhausted.
    fn doc_id(&self) -> DocId;

    /// Move to the next document strictly after the current one.
    ///
    /// Returns the new position. Calling this on an exhausted cursor is a
    /// protocol error: leaf cursors panic, mergers stay exhausted.
    fn next_doc(&mut self) -> Result<DocId>;

    /// Move to the first document >= `target`.
    ///
    /// Must land on the same document repeated [`next_doc`](Self::next_doc)
    /// calls would. `target` must not be behind the current position; this
    /// is checked with an assertion.
    fn skip_to(&mut self, target: DocId) -> Result<DocId>;

    /// Estimated number of documents this cursor may still produce.
    fn cost(&self) -> u64 {
        0
    }

    /// Check if this cursor is exhausted.
    fn is_exhausted(&self) -> bool {
        self.doc_id() == NO_MORE_DOCS
    }
}

/// A document cursor that can score its current document.
pub trait ScoredCursor: DocCursor {
    /// Score of the current document.
    ///
    /// Only meaningful while the cursor is positioned on a real document.
    fn score(&self) -> f32;
}

/// Position cursor over one segment's term dictionary.
pub trait TermCursor: Send + Debug {
    /// The current term, or `None` once exhausted.
    fn term(&self) -> Option<&Term>;

    /// Number of documents containing the current term in this segment.
    fn doc_freq(&self) -> u64;

    /// Move to the next term. Returns `false` when the dictionary is exhausted.
    fn next_term(&mut self) -> Result<bool>;

    /// Move to the first term >= `target`. Returns `false` when none exists.
    ///
    /// Panics if the cursor is exhausted or `target` is behind the current
    /// term.
    fn skip_to(&mut self, target: &Term) -> Result<bool> {
        match self.term() {
            Some(current) => assert!(
                target >= current,
                "skip_to({target}) behind current term {current}"
            ),
            None => panic!("skip_to called on an exhausted term cursor"),
        }
        while let Some(term) = self.term() {
            if term >= target {
                return Ok(true);
            }
            if !self.next_term()? {
                return Ok(false);
            }
        }
        Ok(false)
    }

    /// Release whatever the cursor holds open.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<C: DocCursor + ?Sized> DocCursor for Box<C> {
    fn doc_id(&self) -> DocId {
        (**self).doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        (**self).next_doc()
    }

    fn skip_to(&mut self, target: DocId) -> Result<DocId> {
        (**self).skip_to(target)
    }

    fn cost(&self) -> u64 {
        (**self).cost()
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }
}

impl<C: ScoredCursor + ?Sized> ScoredCursor for Box<C> {
    fn score(&self) -> f32 {
        (**self).score()
    }
}

impl<C: TermCursor + ?Sized> TermCursor for Box<C> {
    fn term(&self) -> Option<&Term> {
        (**self).term()
    }

    fn doc_freq(&self) -> u64 {
        (**self).doc_freq()
    }

    fn next_term(&mut self) -> Result<bool> {
        (**self).next_term()
    }

    fn skip_to(&mut self, target: &Term) -> Result<bool> {
        (**self).skip_to(target)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
