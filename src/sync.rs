//! Serialized access to a single cursor from several threads.
//!
//! Cursors and mergers are single-writer. When one logical result stream has
//! to be pulled from several threads, every advance and the read that follows
//! it must happen inside one critical section, otherwise a thread can read a
//! score that belongs to a document another thread has already moved past.
//! [`SharedCursor`] provides exactly that.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::cursor::{DocId, NO_MORE_DOCS, ScoredCursor};
use crate::error::Result;

#[derive(Debug)]
struct Shared<C> {
    cursor: C,
    /// Whether the initial position has been handed out.
    started: bool,
}

/// A scored cursor shared between threads behind a mutex.
#[derive(Debug)]
pub struct SharedCursor<C> {
    inner: Arc<Mutex<Shared<C>>>,
}

impl<C> Clone for SharedCursor<C> {
    fn clone(&self) -> Self {
        SharedCursor {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: ScoredCursor> SharedCursor<C> {
    /// Wrap an already-positioned cursor.
    pub fn new(cursor: C) -> Self {
        SharedCursor {
            inner: Arc::new(Mutex::new(Shared {
                cursor,
                started: false,
            })),
        }
    }

    /// Hand out the next document and its score.
    ///
    /// The first call yields the cursor's initial position. Returns `None`
    /// once the cursor is exhausted.
    pub fn next_scored(&self) -> Result<Option<(DocId, f32)>> {
        let mut shared = self.inner.lock();
        let doc = if !shared.started {
            shared.started = true;
            shared.cursor.doc_id()
        } else if shared.cursor.is_exhausted() {
            NO_MORE_DOCS
        } else {
            shared.cursor.next_doc()?
        };

        if doc == NO_MORE_DOCS {
            return Ok(None);
        }
        Ok(Some((doc, shared.cursor.score())))
    }

    /// Run `f` on the cursor while holding the lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        let mut shared = self.inner.lock();
        f(&mut shared.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::DocCursor;
    use crate::disjunction::DisjunctionMerger;
    use crate::postings::{Posting, PostingCursor, TermScorer};
    use crate::scoring::{Bm25Params, Bm25Weight};
    use std::thread;

    fn scorer(doc_ids: impl Iterator<Item = DocId>) -> TermScorer {
        let postings = PostingCursor::new(doc_ids.map(Posting::new).collect());
        TermScorer::new(
            postings,
            Bm25Weight::new(Bm25Params::default(), 10, 1000, 1.0, 1.0),
        )
    }

    #[test]
    fn test_first_call_returns_initial_position() {
        let shared = SharedCursor::new(scorer([4, 9].into_iter()));
        assert_eq!(shared.next_scored().unwrap().map(|(d, _)| d), Some(4));
        assert_eq!(shared.next_scored().unwrap().map(|(d, _)| d), Some(9));
        assert!(shared.next_scored().unwrap().is_none());
        assert!(shared.next_scored().unwrap().is_none());
    }

    #[test]
    fn test_concurrent_pull_yields_each_doc_once() {
        let merger = DisjunctionMerger::new(
            vec![
                scorer((0..300).step_by(2)),
                scorer((0..300).step_by(3)),
                scorer((0..300).step_by(5)),
            ],
            0.5,
        )
        .unwrap();
        let shared = SharedCursor::new(merger);

        let mut pulled: Vec<DocId> = thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let shared = shared.clone();
                    s.spawn(move || {
                        let mut docs = Vec::new();
                        while let Some((doc, score)) = shared.next_scored().unwrap() {
                            assert!(score > 0.0);
                            docs.push(doc);
                        }
                        docs
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });
        pulled.sort_unstable();

        let expected: Vec<DocId> = (0..300)
            .filter(|d| d % 2 == 0 || d % 3 == 0 || d % 5 == 0)
            .collect();
        assert_eq!(pulled, expected);
        assert!(shared.with(|c| c.is_exhausted()));
    }
}
