//! K-way merge of per-segment term dictionaries.
//!
//! Merging segments needs every distinct term across all input segments
//! exactly once, in term order, together with the set of segments that
//! contain it. [`TermMergeQueue`] keeps one [`MergeSource`] per segment in a
//! [`CursorHeap`] ordered by current term and then by the segment's `origin`,
//! so equal terms always come out in the same order regardless of how the heap
//! happens to be laid out.
//!
//! The queue is drained group by group:
//!
//! ```
//! use lexmerge::dictionary::MemoryTermCursor;
//! use lexmerge::term_merge::{MergeSource, TermMergeQueue};
//!
//! let a = MemoryTermCursor::from_field("body", &[("apple", 2), ("cherry", 1)]);
//! let b = MemoryTermCursor::from_field("body", &[("banana", 4), ("cherry", 3)]);
//! let mut queue = TermMergeQueue::new(vec![MergeSource::new(0, a), MergeSource::new(1, b)]).unwrap();
//!
//! let mut seen = Vec::new();
//! while let Some(group) = queue.pop_next_group() {
//!     seen.push((group.term().text().to_string(), group.doc_freq()));
//!     queue.advance_group(group).unwrap();
//! }
//! queue.close().unwrap();
//!
//! assert_eq!(seen, vec![
//!     ("apple".to_string(), 2),
//!     ("banana".to_string(), 4),
//!     ("cherry".to_string(), 4),
//! ]);
//! ```
//!
//! [`TermMerger`] wraps that loop and writes the merged dictionary to a
//! [`TermDictionaryWriter`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::TermMergeConfig;
use crate::cursor::TermCursor;
use crate::error::{LexMergeError, Result};
use crate::heap::CursorHeap;
use crate::term::Term;

/// One segment's term cursor together with its merge tie-break.
#[derive(Debug)]
pub struct MergeSource<C: TermCursor = Box<dyn TermCursor>> {
    origin: u64,
    cursor: C,
}

impl<C: TermCursor> MergeSource<C> {
    /// Pair a positioned cursor with its segment's origin.
    pub fn new(origin: u64, cursor: C) -> Self {
        MergeSource { origin, cursor }
    }

    /// The segment's origin.
    pub fn origin(&self) -> u64 {
        self.origin
    }

    /// The current term.
    pub fn term(&self) -> Option<&Term> {
        self.cursor.term()
    }

    /// Document frequency of the current term in this segment.
    pub fn doc_freq(&self) -> u64 {
        self.cursor.doc_freq()
    }

    /// Get the underlying cursor.
    pub fn cursor(&self) -> &C {
        &self.cursor
    }

    /// Get the underlying cursor mutably, e.g. to read the current term's
    /// postings. Moving the cursor is left to the queue.
    pub fn cursor_mut(&mut self) -> &mut C {
        &mut self.cursor
    }
}

type SourceOrder<C> = fn(&MergeSource<C>, &MergeSource<C>) -> bool;

fn term_order<C: TermCursor>(a: &MergeSource<C>, b: &MergeSource<C>) -> bool {
    match (a.term(), b.term()) {
        (Some(x), Some(y)) => match x.cmp(y) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => a.origin < b.origin,
        },
        // Exhausted sorts last.
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Every source positioned on the same term, ordered by origin.
#[derive(Debug)]
pub struct TermGroup<C: TermCursor = Box<dyn TermCursor>> {
    term: Term,
    members: Vec<MergeSource<C>>,
}

impl<C: TermCursor> TermGroup<C> {
    /// The shared term.
    pub fn term(&self) -> &Term {
        &self.term
    }

    /// The contributing sources, by ascending origin.
    pub fn members(&self) -> &[MergeSource<C>] {
        &self.members
    }

    /// Mutable access to the contributing sources.
    pub fn members_mut(&mut self) -> &mut [MergeSource<C>] {
        &mut self.members
    }

    /// Number of contributing sources.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Sum of the members' document frequencies.
    pub fn doc_freq(&self) -> u64 {
        self.members.iter().map(|m| m.doc_freq()).sum()
    }

    /// Origins of the contributing sources, ascending.
    pub fn origins(&self) -> impl Iterator<Item = u64> + '_ {
        self.members.iter().map(|m| m.origin)
    }
}

/// Merges the term dictionaries of several segments.
///
/// Every cursor handed to the queue is closed by it: exhausted ones as soon
/// as they run dry, the rest on [`close`](Self::close) (or on drop).
#[derive(Debug)]
pub struct TermMergeQueue<C: TermCursor = Box<dyn TermCursor>> {
    heap: CursorHeap<MergeSource<C>, SourceOrder<C>>,
    /// Recycled buffer for the next group.
    spare: Vec<MergeSource<C>>,
    /// Sources that failed mid-advance, kept until close.
    retired: Vec<MergeSource<C>>,
    sources: usize,
    closed: bool,
}

impl<C: TermCursor> TermMergeQueue<C> {
    /// Build a queue over sources already positioned on their first term.
    ///
    /// Sources whose dictionary is empty are closed right away. If any of
    /// those closes fail, every other source is closed as well and the
    /// collected failures are returned.
    pub fn new(sources: Vec<MergeSource<C>>) -> Result<Self> {
        let count = sources.len();
        let mut live = Vec::with_capacity(count);
        let mut errors = Vec::new();
        for mut source in sources {
            if source.term().is_some() {
                live.push(source);
            } else if let Err(e) = source.cursor.close() {
                errors.push(e);
            }
        }

        if !errors.is_empty() {
            for mut source in live {
                if let Err(e) = source.cursor.close() {
                    errors.push(e);
                }
            }
            return Err(LexMergeError::close_failure(errors));
        }

        let heap = CursorHeap::from_vec(live, term_order::<C> as SourceOrder<C>);
        log::debug!(
            "term merge queue over {} source(s), {} non-empty",
            count,
            heap.len()
        );

        Ok(TermMergeQueue {
            spare: Vec::with_capacity(heap.len()),
            heap,
            retired: Vec::new(),
            sources: count,
            closed: false,
        })
    }

    /// Number of sources the queue was built with.
    pub fn source_count(&self) -> usize {
        self.sources
    }

    /// Number of sources still positioned on a term.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Check if every source is exhausted.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The smallest pending term.
    pub fn peek_term(&self) -> Option<&Term> {
        self.heap.peek().and_then(|s| s.term())
    }

    /// Check the heap property over the queued sources.
    pub fn is_heap(&self) -> bool {
        self.heap.is_heap()
    }

    /// Pop every source positioned on the smallest pending term.
    ///
    /// The members stay on that term until the group is handed back through
    /// [`advance_group`](Self::advance_group).
    pub fn pop_next_group(&mut self) -> Option<TermGroup<C>> {
        let first = self.heap.remove_root()?;
        let Some(term) = first.term().cloned() else {
            self.retired.push(first);
            return None;
        };

        let mut members = std::mem::take(&mut self.spare);
        members.push(first);
        while let Some(top) = self.heap.peek() {
            if top.term() != Some(&term) {
                break;
            }
            if let Some(source) = self.heap.remove_root() {
                members.push(source);
            }
        }

        log::trace!("term {} from {} source(s)", term, members.len());
        Some(TermGroup { term, members })
    }

    /// Move every member of `group` to its next term and queue it again.
    ///
    /// Members that run out of terms are closed. Close failures are collected
    /// and reported once every member has been handled. A failure to advance
    /// is returned as-is; the failed member and the ones not yet advanced are
    /// kept for [`close`](Self::close).
    pub fn advance_group(&mut self, group: TermGroup<C>) -> Result<()> {
        let mut members = group.members;
        let mut errors = Vec::new();
        let mut pending = members.drain(..);

        while let Some(mut source) = pending.next() {
            match source.cursor.next_term() {
                // A cursor reporting more terms without one is exhausted too.
                Ok(true) if source.term().is_some() => self.heap.push(source),
                Ok(_) => {
                    if let Err(e) = source.cursor.close() {
                        errors.push(e);
                    }
                }
                Err(e) => {
                    self.retired.push(source);
                    self.retired.extend(pending);
                    for close_error in errors {
                        log::warn!("closing exhausted term cursor failed: {close_error}");
                    }
                    return Err(e);
                }
            }
        }
        drop(pending);

        self.spare = members;
        LexMergeError::from_close_errors(errors)
    }

    /// Hand a group back without advancing it; its members are closed
    /// together with the rest of the queue.
    pub fn abandon_group(&mut self, group: TermGroup<C>) {
        self.retired.extend(group.members);
    }

    /// Close every cursor still held by the queue.
    ///
    /// All cursors are attempted even if some fail; the failures are returned
    /// together.
    pub fn close(&mut self) -> Result<()> {
        self.closed = true;
        let mut errors = Vec::new();
        for mut source in self.heap.drain().chain(self.retired.drain(..)) {
            if let Err(e) = source.cursor.close() {
                errors.push(e);
            }
        }
        LexMergeError::from_close_errors(errors)
    }
}

impl<C: TermCursor> Drop for TermMergeQueue<C> {
    fn drop(&mut self) {
        if self.closed && self.heap.is_empty() && self.retired.is_empty() {
            return;
        }
        if let Err(e) = self.close() {
            log::warn!("closing term merge queue on drop failed: {e}");
        }
    }
}

/// Destination of a merged term dictionary.
pub trait TermDictionaryWriter {
    /// Write one merged term. Terms arrive in strictly increasing order.
    fn add_term(&mut self, term: &Term, doc_freq: u64, origins: &[u64]) -> Result<()>;
}

/// Statistics about a dictionary merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermMergeStats {
    /// Number of input segments.
    pub sources: usize,

    /// Distinct terms written.
    pub terms_merged: u64,

    /// Distinct terms skipped because no document contained them.
    pub terms_dropped: u64,

    /// Terms present in more than one segment.
    pub shared_terms: u64,

    /// Sum of the written document frequencies.
    pub total_doc_freq: u64,
}

/// Drains a [`TermMergeQueue`] into a [`TermDictionaryWriter`].
#[derive(Debug, Clone, Default)]
pub struct TermMerger {
    config: TermMergeConfig,
}

impl TermMerger {
    /// Create a merger with the given configuration.
    pub fn new(config: TermMergeConfig) -> Self {
        TermMerger { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &TermMergeConfig {
        &self.config
    }

    /// Merge every term of `queue` into `writer` and close the queue.
    ///
    /// A cursor or writer failure takes precedence over close failures.
    pub fn merge<C, W>(&self, mut queue: TermMergeQueue<C>, writer: &mut W) -> Result<TermMergeStats>
    where
        C: TermCursor,
        W: TermDictionaryWriter + ?Sized,
    {
        let drained = self.drain(&mut queue, writer);
        let closed = queue.close();
        let stats = drained?;
        closed?;

        log::debug!(
            "merged {} term(s) from {} source(s), {} dropped",
            stats.terms_merged,
            stats.sources,
            stats.terms_dropped
        );
        Ok(stats)
    }

    fn drain<C, W>(&self, queue: &mut TermMergeQueue<C>, writer: &mut W) -> Result<TermMergeStats>
    where
        C: TermCursor,
        W: TermDictionaryWriter + ?Sized,
    {
        let mut stats = TermMergeStats {
            sources: queue.source_count(),
            ..Default::default()
        };
        let mut origins = Vec::with_capacity(queue.len());
        let mut last: Option<Term> = None;

        while let Some(group) = queue.pop_next_group() {
            if self.config.verify_term_order {
                if let Some(prev) = &last
                    && prev >= group.term()
                {
                    log::warn!("term {} follows {} out of order", group.term(), prev);
                    let err = LexMergeError::data_source(format!(
                        "term {} follows {} out of order",
                        group.term(),
                        prev
                    ));
                    queue.abandon_group(group);
                    return Err(err);
                }
                last = Some(group.term().clone());
            }

            let doc_freq = group.doc_freq();
            if doc_freq == 0 && self.config.drop_empty_terms {
                stats.terms_dropped += 1;
            } else {
                origins.clear();
                origins.extend(group.origins());
                if let Err(e) = writer.add_term(group.term(), doc_freq, &origins) {
                    queue.abandon_group(group);
                    return Err(e);
                }
                stats.terms_merged += 1;
                stats.total_doc_freq += doc_freq;
                if group.len() > 1 {
                    stats.shared_terms += 1;
                }
            }

            queue.advance_group(group)?;
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{MemoryTermCursor, MemoryTermDictionary};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    /// Term cursor that counts closes and can be told to fail.
    #[derive(Debug)]
    struct TrackedCursor {
        inner: MemoryTermCursor,
        closes: Arc<AtomicUsize>,
        fail_close: bool,
        fail_next: bool,
        /// Report `Ok(true)` from `next_term` even after the last term.
        claims_more: bool,
    }

    impl TrackedCursor {
        fn new(terms: &[(&str, u64)], closes: &Arc<AtomicUsize>) -> Self {
            TrackedCursor {
                inner: MemoryTermCursor::from_field("f", terms),
                closes: Arc::clone(closes),
                fail_close: false,
                fail_next: false,
                claims_more: false,
            }
        }
    }

    impl TermCursor for TrackedCursor {
        fn term(&self) -> Option<&Term> {
            self.inner.term()
        }

        fn doc_freq(&self) -> u64 {
            self.inner.doc_freq()
        }

        fn next_term(&mut self) -> Result<bool> {
            if self.fail_next {
                return Err(LexMergeError::data_source("truncated dictionary"));
            }
            let more = self.inner.next_term()?;
            Ok(more || self.claims_more)
        }

        fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, AtomicOrdering::SeqCst);
            if self.fail_close {
                Err(LexMergeError::data_source("close failed"))
            } else {
                Ok(())
            }
        }
    }

    fn source(origin: u64, terms: &[(&str, u64)]) -> MergeSource<MemoryTermCursor> {
        MergeSource::new(origin, MemoryTermCursor::from_field("f", terms))
    }

    fn drain_texts<C: TermCursor>(queue: &mut TermMergeQueue<C>) -> Vec<(String, Vec<u64>)> {
        let mut out = Vec::new();
        while let Some(group) = queue.pop_next_group() {
            assert!(queue.is_heap());
            out.push((group.term().text().to_string(), group.origins().collect()));
            queue.advance_group(group).unwrap();
            assert!(queue.is_heap());
        }
        out
    }

    #[test]
    fn test_groups_in_term_order() {
        let mut queue = TermMergeQueue::new(vec![
            source(0, &[("apple", 1), ("cherry", 1)]),
            source(1, &[("banana", 1), ("cherry", 1)]),
        ])
        .unwrap();

        let groups = drain_texts(&mut queue);
        assert_eq!(
            groups,
            vec![
                ("apple".to_string(), vec![0]),
                ("banana".to_string(), vec![1]),
                ("cherry".to_string(), vec![0, 1]),
            ]
        );
        assert!(queue.is_empty());
        queue.close().unwrap();
    }

    #[test]
    fn test_equal_terms_ordered_by_origin() {
        // Origins deliberately out of insertion order.
        let mut queue = TermMergeQueue::new(vec![
            source(7, &[("x", 1)]),
            source(2, &[("x", 1)]),
            source(5, &[("x", 1)]),
            source(3, &[("w", 1), ("x", 1)]),
        ])
        .unwrap();

        let groups = drain_texts(&mut queue);
        assert_eq!(groups[0], ("w".to_string(), vec![3]));
        assert_eq!(groups[1], ("x".to_string(), vec![2, 3, 5, 7]));
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_group_members_expose_doc_freq() {
        let mut queue = TermMergeQueue::new(vec![
            source(0, &[("t", 3)]),
            source(1, &[("t", 4)]),
        ])
        .unwrap();

        let mut group = queue.pop_next_group().unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group.doc_freq(), 7);
        let freqs: Vec<u64> = group.members_mut().iter().map(|m| m.doc_freq()).collect();
        assert_eq!(freqs, vec![3, 4]);
        queue.advance_group(group).unwrap();
        assert!(queue.pop_next_group().is_none());
    }

    #[test]
    fn test_empty_sources_closed_on_construction() {
        let closes = Arc::new(AtomicUsize::new(0));
        let queue = TermMergeQueue::new(vec![
            MergeSource::new(0, TrackedCursor::new(&[], &closes)),
            MergeSource::new(1, TrackedCursor::new(&[("a", 1)], &closes)),
        ])
        .unwrap();

        assert_eq!(closes.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(queue.source_count(), 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek_term(), Some(&Term::new("f", "a")));
    }

    #[test]
    fn test_close_attempts_every_cursor() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut failing_a = TrackedCursor::new(&[("a", 1)], &closes);
        failing_a.fail_close = true;
        let mut failing_b = TrackedCursor::new(&[("b", 1)], &closes);
        failing_b.fail_close = true;

        let mut queue = TermMergeQueue::new(vec![
            MergeSource::new(0, failing_a),
            MergeSource::new(1, TrackedCursor::new(&[("c", 1)], &closes)),
            MergeSource::new(2, failing_b),
        ])
        .unwrap();

        let err = queue.close().unwrap_err();
        assert_eq!(closes.load(AtomicOrdering::SeqCst), 3);
        match err {
            LexMergeError::Close(errors) => assert_eq!(errors.len(), 2),
            other => panic!("Expected Close error, got {other:?}"),
        }

        // Nothing left to close on drop.
        drop(queue);
        assert_eq!(closes.load(AtomicOrdering::SeqCst), 3);
    }

    #[test]
    fn test_drop_closes_remaining_cursors() {
        let closes = Arc::new(AtomicUsize::new(0));
        let queue = TermMergeQueue::new(vec![
            MergeSource::new(0, TrackedCursor::new(&[("a", 1)], &closes)),
            MergeSource::new(1, TrackedCursor::new(&[("b", 1)], &closes)),
        ])
        .unwrap();
        drop(queue);
        assert_eq!(closes.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn test_advance_failure_is_returned_verbatim() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut broken = TrackedCursor::new(&[("a", 1), ("b", 1)], &closes);
        broken.fail_next = true;

        let mut queue = TermMergeQueue::new(vec![
            MergeSource::new(0, broken),
            MergeSource::new(1, TrackedCursor::new(&[("a", 1)], &closes)),
        ])
        .unwrap();

        let group = queue.pop_next_group().unwrap();
        let err = queue.advance_group(group).unwrap_err();
        assert_eq!(err.to_string(), "Data source error: truncated dictionary");

        // Both the failed and the untouched member are still closed.
        queue.close().unwrap();
        assert_eq!(closes.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn test_source_without_term_after_advance_is_closed() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut short = TrackedCursor::new(&[("a", 1)], &closes);
        short.claims_more = true;

        let mut queue = TermMergeQueue::new(vec![
            MergeSource::new(0, short),
            MergeSource::new(1, TrackedCursor::new(&[("a", 1), ("b", 1)], &closes)),
        ])
        .unwrap();

        let groups = drain_texts(&mut queue);
        assert_eq!(
            groups,
            vec![("a".to_string(), vec![0, 1]), ("b".to_string(), vec![1])]
        );
        assert_eq!(closes.load(AtomicOrdering::SeqCst), 2);

        queue.close().unwrap();
        drop(queue);
        assert_eq!(closes.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn test_merger_writes_dictionary() {
        let queue = TermMergeQueue::new(vec![
            source(0, &[("apple", 2), ("cherry", 1), ("gone", 0)]),
            source(1, &[("banana", 5), ("cherry", 3), ("gone", 0)]),
        ])
        .unwrap();

        let mut dict = MemoryTermDictionary::new();
        let stats = TermMerger::default().merge(queue, &mut dict).unwrap();

        assert_eq!(stats.sources, 2);
        assert_eq!(stats.terms_merged, 3);
        assert_eq!(stats.terms_dropped, 1);
        assert_eq!(stats.shared_terms, 1);
        assert_eq!(stats.total_doc_freq, 11);

        let cherry = dict.get(&Term::new("f", "cherry")).unwrap();
        assert_eq!(cherry.doc_freq, 4);
        assert_eq!(cherry.origins, vec![0, 1]);
        assert!(dict.get(&Term::new("f", "gone")).is_none());
    }

    #[test]
    fn test_merger_keeps_empty_terms_when_configured() {
        let queue = TermMergeQueue::new(vec![source(0, &[("gone", 0)])]).unwrap();
        let merger = TermMerger::new(TermMergeConfig {
            drop_empty_terms: false,
            ..Default::default()
        });

        let mut dict = MemoryTermDictionary::new();
        let stats = merger.merge(queue, &mut dict).unwrap();
        assert_eq!(stats.terms_merged, 1);
        assert_eq!(dict.terms()[0].doc_freq, 0);
    }

    #[test]
    fn test_merger_closes_queue_on_writer_failure() {
        struct RejectingWriter;

        impl TermDictionaryWriter for RejectingWriter {
            fn add_term(&mut self, term: &Term, _doc_freq: u64, _origins: &[u64]) -> Result<()> {
                Err(LexMergeError::Anyhow(anyhow::anyhow!("disk full at {term}")))
            }
        }

        let closes = Arc::new(AtomicUsize::new(0));
        let queue = TermMergeQueue::new(vec![
            MergeSource::new(0, TrackedCursor::new(&[("a", 1), ("b", 1)], &closes)),
            MergeSource::new(1, TrackedCursor::new(&[("a", 1)], &closes)),
        ])
        .unwrap();

        let err = TermMerger::default()
            .merge(queue, &mut RejectingWriter)
            .unwrap_err();
        assert_eq!(err.to_string(), "Anyhow error: disk full at f:a");
        assert_eq!(closes.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn test_merger_detects_out_of_order_source() {
        /// Yields its terms in the given order, sorted or not.
        #[derive(Debug)]
        struct UnsortedCursor {
            terms: Vec<Term>,
            position: usize,
        }

        impl TermCursor for UnsortedCursor {
            fn term(&self) -> Option<&Term> {
                self.terms.get(self.position)
            }

            fn doc_freq(&self) -> u64 {
                1
            }

            fn next_term(&mut self) -> Result<bool> {
                self.position += 1;
                Ok(self.position < self.terms.len())
            }
        }

        let cursor = UnsortedCursor {
            terms: vec![Term::new("f", "b"), Term::new("f", "a")],
            position: 0,
        };
        let queue = TermMergeQueue::new(vec![MergeSource::new(0, cursor)]).unwrap();

        let mut dict = MemoryTermDictionary::new();
        let err = TermMerger::default().merge(queue, &mut dict).unwrap_err();
        assert!(matches!(err, LexMergeError::DataSource(_)));
        assert_eq!(dict.terms().len(), 1);
    }
}
