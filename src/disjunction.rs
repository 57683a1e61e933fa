//! Disjunction (OR) of scored cursors with max-plus-tie-breaker scoring.
//!
//! [`DisjunctionMerger`] yields the union of its children's documents in
//! increasing order, each exactly once. A document matched by several
//! children scores as
//!
//! ```text
//! max + (sum - max) * tie_breaker_multiplier
//! ```
//!
//! so the best sub-query counts fully and every other match is discounted.
//!
//! Children live in a [`CursorHeap`] keyed on their current document. Only the
//! root is ever advanced; exhausted children are dropped from the heap, so the
//! number of live children only shrinks.

use crate::config::DisjunctionConfig;
use crate::cursor::{DocCursor, DocId, NO_MORE_DOCS, ScoredCursor};
use crate::error::Result;
use crate::heap::CursorHeap;

type ChildOrder<C> = fn(&C, &C) -> bool;

fn doc_order<C: DocCursor>(a: &C, b: &C) -> bool {
    a.doc_id() < b.doc_id()
}

/// Scores a document by its best-matching sub-query plus a discounted share
/// of the others.
///
/// The merger is positioned on its first document as soon as it is built, so
/// it can itself be a child of another merger.
#[derive(Debug)]
pub struct DisjunctionMerger<C: ScoredCursor = Box<dyn ScoredCursor>> {
    /// Min-heap of live children, ordered by current doc_id.
    heap: CursorHeap<C, ChildOrder<C>>,
    /// Weight applied to the non-maximum sub-scores.
    tie_breaker_multiplier: f32,
    /// Current document ID.
    doc: DocId,
    /// Total cost estimate.
    cost: u64,
}

impl<C: ScoredCursor> DisjunctionMerger<C> {
    /// Create a disjunction over already-positioned children.
    ///
    /// Children that are already exhausted are dropped.
    pub fn new(children: Vec<C>, tie_breaker_multiplier: f32) -> Result<Self> {
        Self::with_config(children, &DisjunctionConfig::new(tie_breaker_multiplier))
    }

    /// Create a disjunction using a validated [`DisjunctionConfig`].
    pub fn with_config(children: Vec<C>, config: &DisjunctionConfig) -> Result<Self> {
        config.validate()?;

        let live: Vec<C> = children.into_iter().filter(|c| !c.is_exhausted()).collect();
        let cost = live.iter().map(|c| c.cost()).sum();
        let heap = CursorHeap::from_vec(live, doc_order::<C> as ChildOrder<C>);
        let doc = heap.peek().map_or(NO_MORE_DOCS, |c| c.doc_id());

        log::debug!(
            "disjunction over {} live children (tie breaker {})",
            heap.len(),
            config.tie_breaker_multiplier
        );

        Ok(DisjunctionMerger {
            heap,
            tie_breaker_multiplier: config.tie_breaker_multiplier,
            doc,
            cost,
        })
    }

    /// The configured tie-breaker multiplier.
    pub fn tie_breaker_multiplier(&self) -> f32 {
        self.tie_breaker_multiplier
    }

    /// Number of children that are not exhausted yet.
    pub fn live_children(&self) -> usize {
        self.heap.len()
    }

    /// Number of children positioned on the current document.
    pub fn matching_children(&self) -> usize {
        let mut count = 0;
        self.visit_matching(|_| count += 1);
        count
    }

    /// Check the heap property over the live children.
    pub fn is_heap(&self) -> bool {
        self.heap.is_heap()
    }

    /// Release the remaining live children to the caller.
    pub fn into_children(self) -> Vec<C> {
        self.heap.into_vec()
    }

    /// Calls `f` for every child positioned on the current document, in
    /// pre-order over the heap (root, left subtree, right subtree).
    ///
    /// Children on the current document form a subtree hanging off the root,
    /// so the walk never descends past a non-matching slot. It moves with
    /// index arithmetic alone and needs no stack.
    fn visit_matching<F: FnMut(&C)>(&self, mut f: F) {
        let slots = self.heap.as_slice();
        if slots.is_empty() || self.doc == NO_MORE_DOCS {
            return;
        }
        let doc = self.doc;
        let matches = |i: usize| i < slots.len() && slots[i].doc_id() == doc;

        let mut i = 0;
        f(&slots[0]);
        loop {
            let left = 2 * i + 1;
            if matches(left) {
                i = left;
                f(&slots[i]);
                continue;
            }
            if matches(left + 1) {
                i = left + 1;
                f(&slots[i]);
                continue;
            }
            // Climb until a left child whose right sibling still matches.
            loop {
                if i == 0 {
                    return;
                }
                if i % 2 == 1 && matches(i + 1) {
                    i += 1;
                    f(&slots[i]);
                    break;
                }
                i = (i - 1) / 2;
            }
        }
    }
}

impl<C: ScoredCursor> DocCursor for DisjunctionMerger<C> {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        if self.heap.is_empty() {
            self.doc = NO_MORE_DOCS;
            return Ok(self.doc);
        }

        let doc = self.doc;
        while let Some(top) = self.heap.peek_mut() {
            if top.doc_id() != doc {
                break;
            }
            if top.next_doc()? == NO_MORE_DOCS {
                self.heap.remove_root();
            } else {
                self.heap.adjust_root();
            }
        }

        self.doc = self.heap.peek().map_or(NO_MORE_DOCS, |c| c.doc_id());
        Ok(self.doc)
    }

    fn skip_to(&mut self, target: DocId) -> Result<DocId> {
        if self.heap.is_empty() {
            self.doc = NO_MORE_DOCS;
            return Ok(self.doc);
        }
        assert!(
            target >= self.doc,
            "skip_to({target}) behind current document {}",
            self.doc
        );

        while let Some(top) = self.heap.peek_mut() {
            if top.doc_id() >= target {
                break;
            }
            if top.skip_to(target)? == NO_MORE_DOCS {
                self.heap.remove_root();
            } else {
                self.heap.adjust_root();
            }
        }

        self.doc = self.heap.peek().map_or(NO_MORE_DOCS, |c| c.doc_id());
        Ok(self.doc)
    }

    fn cost(&self) -> u64 {
        self.cost
    }
}

impl<C: ScoredCursor> ScoredCursor for DisjunctionMerger<C> {
    fn score(&self) -> f32 {
        let mut sum = 0.0f32;
        let mut max = f32::NEG_INFINITY;
        self.visit_matching(|child| {
            let s = child.score();
            sum += s;
            max = max.max(s);
        });
        if max == f32::NEG_INFINITY {
            return 0.0;
        }
        max + (sum - max) * self.tie_breaker_multiplier
    }
}
