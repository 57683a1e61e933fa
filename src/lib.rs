//! # lexmerge
//!
//! Query-evaluation and index-merge core for inverted-index text search.
//!
//! ## Features
//!
//! - Forward-only, skip-capable cursors over document ids and term dictionaries
//! - Disjunction (OR) scoring with a configurable tie-breaker
//! - Deterministic k-way merge of per-segment term dictionaries
//! - A fixed-capacity binary heap shared by both mergers

pub mod config;
pub mod cursor;
pub mod dictionary;
pub mod disjunction;
pub mod error;
pub mod heap;
pub mod postings;
pub mod scoring;
pub mod sync;
pub mod term;
pub mod term_merge;

pub mod prelude {
    pub use crate::config::{DisjunctionConfig, TermMergeConfig};
    pub use crate::cursor::{DocCursor, DocId, NO_MORE_DOCS, ScoredCursor, TermCursor};
    pub use crate::disjunction::DisjunctionMerger;
    pub use crate::error::{LexMergeError, Result};
    pub use crate::term::Term;
    pub use crate::term_merge::{
        MergeSource, TermDictionaryWriter, TermGroup, TermMergeQueue, TermMergeStats, TermMerger,
    };
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
