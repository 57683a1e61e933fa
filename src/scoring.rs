//! BM25 similarity used by [`TermScorer`](crate::postings::TermScorer).

use serde::{Deserialize, Serialize};

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f32,
    /// Field length normalization.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Params { k1: 1.2, b: 0.75 }
    }
}

/// BM25 weight of one term over one field.
#[derive(Debug, Clone)]
pub struct Bm25Weight {
    params: Bm25Params,
    /// Pre-multiplied idf * boost.
    weight: f32,
    avg_field_length: f32,
}

impl Bm25Weight {
    /// Create a weight for a term found in `doc_freq` of `total_docs` documents.
    pub fn new(
        params: Bm25Params,
        doc_freq: u64,
        total_docs: u64,
        avg_field_length: f32,
        boost: f32,
    ) -> Self {
        Bm25Weight {
            params,
            weight: Self::idf(doc_freq, total_docs) * boost,
            avg_field_length: if avg_field_length > 0.0 {
                avg_field_length
            } else {
                1.0
            },
        }
    }

    /// IDF = ln(1 + (N - df + 0.5) / (df + 0.5)), never negative.
    pub fn idf(doc_freq: u64, total_docs: u64) -> f32 {
        if doc_freq == 0 || total_docs == 0 {
            return 0.0;
        }
        let n = total_docs as f32;
        let df = doc_freq.min(total_docs) as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Score one document given the term frequency and the field length.
    pub fn score(&self, term_freq: u32, field_length: u32) -> f32 {
        if term_freq == 0 {
            return 0.0;
        }
        let tf = term_freq as f32;
        let Bm25Params { k1, b } = self.params;
        let norm = 1.0 - b + b * (field_length as f32 / self.avg_field_length);
        self.weight * (tf * (k1 + 1.0)) / (tf + k1 * norm)
    }
}
