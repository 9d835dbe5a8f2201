//! `ESAQuery`: maps text to a sparse concept vector and compares concept
//! vectors by cosine similarity.

use crate::concept_index::{ConceptIndex, SparseVector};
use crate::config::Config;
use crate::error::EsaResult;
use crate::label_map::LabelMap;
use crate::store::SqliteBackingStore;
use crate::token::FilterChain;
use ahash::AHashMap;
use std::path::Path;
use tracing::warn;

/// One labelled concept dimension in a query result: the reference document
/// the dimension corresponds to, and the accumulated score there.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub doc_id: u32,
    pub title: String,
    pub score: f32,
}

/// Holds the loaded, read-only `ConceptIndex` and `LabelMap` plus the filter
/// chain a query must use to match the index it was built with.
pub struct ESAQuery {
    index: ConceptIndex,
    labels: LabelMap,
    filter_chain: FilterChain,
    n_labels: usize,
}

impl ESAQuery {
    /// Opens the backing-store file and label file produced by a build,
    /// verifying `config` agrees with the persisted build-time config before
    /// loading anything (a filter-chain mismatch is a `ConfigError`).
    pub fn load(db_path: &Path, labels_path: &Path, config_path: &Path, config: &Config) -> EsaResult<Self> {
        let stored_config = Config::load(config_path)?;
        config.require_same_filter_chain(&stored_config)?;

        let store = SqliteBackingStore::open(db_path)?;
        let index = ConceptIndex::load(&store)?;
        let labels = LabelMap::load(labels_path)?;
        let filter_chain = config.filter_chain.build()?;

        Ok(Self {
            index,
            labels,
            filter_chain,
            n_labels: config.n_labels,
        })
    }

    /// Builds an `ESAQuery` directly from already-loaded pieces, for callers
    /// (tests, in-process builders) that never round-trip through disk.
    pub fn from_parts(index: ConceptIndex, labels: LabelMap, filter_chain: FilterChain, n_labels: usize) -> Self {
        Self {
            index,
            labels,
            filter_chain,
            n_labels,
        }
    }

    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// Maps `text` into concept space: tokenises through the build's filter
    /// chain, sums per-token concept vectors per `doc_id`, and returns the
    /// top `n_labels` labelled dimensions by descending score alongside the
    /// full sparse vector. Unknown tokens contribute an empty map, not an
    /// error (`EmptyResult`). Empty input yields an empty vector and
    /// an empty label list.
    pub fn get_vector(&self, text: &str) -> (Vec<Label>, SparseVector) {
        self.get_vector_with_n_labels(text, self.n_labels)
    }

    pub fn get_vector_with_n_labels(&self, text: &str, n_labels: usize) -> (Vec<Label>, SparseVector) {
        let tokens = self.filter_chain.tokenize(text);
        if tokens.is_empty() && !text.trim().is_empty() {
            warn!(%text, "query text survived tokenizing and filtering down to zero tokens");
        }

        let mut vector: SparseVector = AHashMap::new();
        let mut unknown_tokens = 0usize;

        for token in &tokens {
            let Some(term_vector) = self.index.get(token) else {
                unknown_tokens += 1;
                continue;
            };
            for (&doc_id, &weight) in term_vector {
                *vector.entry(doc_id).or_insert(0.0) += weight;
            }
        }
        if unknown_tokens > 0 {
            warn!(
                unknown_tokens,
                total_tokens = tokens.len(),
                "query tokens absent from the concept index contributed nothing"
            );
        }

        let mut labelled: Vec<Label> = vector
            .iter()
            .filter_map(|(&doc_id, &score)| {
                self.labels.get(doc_id).map(|title| Label {
                    doc_id,
                    title: title.to_string(),
                    score,
                })
            })
            .collect();
        labelled.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        labelled.truncate(n_labels);

        (labelled, vector)
    }

    /// Cosine similarity over the union of keys of `v1` and `v2`. `0.0` if
    /// either vector has zero norm (including both empty).
    pub fn similarity(v1: &SparseVector, v2: &SparseVector) -> f64 {
        let (smaller, larger) = if v1.len() <= v2.len() { (v1, v2) } else { (v2, v1) };

        let mut dot = 0.0f64;
        for (doc_id, w1) in smaller {
            if let Some(w2) = larger.get(doc_id) {
                dot += *w1 as f64 * *w2 as f64;
            }
        }

        let norm1: f64 = v1.values().map(|w| (*w as f64).powi(2)).sum::<f64>().sqrt();
        let norm2: f64 = v2.values().map(|w| (*w as f64).powi(2)).sum::<f64>().sqrt();

        if norm1 == 0.0 || norm2 == 0.0 {
            return 0.0;
        }
        dot / (norm1 * norm2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept_index::encode_vector;
    use crate::token::WordMap;

    fn index_with(entries: &[(&str, &[(u32, f32)])]) -> ConceptIndex {
        let store = SqliteBackingStore::open_in_memory().unwrap();
        store.prepare_schema().unwrap();
        let mut wm = WordMap::new();
        for (word, pairs) in entries {
            let id = wm.intern(word);
            store.save_term_vector(id, &encode_vector(pairs)).unwrap();
        }
        store.save_wordmap(&wm).unwrap();
        ConceptIndex::load(&store).unwrap()
    }

    fn labels_with(entries: &[(u32, &str)]) -> LabelMap {
        let mut labels = LabelMap::new();
        for (doc_id, title) in entries {
            labels.insert(*doc_id, title.to_string());
        }
        labels
    }

    fn no_op_chain() -> FilterChain {
        FilterChain::new(vec![])
    }

    /// Builds a synthetic three-document corpus directly, without going
    /// through a full build: `A -> {apple, fruit}`, `B -> {apple, pie}`,
    /// `C -> {fruit, pie}`, concept vectors left unnormalised and
    /// untruncated since this only exercises query-time summation and
    /// cosine similarity, not the builder.
    fn synthetic_query() -> ESAQuery {
        let index = index_with(&[
            ("apple", &[(1, 1.0), (2, 1.0)]),
            ("fruit", &[(1, 1.0), (3, 1.0)]),
            ("pie", &[(2, 1.0), (3, 1.0)]),
        ]);
        let labels = labels_with(&[(1, "A"), (2, "B"), (3, "C")]);
        ESAQuery::from_parts(index, labels, no_op_chain(), 5)
    }

    #[test]
    fn identical_query_has_similarity_one() {
        let q = synthetic_query();
        let (_, v) = q.get_vector("apple");
        assert!((ESAQuery::similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_then_shared_then_stronger_overlap_orders_correctly() {
        let q = synthetic_query();
        let (_, apple) = q.get_vector("apple");
        let (_, pie) = q.get_vector("pie");
        let (_, xyzzy) = q.get_vector("xyzzy");
        let (_, apple_fruit) = q.get_vector("apple fruit");
        let (_, fruit_pie) = q.get_vector("fruit pie");

        let apple_pie = ESAQuery::similarity(&apple, &pie);
        assert!(apple_pie > 0.0 && apple_pie < 1.0);

        assert_eq!(ESAQuery::similarity(&xyzzy, &apple), 0.0);

        let wider = ESAQuery::similarity(&apple_fruit, &fruit_pie);
        assert!(wider > apple_pie);
    }

    #[test]
    fn similarity_is_symmetric() {
        let q = synthetic_query();
        let (_, apple) = q.get_vector("apple");
        let (_, pie) = q.get_vector("pie");
        assert_eq!(ESAQuery::similarity(&apple, &pie), ESAQuery::similarity(&pie, &apple));
    }

    #[test]
    fn repetition_does_not_change_direction() {
        let q = synthetic_query();
        let (_, once) = q.get_vector("apple");
        let (_, twice) = q.get_vector("apple apple");
        assert!((ESAQuery::similarity(&once, &twice) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_text_yields_empty_vector_and_zero_similarity() {
        let q = synthetic_query();
        let (labels, v) = q.get_vector("");
        assert!(labels.is_empty());
        assert!(v.is_empty());
        let (_, apple) = q.get_vector("apple");
        assert_eq!(ESAQuery::similarity(&v, &apple), 0.0);
    }

    #[test]
    fn unknown_token_contributes_nothing() {
        let q = synthetic_query();
        let (labels, v) = q.get_vector("xyzzy");
        assert!(labels.is_empty());
        assert!(v.is_empty());
    }

    #[test]
    fn labels_are_sorted_descending_and_truncated() {
        let index = index_with(&[("x", &[(1, 0.2), (2, 0.9), (3, 0.5)])]);
        let labels_map = labels_with(&[(1, "One"), (2, "Two"), (3, "Three")]);
        let q = ESAQuery::from_parts(index, labels_map, no_op_chain(), 2);
        let (labels, _) = q.get_vector("x");
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].title, "Two");
        assert_eq!(labels[1].title, "Three");
    }
}
