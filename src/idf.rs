//! Inverse-document-frequency table.

use crate::store::TermFrequencyStore;
use ahash::AHashMap;

/// `idf(t) = ln(N / df(t))` for every term observed in the TF store.
/// `idf(t) >= 0` since `df(t) <= N`; `idf(t) == 0` iff `df(t) == N`.
#[derive(Default)]
pub struct IDFTable {
    by_term: AHashMap<u32, f32>,
}

impl IDFTable {
    /// Computes the table in one pass over the doc-frequency-per-term
    /// iterator (store op 3), after every document has been ingested.
    pub fn compute(store: &impl TermFrequencyStore) -> crate::error::EsaResult<Self> {
        let n = store.distinct_docs_count()? as f64;
        let mut by_term = AHashMap::new();
        for (term_id, df) in store.doc_frequency_per_term()? {
            let idf = (n / df as f64).ln() as f32;
            by_term.insert(term_id, idf);
        }
        Ok(Self { by_term })
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, f32)>) -> Self {
        Self {
            by_term: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, term_id: u32) -> Option<f32> {
        self.by_term.get(&term_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.by_term.iter().map(|(&id, &idf)| (id, idf))
    }

    pub fn len(&self) -> usize {
        self.by_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_term.is_empty()
    }
}
