//! `BackgroundBuilder`: the five-step ingest → TF-IDF → truncated
//! concept-vector emission pipeline.

use crate::concept_index::encode_vector;
use crate::config::Config;
use crate::document::DocumentSource;
use crate::error::EsaResult;
use crate::idf::IDFTable;
use crate::label_map::LabelMap;
use crate::store::{SqliteBackingStore, TermFrequencyStore};
use crate::token::{FilterChain, WordMap};
use ahash::AHashMap;
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Cooperative cancellation/progress callback, checked at document
/// boundaries during ingest and term boundaries during emission.
pub trait ProgressSink {
    fn on_document(&self, _ingested: usize) {}
    fn on_term(&self, _retained: usize) {}
}

/// Default no-op sink for library callers that don't want a progress bar.
pub struct NoopProgress;
impl ProgressSink for NoopProgress {}

/// Summary of one completed (or cancelled) build.
#[derive(Debug, Clone)]
pub struct BuildStats {
    pub documents_ingested: usize,
    pub distinct_terms_interned: usize,
    pub distinct_terms_retained: usize,
    pub cancelled: bool,
    pub elapsed: std::time::Duration,
}

pub struct BackgroundBuilder<'a> {
    store: &'a SqliteBackingStore,
    filter_chain: FilterChain,
    config: &'a Config,
    cancel: Option<Arc<AtomicBool>>,
    progress: Box<dyn ProgressSink>,
}

impl<'a> BackgroundBuilder<'a> {
    pub fn new(store: &'a SqliteBackingStore, config: &'a Config, filter_chain: FilterChain) -> Self {
        Self {
            store,
            filter_chain,
            config,
            cancel: None,
            progress: Box::new(NoopProgress),
        }
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|f| f.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Runs the full build against `source`, checkpointing the label map to
    /// `labels_path` every `config.checkpoint_every` documents.
    pub fn build(
        &self,
        source: &mut dyn DocumentSource,
        labels_path: &Path,
    ) -> EsaResult<BuildStats> {
        let started = Instant::now();

        // Step 1 — schema preparation.
        self.store.prepare_schema()?;
        info!("backing store schema prepared");

        // Step 2 — ingest.
        let mut wordmap = WordMap::new();
        let mut labels = LabelMap::new();
        let mut docs_ingested = 0usize;
        let mut cancelled = false;

        info!("ingest starting");
        self.store.begin()?;
        loop {
            if self.cancelled() {
                cancelled = true;
                break;
            }
            match source.next_document()? {
                None => break,
                Some(doc) => {
                    let tokens = self.filter_chain.tokenize(&doc.body);
                    let mut counts: AHashMap<u32, u32> = AHashMap::new();
                    for token in tokens {
                        let term_id = wordmap.intern(&token);
                        *counts.entry(term_id).or_insert(0) += 1;
                    }
                    let freqs: Vec<(u32, f32)> = counts
                        .into_iter()
                        .map(|(term_id, raw_freq)| (term_id, 1.0 + (raw_freq as f32).ln()))
                        .collect();
                    self.store.insert_document_freqs(doc.doc_id, &freqs)?;

                    labels.insert(doc.doc_id, doc.title);
                    docs_ingested += 1;
                    self.progress.on_document(docs_ingested);
                    if docs_ingested % self.config.checkpoint_every == 0 {
                        labels.save(labels_path)?;
                    }
                }
            }
        }
        self.store.create_index()?;
        self.store.commit()?;
        labels.save(labels_path)?;
        info!(documents = docs_ingested, terms = wordmap.len(), "ingest finished");

        if cancelled {
            info!("build cancelled during ingest");
            return Ok(BuildStats {
                documents_ingested: docs_ingested,
                distinct_terms_interned: wordmap.len(),
                distinct_terms_retained: 0,
                cancelled: true,
                elapsed: started.elapsed(),
            });
        }

        // Step 3 — word-map persistence.
        self.store.begin()?;
        self.store.save_wordmap(&wordmap)?;
        self.store.commit()?;

        // Step 4 — IDF computation.
        info!("computing idf table");
        self.store.begin()?;
        let idf = IDFTable::compute(self.store)?;
        for (term_id, value) in idf.iter() {
            self.store.save_idf(term_id, value)?;
        }
        self.store.commit()?;
        info!(terms = idf.len(), "idf table computed");

        // Step 5 — concept-vector emission. Grouping by term_id is a cheap
        // sequential pass over the already-sorted scan; the per-term
        // normalise+truncate+encode work that follows is independent across
        // terms, so it can optionally run on `rayon`'s pool when the caller
        // opts into `parallel_emission`. Writes still go through the single
        // backing-store connection sequentially, which is also where
        // cancellation is re-checked at term boundaries.
        info!("emitting concept vectors");
        let rows = self.store.scan_by_term(self.config.min_freq)?;
        let mut groups: Vec<(u32, Vec<(u32, f32)>)> = Vec::new();
        let mut i = 0;
        while i < rows.len() {
            let term_id = rows[i].0;
            let mut j = i;
            let mut group: Vec<(u32, f32)> = Vec::new();
            while j < rows.len() && rows[j].0 == term_id {
                let (_, doc_id, tf) = rows[j];
                let idf_value = idf.get(term_id).unwrap_or(0.0);
                group.push((doc_id, tf * idf_value));
                j += 1;
            }
            groups.push((term_id, group));
            i = j;
        }

        let window_size = self.config.window_size;
        let window_thresh = self.config.window_thresh;
        let emit_one = |(term_id, mut group): (u32, Vec<(u32, f32)>)| -> (u32, Vec<u8>) {
            normalize_l1(&mut group);
            let truncated = sliding_window_truncate(&group, window_size, window_thresh);
            (term_id, encode_vector(&truncated))
        };
        let encoded: Vec<(u32, Vec<u8>)> = if self.config.parallel_emission {
            groups.into_par_iter().map(emit_one).collect()
        } else {
            groups.into_iter().map(emit_one).collect()
        };

        let mut terms_retained = 0usize;
        for (term_id, blob) in encoded {
            if self.cancelled() {
                cancelled = true;
                info!("build cancelled during emission");
                break;
            }
            self.store.save_term_vector(term_id, &blob)?;
            terms_retained += 1;
            self.progress.on_term(terms_retained);
        }
        if !cancelled {
            info!(terms = terms_retained, "emission finished");
        }

        Ok(BuildStats {
            documents_ingested: docs_ingested,
            distinct_terms_interned: wordmap.len(),
            distinct_terms_retained: terms_retained,
            cancelled,
            elapsed: started.elapsed(),
        })
    }
}

/// L1-normalises a term's `(doc_id, tf*idf)` group in place: divides every
/// weight by the running sum of the group. Query-time `similarity` applies
/// its own explicit L2 normalisation over whatever vectors it is given, so
/// the stored scale doesn't affect ranking — dividing by the sum rather
/// than by the L2 norm here is just cheaper to compute incrementally during
/// the scan.
///
/// When every weight in the group is zero (the term appears in every
/// ingested document, so its idf is zero), dividing by the zero sum is
/// undefined; this redistributes weight uniformly across the group instead,
/// which keeps the vector well-formed without an arbitrary division by zero.
fn normalize_l1(group: &mut [(u32, f32)]) {
    if group.is_empty() {
        return;
    }
    let sum: f32 = group.iter().map(|(_, w)| *w).sum();
    if sum == 0.0 {
        let uniform = 1.0 / group.len() as f32;
        for (_, w) in group.iter_mut() {
            *w = uniform;
        }
    } else {
        for (_, w) in group.iter_mut() {
            *w /= sum;
        }
    }
}

/// Sliding-window tail truncation. `sorted_desc` must already be
/// sorted by descending weight. Keeps at least `window_size` entries
/// whenever that many exist, then stops once the weight drop across the
/// trailing window falls below `window_thresh * max_weight`.
fn sliding_window_truncate(
    sorted_desc: &[(u32, f32)],
    window_size: usize,
    window_thresh: f32,
) -> Vec<(u32, f32)> {
    if sorted_desc.is_empty() {
        return Vec::new();
    }
    let max_weight = sorted_desc[0].1;
    let mut res = Vec::with_capacity(sorted_desc.len().min(window_size + 1));
    for (i, &pair) in sorted_desc.iter().enumerate() {
        if res.len() >= window_size {
            let earlier = sorted_desc[i.saturating_sub(window_size)].1;
            let later = sorted_desc[i.saturating_sub(1)].1;
            let window_change = earlier - later;
            if max_weight * window_thresh > window_change {
                break;
            }
        }
        res.push(pair);
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_l1_divides_by_sum() {
        let mut group = vec![(1, 1.0), (2, 3.0)];
        normalize_l1(&mut group);
        assert_eq!(group, vec![(1, 0.25), (2, 0.75)]);
    }

    #[test]
    fn normalize_l1_redistributes_uniformly_when_sum_is_zero() {
        let mut group = vec![(1, 0.0), (2, 0.0)];
        normalize_l1(&mut group);
        assert_eq!(group, vec![(1, 0.5), (2, 0.5)]);
    }

    #[test]
    fn truncation_keeps_everything_under_window_size() {
        let v: Vec<(u32, f32)> = (0..10).map(|i| (i, 10.0 - i as f32)).collect();
        let truncated = sliding_window_truncate(&v, 100, 0.05);
        assert_eq!(truncated.len(), 10);
    }

    #[test]
    fn truncation_preserves_first_window_size_entries() {
        let mut v: Vec<(u32, f32)> = (0..150).map(|i| (i, 1000.0 - i as f32)).collect();
        // A sharp drop right after position 100 should trigger the cutoff,
        // but the first 100 entries must always survive.
        v[100].1 = 0.0001;
        for item in v.iter_mut().skip(101) {
            item.1 = 0.0001;
        }
        let truncated = sliding_window_truncate(&v, 100, 0.05);
        assert!(truncated.len() >= 100);
        assert_eq!(&truncated[..100], &v[..100]);
    }

    #[test]
    fn truncation_cuts_a_long_flat_tail() {
        let mut v: Vec<(u32, f32)> = Vec::new();
        for i in 0..100 {
            v.push((i, 1000.0 - i as f32));
        }
        // long flat tail that barely moves
        for i in 100..1000 {
            v.push((i, 900.0 - (i as f32) * 0.0001));
        }
        let truncated = sliding_window_truncate(&v, 100, 0.05);
        assert!(truncated.len() < v.len());
    }

    #[test]
    fn parallel_emission_matches_sequential_output() {
        use crate::config::{Config, FilterChainConfig};
        use crate::document::{Document, DocumentSource};
        use crate::store::SqliteBackingStore;
        use tempfile::tempdir;

        struct FixedCorpus(Vec<Document>);
        impl DocumentSource for FixedCorpus {
            fn next_document(&mut self) -> crate::error::EsaResult<Option<Document>> {
                Ok(if self.0.is_empty() { None } else { Some(self.0.remove(0)) })
            }
        }
        fn corpus() -> FixedCorpus {
            FixedCorpus(vec![
                Document { doc_id: 1, title: "A".into(), body: "apple fruit banana".into() },
                Document { doc_id: 2, title: "B".into(), body: "apple pie banana".into() },
                Document { doc_id: 3, title: "C".into(), body: "fruit pie banana".into() },
            ])
        }
        fn chain() -> FilterChain {
            FilterChainConfig {
                lowercase: true,
                stem: false,
                remove_stopwords: false,
                stopwords_path: None,
            }
            .build()
            .unwrap()
        }

        let dir = tempdir().unwrap();

        let seq_store = SqliteBackingStore::open_in_memory().unwrap();
        let mut seq_config = Config::new(0.0);
        seq_config.parallel_emission = false;
        BackgroundBuilder::new(&seq_store, &seq_config, chain())
            .build(&mut corpus(), &dir.path().join("seq.bin"))
            .unwrap();

        let par_store = SqliteBackingStore::open_in_memory().unwrap();
        let mut par_config = Config::new(0.0);
        par_config.parallel_emission = true;
        BackgroundBuilder::new(&par_store, &par_config, chain())
            .build(&mut corpus(), &dir.path().join("par.bin"))
            .unwrap();

        let mut seq_vectors = seq_store.load_term_vectors().unwrap();
        let mut par_vectors = par_store.load_term_vectors().unwrap();
        seq_vectors.sort_by(|a, b| a.0.cmp(&b.0));
        par_vectors.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(seq_vectors, par_vectors);
    }
}
