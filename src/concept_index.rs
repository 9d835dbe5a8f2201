//! On-disk concept vector codec and the in-memory `ConceptIndex`.
//!
//! Binary vector layout: packed 8-byte records, little-endian —
//! `doc_id: u32` followed by `weight: f32`. Byte order is pinned to
//! little-endian (rather than native) so the format is interoperable across
//! build and query machines regardless of their native endianness.

use crate::store::SqliteBackingStore;
use ahash::AHashMap;

pub type SparseVector = AHashMap<u32, f32>;

/// Encodes `(doc_id, weight)` pairs into the packed binary layout.
pub fn encode_vector(pairs: &[(u32, f32)]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(pairs.len() * 8);
    for (doc_id, weight) in pairs {
        blob.extend_from_slice(&doc_id.to_le_bytes());
        blob.extend_from_slice(&weight.to_le_bytes());
    }
    blob
}

/// Decodes a packed binary blob back into `(doc_id, weight)` pairs. Entry
/// count is implicit in `blob.len() / 8`.
pub fn decode_vector(blob: &[u8]) -> Vec<(u32, f32)> {
    blob.chunks_exact(8)
        .map(|chunk| {
            let doc_id = u32::from_le_bytes(chunk[0..4].try_into().unwrap());
            let weight = f32::from_le_bytes(chunk[4..8].try_into().unwrap());
            (doc_id, weight)
        })
        .collect()
}

/// `word -> {doc_id -> weight}`, fully resident in RAM once loaded. Built
/// once by `BackgroundBuilder`, read-only afterwards.
#[derive(Default)]
pub struct ConceptIndex {
    by_word: AHashMap<String, SparseVector>,
}

impl ConceptIndex {
    /// Joins `term_wordmap` with `term` and decodes every surviving vector.
    /// A word whose every occurrence was truncated away (so it has no row
    /// in `term`) is simply absent here; lookups for it fall back to an
    /// empty map, identically to a word never seen at build time.
    pub fn load(store: &SqliteBackingStore) -> crate::error::EsaResult<Self> {
        let mut by_word = AHashMap::new();
        for (word, blob) in store.load_term_vectors()? {
            let vector: SparseVector = decode_vector(&blob).into_iter().collect();
            by_word.insert(word, vector);
        }
        Ok(Self { by_word })
    }

    /// Looks up a word's concept vector; `None` for words never retained.
    pub fn get(&self, word: &str) -> Option<&SparseVector> {
        self.by_word.get(word)
    }

    pub fn len(&self) -> usize {
        self.by_word.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_word.is_empty()
    }
}
