//! Tokenizer, filter chain and word map.
//!
//! A build and a query must run text through the *same* chain, configured
//! once per run (`Config::filter_chain`, see `config.rs`) — mismatches are
//! caught as a `ConfigError` before the query path runs.

use ahash::AHashMap;
use once_cell::sync::OnceCell;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::sync::Arc;

fn token_regex() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new("[A-Za-z-]+").unwrap())
}

fn stemmer() -> &'static Stemmer {
    static STEMMER: OnceCell<Stemmer> = OnceCell::new();
    STEMMER.get_or_init(|| Stemmer::create(Algorithm::English))
}

/// Splits raw text into maximal runs of `[A-Za-z-]`. Digits, punctuation and
/// whitespace are separators; everything outside ASCII letters is dropped.
pub fn tokenize_raw(text: &str) -> Vec<String> {
    token_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// One stage of the filter chain: a pure `Vec<token> -> Vec<token>` mapping.
#[derive(Clone)]
pub enum TokenTransformer {
    Lowercase,
    Stem,
    RemoveStopwords(Arc<HashSet<String>>),
    /// No-op pass-through stage, useful as the tail of a chain or a
    /// placeholder slot for a future transformer.
    Identity,
}

impl TokenTransformer {
    fn apply(&self, tokens: Vec<String>) -> Vec<String> {
        match self {
            TokenTransformer::Lowercase => tokens.into_iter().map(|t| t.to_lowercase()).collect(),
            TokenTransformer::Stem => tokens
                .into_iter()
                .map(|t| stemmer().stem(&t).into_owned())
                .collect(),
            TokenTransformer::RemoveStopwords(set) => {
                tokens.into_iter().filter(|t| !set.contains(t)).collect()
            }
            TokenTransformer::Identity => tokens,
        }
    }
}

/// An ordered composition of `TokenTransformer`s, applied identically at
/// build and query time.
#[derive(Clone)]
pub struct FilterChain {
    stages: Vec<TokenTransformer>,
}

impl FilterChain {
    pub fn new(stages: Vec<TokenTransformer>) -> Self {
        Self { stages }
    }

    /// The canonical chain: lowercase, Porter stem, stop-word removal,
    /// identity.
    pub fn canonical(stopwords: Arc<HashSet<String>>) -> Self {
        Self::new(vec![
            TokenTransformer::Lowercase,
            TokenTransformer::Stem,
            TokenTransformer::RemoveStopwords(stopwords),
            TokenTransformer::Identity,
        ])
    }

    /// Tokenizes raw text and runs it through every stage in order.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = tokenize_raw(text);
        for stage in &self.stages {
            tokens = stage.apply(tokens);
        }
        tokens
    }
}

/// Interns surface strings into dense, contiguous `term_id`s assigned by
/// insertion order. A given surface string always maps to the same
/// `term_id` within one build.
#[derive(Default)]
pub struct WordMap {
    surface_to_id: AHashMap<String, u32>,
    id_to_surface: Vec<String>,
}

impl WordMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing id for `surface`, assigning a fresh one on miss.
    pub fn intern(&mut self, surface: &str) -> u32 {
        if let Some(&id) = self.surface_to_id.get(surface) {
            return id;
        }
        let id = self.id_to_surface.len() as u32;
        self.id_to_surface.push(surface.to_string());
        self.surface_to_id.insert(surface.to_string(), id);
        id
    }

    /// Looks up `surface` without interning it. Used at query time, where
    /// an unseen word must be treated as an empty contribution rather than
    /// silently growing the word map.
    pub fn lookup(&self, surface: &str) -> Option<u32> {
        self.surface_to_id.get(surface).copied()
    }

    pub fn len(&self) -> usize {
        self.id_to_surface.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_surface.is_empty()
    }

    /// Iterates `(surface, term_id)` pairs in insertion order, for
    /// persistence into `term_wordmap`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.id_to_surface
            .iter()
            .enumerate()
            .map(|(id, surface)| (surface.as_str(), id as u32))
    }

    /// Rebuilds a `WordMap` from persisted `(surface, term_id)` pairs. The
    /// caller (the backing store's load path) is responsible for supplying
    /// every pair exactly once; ids need not arrive in order.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, u32)>) -> Self {
        let mut surface_to_id = AHashMap::new();
        let mut id_to_surface = Vec::new();
        for (surface, id) in pairs {
            let needed = id as usize + 1;
            if id_to_surface.len() < needed {
                id_to_surface.resize(needed, String::new());
            }
            id_to_surface[id as usize] = surface.clone();
            surface_to_id.insert(surface, id);
        }
        Self {
            surface_to_id,
            id_to_surface,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_splits_on_non_letters() {
        let tokens = tokenize_raw("Hello, world! co-operate 123");
        assert_eq!(tokens, vec!["Hello", "world", "co-operate"]);
    }

    #[test]
    fn wordmap_is_stable_within_a_build() {
        let mut wm = WordMap::new();
        let a = wm.intern("apple");
        let b = wm.intern("banana");
        let a2 = wm.intern("apple");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(wm.lookup("apple"), Some(a));
        assert_eq!(wm.lookup("cherry"), None);
    }

    #[test]
    fn wordmap_round_trips_through_pairs() {
        let mut wm = WordMap::new();
        wm.intern("apple");
        wm.intern("banana");
        let pairs: Vec<_> = wm
            .iter()
            .map(|(s, id)| (s.to_string(), id))
            .collect();
        let loaded = WordMap::from_pairs(pairs);
        assert_eq!(loaded.lookup("apple"), wm.lookup("apple"));
        assert_eq!(loaded.lookup("banana"), wm.lookup("banana"));
    }

    #[test]
    fn canonical_chain_lowercases_stems_and_drops_stopwords() {
        let mut sw = HashSet::new();
        sw.insert("the".to_string());
        let chain = FilterChain::canonical(Arc::new(sw));
        let tokens = chain.tokenize("The Running Dogs");
        // "the" is removed; "Running"/"Dogs" are lowercased and stemmed.
        assert!(!tokens.contains(&"the".to_string()));
        assert!(tokens.contains(&"run".to_string()) || tokens.contains(&"running".to_string()));
    }
}
