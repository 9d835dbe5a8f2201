//! Explicit Semantic Analysis (ESA): represents text as a weighted vector
//! over a fixed concept space derived from a reference corpus, so two texts
//! can be compared by cosine similarity independent of surface lexical
//! overlap.
//!
//! The crate is split into the two phases described by the design:
//! ingesting a streaming corpus into an on-disk concept index
//! ([`builder`]), and serving that index to map query text into concept
//! space ([`query`]). Everything in between — tokenisation, the term
//! frequency store, IDF, and the on-disk codec — is its own module so build
//! and query share the same contracts.
//!
//! ```no_run
//! use esa_core::concept_index::ConceptIndex;
//! use esa_core::config::Config;
//! use esa_core::label_map::LabelMap;
//! use esa_core::query::ESAQuery;
//! use esa_core::store::SqliteBackingStore;
//! use std::path::Path;
//!
//! let config = Config::load(Path::new("index.config.json"))?;
//! let store = SqliteBackingStore::open(Path::new("index.db"))?;
//! let index = ConceptIndex::load(&store)?;
//! let labels = LabelMap::load(Path::new("index.labels.bin"))?;
//! let filter_chain = config.filter_chain.build()?;
//! let query = ESAQuery::from_parts(index, labels, filter_chain, config.n_labels);
//!
//! let (labels, vector) = query.get_vector("explicit semantic analysis");
//! # Ok::<(), esa_core::error::EsaError>(())
//! ```

pub mod builder;
pub mod concept_index;
pub mod config;
pub mod document;
pub mod error;
pub mod idf;
pub mod label_map;
pub mod query;
pub mod stopwords;
pub mod store;
pub mod token;
pub mod wikidump;
