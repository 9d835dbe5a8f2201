//! Command-line surface: a thin front end over [`crate::builder`] and
//! [`crate::query`].

use clap::Parser as ClapParser;
use std::path::PathBuf;

#[derive(ClapParser, Debug)]
#[command(
    author,
    version,
    about = "Explicit Semantic Analysis: build a concept-space index from a reference corpus and query it",
    long_about = None
)]
pub struct Args {
    /// Path to the bzip2-compressed MediaWiki export dump.
    #[arg(value_name = "WIKIDUMP")]
    pub wikidump: PathBuf,

    /// Cap the number of documents ingested during a build.
    #[arg(short = 'l', long = "limit")]
    pub limit: Option<usize>,

    /// Perform a fresh build instead of loading an existing index to query.
    #[arg(short = 'b', long = "build")]
    pub build: bool,

    /// Backing-store file (SQLite) holding the concept index.
    #[arg(long = "database", value_name = "PATH")]
    pub database: PathBuf,

    /// Label file (doc_id -> title) persisted alongside the backing store.
    #[arg(long = "explicit", value_name = "PATH")]
    pub explicit: PathBuf,

    /// Minimum stored TF weight a row must exceed to survive into concept
    /// vectors. Required when `-b/--build` is given; there is no built-in
    /// default since the right cutoff varies with corpus size and density.
    #[arg(long = "min-freq", value_name = "N")]
    pub min_freq: Option<f32>,

    /// Custom stop-word list, one word per line. Falls back to the built-in
    /// English list.
    #[arg(long = "stopwords", value_name = "PATH")]
    pub stopwords: Option<PathBuf>,

    /// Raise the tracing log level to debug.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Run per-term concept-vector emission across a `rayon` thread pool
    /// instead of sequentially. Off by default.
    #[arg(long = "parallel-emission")]
    pub parallel_emission: bool,

    /// One-shot query text. May be given twice to also print the cosine
    /// similarity between the two queries. Omit to read queries one per
    /// line from stdin instead.
    #[arg(long = "query", value_name = "TEXT")]
    pub query: Vec<String>,

    /// Number of labelled concept dimensions to print per query.
    #[arg(long = "n-labels", default_value_t = 5)]
    pub n_labels: usize,
}

impl Args {
    /// Path the build/query config is persisted to, derived from the
    /// database path so a caller only has to name one artefact per run.
    pub fn config_path(&self) -> PathBuf {
        let mut path = self.database.clone();
        path.set_extension("config.json");
        path
    }
}
