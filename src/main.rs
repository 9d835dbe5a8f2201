use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use esa_core::builder::{BackgroundBuilder, ProgressSink};
use esa_core::config::Config;
use esa_core::query::ESAQuery;
use esa_core::wikidump::WikidumpSource;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use tracing::{error, info};

mod cli;

use cli::Args;

/// Drives an `indicatif` progress bar from the builder's ingest/emission
/// callbacks.
struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self { bar }
    }
}

impl ProgressSink for IndicatifProgress {
    fn on_document(&self, ingested: usize) {
        self.bar.set_message(format!("ingested {ingested} documents"));
        self.bar.tick();
    }

    fn on_term(&self, retained: usize) {
        self.bar.set_message(format!("emitted {retained} concept vectors"));
        self.bar.tick();
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .with_target(false)
        .init();
}

fn run_build(args: &Args) -> Result<()> {
    let min_freq = args
        .min_freq
        .context("--min-freq is required when building (no default is agreed upon)")?;

    let mut config = Config::new(min_freq);
    if let Some(stopwords_path) = &args.stopwords {
        config.filter_chain.stopwords_path = Some(stopwords_path.clone());
    }
    config.n_labels = args.n_labels;
    config.parallel_emission = args.parallel_emission;

    info!(path = %args.wikidump.display(), "opening corpus dump");
    let mut source = WikidumpSource::open(&args.wikidump, args.limit)
        .with_context(|| format!("opening wikidump at {}", args.wikidump.display()))?;

    let store = esa_core::store::SqliteBackingStore::open(&args.database)
        .with_context(|| format!("opening backing store at {}", args.database.display()))?;
    let filter_chain = config.filter_chain.build()?;

    let progress = IndicatifProgress::new();
    let stats = BackgroundBuilder::new(&store, &config, filter_chain)
        .with_progress(Box::new(progress))
        .build(&mut source, &args.explicit)
        .context("build failed")?;
    progress_finish(&stats);

    config
        .save(&args.config_path())
        .context("saving build config")?;

    info!(
        documents = stats.documents_ingested,
        interned = stats.distinct_terms_interned,
        retained = stats.distinct_terms_retained,
        elapsed = ?stats.elapsed,
        "build complete"
    );
    Ok(())
}

fn progress_finish(stats: &esa_core::builder::BuildStats) {
    if stats.cancelled {
        info!("build cancelled by stop signal");
    }
}

fn run_query(args: &Args) -> Result<()> {
    let min_freq = args.min_freq.unwrap_or(0.0);
    let mut config = Config::new(min_freq);
    if let Some(stopwords_path) = &args.stopwords {
        config.filter_chain.stopwords_path = Some(stopwords_path.clone());
    }
    config.n_labels = args.n_labels;

    let query = ESAQuery::load(&args.database, &args.explicit, &args.config_path(), &config)
        .context("loading concept index")?;
    info!(
        terms = query.index_len(),
        labels = query.label_count(),
        "loaded concept index"
    );

    if !args.query.is_empty() {
        run_one_shot_queries(&query, &args.query);
        return Ok(());
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading query from stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        print_query_result(&query, &line);
    }
    Ok(())
}

fn run_one_shot_queries(query: &ESAQuery, texts: &[String]) {
    print_query_result(query, &texts[0]);
    if let Some(second) = texts.get(1) {
        let (_, v1) = query.get_vector(&texts[0]);
        let (labels2, v2) = query.get_vector(second);
        println!("--- {second} ---");
        for label in &labels2 {
            println!("  {:<40} {:.4}", label.title, label.score);
        }
        let sim = ESAQuery::similarity(&v1, &v2);
        println!("similarity({:?}, {:?}) = {sim:.4}", texts[0], second);
    }
}

fn print_query_result(query: &ESAQuery, text: &str) {
    let (labels, _vector) = query.get_vector(text);
    println!("--- {text} ---");
    if labels.is_empty() {
        println!("  (no matching concepts)");
    }
    for label in &labels {
        println!("  {:<40} {:.4}", label.title, label.score);
    }
    let _ = io::stdout().flush();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let result = if args.build { run_build(&args) } else { run_query(&args) };

    if let Err(err) = &result {
        error!(error = %err, "fatal error");
    }
    result
}
