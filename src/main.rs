// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use medcode_lib::persistence::{
    AssignmentStore, InMemoryAssignmentStore, NoteProvider, PgAssignmentStore, PgNoteProvider,
};
use medcode_lib::utils::coding_config::{CodingConfig, VocabularySourceKind};
use medcode_lib::utils::db_connect::{connect, get_pool_status, PgPool};
use medcode_lib::utils::env::load_env;
use medcode_lib::utils::get_memory_usage;
use medcode_lib::utils::logging::log_vocabulary_loaded;
use medcode_lib::vocabulary::{JsonlVocabularySource, PgVocabularySource, VocabularySource};
use medcode_lib::{
    ClinicalNote, CodeMatchingEngine, CodingReport, PersistenceOutcome, PolicySet, SearchScope,
    VocabularyStore,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Code one note stored in medical_notes
    Code { note_id: String },

    /// Code a note read from a JSON object of section name to text
    CodeFile {
        path: PathBuf,

        #[arg(long, default_value = "local")]
        note_id: String,

        /// Print matches without writing assignments
        #[arg(long)]
        no_persist: bool,
    },

    /// Code notes that have no automatic assignments yet
    CodePending {
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Fuzzy search across the loaded vocabularies
    Search {
        query: String,

        /// all | icd | cpt | snomed
        #[arg(long = "type", default_value = "all")]
        scope: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Print vocabulary statistics
    Stats,
}

impl Command {
    fn needs_database(&self, config: &CodingConfig) -> bool {
        match self {
            Command::Code { .. } | Command::CodePending { .. } => true,
            Command::CodeFile { no_persist, .. } => {
                !no_persist || config.vocabulary_source == VocabularySourceKind::Postgres
            }
            Command::Search { .. } | Command::Stats => {
                config.vocabulary_source == VocabularySourceKind::Postgres
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    load_env();
    let cli = Cli::parse();

    let config = CodingConfig::from_env();
    config.log_config();

    let pool = if cli.command.needs_database(&config) {
        let pool = connect().await.context("Failed to connect to database")?;
        info!("Successfully connected to the database");
        Some(pool)
    } else {
        None
    };

    let load_start = Instant::now();
    let source = build_source(&config, pool.as_ref())?;
    let store = VocabularyStore::load(source.as_ref(), &config.load_options()).await;
    let vocabulary_stats = store.stats();
    log_vocabulary_loaded(&vocabulary_stats);
    info!(
        "Vocabularies from '{}' ready in {:.2?} (memory: {} MB)",
        source.name(),
        load_start.elapsed(),
        get_memory_usage().await
    );
    if store.is_empty() {
        warn!("All vocabularies are empty; every note will code to empty lists");
    }

    let assignments: Arc<dyn AssignmentStore> = match &pool {
        Some(pool) => Arc::new(PgAssignmentStore::new(pool.clone())),
        None => Arc::new(InMemoryAssignmentStore::new()),
    };
    let policies = PolicySet::from_config(&config).context("Invalid matching configuration")?;
    let engine = CodeMatchingEngine::new(Arc::new(store), policies, assignments)
        .with_cache_size(config.cache_size);

    match cli.command {
        Command::Code { note_id } => {
            let pool = require_pool(&pool)?;
            let note = PgNoteProvider::new(pool.clone())
                .fetch_note(&note_id)
                .await
                .with_context(|| format!("Failed to load note {}", note_id))?;
            let report = engine.code_note(&note, &note_id).await;
            print_report(&report)?;
        }
        Command::CodeFile {
            path,
            note_id,
            no_persist,
        } => {
            let note = read_note_file(&path).await?;
            if no_persist {
                let (codes, _stats) = engine.match_note(&note, &note_id).await;
                println!("{}", serde_json::to_string_pretty(&codes)?);
            } else {
                let report = engine.code_note(&note, &note_id).await;
                print_report(&report)?;
            }
        }
        Command::CodePending { limit } => {
            let pool = require_pool(&pool)?;
            code_pending(&engine, pool, limit).await?;
        }
        Command::Search {
            query,
            scope,
            limit,
        } => {
            let scope: SearchScope = scope.parse().context("Invalid --type")?;
            let hits = engine.search_vocabulary(&query, scope, limit).await;
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&vocabulary_stats)?);
        }
    }

    if let Some(pool) = &pool {
        let (connections, idle) = get_pool_status(pool);
        info!("DB pool at exit: {} connections, {} idle", connections, idle);
    }
    Ok(())
}

fn build_source(config: &CodingConfig, pool: Option<&PgPool>) -> Result<Box<dyn VocabularySource>> {
    match config.vocabulary_source {
        VocabularySourceKind::Postgres => {
            let pool = pool.context("Postgres vocabulary source needs a database connection")?;
            Ok(Box::new(PgVocabularySource::new(pool.clone())))
        }
        VocabularySourceKind::File => Ok(Box::new(JsonlVocabularySource::new(
            config.vocabulary_dir.clone(),
        ))),
    }
}

fn require_pool(pool: &Option<PgPool>) -> Result<PgPool> {
    pool.clone()
        .context("This command needs a database connection")
}

async fn read_note_file(path: &Path) -> Result<ClinicalNote> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read note file {}", path.display()))?;
    let sections: HashMap<String, Option<String>> = serde_json::from_str(&raw)
        .with_context(|| format!("Note file {} is not a JSON object of sections", path.display()))?;
    Ok(ClinicalNote::from(sections))
}

fn print_report(report: &CodingReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&report.codes)?);
    match &report.persistence {
        PersistenceOutcome::Stored(count) => {
            info!("Stored {} automatic assignments for note {}", count, report.note_id)
        }
        PersistenceOutcome::Failed(e) => {
            error!("Assignments for note {} were not stored: {}", report.note_id, e)
        }
    }
    Ok(())
}

async fn code_pending(engine: &CodeMatchingEngine, pool: PgPool, limit: usize) -> Result<()> {
    let provider = PgNoteProvider::new(pool);
    let note_ids = provider
        .pending_note_ids(limit)
        .await
        .context("Failed to list pending notes")?;
    if note_ids.is_empty() {
        info!("No pending notes");
        return Ok(());
    }

    let pb = ProgressBar::new(note_ids.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    pb.set_message("Coding notes...");

    let start = Instant::now();
    let concurrency = num_cpus::get().max(1);
    let provider = &provider;
    let pb_ref = &pb;
    let outcomes: Vec<bool> = stream::iter(note_ids)
        .map(|note_id| async move {
            let ok = match provider.fetch_note(&note_id).await {
                Ok(note) => engine.code_note(&note, &note_id).await.is_persisted(),
                Err(e) => {
                    warn!("Skipping note {}: {}", note_id, e);
                    false
                }
            };
            pb_ref.inc(1);
            ok
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let stored = outcomes.iter().filter(|ok| **ok).count();
    pb.finish_with_message(format!("{} of {} notes coded", stored, outcomes.len()));
    info!(
        "Coded {} pending notes ({} failed) in {:.2?}",
        stored,
        outcomes.len() - stored,
        start.elapsed()
    );
    Ok(())
}
