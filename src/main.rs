//! # Memory Harness CLI (`mh`)
//!
//! The `mh` binary manages a file-backed memory directory: a curated
//! `MEMORY.md`, one daily note per day, and a hybrid keyword + vector index
//! over both.
//!
//! ## Usage
//!
//! ```bash
//! mh --config ./config/mh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mh init` | Create the memory directory, `MEMORY.md`, and the SQLite database |
//! | `mh note "<text>"` | Append to (or replace) today's daily note |
//! | `mh remember "<text>"` | Append to `MEMORY.md`, optionally under a section |
//! | `mh save "<text>" --kind <kind>` | Route a fact to its section or the daily note |
//! | `mh extract <file.json>` | Save a conversation transcript into today's note |
//! | `mh show` | Print today's note, a given date, or `MEMORY.md` |
//! | `mh sections` | List `MEMORY.md` sections with entry counts |
//! | `mh recent` | Summarize recent daily notes |
//! | `mh index` | Index every memory file |
//! | `mh search "<query>"` | Hybrid search over memory |
//! | `mh watch` | Index, then keep the index current as files change |
//! | `mh stats` | Memory and index statistics |
//! | `mh cleanup` | Delete daily notes older than the retention window |
//!
//! ## Examples
//!
//! ```bash
//! mh init
//! mh note "Switched the watcher to 300ms debounce"
//! mh save "Prefers tabs over spaces" --kind preference
//! mh search "debounce" --limit 5
//! mh cleanup --retention-days 14 --dry-run
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::info;

use memory_harness::config;
use memory_harness::harness::MemoryHarness;
use memory_harness::logging;
use memory_harness::memory::{ConversationMessage, SaveKind};
use memory_harness::{search, stats};

/// Memory Harness CLI: file-backed long-term memory with hybrid search.
#[derive(Parser)]
#[command(
    name = "mh",
    about = "Memory Harness — file-backed long-term memory with hybrid search",
    version,
    long_about = "Memory Harness keeps durable knowledge in plain Markdown files \
    (MEMORY.md plus dated daily notes), indexes them with BM25 and optional embeddings, \
    and keeps the index current by watching the memory directory."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mh.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the memory directory layout and database. Idempotent.
    Init,

    /// Write to today's daily note.
    Note {
        text: String,

        /// Overwrite today's note instead of appending a timestamped block.
        #[arg(long)]
        replace: bool,
    },

    /// Append an entry to MEMORY.md.
    Remember {
        text: String,

        /// Level-2 section to append under; created if missing.
        #[arg(long)]
        section: Option<String>,
    },

    /// Save a fact by kind.
    ///
    /// `daily` goes to today's note; `discovery`, `preference`, `decision`,
    /// `solution`, and `config` go to the matching MEMORY.md section.
    Save {
        text: String,

        #[arg(long)]
        kind: String,
    },

    /// Save a conversation transcript into today's daily note.
    ///
    /// The file is a JSON array of `{"role": ..., "content": ...}` objects.
    Extract {
        file: PathBuf,

        #[arg(long)]
        title: Option<String>,
    },

    /// Print a daily note (today by default) or MEMORY.md.
    Show {
        /// Date of the note, `YYYY-MM-DD`.
        #[arg(long, conflicts_with = "memory")]
        date: Option<String>,

        /// Print MEMORY.md instead of a daily note.
        #[arg(long)]
        memory: bool,
    },

    /// List MEMORY.md sections.
    Sections,

    /// Summarize daily notes from the last N days.
    Recent {
        #[arg(long, default_value = "7")]
        days: u32,
    },

    /// Index every memory file.
    Index {
        /// Re-chunk and re-embed files whose content hash is unchanged.
        #[arg(long)]
        force: bool,
    },

    /// Search memory.
    Search {
        query: String,

        /// Maximum results; defaults to `retrieval.final_limit`.
        #[arg(long)]
        limit: Option<usize>,

        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Index, then re-index files as they change until Ctrl-C.
    Watch,

    /// Show memory and index statistics.
    Stats,

    /// Delete daily notes older than the retention window.
    Cleanup {
        /// Defaults to `memory.retention_days`.
        #[arg(long)]
        retention_days: Option<u32>,

        /// Report what would be removed without deleting.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Search { query, limit, json } => {
            search::run_search(&cfg, &query, limit, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        command => {
            let harness = MemoryHarness::open(&cfg).await?;
            let result = run(&harness, command).await;
            harness.close().await;
            result?;
        }
    }

    Ok(())
}

async fn run(harness: &MemoryHarness, command: Commands) -> Result<()> {
    let manager = &harness.manager;

    match command {
        Commands::Init => {
            manager.initialize().await?;
            println!(
                "Memory initialized at {}",
                manager.memory_dir().display()
            );
            println!("Database initialized at {}", harness.config.db.path.display());
        }
        Commands::Note { text, replace } => {
            let path = manager.write_daily_note(&text, !replace).await?;
            println!("Saved to {}", path.display());
        }
        Commands::Remember { text, section } => {
            let path = manager.append_to_memory(&text, section.as_deref()).await?;
            println!("Saved to {}", path.display());
        }
        Commands::Save { text, kind } => {
            let kind: SaveKind = kind.parse()?;
            let outcome = manager.save_to_memory(&text, kind).await?;
            match outcome.section {
                Some(section) => println!(
                    "Saved to {} (## {})",
                    outcome.saved_to.display(),
                    section
                ),
                None => println!("Saved to {}", outcome.saved_to.display()),
            }
        }
        Commands::Extract { file, title } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let messages: Vec<ConversationMessage> = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse conversation in {}", file.display()))?;
            let outcome = manager
                .extract_from_conversation(&messages, title.as_deref())
                .await?;
            match outcome.saved_to {
                Some(path) => println!(
                    "Saved {} messages to {}",
                    outcome.message_count,
                    path.display()
                ),
                None => println!("Nothing to save."),
            }
        }
        Commands::Show { date, memory } => {
            if memory {
                match manager.read_memory().await? {
                    Some(text) => print!("{}", text),
                    None => println!("No MEMORY.md yet. Run `mh init`."),
                }
            } else {
                let date = date.unwrap_or_else(|| {
                    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
                });
                match manager.read_daily_note(&date).await? {
                    Some(text) => print!("{}", text),
                    None => println!("No daily note for {}", date),
                }
            }
        }
        Commands::Sections => {
            let sections = manager.get_memory_sections().await?;
            if sections.is_empty() {
                println!("No sections.");
            }
            for s in sections {
                let indent = "  ".repeat(s.level.saturating_sub(1));
                println!("{}{} ({} entries, line {})", indent, s.title, s.entries, s.line);
            }
        }
        Commands::Recent { days } => {
            let notes = manager.get_recent_daily_notes(days).await?;
            if notes.is_empty() {
                println!("No daily notes in the last {} days.", days);
            }
            for n in notes {
                println!(
                    "{}  {} words, {} conversations, {}/{} tasks done, {} discoveries",
                    n.date,
                    n.metadata.word_count,
                    n.metadata.conversation_count,
                    n.metadata.completed_tasks,
                    n.metadata.completed_tasks + n.metadata.pending_tasks,
                    n.metadata.discoveries
                );
            }
        }
        Commands::Index { force } => {
            let summary = harness.indexer.index_all(force).await?;
            println!(
                "Indexed {} files: {} updated, {} unchanged, {} removed, {} errors",
                summary.scanned, summary.indexed, summary.unchanged, summary.removed, summary.errors
            );
            println!("Documents: {}", harness.indexer.document_count().await);
        }
        Commands::Watch => {
            manager.initialize().await?;
            let summary = harness.indexer.index_all(false).await?;
            info!(
                scanned = summary.scanned,
                indexed = summary.indexed,
                "initial index complete"
            );

            let watcher = harness.watcher()?;
            let events = watcher.subscribe();
            watcher.start()?;
            let task = harness.indexer.clone().spawn(events);

            println!(
                "Watching {} (Ctrl-C to stop)",
                manager.memory_dir().display()
            );
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;

            watcher.stop();
            task.abort();
            let stats = watcher.stats();
            println!(
                "Stopped. {} changes, {} errors.",
                stats.changes_detected, stats.errors
            );
        }
        Commands::Cleanup {
            retention_days,
            dry_run,
        } => {
            let days = retention_days.unwrap_or(manager.config().retention_days);
            let report = manager.cleanup_daily_notes(days, dry_run).await?;
            let verb = if report.dry_run { "Would remove" } else { "Removed" };
            println!(
                "{} {} daily notes older than {} days ({} kept)",
                verb,
                report.removed.len(),
                days,
                report.kept
            );
            for path in &report.removed {
                println!("  {}", path);
            }
        }
        Commands::Search { .. } | Commands::Stats => unreachable!("dispatched in main"),
    }

    Ok(())
}
