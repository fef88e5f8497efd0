//! # Memory Harness
//!
//! Hybrid search and permanent memory for AI assistants, backed by plain
//! Markdown files.
//!
//! Long-term knowledge lives in `MEMORY.md`, day-to-day notes in
//! `daily/YYYY-MM-DD.md`. A watcher debounces file changes and signals the
//! indexer, which chunks files into a BM25 corpus, embeds them when a
//! provider is configured, and records status in SQLite. Searches fuse
//! keyword and vector rankings with Reciprocal Rank Fusion.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  index-needed  ┌────────────┐   ┌──────────────────┐
//! │  Watcher   │───────────────▶│  Indexer   │──▶│ SQLite status +  │
//! │ (notify)   │                │ chunk+embed│   │ embedding cache  │
//! └────────────┘                └─────┬──────┘   └────────┬─────────┘
//!                                     ▼                   ▼
//!                               ┌──────────┐        ┌──────────┐
//!                               │   BM25   │──RRF──▶│  Vector  │
//!                               └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mh init                                   # create MEMORY.md and daily/
//! mh note "Fixed the flaky watcher test"    # append to today's note
//! mh save "Prefers tabs" --kind preference  # route to a MEMORY.md section
//! mh search "watcher debounce"
//! mh watch                                  # keep the index fresh
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed library errors |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Index status and embedding cache |
//! | [`embedding`] | Embedding providers |
//! | [`vector`] | Vector retriever over cached embeddings |
//! | [`hybrid`] | BM25 + vector fusion engine |
//! | [`memory`] | `MEMORY.md` and daily notes |
//! | [`watcher`] | Debounced file watching |
//! | [`indexer`] | Incremental indexing |
//! | [`harness`] | Component wiring |
//! | [`search`] | `mh search` output |
//! | [`stats`] | `mh stats` output |

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod harness;
pub mod hybrid;
pub mod indexer;
pub mod logging;
pub mod memory;
pub mod migrate;
pub mod search;
pub mod stats;
pub mod store;
pub mod vector;
pub mod watcher;
