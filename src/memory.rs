//! File-backed long-term memory.
//!
//! # Layout
//!
//! ```text
//! <memory.dir>/
//! ├── MEMORY.md            # curated long-term knowledge, by section
//! └── daily/
//!     └── YYYY-MM-DD.md    # one note per day; the filename is the date key
//! ```
//!
//! Section edits go through [`memory_harness_core::markdown`], so headings
//! inside fenced code and nested `###` sub-sections are handled correctly.
//! Index status and embeddings live in an [`IndexStore`].
//!
//! Daily notes are never deleted implicitly; [`PermanentMemoryManager::cleanup_daily_notes`]
//! is the only retention path.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use memory_harness_core::chunk::sha256_hex;
use memory_harness_core::markdown::{
    append_to_end, append_to_section, parse_sections, section_entry_count,
};
pub use memory_harness_core::markdown::{parse_daily_note_metadata, DailyNoteMetadata};

use crate::config::MemoryConfig;
use crate::error::MemoryError;
use crate::store::{IndexRecord, IndexStatus, IndexStore};

pub const MEMORY_FILE: &str = "MEMORY.md";
pub const DAILY_DIR: &str = "daily";

const MEMORY_TEMPLATE: &str = "# Long-Term Memory

Durable knowledge carried across sessions. Entries are appended under the matching section.

## User Preferences

## Architecture Decisions

## Common Issues & Solutions

## Technical Discoveries

## Important Configuration
";

/// Where a `save_to_memory` call lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveKind {
    Daily,
    Discovery,
    Preference,
    Decision,
    Solution,
    Config,
}

impl SaveKind {
    /// Target `MEMORY.md` section; `None` for the daily note.
    pub fn section(&self) -> Option<&'static str> {
        match self {
            SaveKind::Daily => None,
            SaveKind::Discovery => Some("Technical Discoveries"),
            SaveKind::Preference => Some("User Preferences"),
            SaveKind::Decision => Some("Architecture Decisions"),
            SaveKind::Solution => Some("Common Issues & Solutions"),
            SaveKind::Config => Some("Important Configuration"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SaveKind::Daily => "daily",
            SaveKind::Discovery => "discovery",
            SaveKind::Preference => "preference",
            SaveKind::Decision => "decision",
            SaveKind::Solution => "solution",
            SaveKind::Config => "config",
        }
    }
}

impl fmt::Display for SaveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaveKind {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(SaveKind::Daily),
            "discovery" => Ok(SaveKind::Discovery),
            "preference" => Ok(SaveKind::Preference),
            "decision" => Ok(SaveKind::Decision),
            "solution" => Ok(SaveKind::Solution),
            "config" => Ok(SaveKind::Config),
            other => Err(MemoryError::UnknownSaveKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub saved_to: PathBuf,
    pub section: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractOutcome {
    /// `None` when there was nothing to save.
    pub saved_to: Option<PathBuf>,
    pub message_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemorySection {
    pub title: String,
    pub level: usize,
    /// 1-based line of the heading.
    pub line: usize,
    /// Non-blank body lines, nested headings excluded.
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyNote {
    pub date: NaiveDate,
    pub relative_path: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyNoteSummary {
    pub date: NaiveDate,
    pub relative_path: String,
    pub size: u64,
    pub metadata: DailyNoteMetadata,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    /// Notes removed, or that would be removed on a dry run.
    pub removed: Vec<String>,
    pub kept: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub memory_dir: PathBuf,
    pub memory_file_exists: bool,
    pub memory_file_size: u64,
    pub section_count: usize,
    pub daily_note_count: usize,
    pub oldest_note: Option<NaiveDate>,
    pub newest_note: Option<NaiveDate>,
    pub indexed_files: usize,
    pub pending_files: usize,
    pub error_files: usize,
    pub cached_embeddings: i64,
}

/// Owns the memory directory and its index-status records.
pub struct PermanentMemoryManager {
    config: MemoryConfig,
    store: Arc<dyn IndexStore>,
}

impl PermanentMemoryManager {
    pub fn new(config: MemoryConfig, store: Arc<dyn IndexStore>) -> Self {
        Self { config, store }
    }

    pub fn memory_dir(&self) -> &Path {
        &self.config.dir
    }

    pub fn memory_path(&self) -> PathBuf {
        self.config.dir.join(MEMORY_FILE)
    }

    pub fn daily_dir(&self) -> PathBuf {
        self.config.dir.join(DAILY_DIR)
    }

    pub fn daily_note_path(&self, date: NaiveDate) -> PathBuf {
        self.daily_dir().join(format!("{}.md", date.format("%Y-%m-%d")))
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Create `daily/` and a templated `MEMORY.md`. Idempotent.
    pub async fn initialize(&self) -> Result<()> {
        let daily = self.daily_dir();
        tokio::fs::create_dir_all(&daily)
            .await
            .map_err(|source| MemoryError::Initialization {
                path: daily.clone(),
                source,
            })?;

        let memory_path = self.memory_path();
        let exists = tokio::fs::try_exists(&memory_path)
            .await
            .map_err(|source| MemoryError::Initialization {
                path: memory_path.clone(),
                source,
            })?;
        if !exists {
            tokio::fs::write(&memory_path, MEMORY_TEMPLATE)
                .await
                .map_err(|source| MemoryError::Initialization {
                    path: memory_path.clone(),
                    source,
                })?;
            info!(path = %memory_path.display(), "created long-term memory file");
        }

        Ok(())
    }

    /// Write today's daily note. See [`write_daily_note_on`](Self::write_daily_note_on).
    pub async fn write_daily_note(&self, content: &str, append: bool) -> Result<PathBuf> {
        self.write_daily_note_on(Local::now().naive_local(), content, append)
            .await
    }

    /// Write the note for `at`'s date.
    ///
    /// A new (or replaced) note starts with `# Daily Notes YYYY-MM-DD`.
    /// Appending to an existing note adds a `## HH:MM:SS` heading first.
    pub async fn write_daily_note_on(
        &self,
        at: NaiveDateTime,
        content: &str,
        append: bool,
    ) -> Result<PathBuf> {
        let path = self.daily_note_path(at.date());
        let existing = if append {
            read_optional(&path).await?
        } else {
            None
        };

        let text = match existing {
            Some(existing) => {
                let block = format!("## {}\n\n{}", at.format("%H:%M:%S"), content.trim());
                append_to_end(&existing, &block)
            }
            None => daily_note_header(at.date(), content),
        };

        write_file(&path, &text).await?;
        debug!(path = %path.display(), append, "wrote daily note");
        Ok(path)
    }

    /// `date` is `YYYY-MM-DD`. Missing note → `None`.
    pub async fn read_daily_note(&self, date: &str) -> Result<Option<String>> {
        let date = parse_date(date)?;
        read_optional(&self.daily_note_path(date)).await
    }

    pub async fn read_memory(&self) -> Result<Option<String>> {
        read_optional(&self.memory_path()).await
    }

    /// Append to the level-2 `section` of `MEMORY.md` (created at the end
    /// if missing), or to the end of the file when `section` is `None`.
    pub async fn append_to_memory(&self, content: &str, section: Option<&str>) -> Result<PathBuf> {
        let path = self.memory_path();
        let existing = read_optional(&path)
            .await?
            .unwrap_or_else(|| MEMORY_TEMPLATE.to_string());

        let text = match section {
            Some(section) => append_to_section(&existing, section, content),
            None => append_to_end(&existing, content),
        };

        write_file(&path, &text).await?;
        debug!(section = section.unwrap_or("<end>"), "appended to long-term memory");
        Ok(path)
    }

    pub async fn save_to_memory(&self, text: &str, kind: SaveKind) -> Result<SaveOutcome> {
        self.save_to_memory_at(Local::now().naive_local(), text, kind)
            .await
    }

    pub async fn save_to_memory_at(
        &self,
        at: NaiveDateTime,
        text: &str,
        kind: SaveKind,
    ) -> Result<SaveOutcome> {
        match kind.section() {
            None => {
                let saved_to = self.write_daily_note_on(at, text, true).await?;
                Ok(SaveOutcome {
                    saved_to,
                    section: None,
                })
            }
            Some(section) => {
                let entry = format!("- {}", text.trim());
                let saved_to = self.append_to_memory(&entry, Some(section)).await?;
                Ok(SaveOutcome {
                    saved_to,
                    section: Some(section.to_string()),
                })
            }
        }
    }

    /// Append a `## 💬 {title}` block with role-tagged, truncated messages
    /// to today's daily note.
    pub async fn extract_from_conversation(
        &self,
        messages: &[ConversationMessage],
        title: Option<&str>,
    ) -> Result<ExtractOutcome> {
        self.extract_from_conversation_at(Local::now().naive_local(), messages, title)
            .await
    }

    pub async fn extract_from_conversation_at(
        &self,
        at: NaiveDateTime,
        messages: &[ConversationMessage],
        title: Option<&str>,
    ) -> Result<ExtractOutcome> {
        let kept: Vec<&ConversationMessage> = messages
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .collect();
        if kept.is_empty() {
            return Ok(ExtractOutcome {
                saved_to: None,
                message_count: 0,
            });
        }

        let title = title
            .map(str::to_string)
            .unwrap_or_else(|| format!("Conversation {}", at.format("%H:%M")));
        let mut block = format!("## 💬 {}\n", title);
        for message in &kept {
            block.push('\n');
            block.push_str(&format!(
                "**{}**: {}\n",
                message.role,
                truncate_chars(message.content.trim(), self.config.max_message_chars)
            ));
        }

        let path = self.daily_note_path(at.date());
        let text = match read_optional(&path).await? {
            Some(existing) => append_to_end(&existing, &block),
            None => daily_note_header(at.date(), &block),
        };
        write_file(&path, &text).await?;

        Ok(ExtractOutcome {
            saved_to: Some(path),
            message_count: kept.len(),
        })
    }

    pub async fn get_memory_sections(&self) -> Result<Vec<MemorySection>> {
        let Some(text) = self.read_memory().await? else {
            return Ok(Vec::new());
        };
        Ok(parse_sections(&text)
            .iter()
            .map(|s| MemorySection {
                title: s.title.clone(),
                level: s.level,
                line: s.line + 1,
                entries: section_entry_count(&text, s),
            })
            .collect())
    }

    /// Every daily note whose filename is a valid date, newest first.
    pub async fn list_daily_notes(&self) -> Result<Vec<DailyNote>> {
        let dir = self.daily_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to list {}", dir.display()))
            }
        };

        let mut notes = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(".md") else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") else {
                continue;
            };
            notes.push(DailyNote {
                date,
                relative_path: format!("{}/{}", DAILY_DIR, name),
                path: entry.path(),
            });
        }

        notes.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(notes)
    }

    /// Notes from the last `days` days (today included), newest first.
    pub async fn get_recent_daily_notes(&self, days: u32) -> Result<Vec<DailyNoteSummary>> {
        self.recent_daily_notes_from(Local::now().date_naive(), days)
            .await
    }

    pub async fn recent_daily_notes_from(
        &self,
        today: NaiveDate,
        days: u32,
    ) -> Result<Vec<DailyNoteSummary>> {
        if days == 0 {
            return Ok(Vec::new());
        }
        let earliest = today - Duration::days(i64::from(days) - 1);

        let mut out = Vec::new();
        for note in self.list_daily_notes().await? {
            if note.date > today || note.date < earliest {
                continue;
            }
            let text = tokio::fs::read_to_string(&note.path)
                .await
                .with_context(|| format!("Failed to read {}", note.path.display()))?;
            out.push(DailyNoteSummary {
                date: note.date,
                relative_path: note.relative_path,
                size: text.len() as u64,
                metadata: parse_daily_note_metadata(&text),
            });
        }
        Ok(out)
    }

    /// Remove daily notes older than `retention_days`, with their index
    /// records and cached embeddings.
    pub async fn cleanup_daily_notes(
        &self,
        retention_days: u32,
        dry_run: bool,
    ) -> Result<CleanupReport> {
        self.cleanup_daily_notes_from(Local::now().date_naive(), retention_days, dry_run)
            .await
    }

    pub async fn cleanup_daily_notes_from(
        &self,
        today: NaiveDate,
        retention_days: u32,
        dry_run: bool,
    ) -> Result<CleanupReport> {
        let cutoff = today - Duration::days(i64::from(retention_days));
        let mut report = CleanupReport {
            dry_run,
            ..Default::default()
        };

        for note in self.list_daily_notes().await? {
            if note.date >= cutoff {
                report.kept += 1;
                continue;
            }
            if !dry_run {
                tokio::fs::remove_file(&note.path)
                    .await
                    .with_context(|| format!("Failed to remove {}", note.path.display()))?;
                self.store.remove_embeddings(&note.relative_path).await?;
                self.store.remove_record(&note.relative_path).await?;
                info!(note = %note.relative_path, "removed expired daily note");
            }
            report.removed.push(note.relative_path);
        }

        report.removed.sort();
        Ok(report)
    }

    pub async fn get_stats(&self) -> Result<MemoryStats> {
        let memory = self.read_memory().await?;
        let notes = self.list_daily_notes().await?;
        let records = self.store.list_records().await?;
        let count = |status: IndexStatus| records.iter().filter(|r| r.status == status).count();

        Ok(MemoryStats {
            memory_dir: self.config.dir.clone(),
            memory_file_exists: memory.is_some(),
            memory_file_size: memory.as_ref().map(|m| m.len() as u64).unwrap_or(0),
            section_count: memory.as_deref().map(|m| parse_sections(m).len()).unwrap_or(0),
            daily_note_count: notes.len(),
            newest_note: notes.first().map(|n| n.date),
            oldest_note: notes.last().map(|n| n.date),
            indexed_files: count(IndexStatus::Indexed),
            pending_files: count(IndexStatus::Pending) + count(IndexStatus::Stale),
            error_files: count(IndexStatus::Error),
            cached_embeddings: self.store.embedding_count().await?,
        })
    }

    pub fn hash_content(&self, text: &str) -> String {
        sha256_hex(text)
    }

    /// Record `status` for a file, refreshing its size and hash from disk.
    pub async fn update_index_status(
        &self,
        relative_path: &str,
        status: IndexStatus,
        metadata_count: i64,
    ) -> Result<IndexRecord> {
        self.write_status(relative_path, status, metadata_count, None, None)
            .await
    }

    /// Record `status` with the size and hash of the text that was actually
    /// indexed, which may differ from what is on disk by now.
    pub async fn update_index_status_with(
        &self,
        relative_path: &str,
        status: IndexStatus,
        metadata_count: i64,
        file_size: i64,
        content_hash: &str,
    ) -> Result<IndexRecord> {
        let observed = Some((file_size, content_hash.to_string()));
        self.write_status(relative_path, status, metadata_count, observed, None)
            .await
    }

    /// Mark a file as failed, keeping the message for `mh stats`.
    pub async fn mark_index_error(
        &self,
        relative_path: &str,
        message: &str,
    ) -> Result<IndexRecord> {
        let error = Some(message.to_string());
        self.write_status(relative_path, IndexStatus::Error, 0, None, error)
            .await
    }

    async fn write_status(
        &self,
        relative_path: &str,
        status: IndexStatus,
        metadata_count: i64,
        observed: Option<(i64, String)>,
        error: Option<String>,
    ) -> Result<IndexRecord> {
        let previous = self.store.get_record(relative_path).await?;
        let (file_size, content_hash) = match observed {
            Some(observed) => observed,
            None => match read_optional(&self.absolute_path(relative_path)).await? {
                Some(text) => (text.len() as i64, sha256_hex(&text)),
                None => previous
                    .as_ref()
                    .map(|r| (r.file_size, r.content_hash.clone()))
                    .unwrap_or_default(),
            },
        };

        let last_indexed_at = if status == IndexStatus::Indexed {
            Some(chrono::Utc::now().timestamp())
        } else {
            previous.as_ref().and_then(|r| r.last_indexed_at)
        };

        let record = IndexRecord {
            relative_path: relative_path.to_string(),
            file_size,
            content_hash,
            status,
            metadata_count,
            last_indexed_at,
            error,
        };
        self.store.upsert_record(&record).await?;
        Ok(record)
    }

    pub async fn get_indexed_files(&self) -> Result<Vec<IndexRecord>> {
        self.store.list_records().await
    }

    pub fn absolute_path(&self, relative_path: &str) -> PathBuf {
        self.config.dir.join(relative_path)
    }

    /// Path relative to the memory directory, `/`-separated.
    pub fn resolve_relative(&self, path: &Path) -> Option<String> {
        relative_path(&self.config.dir, path)
    }
}

/// `path` relative to `root`, `/`-separated, or `None` when outside.
///
/// Both sides are canonicalized when they exist, so symlinked roots and
/// `./` prefixes compare equal.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let path = canonicalize_lenient(path);
    let rel = path.strip_prefix(&root).ok()?;

    let parts: Vec<&str> = rel
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Canonicalize through the parent when the file itself is gone.
fn canonicalize_lenient(path: &Path) -> PathBuf {
    if let Ok(p) = path.canonicalize() {
        return p;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

fn parse_date(date: &str) -> Result<NaiveDate, MemoryError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| MemoryError::InvalidDate(date.to_string()))
}

fn daily_note_header(date: NaiveDate, content: &str) -> String {
    format!(
        "# Daily Notes {}\n\n{}\n",
        date.format("%Y-%m-%d"),
        content.trim()
    )
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

async fn write_file(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
