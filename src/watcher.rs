//! Memory directory watcher with per-path debouncing.
//!
//! OS notifications come from `notify` (recursive) and are pumped into
//! tokio. Every path gets its own debounce timer: a new event for the same
//! path cancels the pending timer, merges the kinds, and re-arms. When a
//! timer survives the quiet period an `index-needed` [`WatchEvent`] is
//! broadcast and the optional callback runs.
//!
//! | Pending | Incoming | Emitted |
//! |---------|----------|---------|
//! | add | change | add |
//! | any | unlink | unlink |
//! | unlink | add / change | change |
//! | otherwise | x | x |
//!
//! Only paths relative to the memory directory that match the include
//! globs (default `**/*.md`) and miss the exclude globs are considered.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::WatcherConfig;
use crate::memory::relative_path;

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/.*.swp", "**/*~", "**/.#*"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchEventKind {
    Add,
    Change,
    Unlink,
}

impl WatchEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchEventKind::Add => "add",
            WatchEventKind::Change => "change",
            WatchEventKind::Unlink => "unlink",
        }
    }

    /// Fold a new event into a pending one.
    pub fn merge(self, next: WatchEventKind) -> WatchEventKind {
        use WatchEventKind::*;
        match (self, next) {
            (_, Unlink) => Unlink,
            (Unlink, _) => Change,
            (Add, Change) => Add,
            (_, next) => next,
        }
    }
}

/// An `index-needed` signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchEvent {
    pub event: WatchEventKind,
    pub path: PathBuf,
    /// `/`-separated, relative to the memory directory.
    pub relative_path: String,
}

pub type ChangeCallback = Arc<dyn Fn(&WatchEvent) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct MemoryFile {
    pub path: PathBuf,
    pub relative_path: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatcherStats {
    pub is_watching: bool,
    pub memory_dir: PathBuf,
    pub changes_detected: u64,
    pub errors: u64,
    pub pending: usize,
    pub running_time_ms: u64,
}

struct Pending {
    kind: WatchEventKind,
    generation: u64,
    timer: JoinHandle<()>,
}

struct Shared {
    root: PathBuf,
    config: WatcherConfig,
    filter: PathFilter,
    tx: broadcast::Sender<WatchEvent>,
    callback: Option<ChangeCallback>,
    pending: Mutex<HashMap<String, Pending>>,
    generation: AtomicU64,
    watching: AtomicBool,
    changes_detected: AtomicU64,
    errors: AtomicU64,
    started_at: Mutex<Option<Instant>>,
}

impl Shared {
    fn ingest(self: &Arc<Self>, kind: WatchEventKind, path: &Path) {
        let Some(relative) = relative_path(&self.root, path) else {
            return;
        };
        if !self.filter.accepts(&relative) {
            return;
        }

        let Ok(mut pending) = self.pending.lock() else {
            self.errors.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let merged = match pending.remove(&relative) {
            Some(prev) => {
                prev.timer.abort();
                prev.kind.merge(kind)
            }
            None => kind,
        };
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        let shared = Arc::clone(self);
        let key = relative.clone();
        let path = path.to_path_buf();
        let delay = self.config.debounce();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.fire(&key, path, generation);
        });

        debug!(path = %relative, kind = merged.as_str(), "debouncing change");
        pending.insert(
            relative,
            Pending {
                kind: merged,
                generation,
                timer,
            },
        );
    }

    fn fire(&self, relative: &str, path: PathBuf, generation: u64) {
        let kind = {
            let Ok(mut pending) = self.pending.lock() else {
                return;
            };
            match pending.get(relative) {
                Some(p) if p.generation == generation => {
                    let kind = p.kind;
                    pending.remove(relative);
                    kind
                }
                _ => return,
            }
        };

        let event = WatchEvent {
            event: kind,
            path,
            relative_path: relative.to_string(),
        };
        self.changes_detected.fetch_add(1, Ordering::Relaxed);
        info!(path = %event.relative_path, kind = kind.as_str(), "index needed");

        if let Some(callback) = &self.callback {
            match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(path = %event.relative_path, error = %e, "change callback failed");
                }
                Err(_) => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    error!(path = %event.relative_path, "change callback panicked");
                }
            }
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    fn cancel_pending(&self) -> usize {
        let Ok(mut pending) = self.pending.lock() else {
            return 0;
        };
        let count = pending.len();
        for (_, p) in pending.drain() {
            p.timer.abort();
        }
        count
    }
}

/// Watches a memory directory and emits debounced `index-needed` events.
pub struct MemoryFileWatcher {
    shared: Arc<Shared>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryFileWatcher {
    pub fn new(
        memory_dir: impl Into<PathBuf>,
        config: WatcherConfig,
        callback: Option<ChangeCallback>,
    ) -> Result<Self> {
        let filter = PathFilter::new(&config)?;
        let (tx, _) = broadcast::channel(256);

        Ok(Self {
            shared: Arc::new(Shared {
                root: memory_dir.into(),
                config,
                filter,
                tx,
                callback,
                pending: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                watching: AtomicBool::new(false),
                changes_detected: AtomicU64::new(0),
                errors: AtomicU64::new(0),
                started_at: Mutex::new(None),
            }),
            watcher: Mutex::new(None),
            pump: Mutex::new(None),
        })
    }

    pub fn memory_dir(&self) -> &Path {
        &self.shared.root
    }

    /// Begin watching. Must be called inside a tokio runtime.
    ///
    /// With `ignore_initial = false`, files already present are surfaced as
    /// `add` events through the normal debounce path.
    pub fn start(&self) -> Result<()> {
        if self.is_watching() {
            return Ok(());
        }
        if tokio::runtime::Handle::try_current().is_err() {
            bail!("MemoryFileWatcher::start requires a tokio runtime");
        }

        let root = self
            .shared
            .root
            .canonicalize()
            .with_context(|| {
                format!("Memory directory not found: {}", self.shared.root.display())
            })?;

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = raw_tx.send(res);
            },
            notify::Config::default(),
        )
        .context("Failed to create file watcher")?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;

        let shared = Arc::clone(&self.shared);
        let pump = tokio::spawn(async move {
            while let Some(res) = raw_rx.recv().await {
                match res {
                    Ok(event) => {
                        for (kind, path) in classify(&event) {
                            shared.ingest(kind, &path);
                        }
                    }
                    Err(e) => {
                        shared.errors.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %e, "file watcher error");
                    }
                }
            }
        });

        if let Ok(mut slot) = self.watcher.lock() {
            *slot = Some(watcher);
        }
        if let Ok(mut slot) = self.pump.lock() {
            *slot = Some(pump);
        }
        if let Ok(mut started) = self.shared.started_at.lock() {
            *started = Some(Instant::now());
        }
        self.shared.watching.store(true, Ordering::SeqCst);
        info!(dir = %root.display(), "watching memory directory");

        if !self.shared.config.ignore_initial {
            for file in self.scan_directory()? {
                self.shared.ingest(WatchEventKind::Add, &file.path);
            }
        }

        Ok(())
    }

    /// Release the OS watcher and cancel every pending debounce timer.
    pub fn stop(&self) {
        let was_watching = self.shared.watching.swap(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.watcher.lock() {
            slot.take();
        }
        if let Ok(mut slot) = self.pump.lock() {
            if let Some(pump) = slot.take() {
                pump.abort();
            }
        }
        let cancelled = self.shared.cancel_pending();
        if let Ok(mut started) = self.shared.started_at.lock() {
            *started = None;
        }
        if was_watching {
            info!(cancelled, "stopped watching memory directory");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.shared.watching.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.shared.tx.subscribe()
    }

    /// Feed an event as if the OS had raised it. Must be called inside a
    /// tokio runtime.
    pub fn ingest_event(&self, kind: WatchEventKind, path: impl AsRef<Path>) {
        self.shared.ingest(kind, path.as_ref());
    }

    /// Every matching file under the memory directory, sorted by relative path.
    pub fn scan_directory(&self) -> Result<Vec<MemoryFile>> {
        scan_directory(&self.shared.root, &self.shared.filter)
    }

    pub fn stats(&self) -> WatcherStats {
        let running_time_ms = self
            .shared
            .started_at
            .lock()
            .ok()
            .and_then(|s| (*s).map(|t| t.elapsed().as_millis() as u64))
            .unwrap_or(0);
        let pending = self.shared.pending.lock().map(|p| p.len()).unwrap_or(0);

        WatcherStats {
            is_watching: self.is_watching(),
            memory_dir: self.shared.root.clone(),
            changes_detected: self.shared.changes_detected.load(Ordering::Relaxed),
            errors: self.shared.errors.load(Ordering::Relaxed),
            pending,
            running_time_ms,
        }
    }
}

impl Drop for MemoryFileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map a raw notification onto add/change/unlink per path.
fn classify(event: &Event) -> Vec<(WatchEventKind, PathBuf)> {
    let each = |kind: WatchEventKind| -> Vec<(WatchEventKind, PathBuf)> {
        event.paths.iter().map(|p| (kind, p.clone())).collect()
    };

    match &event.kind {
        EventKind::Create(_) => each(WatchEventKind::Add),
        EventKind::Remove(_) => each(WatchEventKind::Unlink),
        EventKind::Access(_) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => vec![
            (WatchEventKind::Unlink, event.paths[0].clone()),
            (WatchEventKind::Add, event.paths[1].clone()),
        ],
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let kind = if p.exists() {
                    WatchEventKind::Add
                } else {
                    WatchEventKind::Unlink
                };
                (kind, p.clone())
            })
            .collect(),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => each(WatchEventKind::Change),
    }
}

/// Include/exclude globs over `/`-separated relative paths.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl PathFilter {
    pub fn new(config: &WatcherConfig) -> Result<Self> {
        let include = build_globset(config.include_globs.iter().map(String::as_str))
            .context("Invalid watcher.include_globs")?;
        let exclude = build_globset(
            DEFAULT_EXCLUDES
                .iter()
                .copied()
                .chain(config.exclude_globs.iter().map(String::as_str)),
        )
        .context("Invalid watcher.exclude_globs")?;
        Ok(Self { include, exclude })
    }

    pub fn accepts(&self, relative: &str) -> bool {
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }
}

/// Every file under `root` accepted by `filter`, sorted by relative path.
/// A missing root yields an empty list.
pub fn scan_directory(root: &Path, filter: &PathFilter) -> Result<Vec<MemoryFile>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to scan {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !filter.accepts(&relative) {
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        files.push(MemoryFile {
            path: entry.path().to_path_buf(),
            relative_path: relative,
            size,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

fn build_globset<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::broadcast::error::TryRecvError;

    fn setup() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("memory");
        std::fs::create_dir_all(dir.join("daily")).unwrap();
        (tmp, dir)
    }

    fn watcher(dir: &Path, callback: Option<ChangeCallback>) -> MemoryFileWatcher {
        let config = WatcherConfig {
            debounce_ms: 500,
            ..Default::default()
        };
        MemoryFileWatcher::new(dir, config, callback).unwrap()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    #[test]
    fn test_merge_rules() {
        use WatchEventKind::*;
        assert_eq!(Add.merge(Change), Add);
        assert_eq!(Add.merge(Unlink), Unlink);
        assert_eq!(Change.merge(Unlink), Unlink);
        assert_eq!(Unlink.merge(Add), Change);
        assert_eq!(Unlink.merge(Change), Change);
        assert_eq!(Change.merge(Change), Change);
        assert_eq!(Change.merge(Add), Add);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_one_event() {
        let (_tmp, dir) = setup();
        let w = watcher(&dir, None);
        let mut rx = w.subscribe();
        let file = dir.join("daily/2026-01-02.md");

        w.ingest_event(WatchEventKind::Add, &file);
        tokio::time::sleep(Duration::from_millis(200)).await;
        w.ingest_event(WatchEventKind::Change, &file);
        tokio::time::sleep(Duration::from_millis(200)).await;
        w.ingest_event(WatchEventKind::Change, &file);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, WatchEventKind::Add);
        assert_eq!(event.relative_path, "daily/2026-01-02.md");

        settle().await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(w.stats().changes_detected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_events_each_emit() {
        let (_tmp, dir) = setup();
        let w = watcher(&dir, None);
        let mut rx = w.subscribe();
        let file = dir.join("MEMORY.md");

        for _ in 0..3 {
            w.ingest_event(WatchEventKind::Change, &file);
            tokio::time::sleep(Duration::from_millis(800)).await;
        }
        settle().await;

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen.len(), 3);
        assert!(seen
            .iter()
            .all(|e| e.event == WatchEventKind::Change && e.relative_path == "MEMORY.md"));
        assert_eq!(w.stats().changes_detected, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_rearms_on_each_event() {
        let (_tmp, dir) = setup();
        let w = watcher(&dir, None);
        let mut rx = w.subscribe();
        let file = dir.join("MEMORY.md");

        let start = tokio::time::Instant::now();
        for _ in 0..4 {
            w.ingest_event(WatchEventKind::Change, &file);
            tokio::time::sleep(Duration::from_millis(400)).await;
        }
        rx.recv().await.unwrap();
        // Last event at 1200ms, quiet period 500ms.
        assert!(start.elapsed() >= Duration::from_millis(1700));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlink_then_add_is_change() {
        let (_tmp, dir) = setup();
        let w = watcher(&dir, None);
        let mut rx = w.subscribe();
        let file = dir.join("MEMORY.md");

        w.ingest_event(WatchEventKind::Unlink, &file);
        w.ingest_event(WatchEventKind::Add, &file);
        assert_eq!(rx.recv().await.unwrap().event, WatchEventKind::Change);

        w.ingest_event(WatchEventKind::Add, &file);
        w.ingest_event(WatchEventKind::Unlink, &file);
        assert_eq!(rx.recv().await.unwrap().event, WatchEventKind::Unlink);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paths_debounce_independently() {
        let (_tmp, dir) = setup();
        let w = watcher(&dir, None);
        let mut rx = w.subscribe();

        w.ingest_event(WatchEventKind::Change, dir.join("MEMORY.md"));
        w.ingest_event(WatchEventKind::Add, dir.join("daily/2026-01-03.md"));

        let mut got = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        got.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        assert_eq!(got[0].relative_path, "MEMORY.md");
        assert_eq!(got[0].event, WatchEventKind::Change);
        assert_eq!(got[1].relative_path, "daily/2026-01-03.md");
        assert_eq!(got[1].event, WatchEventKind::Add);
    }

    #[tokio::test(start_paused = true)]
    async fn test_filters_non_matching_paths() {
        let (tmp, dir) = setup();
        let config = WatcherConfig {
            exclude_globs: vec!["drafts/**".to_string()],
            ..Default::default()
        };
        let w = MemoryFileWatcher::new(&dir, config, None).unwrap();
        let mut rx = w.subscribe();

        w.ingest_event(WatchEventKind::Change, dir.join("notes.txt"));
        w.ingest_event(WatchEventKind::Change, dir.join("drafts/idea.md"));
        w.ingest_event(WatchEventKind::Change, tmp.path().join("outside.md"));
        w.ingest_event(WatchEventKind::Change, dir.join(".git/HEAD.md"));

        settle().await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(w.stats().changes_detected, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_failures_are_contained() {
        let (_tmp, dir) = setup();
        let callback: ChangeCallback = Arc::new(|event: &WatchEvent| {
            if event.relative_path == "MEMORY.md" {
                anyhow::bail!("indexer offline");
            }
            panic!("callback bug");
        });
        let w = watcher(&dir, Some(callback));
        let mut rx = w.subscribe();

        w.ingest_event(WatchEventKind::Change, dir.join("MEMORY.md"));
        rx.recv().await.unwrap();
        w.ingest_event(WatchEventKind::Change, dir.join("daily/2026-01-01.md"));
        rx.recv().await.unwrap();

        let stats = w.stats();
        assert_eq!(stats.changes_detected, 2);
        assert_eq!(stats.errors, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_timers() {
        let (_tmp, dir) = setup();
        let w = watcher(&dir, None);
        let mut rx = w.subscribe();

        w.ingest_event(WatchEventKind::Change, dir.join("MEMORY.md"));
        assert_eq!(w.stats().pending, 1);
        w.stop();
        assert_eq!(w.stats().pending, 0);
        assert!(!w.is_watching());

        settle().await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_scan_directory_sorted_and_filtered() {
        let (_tmp, dir) = setup();
        std::fs::write(dir.join("MEMORY.md"), "# M").unwrap();
        std::fs::write(dir.join("daily/2026-01-02.md"), "b").unwrap();
        std::fs::write(dir.join("daily/2026-01-01.md"), "a").unwrap();
        std::fs::write(dir.join("daily/scratch.txt"), "x").unwrap();

        let w = watcher(&dir, None);
        let files: Vec<String> = w
            .scan_directory()
            .unwrap()
            .into_iter()
            .map(|f| f.relative_path)
            .collect();
        assert_eq!(
            files,
            vec!["MEMORY.md", "daily/2026-01-01.md", "daily/2026-01-02.md"]
        );
    }

    #[test]
    fn test_path_filter() {
        let filter = PathFilter::new(&WatcherConfig::default()).unwrap();
        assert!(filter.accepts("MEMORY.md"));
        assert!(filter.accepts("daily/2026-01-01.md"));
        assert!(!filter.accepts("daily/notes.txt"));
        assert!(!filter.accepts(".git/x.md"));
        assert!(!filter.accepts("daily/2026-01-01.md~"));
    }

    #[test]
    fn test_start_requires_runtime() {
        let (_tmp, dir) = setup();
        let w = watcher(&dir, None);
        assert!(w.start().is_err());
        assert!(!w.is_watching());
    }

    #[test]
    fn test_classify() {
        let path = PathBuf::from("/m/MEMORY.md");
        let event =
            Event::new(EventKind::Create(notify::event::CreateKind::File)).add_path(path.clone());
        assert_eq!(classify(&event), vec![(WatchEventKind::Add, path.clone())]);

        let event = Event::new(EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Any)))
            .add_path(path.clone());
        assert_eq!(classify(&event), vec![(WatchEventKind::Change, path.clone())]);

        let event =
            Event::new(EventKind::Remove(notify::event::RemoveKind::File)).add_path(path.clone());
        assert_eq!(classify(&event), vec![(WatchEventKind::Unlink, path.clone())]);

        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any)).add_path(path);
        assert!(classify(&event).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_real_filesystem_change() {
        let (_tmp, dir) = setup();
        let config = WatcherConfig {
            debounce_ms: 50,
            ..Default::default()
        };
        let w = MemoryFileWatcher::new(&dir, config, None).unwrap();
        let mut rx = w.subscribe();
        w.start().unwrap();
        assert!(w.is_watching());

        std::fs::write(dir.join("daily/2026-04-01.md"), "# Daily Notes 2026-04-01\n").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let event = rx.recv().await.unwrap();
                if event.relative_path == "daily/2026-04-01.md" {
                    return event;
                }
            }
        })
        .await
        .expect("no watcher event");
        assert_ne!(event.event, WatchEventKind::Unlink);

        w.stop();
        assert!(!w.is_watching());
    }
}
