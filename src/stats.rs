//! `mh stats`: memory tree and index health overview.

use anyhow::Result;

use crate::config::Config;
use crate::harness::MemoryHarness;

pub async fn run_stats(config: &Config) -> Result<()> {
    let harness = MemoryHarness::open(config).await?;
    let stats = harness.manager.get_stats().await?;
    let records = harness.manager.get_indexed_files().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Memory Harness — Stats");
    println!("======================");
    println!();
    println!("  Memory dir:   {}", stats.memory_dir.display());
    println!(
        "  MEMORY.md:    {}",
        if stats.memory_file_exists {
            format!("{} ({} sections)", format_bytes(stats.memory_file_size), stats.section_count)
        } else {
            "missing (run `mh init`)".to_string()
        }
    );
    println!("  Daily notes:  {}", stats.daily_note_count);
    if let (Some(oldest), Some(newest)) = (stats.oldest_note, stats.newest_note) {
        println!("  Date range:   {} .. {}", oldest, newest);
    }
    println!();
    println!("  Database:     {} ({})", config.db.path.display(), format_bytes(db_size));
    println!("  Indexed:      {}", stats.indexed_files);
    println!("  Pending:      {}", stats.pending_files);
    println!("  Errors:       {}", stats.error_files);
    println!("  Embeddings:   {}", stats.cached_embeddings);

    if !records.is_empty() {
        println!();
        println!("  {:<32} {:>8} {:>7}   {}", "FILE", "STATUS", "CHUNKS", "LAST INDEXED");
        println!("  {}", "-".repeat(72));
        for r in &records {
            let last = r
                .last_indexed_at
                .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "  {:<32} {:>8} {:>7}   {}",
                r.relative_path, r.status, r.metadata_count, last
            );
            if let Some(err) = &r.error {
                println!("      error: {}", err);
            }
        }
    }

    println!();
    harness.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
