//! `mh search`: cold-start index pass, then hybrid search.
//!
//! The keyword index lives in memory, so every invocation re-chunks the
//! memory tree. Unchanged files are not re-embedded.

use anyhow::Result;
use serde::Serialize;

use memory_harness_core::models::FusionResult;

use crate::config::Config;
use crate::harness::MemoryHarness;

#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    degraded: bool,
    results: &'a [FusionResult],
}

pub async fn run_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let harness = MemoryHarness::open(config).await?;
    harness.indexer.index_all(false).await?;

    let limit = limit.unwrap_or(config.retrieval.final_limit);
    let results = harness.indexer.search(query, limit).await;
    let degraded = harness.indexer.engine().read().await.last_degraded();

    if json {
        let out = SearchOutput {
            query,
            degraded,
            results: &results,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        harness.close().await;
        return Ok(());
    }

    if degraded {
        eprintln!("note: vector search unavailable, showing keyword results only");
    }

    if results.is_empty() {
        println!("No results.");
        harness.close().await;
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let path = result
            .document
            .metadata
            .get("relative_path")
            .and_then(|v| v.as_str())
            .unwrap_or(&result.document.id);
        println!(
            "{}. [{:.4}] {} ({})",
            i + 1,
            result.score,
            path,
            result.source.as_str()
        );
        println!("    excerpt: \"{}\"", excerpt(&result.document.content, 160));
        println!("    id: {}", result.document.id);
        println!();
    }

    harness.close().await;
    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let mut out: String = flat.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("a\n\nb   c", 10), "a b c");
        assert_eq!(excerpt("记忆记忆记忆", 2), "记忆...");
    }
}
