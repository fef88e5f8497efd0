//! Splits memory files into [`Chunk`]s for keyword and vector indexing.
//!
//! Paragraphs (separated by blank lines) are packed greedily into chunks of
//! at most `max_tokens * 4` bytes. A paragraph that is larger than that on
//! its own is cut at the last newline or space that fits, falling back to a
//! char boundary for unbroken text such as long CJK runs.
//!
//! Chunk ids are `"{source_path}#{index}"`, so unchanged content re-chunks
//! to the same ids.
//!
//! ```rust
//! use memory_harness_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("MEMORY.md", "Hello world.\n\nSecond paragraph.", 700);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].id, "MEMORY.md#0");
//! ```

use sha2::{Digest, Sha256};

use crate::models::Chunk;

const BYTES_PER_TOKEN: usize = 4;

pub fn chunk_text(source_path: &str, text: &str, max_tokens: usize) -> Vec<Chunk> {
    let mut packer = Packer::new(source_path, (max_tokens * BYTES_PER_TOKEN).max(1));
    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        packer.add(paragraph);
    }
    packer.finish()
}

/// SHA-256 of `text` as lowercase hex.
pub fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{:x}", digest)
}

struct Packer<'a> {
    source_path: &'a str,
    limit: usize,
    pending: String,
    out: Vec<Chunk>,
}

impl<'a> Packer<'a> {
    fn new(source_path: &'a str, limit: usize) -> Self {
        Self {
            source_path,
            limit,
            pending: String::new(),
            out: Vec::new(),
        }
    }

    fn add(&mut self, paragraph: &str) {
        let joined_len = match self.pending.len() {
            0 => paragraph.len(),
            n => n + 2 + paragraph.len(),
        };
        if joined_len > self.limit {
            self.flush();
        }

        if paragraph.len() > self.limit {
            for piece in split_oversize(paragraph, self.limit) {
                self.emit(piece);
            }
            return;
        }

        if !self.pending.is_empty() {
            self.pending.push_str("\n\n");
        }
        self.pending.push_str(paragraph);
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.pending);
        self.emit(&text);
    }

    fn emit(&mut self, text: &str) {
        let index = self.out.len() as i64;
        self.out.push(Chunk {
            id: format!("{}#{}", self.source_path, index),
            source_path: self.source_path.to_string(),
            chunk_index: index,
            text: text.to_string(),
            hash: sha256_hex(text),
        });
    }

    fn finish(mut self) -> Vec<Chunk> {
        self.flush();
        self.out
    }
}

/// Cut `paragraph` into trimmed, non-empty pieces of at most `limit` bytes
/// (a single wider char is let through whole).
fn split_oversize(paragraph: &str, limit: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = paragraph;

    while !rest.is_empty() {
        let cut = if rest.len() <= limit {
            rest.len()
        } else {
            let hard = floor_char_boundary(rest, limit);
            rest[..hard]
                .rfind(|c: char| c == '\n' || c == ' ')
                .map(|ws| ws + 1)
                .unwrap_or(hard)
        };
        let piece = rest[..cut].trim();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        rest = &rest[cut..];
    }

    pieces
}

/// Largest char boundary `<= max`, or the end of the first char when that
/// would be zero.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    match (1..=max).rev().find(|&i| s.is_char_boundary(i)) {
        Some(i) => i,
        None => s.chars().next().map_or(s.len(), char::len_utf8),
    }
}
