//! # Memory Harness Core
//!
//! Shared, I/O-free logic for Memory Harness: data models, the tokenizer,
//! BM25 ranking, reciprocal rank fusion, the vector retriever and embedding
//! traits, Markdown section handling, and the paragraph chunker.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! runtime-specific dependencies. Everything here is deterministic and can
//! be unit-tested in isolation.

pub mod bm25;
pub mod chunk;
pub mod embedding;
pub mod fusion;
pub mod markdown;
pub mod models;
pub mod retriever;
pub mod tokenize;
