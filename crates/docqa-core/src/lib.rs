//! # docqa core
//!
//! Runtime-free logic for docqa: data models, chunking, the in-memory
//! vector index, prompt templates, SLA answer parsing, and the provider
//! traits that the application crate implements over HTTP.
//!
//! This crate contains no tokio, reqwest, or filesystem I/O. Everything
//! here is deterministic given its inputs, which keeps the retrieval engine
//! unit-testable without network access.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Documents, chunks, conversations |
//! | [`chunk`] | Overlapping boundary-aware chunker |
//! | [`embedding`] | Embedding provider trait and cosine similarity |
//! | [`generation`] | Generation provider trait |
//! | [`index`] | Brute-force cosine vector index |
//! | [`cache`] | Per-document index cache keyed by content hash |
//! | [`prompt`] | Placeholder templates and the two built-in prompts |
//! | [`sla`] | SLA record and answer post-processing |
//! | [`error`] | Error taxonomy |

pub mod cache;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod models;
pub mod prompt;
pub mod sla;

pub use error::{DocQaError, Result};
