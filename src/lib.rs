//! # docqa
//!
//! Question answering and SLA extraction over PDF documents.
//!
//! A PDF is reduced to text, split into overlapping chunks, embedded into an
//! in-memory vector index, and queried: free-form questions get a
//! model-written answer grounded in the retrieved chunks, and the SLA flow
//! asks six fixed questions and turns the answer into a structured JSON
//! record.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Extractor  │──▶│   Chunker    │──▶│ Vector index │
//! │ local/layout│   │ + Embedder  │   │  (cached)    │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │ top-k
//!                                            ▼
//!                   ┌─────────────┐   ┌──────────────┐
//!                   │  SlaRecord  │◀──│ Prompt + LLM │
//!                   │   / answer  │   │  generation  │
//!                   └─────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GOOGLE_API_KEY=...
//! docqa extract contract.pdf
//! docqa sla ./contracts --out ./out
//! docqa ask contract.pdf "What is the uptime commitment?"
//! docqa chat ./contracts
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credential resolution |
//! | [`logging`] | tracing subscriber setup |
//! | [`extract`] | PDF text extraction strategies |
//! | [`inputs`] | Path argument expansion |
//! | [`embedding`] | Embedding provider backends |
//! | [`generation`] | Generation provider backends |
//! | [`pipeline`] | Chat and SLA flows |
//! | [`session`] | Loaded documents and conversations |
//!
//! Runtime-free logic (chunking, index, prompts, SLA parsing) lives in the
//! `docqa-core` crate.

pub mod config;
pub mod embedding;
pub mod extract;
pub mod generation;
mod http;
pub mod inputs;
pub mod logging;
pub mod pipeline;
pub mod session;
