//! # Context Desk
//!
//! Retrieval-augmented context and conversation sessions for a campus help
//! desk assistant.
//!
//! Context Desk ingests two kinds of knowledge: policy documents (PDF, text,
//! markdown), chunked with overlap, and structured JSON records (calendars,
//! faculty lists), flattened into sentences. Both are embedded into persisted
//! SQLite indexes. Queries come back as ranked context bundles with
//! provenance. Alongside retrieval, a session controller keeps each user's
//! conversation durable and archives it on goodbye or inactivity.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌────────────┐
//! │ documents/ │──▶│ chunk+embed  │──▶│  SQLite    │──┐
//! └────────────┘   └──────────────┘   └────────────┘  │   ┌──────────────┐
//! ┌────────────┐   ┌──────────────┐   ┌────────────┐  ├──▶│ retrieval    │──▶ lookup tools
//! │ records/   │──▶│ flatten+embed│──▶│  SQLite    │──┘   │ (+ rerank)   │
//! └────────────┘   └──────────────┘   └────────────┘      └──────────────┘
//!
//! question/answer ──▶ SessionManager ──▶ <user>_history.json
//!                           ▲
//!                     idle reaper (every cleanup interval)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error type |
//! | [`models`] | Chunks, record units, results, context bundles |
//! | [`sources`] | Source directory scanning |
//! | [`extract`] | PDF and text extraction |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`rerank`] | Cross-encoder relevance scoring |
//! | [`retry`] | Bounded exponential backoff |
//! | [`db`] | SQLite connection |
//! | [`index`] | Persisted vector index |
//! | [`document_index`] | Document indexer |
//! | [`record_index`] | Record flattening and indexer |
//! | [`retrieval`] | Similarity search and reranking |
//! | [`knowledge`] | Owned indexes and lookup calls |
//! | [`notify`] | Status notifications |
//! | [`tools`] | Agent-callable lookup tools |
//! | [`scheduler`] | Shutdown token and ticker |
//! | [`session`] | Session store, lifecycle and idle reaper |
//! | [`logging`] | Tracing setup |

pub mod chunk;
pub mod config;
pub mod db;
pub mod document_index;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod knowledge;
pub mod logging;
pub mod models;
pub mod notify;
pub mod record_index;
pub mod rerank;
pub mod retrieval;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod sources;
pub mod tools;

pub use error::{DeskError, Result};
pub use knowledge::KnowledgeBase;
pub use models::{ContextBundle, Lookup};
pub use session::SessionManager;
