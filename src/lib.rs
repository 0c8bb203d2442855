//! # corpusdb
//!
//! **A small in-memory vector database for text corpora.**
//!
//! corpusdb stores text fragments ("chunks") in a three-level hierarchy —
//! library → document → chunk — builds a per-library similarity index on
//! demand, and serves cosine nearest-neighbor queries over embeddings
//! produced by an external provider (Cohere).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              HTTP API (axum)                 │
//! │   /api/libraries /api/documents /api/chunks  │
//! └──────────────────────┬───────────────────────┘
//!                        │
//!          ┌─────────────┴─────────────┐
//!          ▼                           ▼
//! ┌──────────────────┐       ┌──────────────────┐
//! │      Store       │◀─────▶│    Lifecycle     │──▶ Cohere embed API
//! │ tables + locks   │ stale │ state machine +  │
//! │ reverse maps     │ signal│ installed index  │
//! └────────┬─────────┘       └────────┬─────────┘
//!          │                          │
//!          ▼                          ▼
//! ┌──────────────────┐       ┌──────────────────┐
//! │  JSON snapshots  │       │ Indexers (flat / │
//! │  (per library)   │       │   ball tree)     │
//! └──────────────────┘       └──────────────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. CRUD requests mutate the [`store`]; every mutation marks the owning
//!    library's index *stale* exactly once.
//! 2. An index request moves the library to *building*: the [`lifecycle`]
//!    snapshots the chunk set, fills missing embeddings via [`embedding`],
//!    re-validates, constructs an indexer from [`index`], and atomically
//!    swaps it in.
//! 3. Search requests pass the gate only in *ready*, then run against the
//!    installed indexer and hydrate hits back into chunk records.
//! 4. After each mutation the library is snapshotted to a JSON file by
//!    [`persistence`] — best-effort, embeddings excluded.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`app`] | `AppContext` wiring and startup bootstrap |
//! | [`config`] | Environment-driven configuration |
//! | [`embedding`] | `Embedder` trait and the Cohere client |
//! | [`error`] | Error kinds shared across the crate |
//! | [`index`] | Indexer contract, exhaustive scan, ball tree |
//! | [`lifecycle`] | Index state machine, builds, search gate |
//! | [`models`] | Library / Document / Chunk types and request bodies |
//! | [`persistence`] | File-per-library JSON snapshots |
//! | [`server`] | HTTP facade (axum) |
//! | [`store`] | In-memory tables, reverse maps, per-table locks |
//! | [`vecmath`] | Dense vector math used by the indexers |

pub mod app;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod lifecycle;
pub mod models;
pub mod persistence;
pub mod server;
pub mod store;
pub mod vecmath;
