//! Core data models for the library → document → chunk hierarchy.
//!
//! Three stored record types flow through the store, the indexing
//! lifecycle, and the persistence sink:
//!
//! ```text
//! Library ──owns──▶ Document ──owns──▶ Chunk ──may carry──▶ embedding
//! ```
//!
//! Ownership itself (which documents a library holds, which chunks a
//! document holds) lives in the store's reverse maps, not in the records;
//! the `*View` types join a record with its ordered child-id list for API
//! responses. The `*Create` and `*Patch` types are the request bodies.
//!
//! All identifiers are UUIDs. Metadata maps are string→string.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User-supplied metadata attached to every entity.
pub type Metadata = HashMap<String, String>;

/// Top-level container for a corpus that is searched together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    /// UUID primary key.
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// Free-form string metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// Logical grouping of chunks within a library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// UUID primary key.
    pub id: Uuid,
    /// Owning library.
    pub library_id: Uuid,
    /// Human-readable name.
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// An atomic text fragment; the unit of retrieval.
///
/// The embedding is optional: chunks are created from text alone and the
/// vector is filled in lazily during an index build (or supplied by the
/// client up front).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// UUID primary key.
    pub id: Uuid,
    /// Owning document.
    pub document_id: Uuid,
    /// The text payload.
    pub text: String,
    /// Embedding vector, if one has been generated or supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Metadata,
}

// ============ API views ============

/// A library joined with its ordered document-id list.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryView {
    pub id: Uuid,
    pub name: String,
    pub metadata: Metadata,
    /// Owned documents, in creation order.
    pub document_ids: Vec<Uuid>,
}

/// A document joined with its ordered chunk-id list.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub id: Uuid,
    pub library_id: Uuid,
    pub name: String,
    pub metadata: Metadata,
    /// Owned chunks, in creation order.
    pub chunk_ids: Vec<Uuid>,
}

/// One search hit hydrated with its chunk's payload.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub score: f32,
    pub text: String,
    pub metadata: Metadata,
}

// ============ Create bodies ============

/// Request body for creating a library, optionally with inline documents.
#[derive(Debug, Clone, Deserialize)]
pub struct LibraryCreate {
    /// Client-supplied id; generated when absent.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Documents to create inside the new library in the same request.
    #[serde(default)]
    pub documents: Vec<DocumentCreate>,
}

/// Request body for creating a document, optionally with inline chunks.
///
/// `library_id` is required when the document is created standalone and
/// ignored when it arrives inline inside a [`LibraryCreate`].
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentCreate {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub library_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub chunks: Vec<ChunkCreate>,
}

/// Request body for creating a chunk.
///
/// `document_id` is required when the chunk is created standalone and
/// ignored when it arrives inline inside a [`DocumentCreate`].
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkCreate {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub document_id: Option<Uuid>,
    pub text: String,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Metadata,
}

// ============ Patch bodies ============

/// Partial update for a library. Ownership cannot be changed here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryPatch {
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Partial update for a document. `library_id` is immutable: supplying a
/// different value fails validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentPatch {
    pub library_id: Option<Uuid>,
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Partial update for a chunk. `document_id` is immutable: supplying a
/// different value fails validation.
///
/// Patching `text` discards any stored embedding so the next index build
/// re-embeds the new text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkPatch {
    pub document_id: Option<Uuid>,
    pub text: Option<String>,
    pub metadata: Option<Metadata>,
    pub embedding: Option<Vec<f32>>,
}
