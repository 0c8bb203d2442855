//! In-memory hierarchical store: three entity tables plus reverse maps.
//!
//! Tables are guarded by one lock each, always acquired outermost-first in
//! the order **library → document → chunk**. Operations that span tables
//! take every lock they need in that order and never the reverse. Reverse
//! maps (`documents_by_library`, `chunks_by_document`) live under the lock
//! of the *child* table they index and mirror forward ownership exactly:
//! every insert and cascade updates both sides together.
//!
//! Every public mutation emits exactly one *library-invalidated* signal to
//! the slot registry for the affected library. The one exception is
//! [`Store::set_chunk_embedding_internal`], the embedding-fill write used
//! by a running index build, which is index-internal by definition.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::index::SearchHit;
use crate::lifecycle::{IndexSlots, IndexState};
use crate::models::{
    Chunk, ChunkCreate, ChunkPatch, Document, DocumentCreate, DocumentPatch, DocumentView,
    Library, LibraryCreate, LibraryPatch, LibraryView, SearchResult,
};

/// A chunk as captured by an index-build snapshot.
#[derive(Debug, Clone)]
pub struct ChunkSnapshot {
    pub id: Uuid,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Default)]
struct LibraryTable {
    rows: HashMap<Uuid, Library>,
}

#[derive(Default)]
struct DocumentTable {
    rows: HashMap<Uuid, Document>,
    /// library_id → owned document ids, in creation order.
    by_library: HashMap<Uuid, Vec<Uuid>>,
}

#[derive(Default)]
struct ChunkTable {
    rows: HashMap<Uuid, Chunk>,
    /// document_id → owned chunk ids, in creation order.
    by_document: HashMap<Uuid, Vec<Uuid>>,
}

/// The shared store. Cheap to clone behind an `Arc`; all interior state is
/// lock-guarded.
pub struct Store {
    libraries: RwLock<LibraryTable>,
    documents: RwLock<DocumentTable>,
    chunks: RwLock<ChunkTable>,
    slots: Arc<IndexSlots>,
}

impl Store {
    pub fn new(slots: Arc<IndexSlots>) -> Self {
        Self {
            libraries: RwLock::new(LibraryTable::default()),
            documents: RwLock::new(DocumentTable::default()),
            chunks: RwLock::new(ChunkTable::default()),
            slots,
        }
    }

    // ============ Libraries ============

    /// Create a library, optionally with inline documents and chunks.
    /// The whole request is validated before anything is inserted, so a
    /// duplicate id anywhere leaves the store untouched.
    pub fn create_library(&self, req: LibraryCreate) -> Result<LibraryView> {
        let library_id = req.id.unwrap_or_else(Uuid::new_v4);

        let mut libraries = self.libraries.write();
        let mut documents = self.documents.write();
        let mut chunks = self.chunks.write();

        if libraries.rows.contains_key(&library_id) {
            return Err(Error::Validation(format!(
                "library {library_id} already exists"
            )));
        }

        // Resolve ids up front and check for collisions, both against the
        // tables and within the request itself.
        let mut doc_ids: Vec<Uuid> = Vec::with_capacity(req.documents.len());
        let mut chunk_ids: Vec<Vec<Uuid>> = Vec::with_capacity(req.documents.len());
        for doc in &req.documents {
            let doc_id = doc.id.unwrap_or_else(Uuid::new_v4);
            if documents.rows.contains_key(&doc_id) || doc_ids.contains(&doc_id) {
                return Err(Error::Validation(format!(
                    "document {doc_id} already exists"
                )));
            }
            let mut ids = Vec::with_capacity(doc.chunks.len());
            for chunk in &doc.chunks {
                let chunk_id = chunk.id.unwrap_or_else(Uuid::new_v4);
                if chunks.rows.contains_key(&chunk_id)
                    || chunk_ids.iter().any(|v: &Vec<Uuid>| v.contains(&chunk_id))
                    || ids.contains(&chunk_id)
                {
                    return Err(Error::Validation(format!("chunk {chunk_id} already exists")));
                }
                ids.push(chunk_id);
            }
            doc_ids.push(doc_id);
            chunk_ids.push(ids);
        }

        libraries.rows.insert(
            library_id,
            Library {
                id: library_id,
                name: req.name,
                metadata: req.metadata,
            },
        );
        for ((doc, doc_id), ids) in req.documents.into_iter().zip(&doc_ids).zip(chunk_ids) {
            documents.rows.insert(
                *doc_id,
                Document {
                    id: *doc_id,
                    library_id,
                    name: doc.name,
                    metadata: doc.metadata,
                },
            );
            documents.by_library.entry(library_id).or_default().push(*doc_id);
            for (chunk, chunk_id) in doc.chunks.into_iter().zip(&ids) {
                chunks.rows.insert(
                    *chunk_id,
                    Chunk {
                        id: *chunk_id,
                        document_id: *doc_id,
                        text: chunk.text,
                        embedding: chunk.embedding,
                        metadata: chunk.metadata,
                    },
                );
                chunks.by_document.entry(*doc_id).or_default().push(*chunk_id);
            }
        }
        documents.by_library.entry(library_id).or_default();

        let view = LibraryView {
            id: library_id,
            name: libraries.rows[&library_id].name.clone(),
            metadata: libraries.rows[&library_id].metadata.clone(),
            document_ids: doc_ids,
        };
        drop(chunks);
        drop(documents);
        drop(libraries);

        self.slots.create(library_id, IndexState::Idle);
        Ok(view)
    }

    pub fn library_exists(&self, library_id: Uuid) -> bool {
        self.libraries.read().rows.contains_key(&library_id)
    }

    pub fn get_library(&self, library_id: Uuid) -> Result<LibraryView> {
        let libraries = self.libraries.read();
        let documents = self.documents.read();
        let row = libraries
            .rows
            .get(&library_id)
            .ok_or_else(|| Error::NotFound(format!("library {library_id} not found")))?;
        Ok(library_view(row, &documents))
    }

    pub fn list_libraries(&self) -> Vec<LibraryView> {
        let libraries = self.libraries.read();
        let documents = self.documents.read();
        let mut views: Vec<LibraryView> = libraries
            .rows
            .values()
            .map(|row| library_view(row, &documents))
            .collect();
        views.sort_by_key(|v| v.id);
        views
    }

    /// Patch name/metadata. Invalidates the library's index.
    pub fn update_library(&self, library_id: Uuid, patch: LibraryPatch) -> Result<LibraryView> {
        let view = {
            let mut libraries = self.libraries.write();
            let documents = self.documents.read();
            let row = libraries
                .rows
                .get_mut(&library_id)
                .ok_or_else(|| Error::NotFound(format!("library {library_id} not found")))?;
            if let Some(name) = patch.name {
                row.name = name;
            }
            if let Some(metadata) = patch.metadata {
                row.metadata = metadata;
            }
            library_view(row, &documents)
        };
        self.slots.note_mutation(library_id);
        Ok(view)
    }

    /// Delete a library with all its documents and chunks.
    pub fn delete_library(&self, library_id: Uuid) -> Result<()> {
        {
            let mut libraries = self.libraries.write();
            let mut documents = self.documents.write();
            let mut chunks = self.chunks.write();
            if libraries.rows.remove(&library_id).is_none() {
                return Err(Error::NotFound(format!("library {library_id} not found")));
            }
            let doc_ids = documents.by_library.remove(&library_id).unwrap_or_default();
            for doc_id in doc_ids {
                documents.rows.remove(&doc_id);
                for chunk_id in chunks.by_document.remove(&doc_id).unwrap_or_default() {
                    chunks.rows.remove(&chunk_id);
                }
            }
        }
        self.slots.remove(library_id);
        Ok(())
    }

    // ============ Documents ============

    /// Create a document (optionally with inline chunks) under an existing
    /// library.
    pub fn create_document(&self, req: DocumentCreate) -> Result<DocumentView> {
        let library_id = req
            .library_id
            .ok_or_else(|| Error::Validation("library_id is required".into()))?;
        let doc_id = req.id.unwrap_or_else(Uuid::new_v4);

        {
            let libraries = self.libraries.read();
            let mut documents = self.documents.write();
            let mut chunks = self.chunks.write();

            if !libraries.rows.contains_key(&library_id) {
                return Err(Error::NotFound(format!("library {library_id} not found")));
            }
            if documents.rows.contains_key(&doc_id) {
                return Err(Error::Validation(format!("document {doc_id} already exists")));
            }
            let mut ids = Vec::with_capacity(req.chunks.len());
            for chunk in &req.chunks {
                let chunk_id = chunk.id.unwrap_or_else(Uuid::new_v4);
                if chunks.rows.contains_key(&chunk_id) || ids.contains(&chunk_id) {
                    return Err(Error::Validation(format!("chunk {chunk_id} already exists")));
                }
                ids.push(chunk_id);
            }

            documents.rows.insert(
                doc_id,
                Document {
                    id: doc_id,
                    library_id,
                    name: req.name,
                    metadata: req.metadata,
                },
            );
            documents.by_library.entry(library_id).or_default().push(doc_id);
            for (chunk, chunk_id) in req.chunks.into_iter().zip(&ids) {
                chunks.rows.insert(
                    *chunk_id,
                    Chunk {
                        id: *chunk_id,
                        document_id: doc_id,
                        text: chunk.text,
                        embedding: chunk.embedding,
                        metadata: chunk.metadata,
                    },
                );
                chunks.by_document.entry(doc_id).or_default().push(*chunk_id);
            }
            chunks.by_document.entry(doc_id).or_default();
        }

        self.slots.note_mutation(library_id);
        self.get_document(doc_id)
    }

    pub fn get_document(&self, doc_id: Uuid) -> Result<DocumentView> {
        let documents = self.documents.read();
        let chunks = self.chunks.read();
        let row = documents
            .rows
            .get(&doc_id)
            .ok_or_else(|| Error::NotFound(format!("document {doc_id} not found")))?;
        Ok(document_view(row, &chunks))
    }

    pub fn list_documents(&self) -> Vec<DocumentView> {
        let documents = self.documents.read();
        let chunks = self.chunks.read();
        let mut views: Vec<DocumentView> = documents
            .rows
            .values()
            .map(|row| document_view(row, &chunks))
            .collect();
        views.sort_by_key(|v| v.id);
        views
    }

    /// Documents owned by a library, in creation order.
    pub fn documents_by_library(&self, library_id: Uuid) -> Result<Vec<DocumentView>> {
        let libraries = self.libraries.read();
        let documents = self.documents.read();
        let chunks = self.chunks.read();
        if !libraries.rows.contains_key(&library_id) {
            return Err(Error::NotFound(format!("library {library_id} not found")));
        }
        Ok(documents
            .by_library
            .get(&library_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| documents.rows.get(id))
                    .map(|row| document_view(row, &chunks))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Patch name/metadata. The owning library cannot be changed.
    /// Returns the view and the owning library id.
    pub fn update_document(
        &self,
        doc_id: Uuid,
        patch: DocumentPatch,
    ) -> Result<(DocumentView, Uuid)> {
        let (view, library_id) = {
            let mut documents = self.documents.write();
            let chunks = self.chunks.read();
            let row = documents
                .rows
                .get_mut(&doc_id)
                .ok_or_else(|| Error::NotFound(format!("document {doc_id} not found")))?;
            if let Some(library_id) = patch.library_id {
                if library_id != row.library_id {
                    return Err(Error::Validation(
                        "cannot change library_id of an existing document".into(),
                    ));
                }
            }
            if let Some(name) = patch.name {
                row.name = name;
            }
            if let Some(metadata) = patch.metadata {
                row.metadata = metadata;
            }
            (document_view(row, &chunks), row.library_id)
        };
        self.slots.note_mutation(library_id);
        Ok((view, library_id))
    }

    /// Delete a document and exactly its chunks. Returns the owning
    /// library id.
    pub fn delete_document(&self, doc_id: Uuid) -> Result<Uuid> {
        let library_id = {
            let mut documents = self.documents.write();
            let mut chunks = self.chunks.write();
            let row = documents
                .rows
                .remove(&doc_id)
                .ok_or_else(|| Error::NotFound(format!("document {doc_id} not found")))?;
            if let Some(siblings) = documents.by_library.get_mut(&row.library_id) {
                siblings.retain(|id| *id != doc_id);
            }
            for chunk_id in chunks.by_document.remove(&doc_id).unwrap_or_default() {
                chunks.rows.remove(&chunk_id);
            }
            row.library_id
        };
        self.slots.note_mutation(library_id);
        Ok(library_id)
    }

    // ============ Chunks ============

    /// Create a chunk under an existing document. Returns the chunk and
    /// the owning library id.
    pub fn create_chunk(&self, req: ChunkCreate) -> Result<(Chunk, Uuid)> {
        let (chunks, mut libraries) = self.create_chunks(vec![req])?;
        let chunk = chunks.into_iter().next().ok_or_else(|| {
            Error::Internal("batch create returned no chunks".into())
        })?;
        let library_id = libraries.pop().ok_or_else(|| {
            Error::Internal("batch create returned no library".into())
        })?;
        Ok((chunk, library_id))
    }

    /// Create a batch of chunks. All documents must exist and all ids must
    /// be fresh, or nothing is inserted. Each affected library is
    /// invalidated once. Returns the created chunks and the distinct
    /// affected library ids.
    pub fn create_chunks(&self, reqs: Vec<ChunkCreate>) -> Result<(Vec<Chunk>, Vec<Uuid>)> {
        let mut created = Vec::with_capacity(reqs.len());
        let mut affected: Vec<Uuid> = Vec::new();
        {
            let documents = self.documents.read();
            let mut chunks = self.chunks.write();

            let mut ids: Vec<(Uuid, Uuid)> = Vec::with_capacity(reqs.len());
            for req in &reqs {
                let doc_id = req
                    .document_id
                    .ok_or_else(|| Error::Validation("document_id is required".into()))?;
                let doc = documents
                    .rows
                    .get(&doc_id)
                    .ok_or_else(|| Error::NotFound(format!("document {doc_id} not found")))?;
                let chunk_id = req.id.unwrap_or_else(Uuid::new_v4);
                if chunks.rows.contains_key(&chunk_id) || ids.iter().any(|(_, c)| *c == chunk_id) {
                    return Err(Error::Validation(format!("chunk {chunk_id} already exists")));
                }
                ids.push((doc_id, chunk_id));
                if !affected.contains(&doc.library_id) {
                    affected.push(doc.library_id);
                }
            }

            for (req, (doc_id, chunk_id)) in reqs.into_iter().zip(ids) {
                let chunk = Chunk {
                    id: chunk_id,
                    document_id: doc_id,
                    text: req.text,
                    embedding: req.embedding,
                    metadata: req.metadata,
                };
                chunks.by_document.entry(doc_id).or_default().push(chunk_id);
                chunks.rows.insert(chunk_id, chunk.clone());
                created.push(chunk);
            }
        }
        for library_id in &affected {
            self.slots.note_mutation(*library_id);
        }
        Ok((created, affected))
    }

    pub fn get_chunk(&self, chunk_id: Uuid) -> Result<Chunk> {
        self.chunks
            .read()
            .rows
            .get(&chunk_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("chunk {chunk_id} not found")))
    }

    pub fn list_chunks(&self) -> Vec<Chunk> {
        let chunks = self.chunks.read();
        let mut rows: Vec<Chunk> = chunks.rows.values().cloned().collect();
        rows.sort_by_key(|c| c.id);
        rows
    }

    /// Chunks owned by a document, in creation order.
    pub fn chunks_by_document(&self, doc_id: Uuid) -> Result<Vec<Chunk>> {
        let documents = self.documents.read();
        let chunks = self.chunks.read();
        if !documents.rows.contains_key(&doc_id) {
            return Err(Error::NotFound(format!("document {doc_id} not found")));
        }
        Ok(chunks
            .by_document
            .get(&doc_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| chunks.rows.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Patch a chunk. `document_id` is immutable. Patching `text` without
    /// supplying a replacement embedding clears the stored one, so the
    /// next build re-embeds the new text. Returns the chunk and the owning
    /// library id.
    pub fn update_chunk(&self, chunk_id: Uuid, patch: ChunkPatch) -> Result<(Chunk, Uuid)> {
        // Resolve the owning library before taking the chunk write lock;
        // lock order is document before chunk.
        let doc_id = self
            .chunks
            .read()
            .rows
            .get(&chunk_id)
            .map(|c| c.document_id)
            .ok_or_else(|| Error::NotFound(format!("chunk {chunk_id} not found")))?;
        let library_id = self
            .documents
            .read()
            .rows
            .get(&doc_id)
            .map(|d| d.library_id)
            .ok_or_else(|| Error::NotFound(format!("document {doc_id} not found")))?;

        let chunk = {
            let mut chunks = self.chunks.write();
            let row = chunks
                .rows
                .get_mut(&chunk_id)
                .ok_or_else(|| Error::NotFound(format!("chunk {chunk_id} not found")))?;
            if let Some(document_id) = patch.document_id {
                if document_id != row.document_id {
                    return Err(Error::Validation(
                        "cannot change document_id of an existing chunk".into(),
                    ));
                }
            }
            if let Some(text) = patch.text {
                if text != row.text {
                    row.embedding = None;
                }
                row.text = text;
            }
            if let Some(embedding) = patch.embedding {
                row.embedding = Some(embedding);
            }
            if let Some(metadata) = patch.metadata {
                row.metadata = metadata;
            }
            row.clone()
        };
        self.slots.note_mutation(library_id);
        Ok((chunk, library_id))
    }

    /// Delete a chunk. Returns the owning library id.
    pub fn delete_chunk(&self, chunk_id: Uuid) -> Result<Uuid> {
        let doc_id = {
            let mut chunks = self.chunks.write();
            let row = chunks
                .rows
                .remove(&chunk_id)
                .ok_or_else(|| Error::NotFound(format!("chunk {chunk_id} not found")))?;
            if let Some(siblings) = chunks.by_document.get_mut(&row.document_id) {
                siblings.retain(|id| *id != chunk_id);
            }
            row.document_id
        };
        let library_id = self
            .documents
            .read()
            .rows
            .get(&doc_id)
            .map(|d| d.library_id)
            .ok_or_else(|| Error::NotFound(format!("document {doc_id} not found")))?;
        self.slots.note_mutation(library_id);
        Ok(library_id)
    }

    /// Embedding-fill write used by a running index build. Does *not*
    /// emit the invalidation signal. Returns false if the chunk vanished.
    pub fn set_chunk_embedding_internal(&self, chunk_id: Uuid, embedding: Vec<f32>) -> bool {
        let mut chunks = self.chunks.write();
        match chunks.rows.get_mut(&chunk_id) {
            Some(row) => {
                row.embedding = Some(embedding);
                true
            }
            None => false,
        }
    }

    // ============ Index support ============

    /// Snapshot the library's chunk set (ids, texts, embeddings) in
    /// document order. Consistent: all three locks are held in order for
    /// the duration of the copy.
    pub fn snapshot_chunks(&self, library_id: Uuid) -> Result<Vec<ChunkSnapshot>> {
        let libraries = self.libraries.read();
        let documents = self.documents.read();
        let chunks = self.chunks.read();
        if !libraries.rows.contains_key(&library_id) {
            return Err(Error::NotFound(format!("library {library_id} not found")));
        }
        let mut out = Vec::new();
        for doc_id in documents.by_library.get(&library_id).into_iter().flatten() {
            for chunk_id in chunks.by_document.get(doc_id).into_iter().flatten() {
                if let Some(chunk) = chunks.rows.get(chunk_id) {
                    out.push(ChunkSnapshot {
                        id: chunk.id,
                        text: chunk.text.clone(),
                        embedding: chunk.embedding.clone(),
                    });
                }
            }
        }
        Ok(out)
    }

    /// Total number of chunks currently owned by the library.
    pub fn library_chunk_count(&self, library_id: Uuid) -> Result<usize> {
        let libraries = self.libraries.read();
        let documents = self.documents.read();
        let chunks = self.chunks.read();
        if !libraries.rows.contains_key(&library_id) {
            return Err(Error::NotFound(format!("library {library_id} not found")));
        }
        let mut count = 0;
        for doc_id in documents.by_library.get(&library_id).into_iter().flatten() {
            count += chunks.by_document.get(doc_id).map(|v| v.len()).unwrap_or(0);
        }
        Ok(count)
    }

    /// Join raw index hits back to their chunk records. Hits whose chunk
    /// has vanished are dropped.
    pub fn hydrate_hits(&self, hits: &[SearchHit]) -> Vec<SearchResult> {
        let chunks = self.chunks.read();
        hits.iter()
            .filter_map(|hit| {
                chunks.rows.get(&hit.chunk_id).map(|chunk| SearchResult {
                    chunk_id: chunk.id,
                    document_id: chunk.document_id,
                    score: hit.score,
                    text: chunk.text.clone(),
                    metadata: chunk.metadata.clone(),
                })
            })
            .collect()
    }

    // ============ Persistence support ============

    /// Copy out a library with its documents and chunks in ownership
    /// order, for the persistence sink.
    pub fn export_library(
        &self,
        library_id: Uuid,
    ) -> Result<(Library, Vec<Document>, Vec<Chunk>)> {
        let libraries = self.libraries.read();
        let documents = self.documents.read();
        let chunks = self.chunks.read();
        let library = libraries
            .rows
            .get(&library_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("library {library_id} not found")))?;
        let mut docs = Vec::new();
        let mut all_chunks = Vec::new();
        for doc_id in documents.by_library.get(&library_id).into_iter().flatten() {
            if let Some(doc) = documents.rows.get(doc_id) {
                docs.push(doc.clone());
            }
            for chunk_id in chunks.by_document.get(doc_id).into_iter().flatten() {
                if let Some(chunk) = chunks.rows.get(chunk_id) {
                    all_chunks.push(chunk.clone());
                }
            }
        }
        Ok((library, docs, all_chunks))
    }

    /// Insert a library loaded from disk. Parent links are validated, ids
    /// must be fresh, and no invalidation signal is emitted; the new slot
    /// starts `stale` because the persisted file carries no embeddings.
    pub fn import_library(
        &self,
        library: Library,
        docs: Vec<Document>,
        loaded_chunks: Vec<Chunk>,
    ) -> Result<()> {
        let library_id = library.id;
        {
            let mut libraries = self.libraries.write();
            let mut documents = self.documents.write();
            let mut chunks = self.chunks.write();

            if libraries.rows.contains_key(&library_id) {
                return Err(Error::Validation(format!(
                    "library {library_id} already exists"
                )));
            }
            for doc in &docs {
                if doc.library_id != library_id {
                    return Err(Error::Validation(format!(
                        "document {} does not belong to library {library_id}",
                        doc.id
                    )));
                }
                if documents.rows.contains_key(&doc.id) {
                    return Err(Error::Validation(format!(
                        "document {} already exists",
                        doc.id
                    )));
                }
            }
            for chunk in &loaded_chunks {
                if chunks.rows.contains_key(&chunk.id) {
                    return Err(Error::Validation(format!(
                        "chunk {} already exists",
                        chunk.id
                    )));
                }
                if !docs.iter().any(|d| d.id == chunk.document_id) {
                    return Err(Error::Validation(format!(
                        "chunk {} references unknown document {}",
                        chunk.id, chunk.document_id
                    )));
                }
            }

            libraries.rows.insert(library_id, library);
            documents.by_library.entry(library_id).or_default();
            for doc in docs {
                documents
                    .by_library
                    .entry(library_id)
                    .or_default()
                    .push(doc.id);
                chunks.by_document.entry(doc.id).or_default();
                documents.rows.insert(doc.id, doc);
            }
            for chunk in loaded_chunks {
                chunks
                    .by_document
                    .entry(chunk.document_id)
                    .or_default()
                    .push(chunk.id);
                chunks.rows.insert(chunk.id, chunk);
            }
        }
        self.slots.create(library_id, IndexState::Stale);
        Ok(())
    }

    /// Table and reverse-map cardinalities, for tests and diagnostics:
    /// `(libraries, documents, chunks, by_library entries, by_document entries)`.
    pub fn cardinality(&self) -> (usize, usize, usize, usize, usize) {
        let libraries = self.libraries.read();
        let documents = self.documents.read();
        let chunks = self.chunks.read();
        (
            libraries.rows.len(),
            documents.rows.len(),
            chunks.rows.len(),
            documents.by_library.values().map(|v| v.len()).sum(),
            chunks.by_document.values().map(|v| v.len()).sum(),
        )
    }
}

fn library_view(row: &Library, documents: &DocumentTable) -> LibraryView {
    LibraryView {
        id: row.id,
        name: row.name.clone(),
        metadata: row.metadata.clone(),
        document_ids: documents.by_library.get(&row.id).cloned().unwrap_or_default(),
    }
}

fn document_view(row: &Document, chunks: &ChunkTable) -> DocumentView {
    DocumentView {
        id: row.id,
        library_id: row.library_id,
        name: row.name.clone(),
        metadata: row.metadata.clone(),
        chunk_ids: chunks.by_document.get(&row.id).cloned().unwrap_or_default(),
    }
}
