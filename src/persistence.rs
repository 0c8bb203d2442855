//! Library-scoped JSON persistence.
//!
//! Each library is persisted as one file, `{DATA_DIR}/library_{uuid}.json`,
//! holding the library record, its documents, and their chunks **without
//! embeddings** — vectors are always rebuilt from text at index time.
//! Writes go through a temp-file-then-rename so a crash never leaves a
//! truncated file behind.
//!
//! Durability is best-effort: the in-memory store is the source of truth,
//! write failures are logged and never surfaced to API callers, and a cold
//! restart may lose the most recent unsaved change.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Chunk, ChunkCreate, Document, DocumentCreate, Library, LibraryCreate, Metadata};
use crate::store::Store;

/// A chunk as written to disk: no embedding.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedChunk {
    id: Uuid,
    document_id: Uuid,
    text: String,
    #[serde(default)]
    metadata: Metadata,
}

impl From<&Chunk> for PersistedChunk {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id,
            document_id: chunk.document_id,
            text: chunk.text.clone(),
            metadata: chunk.metadata.clone(),
        }
    }
}

/// The on-disk shape of one library file.
#[derive(Debug, Serialize, Deserialize)]
struct LibraryFile {
    library: Library,
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    chunks: Vec<PersistedChunk>,
}

/// Path of a library's JSON file inside `data_dir`.
pub fn library_file_path(data_dir: &Path, library_id: Uuid) -> PathBuf {
    data_dir.join(format!("library_{library_id}.json"))
}

/// Write one library (documents and chunks included, embeddings stripped)
/// to its JSON file via temp-file-then-rename.
pub fn save_library(store: &Store, data_dir: &Path, library_id: Uuid) -> Result<()> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| Error::Persistence(format!("creating {}: {e}", data_dir.display())))?;

    let (library, documents, chunks) = store.export_library(library_id)?;
    let file = LibraryFile {
        library,
        documents,
        chunks: chunks.iter().map(PersistedChunk::from).collect(),
    };

    let tmp = tempfile::NamedTempFile::new_in(data_dir)
        .map_err(|e| Error::Persistence(format!("creating temp file: {e}")))?;
    serde_json::to_writer(tmp.as_file(), &file)
        .map_err(|e| Error::Persistence(format!("serializing library {library_id}: {e}")))?;
    let path = library_file_path(data_dir, library_id);
    tmp.persist(&path)
        .map_err(|e| Error::Persistence(format!("renaming into {}: {e}", path.display())))?;
    Ok(())
}

/// Delete a library's JSON file. Missing files are fine.
pub fn remove_library_file(data_dir: &Path, library_id: Uuid) -> Result<()> {
    let path = library_file_path(data_dir, library_id);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Persistence(format!(
            "removing {}: {e}",
            path.display()
        ))),
    }
}

/// Load one library file into the store. The loaded library starts
/// `stale` — its embeddings were not persisted.
pub fn load_library_file(store: &Store, path: &Path) -> Result<Uuid> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Persistence(format!("reading {}: {e}", path.display())))?;
    let file: LibraryFile = serde_json::from_str(&content)
        .map_err(|e| Error::Persistence(format!("parsing {}: {e}", path.display())))?;

    let library_id = file.library.id;
    let chunks = file
        .chunks
        .into_iter()
        .map(|c| Chunk {
            id: c.id,
            document_id: c.document_id,
            text: c.text,
            embedding: None,
            metadata: c.metadata,
        })
        .collect();
    store.import_library(file.library, file.documents, chunks)?;
    Ok(library_id)
}

/// Scan `data_dir` for `library_*.json` files and load each one. Bad
/// files are logged and skipped. Returns the number loaded.
pub fn load_all_libraries(store: &Store, data_dir: &Path) -> usize {
    let entries = match std::fs::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            tracing::warn!(dir = %data_dir.display(), error = %e, "cannot scan data directory");
            return 0;
        }
    };

    let mut count = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with("library_") || !name.ends_with(".json") {
            continue;
        }
        match load_library_file(store, &path) {
            Ok(library_id) => {
                tracing::info!(%library_id, file = %path.display(), "loaded library");
                count += 1;
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping library file");
            }
        }
    }
    count
}

/// Create the bundled seed library used when `TESTING_DATA=true`.
pub fn seed_corpus(store: &Store) -> Result<Uuid> {
    let chunk = |text: &str| ChunkCreate {
        id: None,
        document_id: None,
        text: text.to_string(),
        embedding: None,
        metadata: Metadata::new(),
    };

    let view = store.create_library(LibraryCreate {
        id: None,
        name: "Field Notes".into(),
        metadata: [("source".to_string(), "seed".to_string())].into(),
        documents: vec![
            DocumentCreate {
                id: None,
                library_id: None,
                name: "Animals".into(),
                metadata: Metadata::new(),
                chunks: vec![
                    chunk("The cat sat on the warm windowsill all afternoon."),
                    chunk("Kittens are small cats that sleep most of the day."),
                    chunk("Wolves hunt in packs across the northern forests."),
                ],
            },
            DocumentCreate {
                id: None,
                library_id: None,
                name: "Sky".into(),
                metadata: Metadata::new(),
                chunks: vec![
                    chunk("The telescope revealed rings around the distant planet."),
                    chunk("Astronomy clubs meet on clear nights away from city light."),
                ],
            },
        ],
    })?;
    Ok(view.id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::lifecycle::{IndexSlots, IndexState};

    fn store() -> (Store, Arc<IndexSlots>) {
        let slots = Arc::new(IndexSlots::new());
        (Store::new(slots.clone()), slots)
    }

    #[test]
    fn test_save_load_round_trip_drops_embeddings() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (source, _) = store();
        let library_id = seed_corpus(&source).unwrap();

        // Give one chunk an embedding; it must not survive the trip.
        let doc = source.documents_by_library(library_id).unwrap();
        let chunk_id = doc[0].chunk_ids[0];
        source.set_chunk_embedding_internal(chunk_id, vec![1.0, 0.0]);

        save_library(&source, tmp.path(), library_id).unwrap();

        let (restored, slots) = store();
        let loaded = load_all_libraries(&restored, tmp.path());
        assert_eq!(loaded, 1);
        assert_eq!(restored.cardinality(), source.cardinality());
        assert!(restored.get_chunk(chunk_id).unwrap().embedding.is_none());
        assert_eq!(slots.get(library_id).unwrap().state(), IndexState::Stale);
    }

    #[test]
    fn test_file_naming() {
        let id = Uuid::from_u128(7);
        let path = library_file_path(Path::new("data"), id);
        assert_eq!(
            path,
            PathBuf::from(format!("data/library_{id}.json"))
        );
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(remove_library_file(tmp.path(), Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_malformed_file_is_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(format!("library_{}.json", Uuid::new_v4())),
            "{not json",
        )
        .unwrap();
        let (target, _) = store();
        assert_eq!(load_all_libraries(&target, tmp.path()), 0);
        assert_eq!(target.cardinality().0, 0);
    }

    #[test]
    fn test_unrelated_files_ignored() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "hello").unwrap();
        let (target, _) = store();
        assert_eq!(load_all_libraries(&target, tmp.path()), 0);
    }
}
