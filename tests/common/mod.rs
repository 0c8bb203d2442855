//! Shared test fixtures: deterministic stub embedders and context setup.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use corpusdb::app::AppContext;
use corpusdb::config::Config;
use corpusdb::embedding::{EmbedRole, Embedder};
use corpusdb::error::Result;
use corpusdb::lifecycle::IndexStatus;
use uuid::Uuid;

/// Embedding dimension used by the stubs.
pub const STUB_DIM: usize = 8;

/// Deterministic embedder: feline-family tokens share axis 0, astronomy
/// tokens axis 1, everything else hashes onto the remaining axes. Texts
/// about cats therefore land near each other and far from telescopes.
pub struct StubEmbedder;

fn token_axis(token: &str) -> usize {
    match token {
        "cat" | "cats" | "kitten" | "kittens" | "feline" | "felines" => 0,
        "astronomy" | "telescope" | "planet" | "stars" => 1,
        _ => {
            // FNV-1a, folded onto the free axes.
            let mut hash: u64 = 0xcbf29ce484222325;
            for b in token.bytes() {
                hash ^= b as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            2 + (hash % (STUB_DIM as u64 - 2)) as usize
        }
    }
}

pub fn embed_text(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; STUB_DIM];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        v[token_axis(token)] += 1.0;
    }
    if v.iter().all(|x| *x == 0.0) {
        v[STUB_DIM - 1] = 1.0;
    }
    v
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed_batch(&self, texts: &[String], _role: EmbedRole) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }
}

/// Stub that sleeps before answering, to hold a library in `building`.
pub struct SlowEmbedder {
    pub delay: Duration,
}

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed_batch(&self, texts: &[String], _role: EmbedRole) -> Result<Vec<Vec<f32>>> {
        tokio::time::sleep(self.delay).await;
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }
}

/// Stub that answers successive texts with different dimensions.
pub struct MixedDimEmbedder {
    counter: AtomicUsize,
}

impl MixedDimEmbedder {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for MixedDimEmbedder {
    async fn embed_batch(&self, texts: &[String], _role: EmbedRole) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|_| {
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                let dim = if n % 2 == 0 { 768 } else { 1024 };
                let mut v = vec![0.0f32; dim];
                v[0] = 1.0;
                v
            })
            .collect())
    }
}

/// Build a context over a temp data dir and the given embedder.
pub fn test_context(data_dir: &Path, embedder: Arc<dyn Embedder>) -> Arc<AppContext> {
    let config = Config {
        data_dir: data_dir.to_path_buf(),
        ..Config::default()
    };
    AppContext::new(config, embedder)
}

/// Poll the index status until the build settles or the deadline passes.
pub async fn wait_for_build(ctx: &AppContext, library_id: Uuid) -> IndexStatus {
    for _ in 0..200 {
        let status = ctx.lifecycle.status(library_id).expect("library exists");
        if !status.indexing_in_progress {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("index build for {library_id} did not settle in time");
}
