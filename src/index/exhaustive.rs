//! Exhaustive (brute-force) indexer: a linear scan over all vectors.
//!
//! Exact by construction and the baseline the ball tree is validated
//! against. O(n·d) per query.

use crate::error::{Error, Result};
use crate::vecmath;

use super::{Candidate, IndexStats, IndexedPoint, IndexerKind, SearchHit, TopK, VectorIndexer};

/// Flat array of unit vectors, scanned in full on every search.
pub struct ExhaustiveIndex {
    points: Vec<IndexedPoint>,
    dimension: usize,
    built_at_epoch_ms: i64,
}

impl ExhaustiveIndex {
    /// Wrap an already-normalized point set. Called via
    /// [`super::build_indexer`], which performs normalization and the
    /// uniform-dimension check.
    pub(super) fn build(points: Vec<IndexedPoint>) -> Self {
        let dimension = points.first().map(|p| p.vector.len()).unwrap_or(0);
        Self {
            points,
            dimension,
            built_at_epoch_ms: super::epoch_ms(),
        }
    }
}

impl VectorIndexer for ExhaustiveIndex {
    fn kind(&self) -> IndexerKind {
        IndexerKind::Exhaustive
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.points.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(Error::DimMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let q = vecmath::normalize(query)?;
        let mut top = TopK::new(k);
        for (seq, p) in self.points.iter().enumerate() {
            let score = vecmath::dot(&q, &p.vector)?;
            top.offer(Candidate {
                chunk_id: p.chunk_id,
                score,
                seq,
            });
        }
        Ok(top.into_sorted_hits())
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            kind: IndexerKind::Exhaustive,
            vector_count: self.points.len(),
            dimension: self.dimension,
            built_at_epoch_ms: self.built_at_epoch_ms,
        }
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}
