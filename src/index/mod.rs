//! Nearest-neighbor indexers and the uniform contract they satisfy.
//!
//! Two interchangeable implementations exist:
//!
//! | Kind | Module | Build | Search |
//! |------|--------|-------|--------|
//! | `BRUTE_FORCE` | [`exhaustive`] | O(n) | linear scan, bounded heap |
//! | `BALL_TREE` | [`ball_tree`] | O(n log n) expected | best-first pruned |
//!
//! Both rank by cosine similarity, which over unit vectors is the dot
//! product. [`build_indexer`] is the single factory: it unit-normalizes the
//! input points, enforces a uniform dimension, and returns a boxed
//! [`VectorIndexer`]. The tree (or scan array) is immutable after build;
//! re-indexing replaces it wholesale.

pub mod ball_tree;
pub mod exhaustive;

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::vecmath;

/// Which indexer implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexerKind {
    /// Linear scan over all vectors.
    #[serde(rename = "BRUTE_FORCE")]
    Exhaustive,
    /// Metric ball tree with triangle-inequality pruning.
    #[serde(rename = "BALL_TREE")]
    BallTree,
}

impl IndexerKind {
    /// Parse a wire name, tolerating case (`"ball_tree"` == `"BALL_TREE"`).
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BRUTE_FORCE" => Ok(IndexerKind::Exhaustive),
            "BALL_TREE" => Ok(IndexerKind::BallTree),
            other => Err(Error::Validation(format!(
                "unknown indexer_type: {other}. Use BRUTE_FORCE or BALL_TREE."
            ))),
        }
    }

    /// The wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexerKind::Exhaustive => "BRUTE_FORCE",
            IndexerKind::BallTree => "BALL_TREE",
        }
    }
}

/// A chunk id paired with its raw (not yet normalized) embedding.
#[derive(Debug, Clone)]
pub struct IndexedPoint {
    pub chunk_id: Uuid,
    pub vector: Vec<f32>,
}

/// One search result: a chunk and its cosine similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub chunk_id: Uuid,
    pub score: f32,
}

/// Observability snapshot of a built index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub kind: IndexerKind,
    pub vector_count: usize,
    pub dimension: usize,
    pub built_at_epoch_ms: i64,
}

/// Uniform contract both indexers satisfy. Implementations are immutable
/// after construction and safe to share across threads.
pub trait VectorIndexer: Send + Sync {
    /// Which implementation this is.
    fn kind(&self) -> IndexerKind;

    /// Top-k by cosine similarity, sorted descending. `k` larger than the
    /// vector count returns everything; an empty index returns an empty
    /// list. Fails with `DimMismatch` if the query dimension differs.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Build-time statistics.
    fn stats(&self) -> IndexStats;

    /// Number of vectors indexed.
    fn len(&self) -> usize;

    /// Whether the index holds no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build an indexer of the requested kind over the given points.
///
/// Normalizes every vector to unit length (`BadVector` on zero vectors)
/// and rejects mixed dimensions with `DimMismatch`. `leaf_size` applies to
/// the ball tree only; `None` uses the default of 40.
pub fn build_indexer(
    kind: IndexerKind,
    leaf_size: Option<usize>,
    points: Vec<IndexedPoint>,
) -> Result<Box<dyn VectorIndexer>> {
    let normalized = normalize_points(points)?;
    match kind {
        IndexerKind::Exhaustive => Ok(Box::new(exhaustive::ExhaustiveIndex::build(normalized))),
        IndexerKind::BallTree => Ok(Box::new(ball_tree::BallTreeIndex::build(
            normalized,
            leaf_size.unwrap_or(ball_tree::DEFAULT_LEAF_SIZE),
        )?)),
    }
}

fn normalize_points(points: Vec<IndexedPoint>) -> Result<Vec<IndexedPoint>> {
    let mut out = Vec::with_capacity(points.len());
    let mut dim: Option<usize> = None;
    for p in points {
        match dim {
            None => dim = Some(p.vector.len()),
            Some(d) if d != p.vector.len() => {
                return Err(Error::DimMismatch {
                    expected: d,
                    actual: p.vector.len(),
                })
            }
            _ => {}
        }
        out.push(IndexedPoint {
            chunk_id: p.chunk_id,
            vector: vecmath::normalize(&p.vector)?,
        });
    }
    Ok(out)
}

/// Current wall-clock time as epoch milliseconds, for [`IndexStats`].
pub(crate) fn epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ============ Bounded top-k heap ============

/// An entry competing for a top-k slot. `seq` is the insertion order of the
/// point; equal scores are won by the earlier insertion.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub chunk_id: Uuid,
    pub score: f32,
    pub seq: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.seq == other.seq
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher score ranks higher; on a tie the earlier insertion ranks
        // higher. total_cmp keeps the ordering total even for NaN, which
        // cannot occur for finite unit vectors.
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Bounded min-heap keeping the `k` best [`Candidate`]s seen so far.
pub(crate) struct TopK {
    k: usize,
    heap: BinaryHeap<std::cmp::Reverse<Candidate>>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1)),
        }
    }

    /// Offer a candidate, evicting the current worst if full.
    pub fn offer(&mut self, c: Candidate) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(std::cmp::Reverse(c));
        } else if self.heap.peek().map(|worst| c > worst.0).unwrap_or(false) {
            self.heap.pop();
            self.heap.push(std::cmp::Reverse(c));
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    /// The lowest score currently held, if the heap is non-empty.
    pub fn min_score(&self) -> Option<f32> {
        self.heap.peek().map(|std::cmp::Reverse(c)| c.score)
    }

    /// Drain into hits sorted by score descending, ties by insertion order.
    pub fn into_sorted_hits(self) -> Vec<SearchHit> {
        let mut candidates: Vec<Candidate> =
            self.heap.into_iter().map(|std::cmp::Reverse(c)| c).collect();
        candidates.sort_by(|a, b| b.cmp(a));
        candidates
            .into_iter()
            .map(|c| SearchHit {
                chunk_id: c.chunk_id,
                score: c.score,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(seed: u128, v: &[f32]) -> IndexedPoint {
        IndexedPoint {
            chunk_id: Uuid::from_u128(seed),
            vector: v.to_vec(),
        }
    }

    #[test]
    fn test_kind_parse_tolerates_case() {
        assert_eq!(
            IndexerKind::parse("ball_tree").unwrap(),
            IndexerKind::BallTree
        );
        assert_eq!(
            IndexerKind::parse("BRUTE_FORCE").unwrap(),
            IndexerKind::Exhaustive
        );
        assert!(IndexerKind::parse("kd_tree").is_err());
    }

    #[test]
    fn test_factory_rejects_mixed_dims() {
        let points = vec![point(1, &[1.0, 0.0]), point(2, &[1.0, 0.0, 0.0])];
        let err = build_indexer(IndexerKind::Exhaustive, None, points).err().unwrap();
        assert!(matches!(err, Error::DimMismatch { .. }));
    }

    #[test]
    fn test_factory_rejects_zero_vector() {
        let points = vec![point(1, &[0.0, 0.0])];
        let err = build_indexer(IndexerKind::BallTree, None, points).err().unwrap();
        assert!(matches!(err, Error::BadVector));
    }

    #[test]
    fn test_topk_keeps_k_largest() {
        let mut top = TopK::new(2);
        for (i, s) in [0.1f32, 0.9, 0.5, 0.7].iter().enumerate() {
            top.offer(Candidate {
                chunk_id: Uuid::from_u128(i as u128),
                score: *s,
                seq: i,
            });
        }
        let hits = top.into_sorted_hits();
        assert_eq!(hits.len(), 2);
        assert!((hits[0].score - 0.9).abs() < 1e-6);
        assert!((hits[1].score - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_topk_tie_prefers_earlier_insertion() {
        let mut top = TopK::new(1);
        top.offer(Candidate {
            chunk_id: Uuid::from_u128(1),
            score: 0.5,
            seq: 0,
        });
        top.offer(Candidate {
            chunk_id: Uuid::from_u128(2),
            score: 0.5,
            seq: 1,
        });
        let hits = top.into_sorted_hits();
        assert_eq!(hits[0].chunk_id, Uuid::from_u128(1));
    }

    #[test]
    fn test_recall_equivalence_exhaustive_vs_ball_tree() {
        // Deterministic pseudo-random points: both indexers must return the
        // same id set with scores agreeing to 1e-6.
        let mut state = 0x2545F4914F6CDD1Du64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f32 / (1u64 << 53) as f32 - 0.5
        };
        let points: Vec<IndexedPoint> = (0..200)
            .map(|i| IndexedPoint {
                chunk_id: Uuid::from_u128(i as u128 + 1),
                vector: (0..8).map(|_| next()).collect(),
            })
            .collect();
        let query: Vec<f32> = (0..8).map(|_| next()).collect();

        let flat = build_indexer(IndexerKind::Exhaustive, None, points.clone()).unwrap();
        let tree = build_indexer(IndexerKind::BallTree, Some(16), points).unwrap();

        for k in [1usize, 5, 17, 200, 500] {
            let a = flat.search(&query, k).unwrap();
            let b = tree.search(&query, k).unwrap();
            assert_eq!(a.len(), b.len(), "k={k}");
            let ids_a: std::collections::HashSet<Uuid> =
                a.iter().map(|h| h.chunk_id).collect();
            let ids_b: std::collections::HashSet<Uuid> =
                b.iter().map(|h| h.chunk_id).collect();
            assert_eq!(ids_a, ids_b, "k={k}");
            for (x, y) in a.iter().zip(b.iter()) {
                assert!((x.score - y.score).abs() < 1e-6, "k={k}");
            }
        }
    }
}
