//! Metric ball-tree indexer.
//!
//! Each node bounds its points with a hypersphere (center, radius). For a
//! unit query q and any unit point x inside a ball,
//!
//! ```text
//! dot(q, x) ≤ dot(q, center) + ‖x − center‖ ≤ dot(q, center) + radius
//! ```
//!
//! so `dot(q, center) + radius` is an admissible upper bound on the
//! similarity reachable inside the node. Search explores nodes best-first
//! by that bound and stops as soon as the bound cannot beat the current
//! k-th best score, which makes the result exact (recall 1.0), not
//! approximate.
//!
//! Construction splits on a far-apart seed pair: centers are centroids in
//! the ambient space (not re-normalized), points go to the closer seed.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::vecmath;

use super::{Candidate, IndexStats, IndexedPoint, IndexerKind, SearchHit, TopK, VectorIndexer};

/// Maximum points per leaf when the caller does not specify one.
pub const DEFAULT_LEAF_SIZE: usize = 40;

struct LeafPoint {
    /// Position in the original insertion order, for tie-breaking.
    seq: usize,
    chunk_id: Uuid,
    vector: Vec<f32>,
}

struct Node {
    center: Vec<f32>,
    radius: f32,
    content: NodeContent,
}

enum NodeContent {
    Internal { left: Box<Node>, right: Box<Node> },
    Leaf(Vec<LeafPoint>),
}

/// Immutable ball tree over unit vectors. Re-indexing replaces the whole
/// tree; there is no incremental insert.
pub struct BallTreeIndex {
    root: Option<Node>,
    vector_count: usize,
    dimension: usize,
    built_at_epoch_ms: i64,
}

impl BallTreeIndex {
    /// Build from an already-normalized point set. Called via
    /// [`super::build_indexer`].
    pub(super) fn build(points: Vec<IndexedPoint>, leaf_size: usize) -> Result<Self> {
        let leaf_size = leaf_size.max(1);
        let vector_count = points.len();
        let dimension = points.first().map(|p| p.vector.len()).unwrap_or(0);
        let leaf_points: Vec<LeafPoint> = points
            .into_iter()
            .enumerate()
            .map(|(seq, p)| LeafPoint {
                seq,
                chunk_id: p.chunk_id,
                vector: p.vector,
            })
            .collect();
        let root = if leaf_points.is_empty() {
            None
        } else {
            Some(build_node(leaf_points, leaf_size)?)
        };
        Ok(Self {
            root,
            vector_count,
            dimension,
            built_at_epoch_ms: super::epoch_ms(),
        })
    }
}

/// Recursively build the subtree over a non-empty point set.
fn build_node(points: Vec<LeafPoint>, leaf_size: usize) -> Result<Node> {
    let center = vecmath::centroid(points.iter().map(|p| p.vector.as_slice()))
        .ok_or_else(|| Error::Internal("ball-tree node over empty point set".into()))?;
    let radius = vecmath::radius(&center, points.iter().map(|p| p.vector.as_slice()))?;

    if points.len() <= leaf_size {
        return Ok(Node {
            center,
            radius,
            content: NodeContent::Leaf(points),
        });
    }

    let (seed_a, seed_b) = {
        let refs: Vec<&[f32]> = points.iter().map(|p| p.vector.as_slice()).collect();
        let (ia, ib) = vecmath::furthest_pair_seed(&refs)?;
        if ia == ib {
            // Every point coincides; no split exists.
            return Ok(Node {
                center,
                radius,
                content: NodeContent::Leaf(points),
            });
        }
        (points[ia].vector.clone(), points[ib].vector.clone())
    };

    let mut left: Vec<LeafPoint> = Vec::new();
    let mut right: Vec<LeafPoint> = Vec::new();
    for p in points {
        let da = vecmath::euclid(&p.vector, &seed_a)?;
        let db = vecmath::euclid(&p.vector, &seed_b)?;
        // Ties go to the first seed.
        if da <= db {
            left.push(p);
        } else {
            right.push(p);
        }
    }

    if left.is_empty() {
        rebalance(&mut right, &mut left, &seed_b)?;
    } else if right.is_empty() {
        rebalance(&mut left, &mut right, &seed_a)?;
    }
    if left.is_empty() || right.is_empty() {
        let mut all = left;
        all.append(&mut right);
        return Ok(Node {
            center,
            radius,
            content: NodeContent::Leaf(all),
        });
    }

    Ok(Node {
        center,
        radius,
        content: NodeContent::Internal {
            left: Box::new(build_node(left, leaf_size)?),
            right: Box::new(build_node(right, leaf_size)?),
        },
    })
}

/// Move the point furthest from `seed` out of `full` into `empty`. When
/// every point coincides with the seed there is nothing to move and the
/// caller falls back to a leaf.
fn rebalance(full: &mut Vec<LeafPoint>, empty: &mut Vec<LeafPoint>, seed: &[f32]) -> Result<()> {
    let mut best: Option<(usize, f32)> = None;
    for (i, p) in full.iter().enumerate() {
        let d = vecmath::euclid(&p.vector, seed)?;
        if best.map(|(_, bd)| d > bd).unwrap_or(true) {
            best = Some((i, d));
        }
    }
    if let Some((i, d)) = best {
        if d > 0.0 && full.len() > 1 {
            empty.push(full.remove(i));
        }
    }
    Ok(())
}

/// A frontier node ordered by its similarity upper bound.
struct Frontier<'a> {
    ub: f32,
    node: &'a Node,
}

impl PartialEq for Frontier<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.ub == other.ub
    }
}

impl Eq for Frontier<'_> {}

impl PartialOrd for Frontier<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ub.total_cmp(&other.ub)
    }
}

fn upper_bound(query: &[f32], node: &Node) -> Result<f32> {
    Ok(vecmath::dot(query, &node.center)? + node.radius)
}

impl VectorIndexer for BallTreeIndex {
    fn kind(&self) -> IndexerKind {
        IndexerKind::BallTree
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let root = match &self.root {
            None => return Ok(Vec::new()),
            Some(r) => r,
        };
        if k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(Error::DimMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let q = vecmath::normalize(query)?;

        let mut best = TopK::new(k);
        let mut frontier = BinaryHeap::new();
        frontier.push(Frontier {
            ub: upper_bound(&q, root)?,
            node: root,
        });

        while let Some(Frontier { ub, node }) = frontier.pop() {
            if best.is_full() {
                if let Some(min) = best.min_score() {
                    if ub <= min {
                        break;
                    }
                }
            }
            match &node.content {
                NodeContent::Leaf(points) => {
                    for p in points {
                        best.offer(Candidate {
                            chunk_id: p.chunk_id,
                            score: vecmath::dot(&q, &p.vector)?,
                            seq: p.seq,
                        });
                    }
                }
                NodeContent::Internal { left, right } => {
                    frontier.push(Frontier {
                        ub: upper_bound(&q, left)?,
                        node: left,
                    });
                    frontier.push(Frontier {
                        ub: upper_bound(&q, right)?,
                        node: right,
                    });
                }
            }
        }

        Ok(best.into_sorted_hits())
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            kind: IndexerKind::BallTree,
            vector_count: self.vector_count,
            dimension: self.dimension,
            built_at_epoch_ms: self.built_at_epoch_ms,
        }
    }

    fn len(&self) -> usize {
        self.vector_count
    }
}
