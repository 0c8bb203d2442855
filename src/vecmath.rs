//! Dense vector math for the indexers.
//!
//! All functions operate on fixed-length `f32` slices. Length mismatches
//! fail with [`Error::DimMismatch`]; normalizing a zero vector fails with
//! [`Error::BadVector`]. Centroids are *not* re-normalized — ball-tree
//! centers live in the ambient space, not on the unit sphere.

use crate::error::{Error, Result};

/// Divide a vector by its L2 norm, producing a unit vector.
pub fn normalize(v: &[f32]) -> Result<Vec<f32>> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(Error::BadVector);
    }
    Ok(v.iter().map(|x| x / norm).collect())
}

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dims(a, b)?;
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Euclidean distance between two equal-length vectors.
pub fn euclid(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dims(a, b)?;
    let sum: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum();
    Ok(sum.sqrt())
}

/// Arithmetic mean of a non-empty set of vectors. Returns `None` on an
/// empty input.
pub fn centroid<'a, I>(points: I) -> Option<Vec<f32>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut iter = points.into_iter();
    let first = iter.next()?;
    let mut acc: Vec<f32> = first.to_vec();
    let mut count = 1usize;
    for p in iter {
        for (a, x) in acc.iter_mut().zip(p.iter()) {
            *a += x;
        }
        count += 1;
    }
    let n = count as f32;
    for a in acc.iter_mut() {
        *a /= n;
    }
    Some(acc)
}

/// Maximum Euclidean distance from `center` to any point in the set.
pub fn radius<'a, I>(center: &[f32], points: I) -> Result<f32>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut max = 0.0f32;
    for p in points {
        let d = euclid(center, p)?;
        if d > max {
            max = d;
        }
    }
    Ok(max)
}

/// Pick two far-apart seed points for a ball-tree split.
///
/// Starting from the first point x₀, x₁ is the point furthest from x₀ and
/// x₂ the point furthest from x₁. Returns the indices `(i₁, i₂)` into the
/// input slice. Deterministic given input ordering: ties keep the earliest
/// candidate.
pub fn furthest_pair_seed(points: &[&[f32]]) -> Result<(usize, usize)> {
    if points.is_empty() {
        return Err(Error::Internal("furthest_pair_seed on empty set".into()));
    }
    let i1 = argmax_dist(points, points[0])?;
    let i2 = argmax_dist(points, points[i1])?;
    Ok((i1, i2))
}

fn argmax_dist(points: &[&[f32]], from: &[f32]) -> Result<usize> {
    let mut best = 0usize;
    let mut best_d = -1.0f32;
    for (i, p) in points.iter().enumerate() {
        let d = euclid(from, p)?;
        if d > best_d {
            best_d = d;
            best = i;
        }
    }
    Ok(best)
}

fn check_dims(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::DimMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_norm() {
        let v = normalize(&[3.0, 4.0]).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_fails() {
        assert!(matches!(normalize(&[0.0, 0.0, 0.0]), Err(Error::BadVector)));
    }

    #[test]
    fn test_dot_in_unit_range() {
        let a = normalize(&[1.0, 2.0, 3.0]).unwrap();
        let b = normalize(&[-2.0, 0.5, 1.0]).unwrap();
        let d = dot(&a, &b).unwrap();
        assert!((-1.0..=1.0).contains(&d));
    }

    #[test]
    fn test_dot_dim_mismatch() {
        assert!(matches!(
            dot(&[1.0, 2.0], &[1.0]),
            Err(Error::DimMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_euclid() {
        let d = euclid(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_centroid_mean() {
        let a = [0.0f32, 0.0];
        let b = [2.0f32, 4.0];
        let c = centroid([a.as_slice(), b.as_slice()]).unwrap();
        assert_eq!(c, vec![1.0, 2.0]);
    }

    #[test]
    fn test_centroid_empty_is_none() {
        assert!(centroid(std::iter::empty::<&[f32]>()).is_none());
    }

    #[test]
    fn test_radius_is_max_distance() {
        let center = [0.0f32, 0.0];
        let a = [1.0f32, 0.0];
        let b = [0.0f32, 2.0];
        let r = radius(&center, [a.as_slice(), b.as_slice()]).unwrap();
        assert!((r - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_furthest_pair_seed_deterministic() {
        let pts: Vec<Vec<f32>> = vec![
            vec![0.0, 0.0],
            vec![10.0, 0.0],
            vec![0.0, 1.0],
            vec![9.0, 0.5],
        ];
        let refs: Vec<&[f32]> = pts.iter().map(|p| p.as_slice()).collect();
        let (i1, i2) = furthest_pair_seed(&refs).unwrap();
        // Furthest from pts[0] is pts[1]; furthest from pts[1] is pts[0].
        assert_eq!((i1, i2), (1, 0));
        let again = furthest_pair_seed(&refs).unwrap();
        assert_eq!((i1, i2), again);
    }
}
