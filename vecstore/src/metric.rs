use serde::{Deserialize, Serialize};

/// Distance metric used to rank neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// `sqrt(2 - 2 * cos(a, b))`, i.e. the euclidean distance between the
    /// normalized vectors. Range `[0, 2]`.
    #[default]
    Angular,
    /// Plain L2 distance.
    Euclidean,
}

impl Metric {
    /// Distance between two vectors of equal length. Lower is closer.
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Angular => angular_distance(a, b),
            Metric::Euclidean => euclidean_distance(a, b),
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Metric::Angular => 0,
            Metric::Euclidean => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Metric::Angular),
            1 => Some(Metric::Euclidean),
            _ => None,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Angular => f.write_str("angular"),
            Metric::Euclidean => f.write_str("euclidean"),
        }
    }
}

/// Cosine similarity with f64 accumulation. Zero vectors have similarity 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot: f64 = 0.0;
    let mut norm_a: f64 = 0.0;
    let mut norm_b: f64 = 0.0;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    // Clamp to [-1, 1] to handle floating point errors.
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Compute the cosine distance between two vectors.
///
/// Returns a value in `[0, 2]` where 0 means identical direction and
/// 2 means opposite direction. Returns 2.0 on dimension mismatch.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 2.0;
    }
    (1.0 - cosine_similarity(a, b)) as f32
}

/// Angular distance, `sqrt(2 - 2 cos)`. Returns 2.0 on dimension mismatch.
pub fn angular_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 2.0;
    }
    (2.0 - 2.0 * cosine_similarity(a, b)).max(0.0).sqrt() as f32
}

/// L2 distance. Returns `f32::INFINITY` on dimension mismatch.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum();
    sum.sqrt() as f32
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Returns a unit-length copy of `v`, or a zero vector if `v` has no length.
pub(crate) fn normalized(v: &[f32]) -> Vec<f32> {
    let norm: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        let s = (1.0 / norm) as f32;
        v.iter().map(|x| x * s).collect()
    } else {
        vec![0.0; v.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        let d = cosine_distance(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!(d.abs() < 0.001, "identical: got {d}");
        let d = angular_distance(&[2.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!(d.abs() < 0.001, "scaled: got {d}");
    }

    #[test]
    fn test_orthogonal() {
        let d = cosine_distance(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!((d - 1.0).abs() < 0.001, "orthogonal: got {d}");
        let d = angular_distance(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!((d - 2f32.sqrt()).abs() < 0.001, "orthogonal angular: got {d}");
    }

    #[test]
    fn test_opposite() {
        let d = angular_distance(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0]);
        assert!((d - 2.0).abs() < 0.001, "opposite: got {d}");
    }

    #[test]
    fn test_angular_preserves_cosine_order() {
        let q = [1.0, 0.0, 0.0];
        let near = [1.0, 0.1, 0.0];
        let far = [1.0, 1.0, 0.0];
        assert!(angular_distance(&q, &near) < angular_distance(&q, &far));
        assert!(cosine_distance(&q, &near) < cosine_distance(&q, &far));
    }

    #[test]
    fn test_euclidean() {
        let d = euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 5.0).abs() < 1e-6);
        assert_eq!(
            Metric::Euclidean.distance(&[1.0, 1.0], &[1.0, 1.0]),
            0.0
        );
    }

    #[test]
    fn test_dimension_mismatch() {
        assert_eq!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 2.0);
        assert_eq!(angular_distance(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 2.0);
        assert!(euclidean_distance(&[1.0], &[1.0, 0.0]).is_infinite());
    }

    #[test]
    fn test_zero_vector() {
        let d = angular_distance(&[0.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((d - 2f32.sqrt()).abs() < 0.001, "zero vector: got {d}");
    }

    #[test]
    fn test_normalized() {
        let n = normalized(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 1e-6 && (n[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalized(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
