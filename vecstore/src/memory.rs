use crate::error::VecError;
use crate::metric::Metric;
use crate::vecstore::{rank, Match, VecIndex};

/// ExactIndex is a brute-force [`VecIndex`]. Every query scores every
/// stored vector, so results are exact. Intended for testing and for tiny
/// corpora where building trees is not worth it.
pub struct ExactIndex {
    metric: Metric,
    dim: usize,
    slots: Vec<Option<Vec<f32>>>,
    count: usize,
    built: bool,
}

impl ExactIndex {
    /// Create an empty index. Fails if `dim` is zero.
    pub fn new(metric: Metric, dim: usize) -> Result<Self, VecError> {
        if dim == 0 {
            return Err(VecError::InvalidConfig("dim must be positive".into()));
        }
        Ok(Self {
            metric,
            dim,
            slots: Vec::new(),
            count: 0,
            built: false,
        })
    }

    fn vector(&self, id: u32) -> Option<&[f32]> {
        self.slots
            .get(id as usize)
            .and_then(|s| s.as_deref())
    }
}

impl VecIndex for ExactIndex {
    fn insert(&mut self, id: u32, vector: &[f32]) -> Result<(), VecError> {
        if self.built {
            return Err(VecError::InvalidState("insert after build".into()));
        }
        if vector.len() != self.dim {
            return Err(VecError::DimensionMismatch {
                got: vector.len(),
                want: self.dim,
            });
        }
        let idx = id as usize;
        if idx >= self.slots.len() {
            self.slots.resize(idx + 1, None);
        }
        if self.slots[idx].is_some() {
            return Err(VecError::DuplicateId(id));
        }
        self.slots[idx] = Some(vector.to_vec());
        self.count += 1;
        Ok(())
    }

    fn build(&mut self, forest_size: usize) -> Result<(), VecError> {
        if self.built {
            return Err(VecError::InvalidState("index already built".into()));
        }
        if forest_size == 0 {
            return Err(VecError::InvalidConfig("forest size must be positive".into()));
        }
        self.built = true;
        Ok(())
    }

    fn query(&self, id: u32, k: usize) -> Result<Vec<Match>, VecError> {
        if !self.built {
            return Err(VecError::NotBuilt);
        }
        let v = self.vector(id).ok_or(VecError::UnknownId(id))?;
        self.query_vector(v, k)
    }

    fn query_vector(&self, vector: &[f32], k: usize) -> Result<Vec<Match>, VecError> {
        if !self.built {
            return Err(VecError::NotBuilt);
        }
        if vector.len() != self.dim {
            return Err(VecError::DimensionMismatch {
                got: vector.len(),
                want: self.dim,
            });
        }
        if k == 0 {
            return Ok(vec![]);
        }

        let matches = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                slot.as_ref().map(|v| Match {
                    id: i as u32,
                    distance: self.metric.distance(vector, v),
                })
            })
            .collect();
        Ok(rank(matches, k))
    }

    fn len(&self) -> usize {
        self.count
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn is_built(&self) -> bool {
        self.built
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built(vectors: &[&[f32]]) -> ExactIndex {
        let mut idx = ExactIndex::new(Metric::Angular, vectors[0].len()).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            idx.insert(i as u32, v).unwrap();
        }
        idx.build(1).unwrap();
        idx
    }

    #[test]
    fn test_insert_and_query() {
        let idx = built(&[&[1.0, 0.0, 0.0, 0.0], &[0.0, 1.0, 0.0, 0.0], &[0.9, 0.1, 0.0, 0.0]]);

        let matches = idx.query_vector(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, 0);
        assert_eq!(matches[1].id, 2);

        let matches = idx.query(1, 3).unwrap();
        assert_eq!(matches[0].id, 1);
        assert_eq!(matches[0].distance, 0.0);
    }

    #[test]
    fn test_state_machine() {
        let mut idx = ExactIndex::new(Metric::Angular, 2).unwrap();
        idx.insert(0, &[1.0, 0.0]).unwrap();
        assert!(matches!(idx.query(0, 1), Err(VecError::NotBuilt)));

        idx.build(1).unwrap();
        assert!(matches!(
            idx.insert(1, &[0.0, 1.0]),
            Err(VecError::InvalidState(_))
        ));
        assert!(matches!(idx.query(5, 1), Err(VecError::UnknownId(5))));
    }

    #[test]
    fn test_duplicate_and_dimension() {
        let mut idx = ExactIndex::new(Metric::Euclidean, 2).unwrap();
        idx.insert(3, &[1.0, 0.0]).unwrap();
        assert!(matches!(idx.insert(3, &[0.0, 1.0]), Err(VecError::DuplicateId(3))));
        assert!(matches!(
            idx.insert(4, &[0.0]),
            Err(VecError::DimensionMismatch { got: 1, want: 2 })
        ));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn test_zero_dim_rejected() {
        assert!(ExactIndex::new(Metric::Angular, 0).is_err());
    }

    #[test]
    fn test_query_empty_index() {
        let mut idx = ExactIndex::new(Metric::Angular, 3).unwrap();
        idx.build(1).unwrap();
        assert!(idx.query_vector(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }
}
