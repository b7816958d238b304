use crate::error::VecError;

/// Match is a single result from a nearest-neighbor query.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Dense id the vector was inserted under.
    pub id: u32,

    /// Distance between the query and matched vector.
    /// Lower values indicate higher similarity.
    pub distance: f32,
}

/// VecIndex is a build-once nearest-neighbor index over dense float32
/// vectors keyed by dense integer ids.
///
/// An index starts open for insertion. After [`VecIndex::build`] it is
/// immutable and queryable; further inserts fail with
/// [`VecError::InvalidState`] and queries before the build fail with
/// [`VecError::NotBuilt`].
pub trait VecIndex {
    /// Register a vector under an explicit id. Ids need not arrive in order
    /// but must be unique.
    fn insert(&mut self, id: u32, vector: &[f32]) -> Result<(), VecError>;

    /// Finalize the index. `forest_size` is the number of trees for
    /// tree-based indexes; exact indexes only validate it.
    fn build(&mut self, forest_size: usize) -> Result<(), VecError>;

    /// Return up to `k` ids nearest to the vector stored at `id`, ordered by
    /// ascending distance. The item itself is usually the first match.
    fn query(&self, id: u32, k: usize) -> Result<Vec<Match>, VecError>;

    /// Return up to `k` ids nearest to an arbitrary query vector.
    fn query_vector(&self, vector: &[f32], k: usize) -> Result<Vec<Match>, VecError>;

    /// Return the number of vectors in the index.
    fn len(&self) -> usize;

    /// Return true if the index contains no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimension accepted by this index.
    fn dim(&self) -> usize;

    /// Whether [`VecIndex::build`] has completed.
    fn is_built(&self) -> bool;
}

/// Sorts matches by ascending distance with the id as tie-breaker and keeps
/// the first `k`.
pub(crate) fn rank(mut matches: Vec<Match>, k: usize) -> Vec<Match> {
    matches.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    matches.truncate(k);
    matches
}
