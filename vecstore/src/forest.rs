use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::VecError;
use crate::metric::{dot, normalized, Metric};
use crate::vecstore::{rank, Match, VecIndex};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_FOREST_SIZE: usize = 10;
pub const DEFAULT_LEAF_SIZE: usize = 32;
pub const DEFAULT_SEED: u64 = 42;

/// Splits putting more than this share of ids on one side are retried.
const MAX_IMBALANCE: f64 = 0.95;
const SPLIT_ATTEMPTS: usize = 3;

/// IndexConfig configures a new [`Forest`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// Distance used for splitting and ranking.
    pub metric: Metric,
    /// Vector dimension. Required; must be positive.
    pub dim: usize,
    /// Number of trees the pipeline builds with. Must be positive.
    /// Default: 10.
    pub forest_size: usize,
    /// Maximum ids per leaf. 0 selects the default (32).
    pub leaf_size: usize,
    /// Seed for hyperplane sampling. Equal seeds and inputs build equal forests.
    pub seed: u64,
}

impl IndexConfig {
    pub fn new(metric: Metric, dim: usize) -> Self {
        Self {
            metric,
            dim,
            forest_size: DEFAULT_FOREST_SIZE,
            leaf_size: 0,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_forest_size(mut self, n: usize) -> Self {
        self.forest_size = n;
        self
    }

    pub fn with_leaf_size(mut self, n: usize) -> Self {
        self.leaf_size = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Rejects configurations no forest can be built from.
    pub fn validate(&self) -> Result<(), VecError> {
        if self.dim == 0 {
            return Err(VecError::InvalidConfig("dim must be positive".into()));
        }
        if self.forest_size == 0 {
            return Err(VecError::InvalidConfig("forest size must be positive".into()));
        }
        Ok(())
    }

    pub(crate) fn set_defaults(&mut self) {
        if self.leaf_size == 0 {
            self.leaf_size = DEFAULT_LEAF_SIZE;
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) enum Node {
    Leaf(Vec<u32>),
    /// Items with `dot(normal, v) + offset > 0` go right. A zero normal
    /// marks a random split that queries explore on both sides.
    Split {
        normal: Vec<f32>,
        offset: f32,
        left: u32,
        right: u32,
    },
}

/// Max-heap entry for the query frontier: largest margin first.
struct Frontier {
    priority: f32,
    node: u32,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .partial_cmp(&other.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(other.node.cmp(&self.node))
    }
}
impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}
impl Eq for Frontier {}

// ---------------------------------------------------------------------------
// Forest
// ---------------------------------------------------------------------------

/// Forest is an approximate nearest-neighbor index made of random-projection
/// trees, implementing [`VecIndex`].
///
/// Every tree partitions all items by recursively splitting them with a
/// hyperplane between two sampled items. A query walks all trees at once,
/// always expanding the branch whose splitting plane lies farthest on the
/// query's side, until it has collected enough distinct candidates. The
/// candidates are then ranked by exact distance.
#[derive(Debug)]
pub struct Forest {
    pub(crate) cfg: IndexConfig,
    pub(crate) slots: Vec<Option<Vec<f32>>>,
    pub(crate) count: usize,
    pub(crate) nodes: Vec<Node>,
    pub(crate) roots: Vec<u32>,
    pub(crate) built: bool,
}

impl Forest {
    /// Create an empty forest open for insertion.
    pub fn new(mut cfg: IndexConfig) -> Result<Self, VecError> {
        cfg.validate()?;
        cfg.set_defaults();
        Ok(Self {
            cfg,
            slots: Vec::new(),
            count: 0,
            nodes: Vec::new(),
            roots: Vec::new(),
            built: false,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.cfg
    }

    /// Number of trees; zero until built.
    pub fn n_trees(&self) -> usize {
        self.roots.len()
    }

    /// Stored vector for `id`, if any.
    pub fn vector(&self, id: u32) -> Option<&[f32]> {
        self.slots.get(id as usize).and_then(|s| s.as_deref())
    }

    /// Query with an explicit candidate budget. `search_k` is clamped to at
    /// least `k`; larger values trade speed for recall.
    pub fn query_vector_with(
        &self,
        vector: &[f32],
        k: usize,
        search_k: usize,
    ) -> Result<Vec<Match>, VecError> {
        if !self.built {
            return Err(VecError::NotBuilt);
        }
        if vector.len() != self.cfg.dim {
            return Err(VecError::DimensionMismatch {
                got: vector.len(),
                want: self.cfg.dim,
            });
        }
        if k == 0 || self.count == 0 {
            return Ok(vec![]);
        }
        Ok(self.search(vector, k, search_k.max(k)))
    }

    fn default_search_k(&self, k: usize) -> usize {
        k.saturating_mul(self.roots.len()).max(k)
    }

    fn item(&self, id: u32) -> &[f32] {
        self.slots[id as usize]
            .as_deref()
            .unwrap_or_default()
    }

    fn margin(normal: &[f32], offset: f32, v: &[f32]) -> f32 {
        dot(normal, v) + offset
    }

    fn search(&self, query: &[f32], k: usize, search_k: usize) -> Vec<Match> {
        // Angular splits pass through the origin, so only the direction of
        // the query matters for routing.
        let routed = match self.cfg.metric {
            Metric::Angular => normalized(query),
            Metric::Euclidean => query.to_vec(),
        };

        let mut frontier: BinaryHeap<Frontier> = self
            .roots
            .iter()
            .map(|&node| Frontier {
                priority: f32::INFINITY,
                node,
            })
            .collect();
        let mut seen = vec![false; self.slots.len()];
        let mut candidates: Vec<u32> = Vec::with_capacity(search_k.min(self.count));

        while candidates.len() < search_k {
            let Some(top) = frontier.pop() else {
                break;
            };
            match &self.nodes[top.node as usize] {
                Node::Leaf(ids) => {
                    for &id in ids {
                        if !seen[id as usize] {
                            seen[id as usize] = true;
                            candidates.push(id);
                        }
                    }
                }
                Node::Split {
                    normal,
                    offset,
                    left,
                    right,
                } => {
                    let m = Self::margin(normal, *offset, &routed);
                    frontier.push(Frontier {
                        priority: top.priority.min(m),
                        node: *right,
                    });
                    frontier.push(Frontier {
                        priority: top.priority.min(-m),
                        node: *left,
                    });
                }
            }
        }

        let matches = candidates
            .into_iter()
            .map(|id| Match {
                id,
                distance: self.cfg.metric.distance(query, self.item(id)),
            })
            .collect();
        rank(matches, k)
    }

    /// Picks a hyperplane between two distinct sampled items.
    fn hyperplane(&self, ids: &[u32], rng: &mut StdRng) -> (Vec<f32>, f32) {
        let i = rng.gen_range(0..ids.len());
        let mut j = rng.gen_range(0..ids.len() - 1);
        if j >= i {
            j += 1;
        }
        let p = self.item(ids[i]);
        let q = self.item(ids[j]);

        match self.cfg.metric {
            Metric::Angular => {
                let (pn, qn) = (normalized(p), normalized(q));
                let diff: Vec<f32> = pn.iter().zip(qn.iter()).map(|(a, b)| a - b).collect();
                (normalized(&diff), 0.0)
            }
            Metric::Euclidean => {
                let diff: Vec<f32> = p.iter().zip(q.iter()).map(|(a, b)| a - b).collect();
                let normal = normalized(&diff);
                let mid: Vec<f32> = p.iter().zip(q.iter()).map(|(a, b)| (a + b) / 2.0).collect();
                let offset = -dot(&normal, &mid);
                (normal, offset)
            }
        }
    }

    fn partition(
        &self,
        ids: &[u32],
        normal: &[f32],
        offset: f32,
        rng: &mut StdRng,
    ) -> (Vec<u32>, Vec<u32>) {
        let mut left = Vec::new();
        let mut right = Vec::new();
        for &id in ids {
            let m = Self::margin(normal, offset, self.item(id));
            let go_right = if m == 0.0 { rng.r#gen::<bool>() } else { m > 0.0 };
            if go_right {
                right.push(id);
            } else {
                left.push(id);
            }
        }
        (left, right)
    }

    fn balanced(total: usize, left: &[u32], right: &[u32]) -> bool {
        if left.is_empty() || right.is_empty() {
            return false;
        }
        (left.len().max(right.len()) as f64 / total as f64) <= MAX_IMBALANCE
    }

    fn build_tree(&mut self, mut ids: Vec<u32>, rng: &mut StdRng) -> u32 {
        if ids.len() <= self.cfg.leaf_size {
            self.nodes.push(Node::Leaf(ids));
            return (self.nodes.len() - 1) as u32;
        }

        let mut split = None;
        for _ in 0..SPLIT_ATTEMPTS {
            let (normal, offset) = self.hyperplane(&ids, rng);
            if normal.iter().all(|&x| x == 0.0) {
                continue;
            }
            let (left, right) = self.partition(&ids, &normal, offset, rng);
            if Self::balanced(ids.len(), &left, &right) {
                split = Some((normal, offset, left, right));
                break;
            }
        }

        let (normal, offset, left, right) = match split {
            Some(s) => s,
            None => {
                // Duplicates or heavily skewed data: halve at random.
                ids.shuffle(rng);
                let right = ids.split_off(ids.len() / 2);
                (vec![0.0; self.cfg.dim], 0.0, ids, right)
            }
        };

        let left = self.build_tree(left, rng);
        let right = self.build_tree(right, rng);
        self.nodes.push(Node::Split {
            normal,
            offset,
            left,
            right,
        });
        (self.nodes.len() - 1) as u32
    }
}

impl VecIndex for Forest {
    fn insert(&mut self, id: u32, vector: &[f32]) -> Result<(), VecError> {
        if self.built {
            return Err(VecError::InvalidState("insert after build".into()));
        }
        if vector.len() != self.cfg.dim {
            return Err(VecError::DimensionMismatch {
                got: vector.len(),
                want: self.cfg.dim,
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

        let ids: Vec<u32> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| i as u32)
            .collect();

        let mut rng = StdRng::seed_from_u64(self.cfg.seed);
        for _ in 0..forest_size {
            let root = self.build_tree(ids.clone(), &mut rng);
            self.roots.push(root);
        }
        self.cfg.forest_size = forest_size;
        self.built = true;
        Ok(())
    }

    fn query(&self, id: u32, k: usize) -> Result<Vec<Match>, VecError> {
        if !self.built {
            return Err(VecError::NotBuilt);
        }
        let v = self.vector(id).ok_or(VecError::UnknownId(id))?;
        self.query_vector_with(v, k, self.default_search_k(k))
    }

    fn query_vector(&self, vector: &[f32], k: usize) -> Result<Vec<Match>, VecError> {
        self.query_vector_with(vector, k, self.default_search_k(k))
    }

    fn len(&self) -> usize {
        self.count
    }

    fn dim(&self) -> usize {
        self.cfg.dim
    }

    fn is_built(&self) -> bool {
        self.built
    }
}
