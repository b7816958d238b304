//! Build-once approximate nearest-neighbor search over dense vectors.
//!
//! Vectors are registered under dense integer ids, the index is built once,
//! and from then on it only answers "k nearest to this id / vector" queries.
//!
//! ```
//! use imgsim_vecstore::{Forest, IndexConfig, Metric, VecIndex};
//!
//! let mut f = Forest::new(IndexConfig::new(Metric::Angular, 3)).unwrap();
//! f.insert(0, &[1.0, 0.0, 0.0]).unwrap();
//! f.insert(1, &[0.9, 0.1, 0.0]).unwrap();
//! f.insert(2, &[0.0, 0.0, 1.0]).unwrap();
//! f.build(10).unwrap();
//!
//! let nearest = f.query(0, 2).unwrap();
//! assert_eq!(nearest[1].id, 1);
//! ```

pub mod error;
pub mod forest;
pub mod forest_io;
pub mod memory;
pub mod metric;
pub mod vecstore;

pub use error::VecError;
pub use forest::{Forest, IndexConfig, DEFAULT_FOREST_SIZE, DEFAULT_SEED};
pub use forest_io::{load as load_forest, save as save_forest};
pub use memory::ExactIndex;
pub use metric::{angular_distance, cosine_distance, euclidean_distance, Metric};
pub use vecstore::{Match, VecIndex};
