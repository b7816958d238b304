//! Offline pipeline: a grouped image corpus in, a searchable forest index,
//! per-item metadata and a precomputed neighbor list out.
//!
//! Stages run in order: enumerate, extract, index, neighbors, persist. All
//! state lives in memory for one run; the first failing stage aborts it.

pub mod config;
pub mod error;
pub mod extract;
pub mod neighbors;
pub mod persist;
pub mod pipeline;

pub use config::{PipelineConfig, DEFAULT_FEATURE_DIM, DEFAULT_PER_GROUP_CAP, DEFAULT_TOP_K};
pub use error::{ErrorKind, PipelineError};
pub use extract::{extract, ExtractOptions, Extraction, FailurePolicy};
pub use neighbors::{materialize, NeighborKey, NeighborList};
pub use persist::{
    load_index, load_metadata, load_neighbors, write_artifacts, write_json_atomic, ArtifactPaths,
    INDEX_FILE, METADATA_FILE, NEIGHBORS_FILE,
};
pub use pipeline::{build_index, run, Summary};
