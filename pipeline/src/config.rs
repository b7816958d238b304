use std::path::PathBuf;

use imgsim_corpus::{CorpusLayout, DEFAULT_EXTENSION, DEFAULT_IMAGES_DIR};
use imgsim_vecstore::{IndexConfig, Metric, DEFAULT_FOREST_SIZE, DEFAULT_SEED};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::extract::{ExtractOptions, FailurePolicy};
use crate::neighbors::NeighborKey;

pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_PER_GROUP_CAP: usize = 5;
pub const DEFAULT_FEATURE_DIM: usize = 1280;

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Corpus root: one subdirectory per group.
    pub root: PathBuf,
    /// `group_id<TAB>label` file. Without one, labels are the group ids.
    pub labels: Option<PathBuf>,
    /// Where the index, metadata and neighbor documents are written.
    pub output_dir: PathBuf,
    pub images_dir: String,
    pub extensions: Vec<String>,
    pub per_group_cap: Option<usize>,
    /// Neighbors kept per item.
    pub top_k: usize,
    pub metric: Metric,
    pub dimension: usize,
    pub forest_size: usize,
    /// 0 picks the index default.
    pub leaf_size: usize,
    pub seed: u64,
    pub batch_size: usize,
    pub failure_policy: FailurePolicy,
    pub neighbor_key: NeighborKey,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("tiny-imagenet-200/train"),
            labels: Some(PathBuf::from("tiny-imagenet-200/words.txt")),
            output_dir: PathBuf::from("index_data"),
            images_dir: DEFAULT_IMAGES_DIR.to_string(),
            extensions: vec![DEFAULT_EXTENSION.to_string()],
            per_group_cap: Some(DEFAULT_PER_GROUP_CAP),
            top_k: DEFAULT_TOP_K,
            metric: Metric::Angular,
            dimension: DEFAULT_FEATURE_DIM,
            forest_size: DEFAULT_FOREST_SIZE,
            leaf_size: 0,
            seed: DEFAULT_SEED,
            batch_size: 1,
            failure_policy: FailurePolicy::Abort,
            neighbor_key: NeighborKey::Filename,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.top_k == 0 {
            return Err(PipelineError::Config("top_k must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::Config("batch_size must be positive".into()));
        }
        if self.extensions.is_empty() {
            return Err(PipelineError::Config("no file extensions configured".into()));
        }
        self.index_config()
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn corpus_layout(&self) -> CorpusLayout {
        CorpusLayout::new(&self.root)
            .with_images_dir(self.images_dir.clone())
            .with_extensions(self.extensions.iter().cloned())
            .with_cap(self.per_group_cap)
    }

    pub fn index_config(&self) -> IndexConfig {
        IndexConfig::new(self.metric, self.dimension)
            .with_forest_size(self.forest_size)
            .with_leaf_size(self.leaf_size)
            .with_seed(self.seed)
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            batch_size: self.batch_size,
            policy: self.failure_policy,
            dimension: self.dimension,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.top_k, 10);
        assert_eq!(cfg.per_group_cap, Some(5));
        assert_eq!(cfg.forest_size, 10);
        assert_eq!(cfg.dimension, 1280);
        assert_eq!(cfg.metric, Metric::Angular);
        assert_eq!(cfg.extensions, vec![".JPEG".to_string()]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(
            r#"{"root": "/data/train", "top_k": 3, "failure_policy": "skip_and_renumber"}"#,
        )
        .unwrap();
        assert_eq!(cfg.root, PathBuf::from("/data/train"));
        assert_eq!(cfg.top_k, 3);
        assert_eq!(cfg.failure_policy, FailurePolicy::SkipAndRenumber);
        assert_eq!(cfg.dimension, DEFAULT_FEATURE_DIM);
        assert_eq!(cfg.neighbor_key, NeighborKey::Filename);
    }

    #[test]
    fn test_validate() {
        let cfg = PipelineConfig {
            top_k: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(PipelineError::Config(_))));

        let cfg = PipelineConfig {
            dimension: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(PipelineError::Config(_))));

        let cfg = PipelineConfig {
            forest_size: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
