use std::time::{Duration, Instant};

use imgsim_corpus::{enumerate, LabelMap};
use imgsim_embed::ImageEmbedder;
use imgsim_vecstore::{Forest, IndexConfig, VecIndex};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::extract::extract;
use crate::neighbors::materialize;
use crate::persist::{write_artifacts, ArtifactPaths};

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct Summary {
    /// Items indexed, after any skips.
    pub items: usize,
    /// Images dropped under the skip policy.
    pub skipped: usize,
    pub artifacts: ArtifactPaths,
    pub elapsed: Duration,
}

/// Inserts `vectors[i]` under id `i` and builds the forest.
pub fn build_index(cfg: &IndexConfig, vectors: &[Vec<f32>]) -> Result<Forest, PipelineError> {
    let mut forest = Forest::new(cfg.clone()).map_err(PipelineError::Index)?;
    for (i, v) in vectors.iter().enumerate() {
        forest.insert(i as u32, v).map_err(PipelineError::Index)?;
    }
    forest
        .build(cfg.forest_size)
        .map_err(PipelineError::Index)?;
    Ok(forest)
}

/// Runs enumerate, extract, index, neighbors and persist in order.
///
/// The first failing stage aborts the run; its error names the stage.
pub async fn run(
    cfg: &PipelineConfig,
    embedder: &dyn ImageEmbedder,
) -> Result<Summary, PipelineError> {
    cfg.validate()?;
    let start = Instant::now();

    let labels = match &cfg.labels {
        Some(path) => LabelMap::load(path).map_err(PipelineError::Labels)?,
        None => LabelMap::new(),
    };
    if cfg.labels.is_some() && labels.is_empty() {
        tracing::warn!("label map is empty, group ids are used as labels");
    }

    let entries = enumerate(&cfg.corpus_layout()).map_err(PipelineError::Enumerate)?;
    if entries.is_empty() {
        tracing::warn!(root = %cfg.root.display(), "corpus is empty");
    }

    let extraction = extract(&entries, &labels, embedder, &cfg.extract_options()).await?;

    let forest = build_index(&cfg.index_config(), &extraction.vectors)?;
    tracing::info!(
        items = forest.len(),
        trees = forest.n_trees(),
        metric = %cfg.metric,
        "built index"
    );

    let neighbors = materialize(&forest, &extraction.items, cfg.top_k, cfg.neighbor_key)?;

    std::fs::create_dir_all(&cfg.output_dir).map_err(|e| PipelineError::Persist {
        path: cfg.output_dir.display().to_string(),
        reason: e.to_string(),
    })?;
    let artifacts = ArtifactPaths::in_dir(&cfg.output_dir);
    write_artifacts(&artifacts, &forest, &extraction.items, &neighbors)?;

    let summary = Summary {
        items: extraction.items.len(),
        skipped: extraction.skipped.len(),
        artifacts,
        elapsed: start.elapsed(),
    };
    tracing::info!(
        items = summary.items,
        skipped = summary.skipped,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "pipeline finished"
    );
    Ok(summary)
}
