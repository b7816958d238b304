use std::collections::HashSet;
use std::path::Path;

use imgsim_corpus::ItemRecord;
use imgsim_pipeline::{load_metadata, load_neighbors, ArtifactPaths, NeighborList, PipelineError};

use crate::fuzzy::token_set_ratio;

/// Results per keyword search.
pub const SEARCH_LIMIT: usize = 10;

/// Read-only view of one pipeline run: item metadata and neighbor lists.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<ItemRecord>,
    neighbors: NeighborList,
    /// Distinct labels in first-seen order.
    labels: Vec<String>,
}

/// Outcome of a keyword search.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelHit<'a> {
    pub label: &'a str,
    pub score: u32,
    pub paths: Vec<&'a str>,
}

impl Catalog {
    pub fn new(items: Vec<ItemRecord>, neighbors: NeighborList) -> Self {
        let labels = {
            let mut seen = HashSet::new();
            items
                .iter()
                .filter(|i| seen.insert(i.label.as_str()))
                .map(|i| i.label.clone())
                .collect()
        };
        Self {
            items,
            neighbors,
            labels,
        }
    }

    /// Loads `metadata.json` and `neighbors.json` from an output directory.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let paths = ArtifactPaths::in_dir(dir);
        let items = load_metadata(&paths.metadata)?;
        let neighbors = load_neighbors(&paths.neighbors)?;
        tracing::info!(
            items = items.len(),
            keys = neighbors.len(),
            "loaded catalog"
        );
        Ok(Self::new(items, neighbors))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn neighbors(&self, key: &str) -> Option<&[String]> {
        self.neighbors.get(key).map(Vec::as_slice)
    }

    /// Picks the label closest to `keyword` and returns up to `limit` item
    /// paths carrying it. Ties go to the label seen first. `None` when no
    /// label shares anything with the keyword.
    pub fn search(&self, keyword: &str, limit: usize) -> Option<LabelHit<'_>> {
        let mut best: Option<(&str, u32)> = None;
        for label in &self.labels {
            let score = token_set_ratio(keyword, label);
            if score > best.map_or(0, |(_, s)| s) {
                best = Some((label, score));
            }
        }
        let (label, score) = best?;
        let paths = self
            .items
            .iter()
            .filter(|i| i.label == label)
            .take(limit)
            .map(|i| i.path.as_str())
            .collect();
        Some(LabelHit {
            label,
            score,
            paths,
        })
    }
}
