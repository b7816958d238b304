//! `imgsim query`: nearest neighbors straight from the persisted index.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use imgsim_pipeline::{load_index, load_metadata, ArtifactPaths};
use imgsim_vecstore::VecIndex;
use serde_json::json;

use super::{get_config, print_json};
use crate::Cli;

/// Load the index and metadata of a build and print the nearest neighbors of
/// one item.
#[derive(Args)]
pub struct QueryCommand {
    /// Filename (or group_id/filename) of the item
    key: String,

    /// Number of neighbors
    #[arg(short = 'k', long, default_value_t = 10)]
    k: usize,

    /// Build output directory
    #[arg(long)]
    artifacts: Option<PathBuf>,
}

impl QueryCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        let dir = self
            .artifacts
            .clone()
            .unwrap_or_else(|| cfg.artifacts_dir().to_path_buf());
        let paths = ArtifactPaths::in_dir(&dir);

        let items = load_metadata(&paths.metadata)?;
        let index = load_index(&paths.index)?;
        if index.len() != items.len() {
            anyhow::bail!(
                "index holds {} vectors but metadata has {} items",
                index.len(),
                items.len()
            );
        }

        let id = items
            .iter()
            .position(|i| i.filename == self.key || i.qualified_name() == self.key)
            .with_context(|| format!("{:?} is not in {}", self.key, paths.metadata.display()))?;

        let matches = index.query(id as u32, self.k.saturating_add(1))?;
        let neighbors: Vec<_> = matches
            .into_iter()
            .filter(|m| m.id as usize != id)
            .take(self.k)
            .filter_map(|m| items.get(m.id as usize).map(|item| (item, m.distance)))
            .collect();

        if cli.json {
            let list: Vec<_> = neighbors
                .iter()
                .map(|(item, distance)| {
                    json!({
                        "filename": item.filename,
                        "path": item.path,
                        "label": item.label,
                        "distance": distance,
                    })
                })
                .collect();
            return print_json(&json!({ "key": self.key, "neighbors": list }));
        }

        let item = &items[id];
        println!("{} ({})", item.filename, item.label);
        for (n, (neighbor, distance)) in neighbors.iter().enumerate() {
            println!(
                "{:>3}. {:.4}  {}  {}",
                n + 1,
                distance,
                neighbor.filename,
                neighbor.label
            );
        }
        Ok(())
    }
}
