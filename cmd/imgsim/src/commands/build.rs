//! `imgsim build`: run the offline pipeline.

use std::path::PathBuf;

use clap::Args;
use imgsim_pipeline::{FailurePolicy, NeighborKey, PipelineConfig};
use serde_json::json;

use super::{get_config, print_json};
use crate::Cli;

/// Enumerate a corpus, extract features, build the forest index and write
/// the index, metadata and neighbor lists.
#[derive(Args)]
pub struct BuildCommand {
    /// Corpus root with one directory per group
    #[arg(long)]
    root: Option<PathBuf>,

    /// Label file (group_id<TAB>label per line)
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Output directory for the artifacts
    #[arg(short = 'o', long)]
    out: Option<PathBuf>,

    /// Maximum images per group
    #[arg(long, conflicts_with = "no_cap")]
    cap: Option<usize>,

    /// Take every image of every group
    #[arg(long)]
    no_cap: bool,

    /// Neighbors kept per item
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Number of trees in the forest
    #[arg(long)]
    trees: Option<usize>,

    /// Images per embedder call
    #[arg(long)]
    batch_size: Option<usize>,

    /// Skip unreadable images instead of aborting
    #[arg(long)]
    skip_failures: bool,

    /// Key neighbor lists by group_id/filename
    #[arg(long)]
    qualified_keys: bool,
}

impl BuildCommand {
    fn apply(&self, cfg: &mut PipelineConfig) {
        if let Some(root) = &self.root {
            cfg.root = root.clone();
        }
        if let Some(labels) = &self.labels {
            cfg.labels = Some(labels.clone());
        }
        if let Some(out) = &self.out {
            cfg.output_dir = out.clone();
        }
        if let Some(cap) = self.cap {
            cfg.per_group_cap = Some(cap);
        }
        if self.no_cap {
            cfg.per_group_cap = None;
        }
        if let Some(k) = self.top_k {
            cfg.top_k = k;
        }
        if let Some(n) = self.trees {
            cfg.forest_size = n;
        }
        if let Some(n) = self.batch_size {
            cfg.batch_size = n;
        }
        if self.skip_failures {
            cfg.failure_policy = FailurePolicy::SkipAndRenumber;
        }
        if self.qualified_keys {
            cfg.neighbor_key = NeighborKey::Qualified;
        }
    }

    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut cfg = get_config(cli)?;
        self.apply(&mut cfg.pipeline);

        let embedder = cfg.image_embedder.image_embedder(cfg.pipeline.dimension)?;
        let summary = imgsim_pipeline::run(&cfg.pipeline, embedder.as_ref()).await?;

        if cli.json {
            return print_json(&json!({
                "items": summary.items,
                "skipped": summary.skipped,
                "index": summary.artifacts.index,
                "metadata": summary.artifacts.metadata,
                "neighbors": summary.artifacts.neighbors,
                "elapsed_ms": summary.elapsed.as_millis() as u64,
            }));
        }
        println!(
            "Indexed {} images ({} skipped) in {:.1}s",
            summary.items,
            summary.skipped,
            summary.elapsed.as_secs_f64()
        );
        println!("  index:     {}", summary.artifacts.index.display());
        println!("  metadata:  {}", summary.artifacts.metadata.display());
        println!("  neighbors: {}", summary.artifacts.neighbors.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::Commands;

    fn parse(args: &[&str]) -> BuildCommand {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Build(cmd) => cmd,
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn test_flags_override_config() {
        let cmd = parse(&[
            "imgsim", "build", "--root", "/data/train", "--out", "/tmp/out", "--cap", "3",
            "-k", "4", "--trees", "20", "--skip-failures",
        ]);
        let mut cfg = PipelineConfig::default();
        cmd.apply(&mut cfg);
        assert_eq!(cfg.root, PathBuf::from("/data/train"));
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(cfg.per_group_cap, Some(3));
        assert_eq!(cfg.top_k, 4);
        assert_eq!(cfg.forest_size, 20);
        assert_eq!(cfg.failure_policy, FailurePolicy::SkipAndRenumber);
        assert_eq!(cfg.neighbor_key, NeighborKey::Filename);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cmd = parse(&["imgsim", "build", "--no-cap"]);
        let mut cfg = PipelineConfig::default();
        cmd.apply(&mut cfg);
        assert_eq!(cfg.per_group_cap, None);
        assert_eq!(cfg.top_k, 10);
    }

    #[test]
    fn test_cap_conflicts_with_no_cap() {
        assert!(Cli::try_parse_from(["imgsim", "build", "--cap", "2", "--no-cap"]).is_err());
    }
}
