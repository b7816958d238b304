//! `imgsim serve`: the HTTP service.

use std::path::PathBuf;

use clap::Args;
use imgsim_pipeline::METADATA_FILE;
use imgsim_service::{AppState, Catalog};

use super::get_config;
use crate::Cli;

/// Serve `POST /embed` and, when a build output is available, the neighbor
/// and keyword-search routes plus the output files and corpus images.
#[derive(Args)]
pub struct ServeCommand {
    /// Listen address, e.g. ":5001" or "127.0.0.1:5001"
    #[arg(short = 'a', long)]
    addr: Option<String>,

    /// Build output directory to serve
    #[arg(long)]
    artifacts: Option<PathBuf>,

    /// Corpus root whose images are served under /corpus
    #[arg(long)]
    corpus: Option<PathBuf>,
}

impl ServeCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        let addr = self.addr.clone().unwrap_or_else(|| cfg.server.addr.clone());
        let artifacts = self
            .artifacts
            .clone()
            .unwrap_or_else(|| cfg.artifacts_dir().to_path_buf());
        let corpus = self
            .corpus
            .clone()
            .unwrap_or_else(|| cfg.corpus_dir().to_path_buf());

        let embedder = cfg.text_embedder.text_embedder()?;
        tracing::info!(dimension = embedder.dimension(), "text embedder ready");

        let mut state = AppState::new(embedder);
        if artifacts.join(METADATA_FILE).exists() {
            let catalog = Catalog::load(&artifacts)?;
            if catalog.is_empty() {
                tracing::warn!(dir = %artifacts.display(), "build output has no items");
            }
            state = state.with_catalog(catalog).with_artifacts_dir(&artifacts);
        } else {
            tracing::warn!(
                dir = %artifacts.display(),
                "no build output found, artifact routes disabled"
            );
        }

        if corpus.is_dir() {
            state = state.with_corpus_dir(&corpus);
        } else {
            tracing::warn!(dir = %corpus.display(), "corpus root not found, images not served");
        }

        imgsim_service::serve(&addr, state).await?;
        Ok(())
    }
}
