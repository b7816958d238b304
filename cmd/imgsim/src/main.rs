//! imgsim - image similarity index builder and embedding service.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{BuildCommand, QueryCommand, ServeCommand};

/// imgsim - build a nearest-neighbor index over an image corpus and serve
/// text embeddings.
///
/// Configuration is read from ~/.imgsim/config.yaml when present; flags
/// override it.
#[derive(Parser)]
#[command(name = "imgsim")]
#[command(about = "Image similarity index builder and embedding service")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.imgsim/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the offline pipeline: enumerate, embed, index, persist
    Build(BuildCommand),
    /// Serve text embeddings and the artifacts of a previous build
    Serve(ServeCommand),
    /// Print the nearest neighbors of one indexed item
    Query(QueryCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise info, or debug with -v.
    let default = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .init();

    match &cli.command {
        Commands::Build(cmd) => cmd.run(&cli).await,
        Commands::Serve(cmd) => cmd.run(&cli).await,
        Commands::Query(cmd) => cmd.run(&cli).await,
    }
}
