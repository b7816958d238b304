//! Configuration and paths shared by the imgsim binaries.
//!
//! Configuration is stored in ~/.imgsim/config.yaml.

pub mod config;
pub mod paths;

pub use config::{load_config, Config, EmbedderConfig, EmbedderKind, ServerConfig};
pub use paths::Paths;
