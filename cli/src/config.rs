//! Configuration management for the imgsim binaries.
//!
//! Configuration is stored in ~/.imgsim/config.yaml. Every section and
//! field is optional; missing ones take their defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use imgsim_embed::{
    EmbedConfig, Embedder, HashEmbedder, HttpImageEmbedder, ImageEmbedder, OpenAI,
    HASH_IMAGE_DIM, HASH_TEXT_DIM,
};
use imgsim_pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};

use crate::paths::Paths;

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
    /// Text embedder behind `POST /embed`.
    pub text_embedder: EmbedderConfig,
    /// Image embedder driven by the pipeline.
    pub image_embedder: EmbedderConfig,

    /// Path the config was read from, if any (not serialized).
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address; `:port` binds all interfaces.
    pub addr: String,
    /// Pipeline output directory to serve. Defaults to
    /// `pipeline.output_dir`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts_dir: Option<PathBuf>,
    /// Image directory served under `/corpus`. Defaults to `pipeline.root`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: ":5001".to_string(),
            artifacts_dir: None,
            corpus_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Offline feature hashing.
    #[default]
    Hash,
    /// OpenAI-compatible `/embeddings` endpoint (text only).
    Openai,
    /// Feature-extraction server (images only).
    Http,
}

/// One embedder section. Empty strings and zeros take the implementation's
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    pub kind: EmbedderKind,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub base_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    pub dimension: usize,
    pub batch_size: usize,
}

impl EmbedderConfig {
    fn embed_config(&self, dimension: usize) -> EmbedConfig {
        EmbedConfig::default()
            .with_model(&self.model)
            .with_base_url(&self.base_url)
            .with_api_key(&self.api_key)
            .with_dimension(dimension)
            .with_batch_size(self.batch_size)
    }

    /// Builds the text embedder this section describes.
    pub fn text_embedder(&self) -> anyhow::Result<Arc<dyn Embedder>> {
        match self.kind {
            EmbedderKind::Hash => Ok(Arc::new(HashEmbedder::new(nonzero(
                self.dimension,
                HASH_TEXT_DIM,
            )))),
            EmbedderKind::Openai => Ok(Arc::new(OpenAI::with_config(
                self.embed_config(self.dimension),
            ))),
            EmbedderKind::Http => bail!("text embedder cannot be of kind 'http'"),
        }
    }

    /// Builds the image embedder this section describes. A zero dimension
    /// takes `index_dim` so embedder and index agree by default.
    pub fn image_embedder(&self, index_dim: usize) -> anyhow::Result<Box<dyn ImageEmbedder>> {
        let dim = nonzero(self.dimension, nonzero(index_dim, HASH_IMAGE_DIM));
        match self.kind {
            EmbedderKind::Hash => Ok(Box::new(HashEmbedder::new(dim))),
            EmbedderKind::Http => {
                if self.base_url.is_empty() {
                    bail!("image embedder of kind 'http' needs a base_url");
                }
                Ok(Box::new(HttpImageEmbedder::with_config(self.embed_config(dim))))
            }
            EmbedderKind::Openai => bail!("image embedder cannot be of kind 'openai'"),
        }
    }
}

fn nonzero(n: usize, default: usize) -> usize {
    if n == 0 { default } else { n }
}

impl Config {
    /// Gets the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Paths::new().ok().map(|p| p.config_file())
    }

    /// Returns the path the config was read from.
    pub fn path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Directory whose artifacts the server loads.
    pub fn artifacts_dir(&self) -> &Path {
        self.server
            .artifacts_dir
            .as_deref()
            .unwrap_or(self.pipeline.output_dir.as_path())
    }

    /// Directory whose images the server exposes.
    pub fn corpus_dir(&self) -> &Path {
        self.server
            .corpus_dir
            .as_deref()
            .unwrap_or(self.pipeline.root.as_path())
    }
}

/// Loads configuration from `custom_path`, or from the default location.
///
/// A custom path must exist. A missing default file yields the defaults and
/// is not created.
pub fn load_config(custom_path: Option<&str>) -> anyhow::Result<Config> {
    let (path, required) = match custom_path {
        Some(p) => (PathBuf::from(p), true),
        None => match Config::default_config_path() {
            Some(p) => (p, false),
            None => return Ok(Config::default()),
        },
    };

    if !path.exists() {
        if required {
            bail!("config file {} not found", path.display());
        }
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("read config {}", path.display()))?;
    let mut cfg: Config = serde_yaml::from_str(&content)
        .with_context(|| format!("parse config {}", path.display()))?;
    cfg.config_path = Some(path);
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use imgsim_pipeline::FailurePolicy;

    use super::*;

    fn write(dir: &Path, content: &str) -> String {
        let path = dir.join("config.yaml");
        std::fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_load_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r#"
pipeline:
  root: /data/tiny-imagenet-200/train
  top_k: 5
  failure_policy: skip_and_renumber
server:
  addr: "127.0.0.1:8080"
text_embedder:
  kind: openai
  model: sentence-transformers/all-MiniLM-L6-v2
  base_url: http://localhost:8000/v1
"#,
        );
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.pipeline.root, PathBuf::from("/data/tiny-imagenet-200/train"));
        assert_eq!(cfg.pipeline.top_k, 5);
        assert_eq!(cfg.pipeline.per_group_cap, Some(5));
        assert_eq!(cfg.pipeline.failure_policy, FailurePolicy::SkipAndRenumber);
        assert_eq!(cfg.server.addr, "127.0.0.1:8080");
        assert_eq!(cfg.text_embedder.kind, EmbedderKind::Openai);
        assert_eq!(cfg.image_embedder.kind, EmbedderKind::Hash);
        assert_eq!(cfg.path(), Some(Path::new(&path)));
        assert_eq!(cfg.artifacts_dir(), Path::new("index_data"));
        assert_eq!(cfg.corpus_dir(), Path::new("/data/tiny-imagenet-200/train"));
    }

    #[test]
    fn test_missing_custom_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.yaml");
        assert!(load_config(Some(path.to_str().unwrap())).is_err());
    }

    #[test]
    fn test_bad_yaml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "pipeline: [unclosed");
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.server.addr, ":5001");
        assert_eq!(cfg.pipeline.top_k, 10);
        assert!(cfg.path().is_none());
    }

    #[test]
    fn test_embedders() {
        let hash = EmbedderConfig::default();
        assert_eq!(hash.text_embedder().unwrap().dimension(), HASH_TEXT_DIM);
        assert_eq!(hash.image_embedder(0).unwrap().dimension(), HASH_IMAGE_DIM);
        assert_eq!(hash.image_embedder(64).unwrap().dimension(), 64);

        let http = EmbedderConfig {
            kind: EmbedderKind::Http,
            ..Default::default()
        };
        assert!(http.text_embedder().is_err());
        assert!(http.image_embedder(1280).is_err());

        let http = EmbedderConfig {
            base_url: "http://localhost:9000".into(),
            ..http
        };
        assert_eq!(http.image_embedder(1280).unwrap().dimension(), 1280);

        let openai = EmbedderConfig {
            kind: EmbedderKind::Openai,
            model: "sentence-transformers/all-MiniLM-L6-v2".into(),
            ..Default::default()
        };
        assert_eq!(openai.text_embedder().unwrap().dimension(), 384);
        assert!(openai.image_embedder(1280).is_err());
    }

    #[test]
    fn test_serialize_roundtrip_yaml() {
        let mut cfg = Config::default();
        cfg.server.artifacts_dir = Some(PathBuf::from("/srv/imgsim"));
        cfg.server.corpus_dir = Some(PathBuf::from("/srv/images"));
        let text = serde_yaml::to_string(&cfg).unwrap();
        let back: Config = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back.artifacts_dir(), Path::new("/srv/imgsim"));
        assert_eq!(back.corpus_dir(), Path::new("/srv/images"));
        assert_eq!(back.pipeline, cfg.pipeline);
    }
}
