use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EmbedConfig;
use crate::embed::ImageEmbedder;
use crate::error::EmbedError;
use crate::hash::HASH_IMAGE_DIM;

const HTTP_IMAGE_MAX_BATCH: usize = 32;

#[derive(Serialize)]
struct ImageRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    images: Vec<String>,
}

#[derive(Deserialize)]
struct ImageResponse {
    embeddings: Vec<Vec<f64>>,
}

/// HttpImageEmbedder sends image files to a feature-extraction server.
///
/// Request: `POST {base_url}/embed-images` with
/// `{"model": "...", "images": ["<base64>", ...]}`.
/// Response: `{"embeddings": [[...], ...]}` in request order.
///
/// Files are read and encoded client-side; one HTTP call is made per batch.
pub struct HttpImageEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dim: usize,
    max_batch: usize,
}

impl HttpImageEmbedder {
    pub fn new(base_url: &str) -> Self {
        Self::with_config(EmbedConfig::default().with_base_url(base_url))
    }

    pub fn with_config(cfg: EmbedConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: cfg.base_url,
            api_key: cfg.api_key,
            model: cfg.model,
            dim: if cfg.dimension == 0 {
                HASH_IMAGE_DIM
            } else {
                cfg.dimension
            },
            max_batch: if cfg.batch_size == 0 {
                HTTP_IMAGE_MAX_BATCH
            } else {
                cfg.batch_size
            },
        }
    }

    async fn encode(path: &Path) -> Result<String, EmbedError> {
        let data = tokio::fs::read(path).await.map_err(|e| EmbedError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if data.is_empty() {
            return Err(EmbedError::Read {
                path: path.display().to_string(),
                reason: "empty file".into(),
            });
        }
        Ok(STANDARD.encode(data))
    }

    async fn call_api(&self, paths: &[&Path]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut images = Vec::with_capacity(paths.len());
        for path in paths {
            images.push(Self::encode(path).await?);
        }

        let url = format!("{}/embed-images", self.base_url);
        let mut req = self.client.post(&url).json(&ImageRequest {
            model: (!self.model.is_empty()).then_some(self.model.as_str()),
            images,
        });
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| EmbedError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbedError::Api(format!("HTTP {status}: {body}")));
        }

        let data: ImageResponse = resp
            .json()
            .await
            .map_err(|e| EmbedError::Api(e.to_string()))?;

        if data.embeddings.len() != paths.len() {
            return Err(EmbedError::CountMismatch {
                got: data.embeddings.len(),
                want: paths.len(),
            });
        }
        data.embeddings
            .into_iter()
            .map(|v| {
                if v.len() != self.dim {
                    return Err(EmbedError::DimensionMismatch {
                        got: v.len(),
                        want: self.dim,
                    });
                }
                Ok(v.into_iter().map(|x| x as f32).collect())
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ImageEmbedder for HttpImageEmbedder {
    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbedError> {
        let vecs = self.embed_images(&[path]).await?;
        vecs.into_iter().next().ok_or(EmbedError::MissingIndex(0))
    }

    async fn embed_images(&self, paths: &[&Path]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if paths.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        let mut result = Vec::with_capacity(paths.len());
        for chunk in paths.chunks(self.max_batch) {
            tracing::debug!(batch = chunk.len(), "embedding image batch");
            result.extend(self.call_api(chunk).await?);
        }
        Ok(result)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
