use reqwest::Client;

use crate::config::EmbedConfig;
use crate::embed::Embedder;
use crate::error::EmbedError;

/// 384-dimensional sentence-transformer model, as served by OpenAI-compatible
/// inference servers.
pub const MODEL_MINILM_L6_V2: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const MODEL_OPENAI_3_SMALL: &str = "text-embedding-3-small";
pub const MODEL_OPENAI_3_LARGE: &str = "text-embedding-3-large";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MAX_BATCH: usize = 2048;
const OPENAI_DEFAULT_DIM: usize = 1536;
const MINILM_DIM: usize = 384;

/// OpenAI embedder for the OpenAI embeddings API and any OpenAI-compatible
/// server (text-embeddings-inference, vLLM, Ollama, ...) via
/// [`OpenAI::with_config`] and [`EmbedConfig::with_base_url`].
pub struct OpenAI {
    client: Client,
    api_key: String,
    model: String,
    dim: usize,
    base_url: String,
    max_batch: usize,
}

impl OpenAI {
    pub fn new(api_key: &str) -> Self {
        Self::with_config(EmbedConfig::default().with_api_key(api_key))
    }

    pub fn with_config(cfg: EmbedConfig) -> Self {
        let model = if cfg.model.is_empty() {
            MODEL_OPENAI_3_SMALL.to_string()
        } else {
            cfg.model
        };
        let dim = match cfg.dimension {
            0 if model.ends_with("all-MiniLM-L6-v2") => MINILM_DIM,
            0 => OPENAI_DEFAULT_DIM,
            n => n,
        };
        Self {
            client: Client::new(),
            api_key: cfg.api_key,
            model,
            dim,
            base_url: if cfg.base_url.is_empty() {
                OPENAI_BASE_URL.to_string()
            } else {
                cfg.base_url
            },
            max_batch: if cfg.batch_size == 0 {
                OPENAI_MAX_BATCH
            } else {
                cfg.batch_size
            },
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Only the text-embedding-3 family accepts a `dimensions` field.
    fn requested_dimensions(&self) -> Option<usize> {
        self.model
            .starts_with("text-embedding-3")
            .then_some(self.dim)
    }

    async fn call_api(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        crate::openai_compat::call_embedding_api(
            &self.client,
            &self.api_key,
            &self.base_url,
            &self.model,
            self.requested_dimensions(),
            self.dim,
            texts,
        )
        .await
    }
}

#[async_trait::async_trait]
impl Embedder for OpenAI {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        let vecs = self.embed_batch(&[text]).await?;
        vecs.into_iter().next().ok_or(EmbedError::MissingIndex(0))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        let mut result = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.max_batch) {
            let vecs = self.call_api(chunk).await?;
            result.extend(vecs);
        }
        Ok(result)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
