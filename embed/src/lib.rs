//! Embedding sources: text and image to fixed-length vectors.
//!
//! Two seams: [`Embedder`] for text and [`ImageEmbedder`] for image files.
//! Both are deterministic for identical input. Implementations:
//!
//! - [`HashEmbedder`]: model-free feature hashing, both traits, offline.
//! - [`OpenAI`]: any OpenAI-compatible `/embeddings` endpoint (text).
//! - [`HttpImageEmbedder`]: a feature-extraction server (images).

pub mod config;
pub mod embed;
pub mod error;
pub mod hash;
pub mod image_http;
pub mod openai;
pub(crate) mod openai_compat;

pub use config::EmbedConfig;
pub use embed::{Embedder, ImageEmbedder};
pub use error::EmbedError;
pub use hash::{HashEmbedder, HASH_IMAGE_DIM, HASH_TEXT_DIM};
pub use image_http::HttpImageEmbedder;
pub use openai::{OpenAI, MODEL_MINILM_L6_V2};
