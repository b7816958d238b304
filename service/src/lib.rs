//! HTTP service over the embedding sources and pipeline artifacts.
//!
//! The text endpoint is stateless apart from the embedder handle built at
//! startup. Artifact routes read a [`Catalog`] loaded once from a pipeline
//! output directory; without one they answer 404.

pub mod catalog;
pub mod error;
pub mod fuzzy;
pub mod server;

pub use catalog::{Catalog, LabelHit, SEARCH_LIMIT};
pub use error::{ApiError, ServiceError};
pub use fuzzy::token_set_ratio;
pub use server::{parse_addr, router, serve, AppState, DEFAULT_ADDR, HEALTH_MESSAGE};
