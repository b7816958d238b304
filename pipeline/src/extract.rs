use std::path::{Path, PathBuf};

use imgsim_corpus::{Entry, ItemRecord, LabelMap};
use imgsim_embed::{EmbedError, ImageEmbedder};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// What to do when an image cannot be embedded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run at the first failure.
    #[default]
    Abort,
    /// Drop the image, log it, and keep ids contiguous for the rest.
    SkipAndRenumber,
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Images per `embed_images` call.
    pub batch_size: usize,
    pub policy: FailurePolicy,
    /// Dimension the index is configured for.
    pub dimension: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            batch_size: 1,
            policy: FailurePolicy::Abort,
            dimension: crate::config::DEFAULT_FEATURE_DIM,
        }
    }
}

/// Vectors and metadata, index-aligned: `items[i]` describes `vectors[i]`
/// and `i` is the id the vector is inserted under.
#[derive(Debug, Default)]
pub struct Extraction {
    pub vectors: Vec<Vec<f32>>,
    pub items: Vec<ItemRecord>,
    /// Paths dropped under [`FailurePolicy::SkipAndRenumber`].
    pub skipped: Vec<PathBuf>,
}

impl Extraction {
    fn push(&mut self, entry: &Entry, labels: &LabelMap, vector: Vec<f32>) {
        self.items.push(ItemRecord {
            filename: entry.filename.clone(),
            path: entry.path.display().to_string(),
            label: labels.resolve(&entry.group_id).to_string(),
            group_id: entry.group_id.clone(),
        });
        self.vectors.push(vector);
    }
}

fn check_dim(got: usize, want: usize) -> Result<(), PipelineError> {
    if got != want {
        return Err(PipelineError::Dimension { got, want });
    }
    Ok(())
}

/// Embeds every entry in enumeration order.
///
/// A dimension mismatch is always fatal, whatever the policy: it means the
/// embedder and the index disagree, not that one image is bad.
pub async fn extract(
    entries: &[Entry],
    labels: &LabelMap,
    embedder: &dyn ImageEmbedder,
    opts: &ExtractOptions,
) -> Result<Extraction, PipelineError> {
    check_dim(embedder.dimension(), opts.dimension)?;

    let batch_size = opts.batch_size.max(1);
    let mut out = Extraction::default();
    for (n, chunk) in entries.chunks(batch_size).enumerate() {
        let paths: Vec<&Path> = chunk.iter().map(|e| e.path.as_path()).collect();
        tracing::debug!(batch = n, size = chunk.len(), "extracting features");

        match embedder.embed_images(&paths).await {
            Ok(vecs) => {
                if vecs.len() != chunk.len() {
                    return Err(PipelineError::Extract {
                        path: chunk[0].path.display().to_string(),
                        error: EmbedError::CountMismatch {
                            got: vecs.len(),
                            want: chunk.len(),
                        },
                    });
                }
                for (entry, v) in chunk.iter().zip(vecs) {
                    check_dim(v.len(), opts.dimension)?;
                    out.push(entry, labels, v);
                }
            }
            Err(EmbedError::DimensionMismatch { got, want }) => {
                return Err(PipelineError::Dimension { got, want });
            }
            Err(e) if chunk.len() == 1 => {
                fail(&mut out, &chunk[0], e, opts.policy)?;
            }
            Err(e) if opts.policy == FailurePolicy::Abort => {
                return Err(PipelineError::Extract {
                    path: format!(
                        "batch of {} starting at {}",
                        chunk.len(),
                        chunk[0].path.display()
                    ),
                    error: e,
                });
            }
            Err(e) => {
                // Retry one by one to find the failing image.
                tracing::warn!(batch = n, error = %e, "batch failed, retrying per image");
                for entry in chunk {
                    match embedder.embed_image(&entry.path).await {
                        Ok(v) => {
                            check_dim(v.len(), opts.dimension)?;
                            out.push(entry, labels, v);
                        }
                        Err(e) => fail(&mut out, entry, e, opts.policy)?,
                    }
                }
            }
        }
    }

    tracing::info!(
        items = out.items.len(),
        skipped = out.skipped.len(),
        "extracted features"
    );
    Ok(out)
}

fn fail(
    out: &mut Extraction,
    entry: &Entry,
    error: EmbedError,
    policy: FailurePolicy,
) -> Result<(), PipelineError> {
    if let EmbedError::DimensionMismatch { got, want } = error {
        return Err(PipelineError::Dimension { got, want });
    }
    match policy {
        FailurePolicy::Abort => Err(PipelineError::Extract {
            path: entry.path.display().to_string(),
            error,
        }),
        FailurePolicy::SkipAndRenumber => {
            tracing::warn!(path = %entry.path.display(), error = %error, "skipping image");
            out.skipped.push(entry.path.clone());
            Ok(())
        }
    }
}
