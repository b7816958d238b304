use imgsim_corpus::CorpusError;
use imgsim_embed::EmbedError;
use imgsim_vecstore::VecError;
use thiserror::Error;

/// Broad failure classes. Every class aborts a pipeline run; the class tells
/// the operator whether to fix the deployment, the data, the code, or the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad dimension, missing root, malformed label map, bad settings.
    Configuration,
    /// Unreadable or corrupt input.
    Data,
    /// Operation invoked in the wrong index state.
    State,
    /// Reading or writing artifacts failed.
    Io,
}

/// Pipeline failures. Messages name the stage that failed.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("config: {0}")]
    Config(String),

    #[error("labels stage failed: {0}")]
    Labels(CorpusError),

    #[error("enumerate stage failed: {0}")]
    Enumerate(CorpusError),

    #[error("extract stage failed on {path}: {error}")]
    Extract { path: String, error: EmbedError },

    #[error("extract stage failed: embedder produces dimension {got}, index expects {want}")]
    Dimension { got: usize, want: usize },

    #[error("index stage failed: {0}")]
    Index(VecError),

    #[error("neighbors stage failed: {0}")]
    NeighborIndex(VecError),

    #[error("neighbors stage failed: key {0:?} is not unique across groups; use qualified keys")]
    DuplicateKey(String),

    #[error("neighbors stage failed: index holds {vectors} vectors but metadata has {items} items")]
    Misaligned { vectors: usize, items: usize },

    #[error("persist stage failed: {path}: {reason}")]
    Persist { path: String, reason: String },

    #[error("load {path}: {reason}")]
    Load { path: String, reason: String },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Config(_)
            | PipelineError::Dimension { .. }
            | PipelineError::DuplicateKey(_) => ErrorKind::Configuration,
            PipelineError::Labels(e) | PipelineError::Enumerate(e) => match e {
                CorpusError::Io { .. } => ErrorKind::Io,
                _ => ErrorKind::Configuration,
            },
            PipelineError::Extract { error, .. } => match error {
                EmbedError::DimensionMismatch { .. } => ErrorKind::Configuration,
                _ => ErrorKind::Data,
            },
            PipelineError::Index(e) | PipelineError::NeighborIndex(e) => match e {
                VecError::DimensionMismatch { .. } | VecError::InvalidConfig(_) => {
                    ErrorKind::Configuration
                }
                VecError::Io(_) => ErrorKind::Io,
                VecError::InvalidFormat(_) => ErrorKind::Data,
                _ => ErrorKind::State,
            },
            PipelineError::Misaligned { .. } => ErrorKind::State,
            PipelineError::Persist { .. } | PipelineError::Load { .. } => ErrorKind::Io,
        }
    }
}
