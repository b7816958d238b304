use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("corpus: root directory {0:?} does not exist")]
    MissingRoot(PathBuf),

    #[error("corpus: label map line {line}: expected `group_id<TAB>label`, got {content:?}")]
    MalformedLabelLine { line: usize, content: String },

    #[error("corpus: {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CorpusError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CorpusError::Io {
            path: path.into(),
            source,
        }
    }
}
