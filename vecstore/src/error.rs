use thiserror::Error;

#[derive(Error, Debug)]
pub enum VecError {
    #[error("vecstore: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("vecstore: duplicate id {0}")]
    DuplicateId(u32),

    #[error("vecstore: unknown id {0}")]
    UnknownId(u32),

    #[error("vecstore: index not built")]
    NotBuilt,

    #[error("vecstore: invalid state: {0}")]
    InvalidState(String),

    #[error("vecstore: invalid config: {0}")]
    InvalidConfig(String),

    #[error("vecstore: {0}")]
    Io(String),

    #[error("vecstore: invalid format: {0}")]
    InvalidFormat(String),
}
