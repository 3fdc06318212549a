use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid storage key {key:?}")]
    InvalidKey { key: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
