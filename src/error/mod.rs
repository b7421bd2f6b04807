use std::path::PathBuf;

use crate::session::EditorError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid recipe {path}: {source}")]
    Recipe {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
