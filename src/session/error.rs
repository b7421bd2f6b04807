use thiserror::Error;

use crate::codec::{InputRejection, RenderError};
use crate::editor::tools::ToolError;

pub type EditorResult<T> = std::result::Result<T, EditorError>;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("upload rejected: {0}")]
    InputRejected(#[from] InputRejection),
    #[error("{operation} failed: {source}")]
    Render {
        operation: &'static str,
        #[source]
        source: RenderError,
    },
    #[error("no image loaded")]
    NoImage,
    #[error("crop mode is not active")]
    CropInactive,
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl EditorError {
    pub(crate) fn render(operation: &'static str) -> impl FnOnce(RenderError) -> Self {
        move |source| Self::Render { operation, source }
    }
}
