pub mod codec;
pub mod compositor;
pub mod config;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod history;
pub mod logging;
pub mod recipe;
pub mod resource;
pub mod session;
pub mod viewport;
pub use error::{AppError, AppResult};
pub use session::{EditorError, EditorResult, EditorSession};
