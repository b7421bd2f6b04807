//! Interactive editing tools: the crop state machine and the text overlay store.

pub mod tools;

pub use tools::{
    parse_dimension, AspectRatio, CropBox, CropHandle, CropSession, GridType, TextMeasurer,
    TextOverlay, TextOverlayPatch, TextOverlayStore, TextStyle, ToolError,
};
