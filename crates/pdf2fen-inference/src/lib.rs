//! ONNX inference layer for pdf2fen.
//!
//! The piece classifier is a single ONNX model. This crate hides which
//! runtime executes it:
//! - `ort` with the XNNPACK execution provider (feature `native`, default)
//! - `tract`, a pure Rust runtime (feature `tract`)

mod backend;
mod error;
mod tensor;

pub use backend::InferenceBackend;
pub use error::InferenceError;
pub use tensor::{InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use backend::ort::OrtBackend;

#[cfg(feature = "tract")]
pub use backend::tract::TractBackend;

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
