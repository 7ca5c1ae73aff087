//! Error types for the inference layer.

use thiserror::Error;

/// Errors raised while loading or running the classifier model.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// The model file could not be parsed.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The runtime session could not be built.
    #[error("failed to create session: {0}")]
    SessionCreate(String),

    /// Input tensor shape or data did not fit the model.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The runtime failed while executing the graph.
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// An output tensor had an unsupported element type or shape.
    #[error("failed to extract output: {0}")]
    OutputExtraction(String),

    /// I/O error when reading the model file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
