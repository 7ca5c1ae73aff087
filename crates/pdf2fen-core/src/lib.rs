//! Core library for turning chess diagrams in scanned documents into FEN.
//!
//! This crate provides:
//! - Page rasters from PDFs (rendered or scan-extracted) and plain images
//! - Chessboard detection and reading-order sorting
//! - Cell segmentation and piece classification with an ONNX model
//! - FEN piece-placement encoding and editor links

pub mod board;
pub mod error;
pub mod fen;
pub mod models;
pub mod pdf;

pub use board::{
    BoardDetector, CellGrid, CellSegmenter, DiagramEngine, OnnxPieceClassifier, PageResult,
    PieceClassifier, Region, RunReport, RunSummary, load_classifier,
};
pub use error::{Pdf2FenError, Result};
pub use fen::{FenString, LabelGrid, Piece};
pub use models::config::Pdf2FenConfig;
pub use models::diagram::{BoardBox, Diagram, OutputRow};
pub use pdf::{ImageDocument, PageImage, PageRange, PageRasterizer, PdfExtractor};

#[cfg(feature = "render")]
pub use pdf::PdfRenderer;

/// Re-export inference types.
pub use pdf2fen_inference::{InferenceBackend, InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use pdf2fen_inference::OrtBackend;

#[cfg(feature = "tract")]
pub use pdf2fen_inference::TractBackend;
