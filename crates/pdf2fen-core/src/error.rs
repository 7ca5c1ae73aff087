//! Error types for the pdf2fen-core library.

use thiserror::Error;

/// Main error type for the pdf2fen library.
#[derive(Error, Debug)]
pub enum Pdf2FenError {
    /// Rasterization error. Fatal for the run.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Piece classification error.
    #[error("classification error: {0}")]
    Classification(#[from] ClassificationError),

    /// FEN encoding or parsing error.
    #[error("FEN error: {0}")]
    Fen(#[from] FenError),
}

/// Errors raised while turning a document into page images.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted with a non-empty password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// The requested page range does not fit the document.
    #[error("page range {first}..={last} is outside the document (1..={page_count})")]
    PageRange { first: u32, last: u32, page_count: u32 },

    /// The renderer produced no usable pixel buffer for the page.
    #[error("page {0} could not be rasterized")]
    NoRaster(u32),

    /// A stand-alone image input could not be decoded.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),
}

/// Errors raised while locating a board outline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// The simplified contour's convex hull has too few points for 4 corners.
    #[error("convex hull has {hull_points} points, 4 corners required")]
    TooFewHullPoints { hull_points: usize },

    /// The contour is too short or flat to be approximated.
    #[error("degenerate contour with {points} points")]
    DegenerateContour { points: usize },
}

/// Errors related to piece classification of one board.
#[derive(Error, Debug)]
pub enum ClassificationError {
    /// Failed to load the classifier model.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The cell grid could not be turned into model input.
    #[error("preprocessing failed: {0}")]
    Preprocessing(String),

    /// The backend failed to run the model.
    #[error("inference failed: {0}")]
    Inference(#[from] pdf2fen_inference::InferenceError),

    /// The model produced output of an unexpected shape or type.
    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),

    /// A predicted class index is outside the 13-class alphabet.
    #[error("class index {0} is not a piece class")]
    InvalidClass(i64),
}

/// Errors related to FEN piece-placement strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    /// A rank does not describe exactly 8 squares.
    #[error("rank {rank} covers {squares} squares, expected 8")]
    RankLength { rank: usize, squares: usize },

    /// The placement does not have exactly 8 ranks.
    #[error("placement has {0} ranks, expected 8")]
    RankCount(usize),

    /// A character is neither a piece letter nor a run length 1-8.
    #[error("invalid symbol '{0}' in placement")]
    InvalidSymbol(char),

    /// Two run lengths follow each other, as in `44`.
    #[error("rank '{0}' has adjacent empty-square counts")]
    AdjacentDigits(String),
}

/// Result type for the pdf2fen library.
pub type Result<T> = std::result::Result<T, Pdf2FenError>;
