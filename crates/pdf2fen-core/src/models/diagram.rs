//! Decoded diagrams and numbered output rows.

use serde::Serialize;

use crate::fen::FenString;

/// Axis-aligned crop of a board on its page, in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoardBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// A board decoded from one page, before global numbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagram {
    /// Page number (1-indexed).
    pub page: u32,
    /// FEN placement.
    pub fen: FenString,
    /// Crop rectangle on the page.
    pub bbox: BoardBox,
    /// Outline corners as detected, `[x, y]`.
    pub corners: [[i32; 2]; 4],
}

/// One line of the output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow {
    /// 1-based, gap-free across the whole run.
    pub number: usize,
    pub fen: FenString,
    pub link: String,
    pub page: u32,
    pub bbox: BoardBox,
    pub corners: [[i32; 2]; 4],
}

impl OutputRow {
    /// Number a diagram and derive its editor link.
    pub fn new(number: usize, diagram: Diagram, link_base: &str) -> Self {
        let link = diagram.fen.editor_link(link_base);
        Self {
            number,
            fen: diagram.fen,
            link,
            page: diagram.page,
            bbox: diagram.bbox,
            corners: diagram.corners,
        }
    }
}
