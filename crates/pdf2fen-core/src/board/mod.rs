//! Chess diagram pipeline: board detection, ordering, cell segmentation,
//! piece classification and the orchestrating engine.

mod classifier;
mod detector;
mod engine;
mod segmenter;
mod sorting;

pub use classifier::{OnnxPieceClassifier, PieceClassifier, load_classifier};
pub use detector::{BoardDetector, Detection, corners_from_contour};
pub use engine::{DiagramEngine, PageResult, RunReport, RunSummary};
pub use segmenter::{CellGrid, CellSegmenter};
pub use sorting::{reading_order, sort_regions};

use image::DynamicImage;
use imageproc::point::Point;
use imageproc::rect::Rect;

use crate::models::diagram::BoardBox;

/// A candidate board cropped from a page.
#[derive(Debug, Clone)]
pub struct Region {
    /// Crop of the page inside `bounds`.
    pub image: DynamicImage,
    /// Outline corners in page pixels, in hull order.
    pub corners: [Point<i32>; 4],
    /// Crop rectangle; always inside the page.
    pub bounds: Rect,
}

impl Region {
    /// Smallest x and smallest y over the four corners.
    pub fn top_left(&self) -> (i32, i32) {
        top_left(&self.corners)
    }

    /// Crop rectangle as a serializable box.
    pub fn board_box(&self) -> BoardBox {
        BoardBox {
            x: self.bounds.left(),
            y: self.bounds.top(),
            width: self.bounds.width(),
            height: self.bounds.height(),
        }
    }

    /// Corners as `[x, y]` pairs.
    pub fn corner_pairs(&self) -> [[i32; 2]; 4] {
        self.corners.map(|p| [p.x, p.y])
    }
}

pub(crate) fn top_left(corners: &[Point<i32>; 4]) -> (i32, i32) {
    let x = corners.iter().map(|p| p.x).min().unwrap_or(0);
    let y = corners.iter().map(|p| p.y).min().unwrap_or(0);
    (x, y)
}
