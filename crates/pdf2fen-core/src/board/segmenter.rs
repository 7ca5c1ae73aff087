//! Splitting a board crop into 64 normalized square cells.

use image::imageops::sample_bilinear;
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::{Array3, ArrayView3, s};
use tracing::trace;

use crate::models::config::SegmentationConfig;

/// The 64 cells of one board, row-major from the top-left square.
///
/// Each cell is an HWC array of RGB values in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct CellGrid {
    cells: Vec<Array3<f32>>,
    cell_width: usize,
    cell_height: usize,
}

impl CellGrid {
    /// Number of cells (always 64).
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// `(height, width)` of every cell.
    pub fn cell_size(&self) -> (usize, usize) {
        (self.cell_height, self.cell_width)
    }

    /// Cell at `(rank, file)`, rank 0 being the top row.
    pub fn cell(&self, rank: usize, file: usize) -> ArrayView3<'_, f32> {
        self.cells[rank * 8 + file].view()
    }

    /// Cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Array3<f32>> {
        self.cells.iter()
    }
}

/// Resizes a board crop and cuts it into an 8x8 grid.
#[derive(Debug, Clone, Copy)]
pub struct CellSegmenter {
    width: u32,
    height: u32,
}

impl CellSegmenter {
    /// Segmenter resizing boards to `width` x `height`; both are at least 8.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(8),
            height: height.max(8),
        }
    }

    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self::new(config.target_width, config.target_height)
    }

    /// Resize, min-max normalize and cut into cells.
    ///
    /// Normalization uses the minimum and maximum over every channel of the
    /// resized image; a constant image normalizes to zeros.
    pub fn segment(&self, board: &DynamicImage) -> CellGrid {
        let rgb = board.to_rgb8();
        let resized = resize_linear(&rgb, self.width, self.height);

        let (min, max) = resized
            .as_raw()
            .iter()
            .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = f32::from(max.saturating_sub(min));
        trace!("Board value range {}..={}", min, max);

        let (w, h) = (self.width as usize, self.height as usize);
        let normalized = Array3::from_shape_fn((h, w, 3), |(y, x, c)| {
            if range > 0.0 {
                f32::from(resized.get_pixel(x as u32, y as u32)[c] - min) / range
            } else {
                0.0
            }
        });

        let (cell_height, cell_width) = (h / 8, w / 8);
        let cells = (0..8)
            .flat_map(|rank| (0..8).map(move |file| (rank, file)))
            .map(|(rank, file)| {
                let y0 = rank * h / 8;
                let x0 = file * w / 8;
                normalized
                    .slice(s![y0..y0 + cell_height, x0..x0 + cell_width, ..])
                    .to_owned()
            })
            .collect();

        CellGrid {
            cells,
            cell_width,
            cell_height,
        }
    }
}

/// Bilinear resize sampling pixel centers, without an antialiasing
/// prefilter when shrinking.
fn resize_linear(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    let (w, h) = (width as f32, height as f32);
    RgbImage::from_fn(width, height, |x, y| {
        let u = (x as f32 + 0.5) / w;
        let v = (y as f32 + 0.5) / h;
        sample_bilinear(image, u, v).unwrap_or(Rgb([0, 0, 0]))
    })
}

impl Default for CellSegmenter {
    fn default() -> Self {
        Self::from_config(&SegmentationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use pretty_assertions::assert_eq;

    fn checkerboard(side: u32) -> DynamicImage {
        let square = side / 8;
        let img = RgbImage::from_fn(side, side, |x, y| {
            if (x / square + y / square) % 2 == 0 {
                Rgb([230, 220, 200])
            } else {
                Rgb([30, 40, 50])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_segment_shape() {
        let grid = CellSegmenter::default().segment(&checkerboard(320));
        assert_eq!(grid.len(), 64);
        assert_eq!(grid.cell_size(), (50, 50));
        assert!(grid.iter().all(|cell| cell.dim() == (50, 50, 3)));
    }

    #[test]
    fn test_normalized_range() {
        let grid = CellSegmenter::default().segment(&checkerboard(400));
        let (lo, hi) = grid
            .iter()
            .flat_map(|cell| cell.iter().copied())
            .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
        assert_eq!(lo, 0.0);
        assert_eq!(hi, 1.0);
    }

    #[test]
    fn test_cells_follow_board_squares() {
        let grid = CellSegmenter::default().segment(&checkerboard(400));
        // Light square top-left, dark one to its right.
        assert!(grid.cell(0, 0)[[25, 25, 0]] > 0.9);
        assert!(grid.cell(0, 1)[[25, 25, 0]] < 0.1);
        assert!(grid.cell(1, 0)[[25, 25, 0]] < 0.1);
        assert!(grid.cell(7, 7)[[25, 25, 0]] > 0.9);
    }

    #[test]
    fn test_grayscale_input_gets_three_channels() {
        let gray = GrayImage::from_fn(80, 80, |x, _| Luma([(x * 3) as u8]));
        let grid = CellSegmenter::new(80, 80).segment(&DynamicImage::ImageLuma8(gray));
        assert_eq!(grid.cell_size(), (10, 10));
        let cell = grid.cell(3, 3);
        assert_eq!(cell[[0, 0, 0]], cell[[0, 0, 1]]);
        assert_eq!(cell[[0, 0, 1]], cell[[0, 0, 2]]);
    }

    #[test]
    fn test_shrinking_samples_without_prefilter() {
        // Columns 1 and 2 of every 4 are bright; a 4x shrink lands between them.
        let stripes = RgbImage::from_fn(16, 4, |x, _| {
            if matches!(x % 4, 1 | 2) {
                Rgb([200, 200, 200])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let resized = resize_linear(&stripes, 4, 1);
        assert!(resized.pixels().all(|p| p.0 == [200, 200, 200]));
    }

    #[test]
    fn test_half_pixel_blend() {
        let img = RgbImage::from_fn(4, 1, |x, _| Rgb([(x * 60) as u8, 0, 0]));
        let resized = resize_linear(&img, 2, 1);
        assert_eq!(resized.get_pixel(0, 0)[0], 30);
        assert_eq!(resized.get_pixel(1, 0)[0], 150);
    }

    #[test]
    fn test_constant_board_normalizes_to_zero() {
        let flat = RgbImage::from_pixel(64, 64, Rgb([128, 128, 128]));
        let grid = CellSegmenter::new(64, 64).segment(&DynamicImage::ImageRgb8(flat));
        assert!(grid.iter().all(|cell| cell.iter().all(|&v| v == 0.0)));
    }
}
