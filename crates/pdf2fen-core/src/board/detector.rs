//! Board outline detection on page images.
//!
//! Diagrams are printed as dark framed squares on a light page. The page is
//! smoothed, binarized with Otsu's threshold, edge-detected and dilated so
//! the frame becomes one closed blob; the outer contour of every large blob
//! is a board candidate.

use image::{DynamicImage, GrayImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length, convex_hull};
use imageproc::morphology::dilate;
use imageproc::point::Point;
use imageproc::rect::Rect;
use tracing::{debug, warn};

use super::Region;
use crate::error::DetectionError;
use crate::models::config::DetectionConfig;

/// Board candidates found on one page.
#[derive(Debug, Default)]
pub struct Detection {
    /// Accepted regions, in contour order.
    pub regions: Vec<Region>,
    /// Large contours that could not be reduced to four corners.
    pub rejected: Vec<DetectionError>,
}

/// Contour-based chessboard detector.
#[derive(Debug, Clone)]
pub struct BoardDetector {
    blur_sigma: f32,
    canny_low: f32,
    canny_high: f32,
    dilate_radius: u8,
    min_area: f64,
    epsilon_ratio: f64,
}

impl BoardDetector {
    /// Create a detector with default parameters.
    pub fn new() -> Self {
        Self::from_config(&DetectionConfig::default())
    }

    /// Create a detector from configuration.
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            blur_sigma: config.blur_sigma,
            canny_low: config.canny_low,
            canny_high: config.canny_high,
            dilate_radius: config.dilate_radius,
            min_area: config.min_board_area,
            epsilon_ratio: config.approx_epsilon_ratio,
        }
    }

    /// Set the minimum contour area in px^2.
    pub fn with_min_area(mut self, min_area: f64) -> Self {
        self.min_area = min_area;
        self
    }

    /// Smoothed, binarized, edge-detected and dilated page.
    pub fn edge_map(&self, page: &DynamicImage) -> GrayImage {
        let gray = page.to_luma8();
        let blurred = if self.blur_sigma > 0.0 {
            gaussian_blur_f32(&gray, self.blur_sigma)
        } else {
            gray
        };

        let level = otsu_level(&blurred);
        let binary = threshold(&blurred, level, ThresholdType::Binary);
        debug!("Otsu threshold: {}", level);

        let edges = canny(&binary, self.canny_low, self.canny_high);
        if self.dilate_radius == 0 {
            edges
        } else {
            dilate(&edges, Norm::LInf, self.dilate_radius)
        }
    }

    /// Find board candidates on a page.
    pub fn detect(&self, page: &DynamicImage) -> Detection {
        let (width, height) = (page.width(), page.height());
        let edges = self.edge_map(page);
        let contours = find_contours::<i32>(&edges);
        let page_rect = Rect::at(0, 0).of_size(width.max(1), height.max(1));

        let mut detection = Detection::default();
        let mut external = 0usize;

        for contour in contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        {
            external += 1;
            let area = polygon_area(&contour.points);
            if area < self.min_area {
                continue;
            }

            let corners = match corners_from_contour(&contour.points, self.epsilon_ratio) {
                Ok(corners) => corners,
                Err(e) => {
                    warn!("Skipping contour with area {:.0}: {}", area, e);
                    detection.rejected.push(e);
                    continue;
                }
            };

            let Some(bounds) = bounding_rect(&contour.points).intersect(page_rect) else {
                continue;
            };
            let image = page.crop_imm(
                bounds.left() as u32,
                bounds.top() as u32,
                bounds.width(),
                bounds.height(),
            );

            debug!(
                "Board candidate at ({}, {}) {}x{}, area {:.0}",
                bounds.left(),
                bounds.top(),
                bounds.width(),
                bounds.height(),
                area
            );

            detection.regions.push(Region {
                image,
                corners,
                bounds,
            });
        }

        debug!(
            "{} external contours, {} board candidates, {} rejected",
            external,
            detection.regions.len(),
            detection.rejected.len()
        );

        detection
    }
}

impl Default for BoardDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduce a closed contour to four corner points.
///
/// The contour is simplified with Douglas-Peucker (epsilon is
/// `epsilon_ratio` times the perimeter), and the first four points of the
/// simplified polygon's convex hull are the corners. Fails when the hull has
/// fewer than four points.
pub fn corners_from_contour(
    points: &[Point<i32>],
    epsilon_ratio: f64,
) -> Result<[Point<i32>; 4], DetectionError> {
    if points.len() < 3 {
        return Err(DetectionError::DegenerateContour {
            points: points.len(),
        });
    }

    let epsilon = epsilon_ratio * arc_length(points, true);
    if !(epsilon > 0.0) {
        return Err(DetectionError::DegenerateContour {
            points: points.len(),
        });
    }

    let mut approx = approximate_polygon_dp(points, epsilon, true);
    approx.dedup();
    if approx.len() > 1 && approx.first() == approx.last() {
        approx.pop();
    }

    let hull = convex_hull(&approx[..]);
    match hull.as_slice() {
        [a, b, c, d, ..] => Ok([*a, *b, *c, *d]),
        _ => Err(DetectionError::TooFewHullPoints {
            hull_points: hull.len(),
        }),
    }
}

/// Enclosed area of a closed polygon (shoelace formula).
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| i64::from(p.x) * i64::from(q.y) - i64::from(q.x) * i64::from(p.y))
        .sum();
    twice.abs() as f64 / 2.0
}

/// Smallest upright rectangle containing every point, edges inclusive.
fn bounding_rect(points: &[Point<i32>]) -> Rect {
    let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
    let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    if points.is_empty() {
        return Rect::at(0, 0).of_size(1, 1);
    }
    Rect::at(min_x, min_y).of_size((max_x - min_x + 1) as u32, (max_y - min_y + 1) as u32)
}
