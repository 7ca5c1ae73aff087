//! Diagram engine orchestrating detection, segmentation, classification and
//! FEN encoding.

use std::time::Instant;

use image::GenericImageView;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Pdf2FenError, Result};
use crate::fen::{self, FenString};
use crate::models::config::{Pdf2FenConfig, SortStrategy};
use crate::models::diagram::{Diagram, OutputRow};
use crate::pdf::{PageImage, PageRange, PageRasterizer};

use super::{BoardDetector, CellSegmenter, PieceClassifier, Region, sort_regions};

/// Boards decoded from one page.
#[derive(Debug, Clone, Default)]
pub struct PageResult {
    /// Page number (1-indexed).
    pub page: u32,
    /// Decoded boards in reading order.
    pub diagrams: Vec<Diagram>,
    /// Large contours rejected for lacking four corners.
    pub rejected_contours: usize,
    /// Regions whose classification failed.
    pub failed_regions: usize,
}

/// Totals of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub pages: usize,
    pub diagrams: usize,
    pub rejected_contours: usize,
    pub failed_regions: usize,
}

/// Numbered rows of a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub rows: Vec<OutputRow>,
    pub summary: RunSummary,
}

impl RunReport {
    /// Number diagrams 1..N in page order, then reading order within a page.
    ///
    /// `pages` must already be in page order.
    pub fn from_pages(pages: impl IntoIterator<Item = PageResult>, link_base: &str) -> Self {
        let mut report = RunReport::default();
        for page in pages {
            report.summary.pages += 1;
            report.summary.rejected_contours += page.rejected_contours;
            report.summary.failed_regions += page.failed_regions;
            for diagram in page.diagrams {
                let number = report.rows.len() + 1;
                report.rows.push(OutputRow::new(number, diagram, link_base));
            }
        }
        report.summary.diagrams = report.rows.len();
        report
    }
}

/// Turns page images into FEN diagrams.
///
/// The classifier is loaded once and shared by every board; the engine is
/// `Sync` when the classifier is, so pages can be processed concurrently.
pub struct DiagramEngine<C: PieceClassifier> {
    classifier: C,
    detector: BoardDetector,
    segmenter: CellSegmenter,
    sort: SortStrategy,
    row_tolerance: i32,
}

impl<C: PieceClassifier> DiagramEngine<C> {
    /// Engine with default detection and segmentation parameters.
    pub fn new(classifier: C) -> Self {
        Self::with_config(classifier, &Pdf2FenConfig::default())
    }

    /// Engine configured from `config`.
    pub fn with_config(classifier: C, config: &Pdf2FenConfig) -> Self {
        Self {
            classifier,
            detector: BoardDetector::from_config(&config.detection),
            segmenter: CellSegmenter::from_config(&config.segmentation),
            sort: config.detection.sort,
            row_tolerance: config.detection.row_tolerance,
        }
    }

    /// Replace the board detector.
    pub fn with_detector(mut self, detector: BoardDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Decode one cropped board into its placement.
    pub fn decode_region(&self, region: &Region) -> Result<FenString> {
        let cells = self.segmenter.segment(&region.image);
        let labels = self.classifier.classify(&cells)?;
        Ok(fen::encode(&labels)?)
    }

    /// Detect and decode every board on a page.
    ///
    /// A board whose classification fails is logged and skipped. An invalid
    /// placement is an internal error and aborts the page.
    pub fn process_page(&self, page: &PageImage) -> Result<PageResult> {
        let start = Instant::now();
        let (width, height) = page.image.dimensions();
        debug!("Processing page {} ({}x{})", page.number, width, height);

        let detection = self.detector.detect(&page.image);
        let regions = sort_regions(detection.regions, self.sort, self.row_tolerance);

        let mut result = PageResult {
            page: page.number,
            rejected_contours: detection.rejected.len(),
            ..Default::default()
        };

        for (idx, region) in regions.iter().enumerate() {
            match self.decode_region(region) {
                Ok(fen) => {
                    debug!("Page {} board {}: {}", page.number, idx + 1, fen);
                    result.diagrams.push(Diagram {
                        page: page.number,
                        fen,
                        bbox: region.board_box(),
                        corners: region.corner_pairs(),
                    });
                }
                Err(Pdf2FenError::Classification(e)) => {
                    warn!(
                        "Skipping board {} on page {}: {}",
                        idx + 1,
                        page.number,
                        e
                    );
                    result.failed_regions += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Page {}: {} diagrams in {:?}",
            page.number,
            result.diagrams.len(),
            start.elapsed()
        );
        Ok(result)
    }

    /// Process a page range sequentially and number the diagrams.
    pub fn run<R: PageRasterizer>(
        &self,
        source: &R,
        range: PageRange,
        link_base: &str,
    ) -> Result<RunReport> {
        let mut pages = Vec::new();
        for page in source.pages(range)? {
            pages.push(self.process_page(&page?)?);
        }
        Ok(RunReport::from_pages(pages, link_base))
    }
}
