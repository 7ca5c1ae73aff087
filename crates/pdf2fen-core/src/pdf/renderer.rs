//! Full page rendering with hayro.
//!
//! Renders everything the page draws (images, vector art, text) at a fixed
//! resolution, so born-digital diagrams come out the same way scans do.

use std::path::Path;
use std::sync::Arc;

use hayro::{InterpreterSettings, Pdf, RenderSettings};
use image::{DynamicImage, RgbImage};
use tracing::{debug, trace};

use super::{PageRasterizer, Result};
use crate::error::PdfError;

/// PDF page renderer.
pub struct PdfRenderer {
    pdf: Pdf,
    dpi: f32,
}

impl PdfRenderer {
    /// Open a PDF file, rendering at `dpi`.
    pub fn open(path: &Path, dpi: f32) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| PdfError::Parse(e.to_string()))?;
        Self::from_bytes(data, dpi)
    }

    /// Parse a PDF held in memory.
    pub fn from_bytes(data: Vec<u8>, dpi: f32) -> Result<Self> {
        let pdf = Pdf::new(Arc::new(data)).map_err(|e| PdfError::Parse(format!("{:?}", e)))?;
        if pdf.pages().is_empty() {
            return Err(PdfError::NoPages);
        }
        debug!("Loaded PDF with {} pages, rendering at {} dpi", pdf.pages().len(), dpi);
        Ok(Self { pdf, dpi })
    }
}

impl PageRasterizer for PdfRenderer {
    fn page_count(&self) -> u32 {
        self.pdf.pages().len() as u32
    }

    fn rasterize_page(&self, page: u32) -> Result<DynamicImage> {
        let index = page.checked_sub(1).ok_or(PdfError::InvalidPage(page))?;
        let pages = self.pdf.pages();
        let pdf_page = pages
            .get(index as usize)
            .ok_or(PdfError::InvalidPage(page))?;

        let scale = self.dpi / 72.0;
        let settings = RenderSettings {
            x_scale: scale,
            y_scale: scale,
            ..Default::default()
        };
        let pixmap = hayro::render(pdf_page, &InterpreterSettings::default(), &settings);
        let (width, height) = (u32::from(pixmap.width()), u32::from(pixmap.height()));
        trace!("Rendered page {} at {}x{}", page, width, height);

        let rgb = flatten_on_white(pixmap.data_as_u8_slice());
        RgbImage::from_raw(width, height, rgb)
            .map(DynamicImage::ImageRgb8)
            .ok_or(PdfError::NoRaster(page))
    }
}

/// Composite premultiplied RGBA over white paper.
fn flatten_on_white(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .flat_map(|px| {
            let paper = 255 - px[3];
            [
                px[0].saturating_add(paper),
                px[1].saturating_add(paper),
                px[2].saturating_add(paper),
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_transparent_pixels_become_paper() {
        let rgba = [0, 0, 0, 0, 0, 0, 0, 255, 64, 64, 64, 128];
        assert_eq!(
            flatten_on_white(&rgba),
            vec![255, 255, 255, 0, 0, 0, 191, 191, 191]
        );
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(
            PdfRenderer::from_bytes(b"not a pdf".to_vec(), 72.0),
            Err(PdfError::Parse(_))
        ));
    }
}
