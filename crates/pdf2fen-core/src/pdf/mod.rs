//! Turning documents into page images.

mod extractor;
#[cfg(feature = "render")]
mod renderer;

pub use extractor::PdfExtractor;
#[cfg(feature = "render")]
pub use renderer::PdfRenderer;

use std::ops::RangeInclusive;
use std::path::Path;

use image::DynamicImage;
use tracing::debug;

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// A raster image of one page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Page number (1-indexed).
    pub number: u32,
    /// Decoded page raster.
    pub image: DynamicImage,
}

/// Optional 1-based inclusive page bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRange {
    pub first: Option<u32>,
    pub last: Option<u32>,
}

impl PageRange {
    /// Every page of the document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Bounds, either of which may be open.
    pub fn new(first: Option<u32>, last: Option<u32>) -> Self {
        Self { first, last }
    }

    /// Resolve against a document with `page_count` pages.
    pub fn resolve(&self, page_count: u32) -> Result<RangeInclusive<u32>> {
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }
        let first = self.first.unwrap_or(1);
        let last = self.last.unwrap_or(page_count);

        if first == 0 || first > last || last > page_count {
            return Err(PdfError::PageRange {
                first,
                last,
                page_count,
            });
        }
        Ok(first..=last)
    }
}

/// A source of page rasters.
pub trait PageRasterizer {
    /// Number of pages in the document.
    fn page_count(&self) -> u32;

    /// Raster of one page (1-indexed).
    fn rasterize_page(&self, page: u32) -> Result<DynamicImage>;

    /// Rasterize `range` lazily, in page order.
    fn pages(&self, range: PageRange) -> Result<Pages<'_, Self>>
    where
        Self: Sized,
    {
        let numbers = range.resolve(self.page_count())?;
        debug!("Rasterizing pages {:?}", numbers);
        Ok(Pages {
            source: self,
            numbers,
        })
    }
}

/// Iterator over rasterized pages, see [`PageRasterizer::pages`].
pub struct Pages<'a, R> {
    source: &'a R,
    numbers: RangeInclusive<u32>,
}

impl<R: PageRasterizer> Iterator for Pages<'_, R> {
    type Item = Result<PageImage>;

    fn next(&mut self) -> Option<Self::Item> {
        let number = self.numbers.next()?;
        Some(
            self.source
                .rasterize_page(number)
                .map(|image| PageImage { number, image }),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.numbers.size_hint()
    }
}

/// A stand-alone image treated as a one-page document.
pub struct ImageDocument {
    image: DynamicImage,
}

impl ImageDocument {
    /// Decode an image file.
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)?;
        debug!(
            "Loaded image {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(Self { image })
    }

    /// Wrap an already decoded image.
    pub fn from_image(image: DynamicImage) -> Self {
        Self { image }
    }
}

impl PageRasterizer for ImageDocument {
    fn page_count(&self) -> u32 {
        1
    }

    fn rasterize_page(&self, page: u32) -> Result<DynamicImage> {
        if page != 1 {
            return Err(PdfError::InvalidPage(page));
        }
        Ok(self.image.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_open_range() {
        assert_eq!(PageRange::all().resolve(10).unwrap(), 1..=10);
        assert_eq!(PageRange::new(Some(4), None).resolve(10).unwrap(), 4..=10);
        assert_eq!(PageRange::new(None, Some(2)).resolve(10).unwrap(), 1..=2);
    }

    #[test]
    fn test_resolve_rejects_out_of_bounds() {
        assert!(matches!(
            PageRange::new(Some(3), Some(11)).resolve(10),
            Err(PdfError::PageRange { last: 11, .. })
        ));
        assert!(PageRange::new(Some(0), None).resolve(10).is_err());
        assert!(PageRange::new(Some(6), Some(5)).resolve(10).is_err());
        assert!(matches!(PageRange::all().resolve(0), Err(PdfError::NoPages)));
    }

    #[test]
    fn test_image_document_single_page() {
        let doc = ImageDocument::from_image(DynamicImage::new_rgb8(4, 4));
        let pages: Vec<_> = doc.pages(PageRange::all()).unwrap().collect();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].as_ref().unwrap().number, 1);
        assert!(matches!(
            doc.rasterize_page(2),
            Err(PdfError::InvalidPage(2))
        ));
    }
}
