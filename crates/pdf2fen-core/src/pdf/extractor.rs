//! Page rasters of scanned PDFs, read with lopdf.
//!
//! A scanned page is a single full-page image XObject, so "rasterizing" the
//! page means decoding the largest image the page draws. Pages without a
//! decodable image come out as blank paper sized from the MediaBox.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use super::{PageRasterizer, Result};
use crate::error::PdfError;
use crate::models::config::RasterConfig;

/// US Letter in points, for pages without a usable MediaBox.
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Page tree depth at which inherited attribute lookup gives up.
const MAX_TREE_DEPTH: usize = 32;

/// Page image extractor for scanned PDFs.
pub struct PdfExtractor {
    document: Option<Document>,
    dpi: f32,
}

impl PdfExtractor {
    /// Create an extractor with no document loaded.
    pub fn new() -> Self {
        Self {
            document: None,
            dpi: RasterConfig::default().dpi,
        }
    }

    /// Resolution used to size blank pages.
    pub fn with_dpi(mut self, dpi: f32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Open and load a PDF file.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| PdfError::Parse(e.to_string()))?;
        let mut extractor = Self::new();
        extractor.load(&data)?;
        Ok(extractor)
    }

    /// Load a PDF from bytes.
    pub fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("No document loaded".to_string()))
    }

    fn page_id(&self, page: u32) -> Result<ObjectId> {
        let doc = self.document()?;
        doc.get_pages()
            .get(&page)
            .copied()
            .ok_or(PdfError::InvalidPage(page))
    }

    /// Decode every image XObject the page references.
    pub fn page_images(&self, page: u32) -> Result<Vec<DynamicImage>> {
        let doc = self.document()?;
        let page_id = self.page_id(page)?;

        let mut images = Vec::new();
        if let Some(resources) = page_resources(doc, page_id) {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
                    for (name, obj_ref) in xobj_dict.iter() {
                        let Ok((_, obj)) = doc.dereference(obj_ref) else {
                            continue;
                        };
                        if !is_image(obj) {
                            continue;
                        }
                        match decode_image_object(doc, obj) {
                            Some(img) => images.push(img),
                            None => warn!(
                                "Skipping undecodable image /{} on page {}",
                                String::from_utf8_lossy(name),
                                page
                            ),
                        }
                    }
                }
            }
        }

        debug!("Decoded {} images on page {}", images.len(), page);
        Ok(images)
    }

    /// Page size in pixels at the configured resolution, before rotation.
    fn blank_size(&self, doc: &Document, page_id: ObjectId) -> (u32, u32) {
        let (width, height) = media_box(doc, page_id).unwrap_or(DEFAULT_PAGE_SIZE);
        let scale = self.dpi / 72.0;
        let px = |points: f32| (points * scale).round().max(1.0) as u32;
        (px(width), px(height))
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRasterizer for PdfExtractor {
    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn rasterize_page(&self, page: u32) -> Result<DynamicImage> {
        let doc = self.document()?;
        let page_id = self.page_id(page)?;

        let largest = self
            .page_images(page)?
            .into_iter()
            .max_by_key(|img| u64::from(img.width()) * u64::from(img.height()));
        let image = match largest {
            Some(image) => image,
            None => {
                let (width, height) = self.blank_size(doc, page_id);
                debug!(
                    "Page {} has no decodable image, using a blank {}x{} raster",
                    page, width, height
                );
                DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255])))
            }
        };

        Ok(rotate(image, page_rotation(doc, page_id)))
    }
}

/// Page attribute, following inheritance up the page tree.
fn inherited(doc: &Document, node_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node_id = node_id;
    for _ in 0..MAX_TREE_DEPTH {
        let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
            return None;
        };
        if let Ok(value) = dict.get(key) {
            return doc.dereference(value).ok().map(|(_, value)| value.clone());
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => node_id = *parent_id,
            _ => return None,
        }
    }
    None
}

fn page_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    match inherited(doc, page_id, b"Resources")? {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Width and height of the MediaBox in points.
fn media_box(doc: &Document, page_id: ObjectId) -> Option<(f32, f32)> {
    let Object::Array(values) = inherited(doc, page_id, b"MediaBox")? else {
        return None;
    };
    let coords: Vec<f32> = values.iter().filter_map(|v| v.as_float().ok()).collect();
    match coords.as_slice() {
        [x0, y0, x1, y1] if x0 != x1 && y0 != y1 => Some(((x1 - x0).abs(), (y1 - y0).abs())),
        _ => None,
    }
}

/// Clockwise display rotation of the page in degrees.
fn page_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited(doc, page_id, b"Rotate")
        .and_then(|value| value.as_i64().ok())
        .map_or(0, |degrees| degrees.rem_euclid(360))
}

fn rotate(image: DynamicImage, degrees: i64) -> DynamicImage {
    match degrees {
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        _ => image,
    }
}

fn is_image(obj: &Object) -> bool {
    let Object::Stream(stream) = obj else {
        return false;
    };
    matches!(stream.dict.get(b"Subtype").and_then(Object::as_name), Ok(b"Image"))
}

fn decode_image_object(doc: &Document, obj: &Object) -> Option<DynamicImage> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    let width = u32::try_from(dict.get(b"Width").ok()?.as_i64().ok()?).ok()?;
    let height = u32::try_from(dict.get(b"Height").ok()?.as_i64().ok()?).ok()?;
    trace!("Found image object: {}x{}", width, height);

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            Some(b"DCTDecode") => {
                trace!("Decoding JPEG image");
                return image::load_from_memory_with_format(
                    &stream.content,
                    image::ImageFormat::Jpeg,
                )
                .ok();
            }
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!(
                    "Unsupported image filter {:?}",
                    filter_name.map(String::from_utf8_lossy)
                );
                return None;
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceGray");

    // Stencil masks are 1-bit samples with no color space of their own.
    let image_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(if image_mask { 1 } else { 8 });

    let mut image = decode_raw(&data, width, height, color_space, bits)?;
    if inverted_decode(dict) {
        image.invert();
    }
    Some(image)
}

/// Whether `/Decode` maps samples in reverse, as in `[1 0]`.
fn inverted_decode(dict: &Dictionary) -> bool {
    let Ok(Object::Array(decode)) = dict.get(b"Decode") else {
        return false;
    };
    match (
        decode.first().and_then(|v| v.as_float().ok()),
        decode.get(1).and_then(|v| v.as_float().ok()),
    ) {
        (Some(lo), Some(hi)) => lo > hi,
        _ => false,
    }
}

/// Decode unfiltered samples. Supports 8-bit RGB/gray and 1-bit gray, the
/// formats scanners commonly emit.
fn decode_raw(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
    bits_per_component: i64,
) -> Option<DynamicImage> {
    let (w, h) = (width as usize, height as usize);

    match (color_space, bits_per_component) {
        (b"DeviceRGB" | b"RGB", 8) => {
            let expected = w * h * 3;
            if data.len() < expected {
                return None;
            }
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, data[..expected].to_vec())
                .map(DynamicImage::ImageRgb8)
        }
        (b"DeviceGray" | b"G", 8) => {
            let expected = w * h;
            if data.len() < expected {
                return None;
            }
            GrayImage::from_raw(width, height, data[..expected].to_vec())
                .map(DynamicImage::ImageLuma8)
        }
        (b"DeviceGray" | b"G", 1) => {
            // Rows are padded to whole bytes; a set bit is white.
            let stride = w.div_ceil(8);
            if data.len() < stride * h {
                return None;
            }
            let img = GrayImage::from_fn(width, height, |x, y| {
                let byte = data[y as usize * stride + x as usize / 8];
                let bit = (byte >> (7 - (x % 8))) & 1;
                Luma([if bit == 1 { 255 } else { 0 }])
            });
            Some(DynamicImage::ImageLuma8(img))
        }
        _ => {
            trace!(
                "Could not decode image: colorspace={:?}, bits={}, data_len={}",
                String::from_utf8_lossy(color_space),
                bits_per_component,
                data.len()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};
    use pretty_assertions::assert_eq;

    /// One page per entry: an optional image XObject and extra page keys.
    fn build_pdf(pages: Vec<(Option<Stream>, Dictionary)>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for (image, mut page) in pages {
            page.set("Type", "Page");
            page.set("Parent", pages_id);
            if let Some(image) = image {
                let image_id = doc.add_object(image);
                page.set(
                    "Resources",
                    dictionary! { "XObject" => dictionary! { "Im0" => image_id } },
                );
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }

        let count = kids.len() as i64;
        let media_box: Vec<Object> = vec![0.into(), 0.into(), 200.into(), 100.into()];
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => media_box,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn gray_image(width: i64, height: i64, samples: Vec<u8>, extra: Dictionary) -> Stream {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        };
        dict.extend(&extra);
        Stream::new(dict, samples)
    }

    fn extractor(bytes: &[u8]) -> PdfExtractor {
        let mut extractor = PdfExtractor::new().with_dpi(72.0);
        extractor.load(bytes).unwrap();
        extractor
    }

    #[test]
    fn test_pdf_extractor_new() {
        let extractor = PdfExtractor::new();
        assert!(extractor.document.is_none());
        assert_eq!(extractor.page_count(), 0);
        assert!(extractor.page_images(1).is_err());
    }

    #[test]
    fn test_load_garbage_is_parse_error() {
        let mut extractor = PdfExtractor::new();
        assert!(matches!(
            extractor.load(b"definitely not a pdf"),
            Err(PdfError::Parse(_))
        ));
    }

    #[test]
    fn test_decode_one_bit_gray() {
        // 10 pixels wide -> 2 bytes per row.
        let data = [0b1000_0000, 0b0100_0000, 0b0000_0000, 0b0000_0000];
        let img = decode_raw(&data, 10, 2, b"DeviceGray", 1).unwrap().to_luma8();

        assert_eq!(img.get_pixel(0, 0)[0], 255);
        assert_eq!(img.get_pixel(1, 0)[0], 0);
        assert_eq!(img.get_pixel(9, 0)[0], 255);
        assert_eq!(img.get_pixel(0, 1)[0], 0);
    }

    #[test]
    fn test_decode_rgb_short_data() {
        assert!(decode_raw(&[0; 11], 2, 2, b"DeviceRGB", 8).is_none());
        assert!(decode_raw(&[0; 12], 2, 2, b"DeviceRGB", 8).is_some());
        assert!(decode_raw(&[0; 12], 2, 2, b"DeviceCMYK", 8).is_none());
    }

    #[test]
    fn test_page_without_image_is_blank_paper() {
        let bytes = build_pdf(vec![
            (Some(gray_image(4, 3, vec![0; 12], Dictionary::new())), Dictionary::new()),
            (None, Dictionary::new()),
        ]);
        let extractor = extractor(&bytes);
        assert_eq!(extractor.page_count(), 2);

        let scan = extractor.rasterize_page(1).unwrap();
        assert_eq!((scan.width(), scan.height()), (4, 3));

        let blank = extractor.rasterize_page(2).unwrap().to_luma8();
        assert_eq!(blank.dimensions(), (200, 100));
        assert!(blank.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_blank_page_scales_with_dpi() {
        let bytes = build_pdf(vec![(None, Dictionary::new())]);
        let mut extractor = PdfExtractor::new().with_dpi(144.0);
        extractor.load(&bytes).unwrap();
        let blank = extractor.rasterize_page(1).unwrap();
        assert_eq!((blank.width(), blank.height()), (400, 200));
    }

    #[test]
    fn test_page_rotation_is_applied() {
        let bytes = build_pdf(vec![
            (None, dictionary! { "Rotate" => 90 }),
            (
                Some(gray_image(4, 3, vec![0; 12], Dictionary::new())),
                dictionary! { "Rotate" => -90 },
            ),
        ]);
        let extractor = extractor(&bytes);

        let blank = extractor.rasterize_page(1).unwrap();
        assert_eq!((blank.width(), blank.height()), (100, 200));
        let scan = extractor.rasterize_page(2).unwrap();
        assert_eq!((scan.width(), scan.height()), (3, 4));
    }

    #[test]
    fn test_inverted_decode_array() {
        let decode: Vec<Object> = vec![1.into(), 0.into()];
        let bytes = build_pdf(vec![(
            Some(gray_image(2, 1, vec![0, 255], dictionary! { "Decode" => decode })),
            Dictionary::new(),
        )]);
        let img = extractor(&bytes).rasterize_page(1).unwrap().to_luma8();
        assert_eq!(img.get_pixel(0, 0)[0], 255);
        assert_eq!(img.get_pixel(1, 0)[0], 0);
    }

    #[test]
    fn test_missing_page_is_invalid() {
        let bytes = build_pdf(vec![(None, Dictionary::new())]);
        assert!(matches!(
            extractor(&bytes).rasterize_page(2),
            Err(PdfError::InvalidPage(2))
        ));
    }
}
