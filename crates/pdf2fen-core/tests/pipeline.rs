//! End-to-end runs over synthetic pages with a stub piece classifier.

use std::sync::Mutex;

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use lopdf::{Document, Object, Stream, dictionary};
use pretty_assertions::assert_eq;

use pdf2fen_core::error::{ClassificationError, PdfError};
use pdf2fen_core::pdf;
use pdf2fen_core::{
    BoardDetector, CellGrid, DiagramEngine, ImageDocument, LabelGrid, PageRange, PageRasterizer,
    PdfExtractor, PieceClassifier,
};

const LICHESS: &str = "https://lichess.org/editor/";
const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";

/// Returns the starting position for every board.
struct StartingPosition;

impl PieceClassifier for StartingPosition {
    fn classify(&self, _cells: &CellGrid) -> Result<LabelGrid, ClassificationError> {
        let back = [1, 3, 2, 5, 4, 2, 3, 1];
        let mut indices = Vec::with_capacity(64);
        indices.extend(back.iter().copied());
        indices.extend([0; 8]);
        indices.extend([12; 32]);
        indices.extend([6; 8]);
        indices.extend(back.iter().map(|c| c + 6));
        LabelGrid::from_class_indices(&indices)
    }
}

fn engine() -> DiagramEngine<StartingPosition> {
    DiagramEngine::new(StartingPosition).with_detector(BoardDetector::new().with_min_area(10_000.0))
}

fn page_with_boards(boards: &[(i32, i32)]) -> DynamicImage {
    let mut img = RgbImage::from_pixel(850, 1100, Rgb([255, 255, 255]));
    for &(x, y) in boards {
        draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(240, 240), Rgb([15, 15, 15]));
    }
    DynamicImage::ImageRgb8(img)
}

/// A document whose page `n` holds `n % 3` boards; records rasterized pages.
struct FakeDocument {
    pages: u32,
    requested: Mutex<Vec<u32>>,
}

impl FakeDocument {
    fn new(pages: u32) -> Self {
        Self {
            pages,
            requested: Mutex::new(Vec::new()),
        }
    }
}

impl PageRasterizer for FakeDocument {
    fn page_count(&self) -> u32 {
        self.pages
    }

    fn rasterize_page(&self, page: u32) -> pdf::Result<DynamicImage> {
        if page == 0 || page > self.pages {
            return Err(PdfError::InvalidPage(page));
        }
        self.requested.lock().unwrap().push(page);
        let boards: Vec<(i32, i32)> = [(60, 80), (500, 80)]
            .into_iter()
            .take((page % 3) as usize)
            .collect();
        Ok(page_with_boards(&boards))
    }
}

#[test]
fn single_diagram_becomes_one_row() {
    let doc = ImageDocument::from_image(page_with_boards(&[(300, 400)]));
    let report = engine().run(&doc, PageRange::all(), LICHESS).unwrap();

    assert_eq!(report.rows.len(), 1);
    let row = &report.rows[0];
    assert_eq!(row.number, 1);
    assert_eq!(row.fen.as_str(), START);
    assert_eq!(row.link, format!("{}{}", LICHESS, START));
    assert_eq!(row.page, 1);
}

#[test]
fn page_without_diagrams_adds_no_rows() {
    let doc = ImageDocument::from_image(page_with_boards(&[]));
    let report = engine().run(&doc, PageRange::all(), LICHESS).unwrap();

    assert!(report.rows.is_empty());
    assert_eq!(report.summary.pages, 1);
    assert_eq!(report.summary.diagrams, 0);
}

#[test]
fn page_range_limits_rasterized_pages() {
    let doc = FakeDocument::new(10);
    let report = engine()
        .run(&doc, PageRange::new(Some(3), Some(5)), LICHESS)
        .unwrap();

    assert_eq!(*doc.requested.lock().unwrap(), vec![3, 4, 5]);

    // Page 3 has no boards, page 4 one, page 5 two.
    let numbered: Vec<(usize, u32)> = report.rows.iter().map(|r| (r.number, r.page)).collect();
    assert_eq!(numbered, vec![(1, 4), (2, 5), (3, 5)]);
    assert!(report.rows[1].bbox.x < report.rows[2].bbox.x);
}

#[test]
fn numbering_is_global_across_pages() {
    let doc = FakeDocument::new(6);
    let report = engine().run(&doc, PageRange::all(), LICHESS).unwrap();

    // 1 + 2 + 0 + 1 + 2 + 0 boards.
    let numbers: Vec<usize> = report.rows.iter().map(|r| r.number).collect();
    assert_eq!(numbers, (1..=6).collect::<Vec<_>>());
    assert_eq!(report.summary.pages, 6);
    assert_eq!(report.summary.diagrams, 6);
}

#[test]
fn out_of_range_pages_are_rejected() {
    let doc = FakeDocument::new(4);
    let err = engine()
        .run(&doc, PageRange::new(Some(2), Some(9)), LICHESS)
        .unwrap_err();

    assert!(matches!(
        err,
        pdf2fen_core::Pdf2FenError::Pdf(PdfError::PageRange { page_count: 4, .. })
    ));
    assert!(doc.requested.lock().unwrap().is_empty());
}

/// Two-page scan: page 1 is an 8-bit gray scan holding one board, page 2
/// draws nothing.
fn scan_with_blank_page() -> Vec<u8> {
    let board = page_with_boards(&[(300, 400)]).to_luma8();
    let (width, height) = board.dimensions();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let scan_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        board.into_raw(),
    ));
    let media_box: Vec<Object> = vec![0.into(), 0.into(), 612.into(), 792.into()];
    let scanned = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Resources" => dictionary! { "XObject" => dictionary! { "Im0" => scan_id } },
    });
    let blank = doc.add_object(dictionary! { "Type" => "Page", "Parent" => pages_id });
    let kids: Vec<Object> = vec![scanned.into(), blank.into()];
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 2,
            "MediaBox" => media_box,
        }),
    );
    let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[test]
fn pdf_page_without_images_is_processed_as_blank() {
    let mut extractor = PdfExtractor::new().with_dpi(72.0);
    extractor.load(&scan_with_blank_page()).unwrap();

    let report = engine().run(&extractor, PageRange::all(), LICHESS).unwrap();

    assert_eq!(report.summary.pages, 2);
    assert_eq!(report.rows.len(), 1);
    assert_eq!((report.rows[0].number, report.rows[0].page), (1, 1));
}
