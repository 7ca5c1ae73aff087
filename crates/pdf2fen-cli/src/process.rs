//! Running the diagram pipeline over a document.

use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, ValueEnum, value_parser};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use pdf2fen_core::models::config::{OutputFormat, Pdf2FenConfig};
#[cfg(not(feature = "render"))]
use pdf2fen_core::PdfExtractor;
#[cfg(feature = "render")]
use pdf2fen_core::PdfRenderer;
use pdf2fen_core::{
    DiagramEngine, ImageDocument, PageImage, PageRange, PageRasterizer, PageResult,
    PieceClassifier, RunReport, load_classifier,
};

use crate::output::write_rows;

/// File extensions read as single page images instead of PDFs.
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// Arguments for processing one document.
#[derive(Args)]
pub struct ProcessArgs {
    /// Scanned PDF (or page image) to read
    #[arg(value_name = "PDF")]
    pub pdf: PathBuf,

    /// First page to process (1-based)
    #[arg(long = "start_page", visible_alias = "start-page", value_parser = value_parser!(u32).range(1..))]
    pub start_page: Option<u32>,

    /// Last page to process (inclusive)
    #[arg(long = "last_page", visible_alias = "last-page", value_parser = value_parser!(u32).range(1..))]
    pub last_page: Option<u32>,

    /// Output file (default: output_data.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<Format>,

    /// Piece classifier model (ONNX)
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Number of pages processed in parallel
    #[arg(short = 'j', long, default_value = "1", value_parser = value_parser!(u32).range(1..))]
    pub jobs: u32,

    /// Minimum board contour area in px^2
    #[arg(long)]
    pub min_area: Option<f64>,

    /// Page rendering resolution (default: 500)
    #[arg(long)]
    pub dpi: Option<f32>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Format {
    /// Diagram Number, FEN Notation, Lichess Link
    Csv,
    /// Array of rows with page and bounding box
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => OutputFormat::Csv,
            Format::Json => OutputFormat::Json,
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, &args);
    if !(config.raster.dpi > 0.0) {
        anyhow::bail!("DPI must be positive, got {}", config.raster.dpi);
    }

    let output_path = config.output.path.clone();
    if output_path.exists() {
        fs::remove_file(&output_path)
            .with_context(|| format!("Failed to remove {}", output_path.display()))?;
        debug!("Removed previous output {}", output_path.display());
    }

    if !args.pdf.exists() {
        anyhow::bail!("Input file not found: {}", args.pdf.display());
    }

    let source = open_document(&args.pdf, config.raster.dpi)?;
    let numbers = PageRange::new(args.start_page, args.last_page).resolve(source.page_count())?;
    info!(
        "Processing pages {}..={} of {}",
        numbers.start(),
        numbers.end(),
        args.pdf.display()
    );

    let classifier = load_classifier(&config.classifier, &config.segmentation)
        .context("Failed to load piece classifier")?;
    let engine = Arc::new(DiagramEngine::with_config(classifier, &config));

    let pb = ProgressBar::new(numbers.clone().count() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages")?
            .progress_chars("=>-"),
    );

    let batch = process_pages(engine, &*source, numbers, args.jobs as usize, &pb).await;
    pb.finish_and_clear();

    let report = RunReport::from_pages(batch.pages, &config.output.link_base);
    write_rows(&output_path, config.output.format, &report.rows)?;
    print_summary(&report, &output_path, start);

    batch.failure.map_or(Ok(()), Err)
}

/// Results of the pages processed before the run stopped.
pub struct PageBatch {
    /// Page results in page order, up to the first failed page.
    pub pages: Vec<PageResult>,
    /// Why the run stopped early, if it did.
    pub failure: Option<anyhow::Error>,
}

/// Process `numbers` with up to `jobs` pages in flight.
///
/// Pages are rasterized one at a time in page order; detection and
/// classification run on blocking workers. Results are merged in page
/// order, so diagram numbering never depends on completion order. The first
/// failure stops the run, keeping every page before it.
///
/// Must be called from a multi-threaded runtime.
pub async fn process_pages<C, R>(
    engine: Arc<DiagramEngine<C>>,
    source: &R,
    numbers: RangeInclusive<u32>,
    jobs: usize,
    pb: &ProgressBar,
) -> PageBatch
where
    C: PieceClassifier + 'static,
    R: PageRasterizer + ?Sized,
{
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let mut handles = Vec::new();
    let mut failure: Option<anyhow::Error> = None;

    for number in numbers {
        let image = match tokio::task::block_in_place(|| source.rasterize_page(number)) {
            Ok(image) => image,
            Err(e) => {
                failure = Some(
                    anyhow::Error::new(e).context(format!("Failed to rasterize page {number}")),
                );
                break;
            }
        };

        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                failure = Some(e.into());
                break;
            }
        };
        let engine = Arc::clone(&engine);
        let pb = pb.clone();
        handles.push((
            number,
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let result = engine.process_page(&PageImage { number, image });
                pb.inc(1);
                result
            }),
        ));
    }

    let mut pages = Vec::with_capacity(handles.len());
    for (number, handle) in handles {
        match handle.await {
            Ok(Ok(page)) => pages.push(page),
            Ok(Err(e)) => {
                failure = Some(anyhow::Error::new(e).context(format!("Page {number} failed")));
                break;
            }
            Err(e) => {
                failure =
                    Some(anyhow::Error::new(e).context(format!("Worker for page {number} died")));
                break;
            }
        }
    }

    PageBatch { pages, failure }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Pdf2FenConfig> {
    if let Some(path) = path {
        return Pdf2FenConfig::from_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()));
    }

    let default = dirs::config_dir().map(|dir| dir.join("pdf2fen").join("config.json"));
    match default {
        Some(path) if path.exists() => {
            debug!("Using config {}", path.display());
            Pdf2FenConfig::from_file(&path)
                .with_context(|| format!("Failed to read config {}", path.display()))
        }
        _ => Ok(Pdf2FenConfig::default()),
    }
}

fn apply_overrides(config: &mut Pdf2FenConfig, args: &ProcessArgs) {
    if let Some(output) = &args.output {
        config.output.path = output.clone();
    }
    if let Some(format) = args.format {
        config.output.format = format.into();
    }
    if let Some(model) = &args.model {
        config.classifier.model_path = model.clone();
    }
    if let Some(min_area) = args.min_area {
        config.detection.min_board_area = min_area;
    }
    if let Some(dpi) = args.dpi {
        config.raster.dpi = dpi;
    }
}

fn open_document(path: &Path, dpi: f32) -> anyhow::Result<Box<dyn PageRasterizer>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        let doc = ImageDocument::open(path)
            .with_context(|| format!("Failed to open image {}", path.display()))?;
        Ok(Box::new(doc))
    } else {
        open_pdf(path, dpi).with_context(|| format!("Failed to open PDF {}", path.display()))
    }
}

#[cfg(feature = "render")]
fn open_pdf(path: &Path, dpi: f32) -> anyhow::Result<Box<dyn PageRasterizer>> {
    Ok(Box::new(PdfRenderer::open(path, dpi)?))
}

#[cfg(not(feature = "render"))]
fn open_pdf(path: &Path, dpi: f32) -> anyhow::Result<Box<dyn PageRasterizer>> {
    Ok(Box::new(PdfExtractor::open(path)?.with_dpi(dpi)))
}

fn print_summary(report: &RunReport, output_path: &Path, start: Instant) {
    let summary = &report.summary;
    println!(
        "{} Wrote {} diagrams to {} in {:?}",
        style("✓").green(),
        style(summary.diagrams).green(),
        output_path.display(),
        start.elapsed()
    );
    println!(
        "   {} pages processed, {} contours rejected, {} boards skipped",
        summary.pages,
        style(summary.rejected_contours).yellow(),
        style(summary.failed_regions).red()
    );
}
