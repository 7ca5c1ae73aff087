//! Configuration structures for the diagram pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the pdf2fen pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Pdf2FenConfig {
    /// Page rasterization configuration.
    pub raster: RasterConfig,

    /// Board detection configuration.
    pub detection: DetectionConfig,

    /// Cell segmentation configuration.
    pub segmentation: SegmentationConfig,

    /// Piece classifier configuration.
    pub classifier: ClassifierConfig,

    /// Output configuration.
    pub output: OutputConfig,
}

/// Page rasterization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Rendering resolution in dots per inch. Detection thresholds assume 500.
    pub dpi: f32,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self { dpi: 500.0 }
    }
}

/// How detected boards are put into reading order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortStrategy {
    /// Stable sort by `top * 1000 + left`.
    #[default]
    CompositeKey,
    /// Group boards whose tops lie within `row_tolerance` pixels into one
    /// row, then order rows top-down and boards in a row left-to-right.
    RowBands,
}

/// Board detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Gaussian sigma used to smooth scan noise (1.1 matches a 5x5 kernel).
    pub blur_sigma: f32,

    /// Canny low hysteresis threshold.
    pub canny_low: f32,

    /// Canny high hysteresis threshold.
    pub canny_high: f32,

    /// Dilation radius in pixels (1 = 3x3 square element).
    pub dilate_radius: u8,

    /// Minimum enclosed contour area in px^2. Tuned for 500 DPI scans.
    pub min_board_area: f64,

    /// Polygon approximation epsilon as a fraction of contour perimeter.
    pub approx_epsilon_ratio: f64,

    /// Reading-order strategy.
    pub sort: SortStrategy,

    /// Row band height for [`SortStrategy::RowBands`].
    pub row_tolerance: i32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            canny_low: 100.0,
            canny_high: 200.0,
            dilate_radius: 1,
            min_board_area: 45_000.0,
            approx_epsilon_ratio: 0.03,
            sort: SortStrategy::CompositeKey,
            row_tolerance: 50,
        }
    }
}

/// Cell segmentation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Width every board crop is resized to.
    pub target_width: u32,

    /// Height every board crop is resized to.
    pub target_height: u32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            target_width: 400,
            target_height: 400,
        }
    }
}

impl SegmentationConfig {
    /// Size of one cell, `(width, height)`.
    pub fn cell_size(&self) -> (u32, u32) {
        (self.target_width / 8, self.target_height / 8)
    }
}

/// Runtime used to execute the classifier model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// ONNX Runtime.
    #[default]
    Ort,
    /// Tract (pure Rust).
    Tract,
}

/// Memory layout of the classifier's input batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    /// `[batch, height, width, channels]`, as exported from Keras.
    #[default]
    Nhwc,
    /// `[batch, channels, height, width]`.
    Nchw,
}

/// Channel order the classifier was trained with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    /// OpenCV order.
    #[default]
    Bgr,
    Rgb,
}

/// Piece classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Path to the ONNX model.
    pub model_path: PathBuf,

    /// Inference runtime.
    pub backend: BackendKind,

    /// Name of the model input. Defaults to the model's first input.
    pub input_name: Option<String>,

    /// Input tensor layout.
    pub layout: TensorLayout,

    /// Input channel order.
    pub channel_order: ChannelOrder,

    /// Intra-op threads for the runtime.
    pub num_threads: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("assets").join("chess_model.onnx"),
            backend: BackendKind::Ort,
            input_name: None,
            layout: TensorLayout::Nhwc,
            channel_order: ChannelOrder::Bgr,
            num_threads: 4,
        }
    }
}

/// Output file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output file path. Replaced on every run.
    pub path: PathBuf,

    /// Output format.
    pub format: OutputFormat,

    /// Prefix of the editor link; the FEN placement is appended.
    pub link_base: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("output_data.csv"),
            format: OutputFormat::Csv,
            link_base: "https://lichess.org/editor/".to_string(),
        }
    }
}

impl Pdf2FenConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let json = r#"{ "detection": { "min_board_area": 1000.0, "sort": "row_bands" } }"#;
        let config: Pdf2FenConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.detection.min_board_area, 1000.0);
        assert_eq!(config.detection.sort, SortStrategy::RowBands);
        assert_eq!(config.detection.canny_high, 200.0);
        assert_eq!(config.segmentation.cell_size(), (50, 50));
        assert_eq!(config.raster.dpi, 500.0);
        assert_eq!(config.output.path, PathBuf::from("output_data.csv"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Pdf2FenConfig::default();
        config.classifier.layout = TensorLayout::Nchw;
        config.output.format = OutputFormat::Json;
        config.save(&path).unwrap();

        let loaded = Pdf2FenConfig::from_file(&path).unwrap();
        assert_eq!(loaded.classifier.layout, TensorLayout::Nchw);
        assert_eq!(loaded.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_invalid_json_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Pdf2FenConfig::from_file(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
