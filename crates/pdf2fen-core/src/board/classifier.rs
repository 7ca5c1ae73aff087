//! Piece classification of board cells.

use ndarray::{Array4, ArrayView1, Axis, s};
use tracing::{debug, info};

use pdf2fen_inference::{InferenceBackend, InputTensor, OutputTensor};

use super::segmenter::CellGrid;
use crate::error::ClassificationError;
use crate::fen::{LabelGrid, NUM_CLASSES};
use crate::models::config::{
    BackendKind, ChannelOrder, ClassifierConfig, SegmentationConfig, TensorLayout,
};

/// Maps the 64 cells of a board to piece labels.
pub trait PieceClassifier: Send + Sync {
    /// Classify every cell of one board as a single batch.
    fn classify(&self, cells: &CellGrid) -> Result<LabelGrid, ClassificationError>;
}

impl<C: PieceClassifier + ?Sized> PieceClassifier for Box<C> {
    fn classify(&self, cells: &CellGrid) -> Result<LabelGrid, ClassificationError> {
        (**self).classify(cells)
    }
}

impl<C: PieceClassifier + ?Sized> PieceClassifier for std::sync::Arc<C> {
    fn classify(&self, cells: &CellGrid) -> Result<LabelGrid, ClassificationError> {
        (**self).classify(cells)
    }
}

/// Classifier backed by a 13-class ONNX model.
///
/// The model takes a `[64, h, w, 3]` batch (or `[64, 3, h, w]` with
/// [`TensorLayout::Nchw`]) and returns either per-class scores
/// `[64, 13]` or already reduced class ids `[64]`.
pub struct OnnxPieceClassifier<B: InferenceBackend> {
    backend: B,
    input_name: Option<String>,
    layout: TensorLayout,
    channel_order: ChannelOrder,
}

impl<B: InferenceBackend> OnnxPieceClassifier<B> {
    /// Create a classifier with NHWC/BGR input.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            input_name: None,
            layout: TensorLayout::default(),
            channel_order: ChannelOrder::default(),
        }
    }

    /// Override the model input name.
    pub fn with_input_name(mut self, name: impl Into<String>) -> Self {
        self.input_name = Some(name.into());
        self
    }

    pub fn with_layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.channel_order = order;
        self
    }

    /// Stack the cells into one input batch.
    fn batch(&self, cells: &CellGrid) -> Result<InputTensor, ClassificationError> {
        if cells.len() != 64 {
            return Err(ClassificationError::Preprocessing(format!(
                "expected 64 cells, got {}",
                cells.len()
            )));
        }

        let (h, w) = cells.cell_size();
        let mut batch = Array4::<f32>::zeros((64, h, w, 3));
        for (mut slot, cell) in batch.axis_iter_mut(Axis(0)).zip(cells.iter()) {
            match self.channel_order {
                ChannelOrder::Rgb => slot.assign(cell),
                ChannelOrder::Bgr => slot.assign(&cell.slice(s![.., .., ..;-1])),
            }
        }

        let batch = match self.layout {
            TensorLayout::Nhwc => batch,
            TensorLayout::Nchw => batch
                .permuted_axes([0, 3, 1, 2])
                .as_standard_layout()
                .into_owned(),
        };
        Ok(InputTensor::Float32(batch.into_dyn()))
    }

    fn input_name(&self) -> &str {
        self.input_name
            .as_deref()
            .or_else(|| self.backend.input_names().first().map(String::as_str))
            .unwrap_or("input")
    }
}

impl<B: InferenceBackend> PieceClassifier for OnnxPieceClassifier<B> {
    fn classify(&self, cells: &CellGrid) -> Result<LabelGrid, ClassificationError> {
        let input = self.batch(cells)?;
        debug!("Classifier input shape: {:?}", input.shape());

        let outputs = self.backend.run(&[(self.input_name(), input)])?;
        let (name, output) = outputs.into_iter().next().ok_or_else(|| {
            ClassificationError::UnexpectedOutput("model produced no outputs".to_string())
        })?;
        debug!("Classifier output '{}' shape: {:?}", name, output.shape());

        let classes = class_ids(&output)?;
        LabelGrid::from_class_indices(&classes)
    }
}

/// Per-cell class ids from scores or from an argmax output.
fn class_ids(output: &OutputTensor) -> Result<Vec<i64>, ClassificationError> {
    if let Some(ids) = output.to_class_ids() {
        return Ok(ids);
    }

    let scores = output.as_f32().ok_or_else(|| {
        ClassificationError::UnexpectedOutput("unsupported output tensor type".to_string())
    })?;
    if scores.len() != 64 * NUM_CLASSES {
        return Err(ClassificationError::UnexpectedOutput(format!(
            "expected 64x{} scores, got shape {:?}",
            NUM_CLASSES,
            scores.shape()
        )));
    }

    let scores = scores
        .to_shape((64, NUM_CLASSES))
        .map_err(|e| ClassificationError::UnexpectedOutput(e.to_string()))?;
    Ok(scores.outer_iter().map(argmax).collect())
}

/// Index of the first maximum.
fn argmax(row: ArrayView1<'_, f32>) -> i64 {
    let mut best = 0usize;
    for (idx, &value) in row.iter().enumerate() {
        if value > row[best] {
            best = idx;
        }
    }
    best as i64
}

/// Load the configured model once, for sharing across every board of a run.
pub fn load_classifier(
    config: &ClassifierConfig,
    segmentation: &SegmentationConfig,
) -> Result<OnnxPieceClassifier<Box<dyn InferenceBackend>>, ClassificationError> {
    let path = &config.model_path;
    if !path.exists() {
        return Err(ClassificationError::ModelLoad(format!(
            "model not found at {}",
            path.display()
        )));
    }

    let backend: Box<dyn InferenceBackend> = match config.backend {
        BackendKind::Ort => load_ort(config)?,
        BackendKind::Tract => load_tract(config, segmentation)?,
    };
    info!(
        "Loaded piece classifier {} ({:?})",
        path.display(),
        config.backend
    );

    let mut classifier = OnnxPieceClassifier::new(backend)
        .with_layout(config.layout)
        .with_channel_order(config.channel_order);
    if let Some(name) = &config.input_name {
        classifier = classifier.with_input_name(name.clone());
    }
    Ok(classifier)
}

#[cfg(feature = "native")]
fn load_ort(config: &ClassifierConfig) -> Result<Box<dyn InferenceBackend>, ClassificationError> {
    let backend = pdf2fen_inference::OrtBackend::from_file(&config.model_path, config.num_threads)
        .map_err(|e| ClassificationError::ModelLoad(e.to_string()))?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "native"))]
fn load_ort(_config: &ClassifierConfig) -> Result<Box<dyn InferenceBackend>, ClassificationError> {
    Err(ClassificationError::ModelLoad(
        "built without the `native` feature".to_string(),
    ))
}

#[cfg(feature = "tract")]
fn load_tract(
    config: &ClassifierConfig,
    segmentation: &SegmentationConfig,
) -> Result<Box<dyn InferenceBackend>, ClassificationError> {
    let (w, h) = segmentation.cell_size();
    let (w, h) = (w.max(1) as usize, h.max(1) as usize);
    let shape = match config.layout {
        TensorLayout::Nhwc => [64, h, w, 3],
        TensorLayout::Nchw => [64, 3, h, w],
    };
    let backend = pdf2fen_inference::TractBackend::from_file(&config.model_path, &shape)
        .map_err(|e| ClassificationError::ModelLoad(e.to_string()))?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "tract"))]
fn load_tract(
    _config: &ClassifierConfig,
    _segmentation: &SegmentationConfig,
) -> Result<Box<dyn InferenceBackend>, ClassificationError> {
    Err(ClassificationError::ModelLoad(
        "built without the `tract` feature".to_string(),
    ))
}
