//! Deep embedding features from a frozen pretrained backbone, served by
//! ONNX Runtime. The network is never trained here; one forward pass per
//! batch produces a fixed-width embedding per example.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::{Array2, Array4, Axis};
use ort::session::Session;
use ort::value::TensorRef;

/// Examples per forward pass.
pub const BATCH_SIZE: usize = 16;

/// Errors from loading or running the embedding backbone.
#[derive(Debug)]
pub enum EmbeddingError {
    /// Session construction or inference failed inside ONNX Runtime.
    Runtime(ort::Error),
    /// Another user of the session panicked while holding the lock.
    SessionPoisoned,
    /// The model produced an output the pooling step cannot handle.
    UnsupportedOutputRank { rank: usize },
    /// The named output tensor is missing from the model's outputs.
    OutputMissing { name: String },
    /// Batched inference needs every image to share one shape.
    MismatchedImageShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    /// The model file could not be found.
    ModelNotFound { path: PathBuf },
}

impl Display for EmbeddingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingError::Runtime(source) => write!(f, "onnx runtime error: {}", source),
            EmbeddingError::SessionPoisoned => write!(f, "embedding session lock poisoned"),
            EmbeddingError::UnsupportedOutputRank { rank } => {
                write!(f, "cannot pool a rank-{} model output", rank)
            }
            EmbeddingError::OutputMissing { name } => {
                write!(f, "model has no output named '{}'", name)
            }
            EmbeddingError::MismatchedImageShape { expected, actual } => write!(
                f,
                "expected every image to be {}x{}, got {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
            EmbeddingError::ModelNotFound { path } => {
                write!(f, "embedding model not found at {}", path.display())
            }
        }
    }
}

impl Error for EmbeddingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EmbeddingError::Runtime(source) => Some(source),
            _ => None,
        }
    }
}

impl From<ort::Error> for EmbeddingError {
    fn from(source: ort::Error) -> Self {
        EmbeddingError::Runtime(source)
    }
}

/// A frozen image backbone behind an ONNX Runtime session.
///
/// Rank-2 outputs are taken as ready-made embeddings; rank-4 activation
/// maps go through ReLU and global average pooling over the spatial axes,
/// matching the penultimate-layer recipe used for the DenseNet backbone.
pub struct NeuralNetFeatureExtractor {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl NeuralNetFeatureExtractor {
    /// Loads the backbone from an ONNX file, expecting tensor names
    /// `input` and `output`.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError::ModelNotFound`] for a missing file and
    /// [`EmbeddingError::Runtime`] when session construction fails.
    pub fn load(model_path: &Path) -> Result<Self, EmbeddingError> {
        if !model_path.is_file() {
            return Err(EmbeddingError::ModelNotFound {
                path: model_path.to_path_buf(),
            });
        }
        let session = Session::builder()?
            .with_intra_threads(4)?
            .commit_from_file(model_path)?;

        Ok(Self {
            session: Mutex::new(session),
            input_name: "input".to_string(),
            output_name: "output".to_string(),
        })
    }

    /// Overrides the model's input/output tensor names.
    pub fn with_io_names(mut self, input: &str, output: &str) -> Self {
        self.input_name = input.to_string();
        self.output_name = output.to_string();
        self
    }

    /// Runs the backbone over all images, [`BATCH_SIZE`] at a time, and
    /// stacks the embeddings into one row per image.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError::MismatchedImageShape`] when the images do
    /// not share a single shape, plus any runtime error from inference.
    pub fn extract(
        &self,
        images: &[ndarray::Array2<f32>],
    ) -> Result<Array2<f32>, EmbeddingError> {
        if images.is_empty() {
            return Ok(Array2::zeros((0, 0)));
        }
        let shape = images[0].dim();
        for img in images {
            if img.dim() != shape {
                return Err(EmbeddingError::MismatchedImageShape {
                    expected: shape,
                    actual: img.dim(),
                });
            }
        }

        let mut rows: Vec<Vec<f32>> = Vec::with_capacity(images.len());
        for batch in images.chunks(BATCH_SIZE) {
            let embeddings = self.forward(batch, shape)?;
            rows.extend(embeddings);
        }

        let width = rows[0].len();
        let mut out = Array2::zeros((rows.len(), width));
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                out[[i, j]] = v;
            }
        }
        Ok(out)
    }

    /// One forward pass over a batch, returning one embedding per image.
    fn forward(
        &self,
        batch: &[ndarray::Array2<f32>],
        (h, w): (usize, usize),
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        // NCHW with a single grayscale channel.
        let mut input = Array4::zeros((batch.len(), 1, h, w));
        for (b, img) in batch.iter().enumerate() {
            input.slice_mut(ndarray::s![b, 0, .., ..]).assign(img);
        }

        let input_tensor = TensorRef::from_array_view(&input)?;
        let mut session = self
            .session
            .lock()
            .map_err(|_| EmbeddingError::SessionPoisoned)?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        let value = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| EmbeddingError::OutputMissing {
                name: self.output_name.clone(),
            })?;
        let array = value.try_extract_array::<f32>()?;

        match array.ndim() {
            2 => {
                let embeddings = array
                    .to_owned()
                    .into_dimensionality::<ndarray::Ix2>()
                    .map_err(|_| EmbeddingError::UnsupportedOutputRank { rank: 2 })?;
                Ok(embeddings
                    .rows()
                    .into_iter()
                    .map(|row| row.iter().copied().collect())
                    .collect())
            }
            4 => {
                // ReLU then global average pooling over the spatial axes.
                let activations = array
                    .to_owned()
                    .into_dimensionality::<ndarray::Ix4>()
                    .map_err(|_| EmbeddingError::UnsupportedOutputRank { rank: 4 })?;
                let rectified = activations.mapv(|v| v.max(0.0));
                let pooled = rectified.mean_axis(Axis(3)).and_then(|a| a.mean_axis(Axis(2)));
                match pooled {
                    Some(pooled) => Ok(pooled
                        .rows()
                        .into_iter()
                        .map(|row| row.iter().copied().collect())
                        .collect()),
                    None => Err(EmbeddingError::UnsupportedOutputRank { rank: 4 }),
                }
            }
            rank => Err(EmbeddingError::UnsupportedOutputRank { rank }),
        }
    }
}
