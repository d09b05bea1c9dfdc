//! Turns a dataset into a flat feature matrix by concatenating the
//! enabled descriptors per example, with optional deep embeddings
//! appended as trailing columns.

use std::error::Error;
use std::fmt::{Display, Formatter};

use log::warn;
use ndarray::{Array2, Axis};
use rand::RngCore;

use crate::config::Config;
use crate::datasets::Dataset;
use crate::descriptors;
use crate::embedding::{EmbeddingError, NeuralNetFeatureExtractor};

/// Errors from configuring or running feature extraction.
#[derive(Debug)]
pub enum FeatureError {
    /// Every descriptor and the embedding backbone are disabled.
    NoDescriptors,
    /// Every example failed to load, leaving nothing to extract.
    NoUsableExamples,
    /// Two examples produced rows of different widths.
    InconsistentWidth { expected: usize, actual: usize, index: usize },
    Embedding(EmbeddingError),
}

impl Display for FeatureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureError::NoDescriptors => {
                write!(f, "no descriptors enabled: at least one of hog, fft, lbp or an embedding model is required")
            }
            FeatureError::NoUsableExamples => {
                write!(f, "no example could be loaded from the dataset")
            }
            FeatureError::InconsistentWidth { expected, actual, index } => write!(
                f,
                "example {} produced {} features where {} were expected",
                index, actual, expected
            ),
            FeatureError::Embedding(source) => write!(f, "embedding extraction failed: {}", source),
        }
    }
}

impl Error for FeatureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FeatureError::Embedding(source) => Some(source),
            _ => None,
        }
    }
}

impl From<EmbeddingError> for FeatureError {
    fn from(source: EmbeddingError) -> Self {
        FeatureError::Embedding(source)
    }
}

/// The extraction result: one feature row and one label row per example
/// that loaded successfully, plus the original indices of those examples.
#[derive(Debug, Clone)]
pub struct ExtractedFeatures {
    pub features: Array2<f32>,
    pub labels: Array2<f32>,
    pub kept: Vec<usize>,
}

impl ExtractedFeatures {
    /// Examples dropped from a dataset of the given original size.
    pub fn dropped(&self, dataset_len: usize) -> usize {
        dataset_len - self.kept.len()
    }
}

/// Computes the enabled descriptors per example and concatenates them in
/// the fixed order hog, fft, lbp; embedding columns come last.
///
/// The `feature_budget` is shared between the hog and fft descriptors:
/// each enabled one of the two receives `budget / enabled_count`
/// components. The lbp histogram has a fixed width and sits outside the
/// budget.
pub struct FeatureExtractor {
    hog: bool,
    fft: bool,
    lbp: bool,
    nn: Option<NeuralNetFeatureExtractor>,
    feature_budget: usize,
}

impl FeatureExtractor {
    /// Creates an extractor with explicit toggles.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::NoDescriptors`] when nothing is enabled.
    pub fn new(
        hog: bool,
        fft: bool,
        lbp: bool,
        nn: Option<NeuralNetFeatureExtractor>,
        feature_budget: usize,
    ) -> Result<Self, FeatureError> {
        if !(hog || fft || lbp || nn.is_some()) {
            return Err(FeatureError::NoDescriptors);
        }
        Ok(Self {
            hog,
            fft,
            lbp,
            nn,
            feature_budget,
        })
    }

    /// Builds the extractor described by a run configuration, loading the
    /// embedding backbone when one is configured.
    pub fn from_config(config: &Config) -> Result<Self, FeatureError> {
        let nn = match &config.nn_model {
            Some(path) => Some(NeuralNetFeatureExtractor::load(path)?),
            None => None,
        };
        Self::new(config.hog, config.fft, config.lbp, nn, config.feature_budget)
    }

    /// The per-descriptor share of the hog/fft component budget.
    fn comp_share(&self) -> usize {
        let enabled = usize::from(self.hog) + usize::from(self.fft);
        if enabled == 0 {
            0
        } else {
            self.feature_budget / enabled
        }
    }

    /// Extracts features for every loadable example.
    ///
    /// Examples whose image fails to load are logged and dropped; the
    /// returned labels stay aligned with the surviving feature rows and
    /// `kept` records their dataset indices.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::NoUsableExamples`] when nothing loads and
    /// [`FeatureError::InconsistentWidth`] if surviving examples disagree
    /// on descriptor width (possible only with the identity transform).
    pub fn extract<D: Dataset + ?Sized>(
        &self,
        dataset: &D,
        rng: &mut dyn RngCore,
    ) -> Result<ExtractedFeatures, FeatureError> {
        let comp_share = self.comp_share();
        let all_labels = dataset.labels();

        let mut rows: Vec<Vec<f32>> = Vec::with_capacity(dataset.len());
        let mut kept = Vec::with_capacity(dataset.len());
        let mut images = Vec::new();

        for idx in 0..dataset.len() {
            let example = match dataset.example(idx, rng) {
                Ok(example) => example,
                Err(error) => {
                    warn!("dropping example {}: {}", idx, error);
                    continue;
                }
            };

            let mut row = Vec::new();
            if self.hog {
                row.extend(descriptors::hog(example.image.view(), comp_share).iter());
            }
            if self.fft {
                row.extend(descriptors::fft(example.image.view(), comp_share).iter());
            }
            if self.lbp {
                row.extend(descriptors::lbp(example.image.view()).iter());
            }

            if self.nn.is_some() {
                images.push(example.image);
            }
            kept.push(idx);
            rows.push(row);
        }

        if kept.is_empty() {
            return Err(FeatureError::NoUsableExamples);
        }

        let width = rows[0].len();
        for (row, &idx) in rows.iter().zip(&kept) {
            if row.len() != width {
                return Err(FeatureError::InconsistentWidth {
                    expected: width,
                    actual: row.len(),
                    index: idx,
                });
            }
        }

        let mut features = Array2::zeros((rows.len(), width));
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                features[[i, j]] = v;
            }
        }

        if let Some(nn) = &self.nn {
            let embeddings = nn.extract(&images)?;
            features = ndarray::concatenate(Axis(1), &[features.view(), embeddings.view()])
                .map_err(|_| FeatureError::InconsistentWidth {
                    expected: features.nrows(),
                    actual: embeddings.nrows(),
                    index: 0,
                })?;
        }

        let mut labels = Array2::zeros((kept.len(), all_labels.ncols()));
        for (row, &idx) in kept.iter().enumerate() {
            labels.row_mut(row).assign(&all_labels.row(idx));
        }

        Ok(ExtractedFeatures {
            features,
            labels,
            kept,
        })
    }
}
