//! Chest X-ray classification pipeline: dataset adapters, classical image
//! descriptors, optional deep embeddings, and one-vs-rest wrappers around
//! the workspace's binary estimators.

pub mod config;
pub mod datasets;
pub mod descriptors;
pub mod embedding;
pub mod features;
pub mod models;
pub mod multioutput;
pub mod pca;

pub use config::{ClassifierKind, Config};
pub use cxr_helpers::{
    BinaryClassifier, Distance, EstimatorError, Float, L1Dist, L2Dist, LInfDist,
};
pub use datasets::{Dataset, Example, PATHOLOGIES};
pub use features::{ExtractedFeatures, FeatureExtractor};
pub use multioutput::OneVsRestClassifier;
pub use pca::Pca;
