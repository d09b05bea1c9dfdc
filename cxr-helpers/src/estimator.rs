use std::error::Error;
use std::fmt::{Display, Formatter};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::Float;

/// Errors shared by every binary estimator in the workspace.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorError {
    /// `predict` was called before `fit`.
    NotFitted,
    /// The training set contains no rows.
    EmptyTrainingSet,
    /// Every training target has the same value; a binary fit is undefined.
    /// The one-vs-rest wrapper is expected to intercept this case before
    /// the estimator ever sees it.
    SingleClassTraining,
    /// A feature matrix does not match the dimensionality seen at fit time.
    DimensionMismatch { expected: usize, actual: usize },
    /// A hyperparameter is outside its valid range.
    InvalidParameter(&'static str),
    /// Targets and rows disagree in length.
    TargetLengthMismatch { rows: usize, targets: usize },
}

impl Display for EstimatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EstimatorError::NotFitted => write!(f, "estimator has not been fitted"),
            EstimatorError::EmptyTrainingSet => {
                write!(f, "cannot fit on an empty training set")
            }
            EstimatorError::SingleClassTraining => {
                write!(f, "training targets contain a single class")
            }
            EstimatorError::DimensionMismatch { expected, actual } => write!(
                f,
                "feature dimension mismatch: expected {}, got {}",
                expected, actual
            ),
            EstimatorError::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
            EstimatorError::TargetLengthMismatch { rows, targets } => write!(
                f,
                "target length mismatch: {} rows but {} targets",
                rows, targets
            ),
        }
    }
}

impl Error for EstimatorError {}

/// A binary classifier over 0/1 targets.
///
/// Every algorithm crate in the workspace implements this trait so the
/// one-vs-rest wrapper can drive any of them through a boxed factory.
/// `predict_proba` returns two columns, P(class 0) and P(class 1), in
/// that order.
pub trait BinaryClassifier<F: Float> {
    /// Fits the estimator on a feature matrix and 0/1 targets.
    ///
    /// # Errors
    ///
    /// Returns [`EstimatorError::EmptyTrainingSet`],
    /// [`EstimatorError::TargetLengthMismatch`] or
    /// [`EstimatorError::SingleClassTraining`] for the shared input
    /// violations, plus estimator-specific parameter errors.
    fn fit(&mut self, x: ArrayView2<F>, y: ArrayView1<u8>) -> Result<(), EstimatorError>;

    /// Predicts a hard 0/1 label per row.
    fn predict(&self, x: ArrayView2<F>) -> Result<Array1<u8>, EstimatorError>;

    /// Predicts per-class probabilities, one row per input row and one
    /// column per class.
    fn predict_proba(&self, x: ArrayView2<F>) -> Result<Array2<F>, EstimatorError>;
}

/// Validates the shared `fit` preconditions: a non-empty training set,
/// matching target length and the presence of both classes.
pub fn validate_training_set<F: Float>(
    x: ArrayView2<F>,
    y: ArrayView1<u8>,
) -> Result<(), EstimatorError> {
    if x.nrows() == 0 {
        return Err(EstimatorError::EmptyTrainingSet);
    }
    if x.nrows() != y.len() {
        return Err(EstimatorError::TargetLengthMismatch {
            rows: x.nrows(),
            targets: y.len(),
        });
    }
    let has_zero = y.iter().any(|&v| v == 0);
    let has_one = y.iter().any(|&v| v != 0);
    if !(has_zero && has_one) {
        return Err(EstimatorError::SingleClassTraining);
    }
    Ok(())
}
