//! One-vs-rest multi-output classification: one independent binary
//! estimator per pathology column, built from an injected factory.
//!
//! Columns where the training data contains a single class never reach an
//! estimator. The wrapper records the lone class and answers constant
//! predictions and one-hot probability rows for that column, which is what
//! keeps degenerate folds from crashing the underlying fit.

use std::error::Error;
use std::fmt::{Display, Formatter};

use cxr_helpers::{BinaryClassifier, EstimatorError, Float};
use ndarray::{Array2, ArrayView2};

/// Produces a fresh unfitted estimator for each label column.
pub type EstimatorFactory<F> = Box<dyn Fn() -> Box<dyn BinaryClassifier<F>>>;

enum ColumnModel<F: Float> {
    /// The column had one observed class; no estimator was fitted.
    Constant(u8),
    Fitted(Box<dyn BinaryClassifier<F>>),
}

/// Errors from the multi-output wrapper.
#[derive(Debug)]
pub enum MultiOutputError {
    NotFitted,
    /// The training targets have no columns.
    EmptyTargets,
    Estimator(EstimatorError),
}

impl Display for MultiOutputError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MultiOutputError::NotFitted => write!(f, "classifier has not been fitted"),
            MultiOutputError::EmptyTargets => write!(f, "target matrix has no columns"),
            MultiOutputError::Estimator(source) => write!(f, "estimator error: {}", source),
        }
    }
}

impl Error for MultiOutputError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MultiOutputError::Estimator(source) => Some(source),
            _ => None,
        }
    }
}

impl From<EstimatorError> for MultiOutputError {
    fn from(source: EstimatorError) -> Self {
        MultiOutputError::Estimator(source)
    }
}

/// One-vs-rest wrapper around any [`BinaryClassifier`] factory.
pub struct OneVsRestClassifier<F: Float> {
    factory: EstimatorFactory<F>,
    columns: Vec<ColumnModel<F>>,
}

impl<F: Float> OneVsRestClassifier<F> {
    pub fn new(factory: impl Fn() -> Box<dyn BinaryClassifier<F>> + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            columns: Vec::new(),
        }
    }

    /// Fits one estimator per target column. Target values are binarised
    /// at 0.5, matching the multi-hot float label vectors.
    ///
    /// # Errors
    ///
    /// Propagates estimator failures; degenerate single-class columns are
    /// handled here and never produce an error.
    pub fn fit(&mut self, x: ArrayView2<F>, y: ArrayView2<F>) -> Result<(), MultiOutputError> {
        if y.ncols() == 0 {
            return Err(MultiOutputError::EmptyTargets);
        }
        let half = F::from_f64(0.5).unwrap_or_else(F::one);

        let mut columns = Vec::with_capacity(y.ncols());
        for column in y.columns() {
            let targets: ndarray::Array1<u8> =
                column.iter().map(|&v| u8::from(v >= half)).collect();

            let first = targets.first().copied().unwrap_or(0);
            if targets.iter().all(|&v| v == first) {
                columns.push(ColumnModel::Constant(first));
                continue;
            }

            let mut estimator = (self.factory)();
            estimator.fit(x, targets.view())?;
            columns.push(ColumnModel::Fitted(estimator));
        }
        self.columns = columns;
        Ok(())
    }

    /// Hard multi-hot predictions, one column per fitted target column.
    pub fn predict(&self, x: ArrayView2<F>) -> Result<Array2<F>, MultiOutputError> {
        if self.columns.is_empty() {
            return Err(MultiOutputError::NotFitted);
        }
        let mut out = Array2::zeros((x.nrows(), self.columns.len()));
        for (c, column) in self.columns.iter().enumerate() {
            match column {
                ColumnModel::Constant(value) => {
                    let v = F::from_u8(*value).unwrap_or_else(F::zero);
                    out.column_mut(c).fill(v);
                }
                ColumnModel::Fitted(estimator) => {
                    let labels = estimator.predict(x)?;
                    for (r, &label) in labels.iter().enumerate() {
                        out[[r, c]] = F::from_u8(label).unwrap_or_else(F::zero);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Per-column class probabilities: one (rows x 2) matrix per column.
    /// Degenerate columns yield a one-hot distribution at the recorded
    /// class for every row.
    pub fn predict_proba(&self, x: ArrayView2<F>) -> Result<Vec<Array2<F>>, MultiOutputError> {
        if self.columns.is_empty() {
            return Err(MultiOutputError::NotFitted);
        }
        let mut out = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            match column {
                ColumnModel::Constant(value) => {
                    let mut proba = Array2::zeros((x.nrows(), 2));
                    proba.column_mut(usize::from(*value)).fill(F::one());
                    out.push(proba);
                }
                ColumnModel::Fitted(estimator) => out.push(estimator.predict_proba(x)?),
            }
        }
        Ok(out)
    }

    pub fn n_outputs(&self) -> usize {
        self.columns.len()
    }

    /// Indices of the columns that were degenerate at fit time.
    pub fn degenerate_columns(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, ColumnModel::Constant(_)))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxr_helpers::L2Dist;
    use k_nn::KnnClassifier;
    use ndarray::{array, Array1, ArrayView1};

    /// A stub that panics if the wrapper ever invokes it.
    struct PanickingEstimator;

    impl BinaryClassifier<f32> for PanickingEstimator {
        fn fit(
            &mut self,
            _x: ArrayView2<f32>,
            _y: ArrayView1<u8>,
        ) -> Result<(), EstimatorError> {
            panic!("estimator must not be invoked for a degenerate column");
        }

        fn predict(&self, _x: ArrayView2<f32>) -> Result<Array1<u8>, EstimatorError> {
            panic!("estimator must not be invoked for a degenerate column");
        }

        fn predict_proba(&self, _x: ArrayView2<f32>) -> Result<Array2<f32>, EstimatorError> {
            panic!("estimator must not be invoked for a degenerate column");
        }
    }

    #[test]
    fn degenerate_columns_bypass_the_estimator() {
        let x = array![[0.0_f32, 1.0], [1.0, 0.0], [0.5, 0.5]];
        // Column 0 is all ones, column 1 all zeros.
        let y = array![[1.0_f32, 0.0], [1.0, 0.0], [1.0, 0.0]];

        let mut model = OneVsRestClassifier::new(|| {
            Box::new(PanickingEstimator) as Box<dyn BinaryClassifier<f32>>
        });
        model.fit(x.view(), y.view()).unwrap();
        assert_eq!(model.degenerate_columns(), vec![0, 1]);

        let predictions = model.predict(x.view()).unwrap();
        for r in 0..3 {
            assert_eq!(predictions[[r, 0]], 1.0);
            assert_eq!(predictions[[r, 1]], 0.0);
        }

        let proba = model.predict_proba(x.view()).unwrap();
        for r in 0..3 {
            // One-hot at the recorded class.
            assert_eq!(proba[0][[r, 1]], 1.0);
            assert_eq!(proba[0][[r, 0]], 0.0);
            assert_eq!(proba[1][[r, 0]], 1.0);
            assert_eq!(proba[1][[r, 1]], 0.0);
        }
    }

    #[test]
    fn mixed_columns_fit_real_estimators() {
        let x = array![
            [0.0_f32, 0.0],
            [0.1, 0.1],
            [0.9, 0.9],
            [1.0, 1.0]
        ];
        // Column 0 is learnable, column 1 is degenerate.
        let y = array![
            [0.0_f32, 1.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [1.0, 1.0]
        ];

        let mut model = OneVsRestClassifier::new(|| {
            Box::new(KnnClassifier::new(1, L2Dist)) as Box<dyn BinaryClassifier<f32>>
        });
        model.fit(x.view(), y.view()).unwrap();
        assert_eq!(model.n_outputs(), 2);
        assert_eq!(model.degenerate_columns(), vec![1]);

        let predictions = model.predict(x.view()).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn unfitted_predict_is_an_error() {
        let model: OneVsRestClassifier<f32> = OneVsRestClassifier::new(|| {
            Box::new(KnnClassifier::new(1, L2Dist)) as Box<dyn BinaryClassifier<f32>>
        });
        assert!(matches!(
            model.predict(array![[0.0_f32]].view()),
            Err(MultiOutputError::NotFitted)
        ));
    }

    #[test]
    fn empty_targets_are_rejected() {
        let x = array![[0.0_f32], [1.0]];
        let y = Array2::zeros((2, 0));
        let mut model = OneVsRestClassifier::new(|| {
            Box::new(KnnClassifier::new(1, L2Dist)) as Box<dyn BinaryClassifier<f32>>
        });
        assert!(matches!(
            model.fit(x.view(), y.view()),
            Err(MultiOutputError::EmptyTargets)
        ));
    }
}
