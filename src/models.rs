//! The classifier registry: maps a configured [`ClassifierKind`] to a
//! one-vs-rest wrapper around the matching estimator factory.

use adaboost::AdaBoostClassifier;
use cxr_helpers::{BinaryClassifier, EstimatorError, L2Dist};
use decision_tree::DecisionTreeClassifier;
use gaussian_nb::GaussianNb;
use k_nn::KnnClassifier;
use linear_svm::LinearSvm;
use logistic::LogisticRegression;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use random_forest::RandomForestClassifier;

use crate::config::ClassifierKind;
use crate::multioutput::OneVsRestClassifier;

/// Neighbours consulted by the k-NN estimator.
const KNN_NEIGHBOURS: usize = 5;
/// Trees in the random forest.
const FOREST_SIZE: usize = 100;
/// Depth limit shared by the tree-based estimators.
const TREE_DEPTH: usize = 10;
/// Boosting rounds for AdaBoost.
const BOOST_ROUNDS: usize = 50;
/// SVM regularisation strength and epoch count.
const SVM_LAMBDA: f32 = 1e-4;
const SVM_EPOCHS: u32 = 20;

/// The all-negative reference model: every pathology scored absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroBaseline;

impl BinaryClassifier<f32> for ZeroBaseline {
    fn fit(&mut self, _x: ArrayView2<f32>, _y: ArrayView1<u8>) -> Result<(), EstimatorError> {
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f32>) -> Result<Array1<u8>, EstimatorError> {
        Ok(Array1::zeros(x.nrows()))
    }

    fn predict_proba(&self, x: ArrayView2<f32>) -> Result<Array2<f32>, EstimatorError> {
        let mut proba = Array2::zeros((x.nrows(), 2));
        proba.column_mut(0).fill(1.0);
        Ok(proba)
    }
}

/// Builds the one-vs-rest classifier for a configured kind.
///
/// The seed reaches the stochastic estimators (SVM epoch shuffling,
/// forest bootstrap draws); the rest ignore it. Each label column gets a
/// fresh estimator from the factory, all sharing the same seed so a run
/// is reproducible end to end.
pub fn build_classifier(kind: ClassifierKind, seed: u64) -> OneVsRestClassifier<f32> {
    match kind {
        ClassifierKind::Baseline => OneVsRestClassifier::new(|| {
            Box::new(ZeroBaseline) as Box<dyn BinaryClassifier<f32>>
        }),
        ClassifierKind::Logistic => OneVsRestClassifier::new(|| {
            Box::new(LogisticRegression::default()) as Box<dyn BinaryClassifier<f32>>
        }),
        ClassifierKind::LinearSvm => OneVsRestClassifier::new(move || {
            Box::new(LinearSvm::new(SVM_LAMBDA, SVM_EPOCHS, seed))
                as Box<dyn BinaryClassifier<f32>>
        }),
        ClassifierKind::KNearest => OneVsRestClassifier::new(|| {
            Box::new(KnnClassifier::new(KNN_NEIGHBOURS, L2Dist))
                as Box<dyn BinaryClassifier<f32>>
        }),
        ClassifierKind::DecisionTree => OneVsRestClassifier::new(|| {
            Box::new(DecisionTreeClassifier::new(TREE_DEPTH, 2, 1))
                as Box<dyn BinaryClassifier<f32>>
        }),
        ClassifierKind::RandomForest => OneVsRestClassifier::new(move || {
            Box::new(RandomForestClassifier::new(FOREST_SIZE, TREE_DEPTH, 2, 1, seed))
                as Box<dyn BinaryClassifier<f32>>
        }),
        ClassifierKind::AdaBoost => OneVsRestClassifier::new(|| {
            Box::new(AdaBoostClassifier::new(BOOST_ROUNDS)) as Box<dyn BinaryClassifier<f32>>
        }),
        ClassifierKind::GaussianNb => OneVsRestClassifier::new(|| {
            Box::new(GaussianNb::default()) as Box<dyn BinaryClassifier<f32>>
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy_problem() -> (Array2<f32>, Array2<f32>) {
        // Two learnable columns plus one degenerate all-zero column.
        let x = array![
            [0.0_f32, 0.0],
            [0.2, 0.1],
            [0.1, 0.2],
            [0.9, 1.0],
            [1.0, 0.9],
            [0.8, 0.8]
        ];
        let y = array![
            [0.0_f32, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0]
        ];
        (x, y)
    }

    #[test]
    fn every_kind_fits_and_predicts() {
        let (x, y) = toy_problem();
        for kind in [
            ClassifierKind::Baseline,
            ClassifierKind::Logistic,
            ClassifierKind::LinearSvm,
            ClassifierKind::KNearest,
            ClassifierKind::DecisionTree,
            ClassifierKind::RandomForest,
            ClassifierKind::AdaBoost,
            ClassifierKind::GaussianNb,
        ] {
            let mut model = build_classifier(kind, 20);
            model.fit(x.view(), y.view()).unwrap();
            let predictions = model.predict(x.view()).unwrap();
            assert_eq!(predictions.dim(), (6, 3), "kind {}", kind);

            // The degenerate third column always predicts its lone class.
            for r in 0..6 {
                assert_eq!(predictions[[r, 2]], 0.0, "kind {}", kind);
            }
            assert_eq!(model.degenerate_columns(), vec![2], "kind {}", kind);

            let proba = model.predict_proba(x.view()).unwrap();
            assert_eq!(proba.len(), 3, "kind {}", kind);
            assert_eq!(proba[0].dim(), (6, 2), "kind {}", kind);
        }
    }

    #[test]
    fn baseline_predicts_all_zeros() {
        let (x, y) = toy_problem();
        let mut model = build_classifier(ClassifierKind::Baseline, 0);
        model.fit(x.view(), y.view()).unwrap();
        let predictions = model.predict(x.view()).unwrap();
        assert!(predictions.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn non_baseline_models_learn_the_toy_problem() {
        let (x, y) = toy_problem();
        for kind in [
            ClassifierKind::Logistic,
            ClassifierKind::KNearest,
            ClassifierKind::DecisionTree,
            ClassifierKind::RandomForest,
            ClassifierKind::AdaBoost,
            ClassifierKind::GaussianNb,
        ] {
            let mut model = build_classifier(kind, 20);
            model.fit(x.view(), y.view()).unwrap();
            let predictions = model.predict(x.view()).unwrap();
            for r in 0..6 {
                assert_eq!(predictions[[r, 0]], y[[r, 0]], "kind {}", kind);
                assert_eq!(predictions[[r, 1]], y[[r, 1]], "kind {}", kind);
            }
        }
    }
}
