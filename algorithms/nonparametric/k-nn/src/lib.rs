use std::cmp::Ordering;

// Core components from the shared library.
use cxr_helpers::{validate_training_set, BinaryClassifier, Distance, EstimatorError, Float};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// A k-Nearest Neighbours classifier over 0/1 targets.
///
/// Prediction finds the `k` training rows closest to a query row (under
/// the configured distance metric) and votes among their labels. The
/// positive-class probability is the fraction of neighbours labelled 1;
/// an exactly split vote is broken by the label of the single nearest
/// neighbour.
///
/// # Type Parameters
///
/// * `F`: The float type for the features (e.g., `f32`, `f64`).
/// * `D`: The distance metric, which must implement the `Distance` trait.
#[derive(Debug, Clone)]
pub struct KnnClassifier<F, D>
where
    F: Float,
    D: Distance<F>,
{
    k: usize,
    distance: D,
    train_x: Option<Array2<F>>,
    train_y: Option<Array1<u8>>,
}

impl<F, D> KnnClassifier<F, D>
where
    F: Float,
    D: Distance<F>,
{
    /// Creates a new k-NN classifier.
    ///
    /// # Arguments
    ///
    /// * `k`: The number of neighbours to consult. A zero `k` is rejected
    ///   at fit time with [`EstimatorError::InvalidParameter`].
    /// * `distance`: An instance of a struct that implements the
    ///   `Distance` trait (e.g., `L2Dist`).
    pub fn new(k: usize, distance: D) -> Self {
        Self {
            k,
            distance,
            train_x: None,
            train_y: None,
        }
    }

    /// Sorted (reduced distance, label) pairs from a query row to every
    /// training row, nearest first.
    fn ranked_neighbours(
        &self,
        train_x: &Array2<F>,
        train_y: &Array1<u8>,
        query: ArrayView1<F>,
    ) -> Vec<(F, u8)> {
        let mut distances: Vec<(F, u8)> = train_x
            .rows()
            .into_iter()
            .zip(train_y.iter())
            .map(|(row, &label)| (self.distance.rdistance(row, query), label))
            .collect();

        // Floats have no total order; NaN pairs compare as equal, which
        // keeps the sort stable enough for voting.
        distances.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        distances
    }

    /// The positive-class vote fraction and hard label for one query row.
    fn vote(&self, train_x: &Array2<F>, train_y: &Array1<u8>, query: ArrayView1<F>) -> (F, u8) {
        let ranked = self.ranked_neighbours(train_x, train_y, query);

        // `min` handles k larger than the training set.
        let num_neighbours = self.k.min(ranked.len());
        let neighbours = &ranked[..num_neighbours];

        let positives = neighbours.iter().filter(|(_, label)| *label != 0).count();
        let p1 = F::from_usize(positives).unwrap_or_else(F::zero)
            / F::from_usize(num_neighbours).unwrap_or_else(F::one);

        let half = F::from_f64(0.5).unwrap_or_else(F::one);
        let hard = match p1.partial_cmp(&half) {
            Some(Ordering::Greater) => 1,
            Some(Ordering::Less) => 0,
            // Even split: fall back to the nearest neighbour's label.
            _ => neighbours[0].1,
        };
        (p1, hard)
    }

    fn fitted(&self) -> Result<(&Array2<F>, &Array1<u8>), EstimatorError> {
        match (self.train_x.as_ref(), self.train_y.as_ref()) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(EstimatorError::NotFitted),
        }
    }

    fn check_width(&self, expected: usize, x: ArrayView2<F>) -> Result<(), EstimatorError> {
        if x.ncols() != expected {
            return Err(EstimatorError::DimensionMismatch {
                expected,
                actual: x.ncols(),
            });
        }
        Ok(())
    }
}

impl<F, D> BinaryClassifier<F> for KnnClassifier<F, D>
where
    F: Float,
    D: Distance<F>,
{
    fn fit(&mut self, x: ArrayView2<F>, y: ArrayView1<u8>) -> Result<(), EstimatorError> {
        if self.k == 0 {
            return Err(EstimatorError::InvalidParameter(
                "k cannot be zero for a k-NN classifier",
            ));
        }
        validate_training_set(x, y)?;
        self.train_x = Some(x.to_owned());
        self.train_y = Some(y.to_owned());
        Ok(())
    }

    fn predict(&self, x: ArrayView2<F>) -> Result<Array1<u8>, EstimatorError> {
        let (train_x, train_y) = self.fitted()?;
        self.check_width(train_x.ncols(), x)?;

        let labels: Vec<u8> = x
            .rows()
            .into_iter()
            .map(|row| self.vote(train_x, train_y, row).1)
            .collect();
        Ok(Array1::from_vec(labels))
    }

    fn predict_proba(&self, x: ArrayView2<F>) -> Result<Array2<F>, EstimatorError> {
        let (train_x, train_y) = self.fitted()?;
        self.check_width(train_x.ncols(), x)?;

        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, row) in x.rows().into_iter().enumerate() {
            let (p1, _) = self.vote(train_x, train_y, row);
            proba[[i, 0]] = F::one() - p1;
            proba[[i, 1]] = p1;
        }
        Ok(proba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use cxr_helpers::L2Dist;
    use ndarray::array;

    fn two_blobs() -> (Array2<f64>, Array1<u8>) {
        (
            array![
                [1.0, 1.0],
                [2.0, 2.0],
                [1.0, 2.0],
                [8.0, 8.0],
                [9.0, 8.0],
                [8.0, 9.0]
            ],
            array![0, 0, 0, 1, 1, 1],
        )
    }

    #[test]
    fn classifies_simple_blobs() {
        let (x, y) = two_blobs();
        let mut classifier = KnnClassifier::new(3, L2Dist);
        classifier.fit(x.view(), y.view()).unwrap();

        let queries = array![[2.5, 2.5], [7.5, 8.5]];
        let labels = classifier.predict(queries.view()).unwrap();
        assert_eq!(labels, array![0, 1]);
    }

    #[test]
    fn proba_is_vote_fraction() {
        let (x, y) = two_blobs();
        let mut classifier = KnnClassifier::new(3, L2Dist);
        classifier.fit(x.view(), y.view()).unwrap();

        let queries = array![[1.5, 1.5]];
        let proba = classifier.predict_proba(queries.view()).unwrap();
        assert_abs_diff_eq!(proba[[0, 0]], 1.0);
        assert_abs_diff_eq!(proba[[0, 1]], 0.0);
    }

    #[test]
    fn k_larger_than_dataset_still_votes() {
        let x = array![[1.0], [2.0], [10.0]];
        let y = array![0_u8, 0, 1];

        // k=5 exceeds the dataset size of 3; the two zeros outvote the one.
        let mut classifier = KnnClassifier::new(5, L2Dist);
        classifier.fit(x.view(), y.view()).unwrap();
        let labels = classifier.predict(array![[3.0]].view()).unwrap();
        assert_eq!(labels, array![0]);
    }

    #[test]
    fn even_split_falls_back_to_nearest() {
        let x = array![[0.0], [1.0]];
        let y = array![1_u8, 0];
        let mut classifier = KnnClassifier::new(2, L2Dist);
        classifier.fit(x.view(), y.view()).unwrap();

        let labels = classifier.predict(array![[0.1]].view()).unwrap();
        assert_eq!(labels, array![1]);
    }

    #[test]
    fn error_on_k_zero() {
        let (x, y) = two_blobs();
        let mut classifier = KnnClassifier::new(0, L2Dist);
        assert_eq!(
            classifier.fit(x.view(), y.view()),
            Err(EstimatorError::InvalidParameter(
                "k cannot be zero for a k-NN classifier"
            ))
        );
    }

    #[test]
    fn error_on_unfitted_predict() {
        let classifier: KnnClassifier<f64, L2Dist> = KnnClassifier::new(3, L2Dist);
        let result = classifier.predict(array![[1.0, 1.0]].view());
        assert_eq!(result, Err(EstimatorError::NotFitted));
    }

    #[test]
    fn error_on_single_class_fit() {
        let x = array![[1.0], [2.0]];
        let y = array![1_u8, 1];
        let mut classifier = KnnClassifier::new(1, L2Dist);
        assert_eq!(
            classifier.fit(x.view(), y.view()),
            Err(EstimatorError::SingleClassTraining)
        );
    }

    #[test]
    fn error_on_query_width_mismatch() {
        let (x, y) = two_blobs();
        let mut classifier = KnnClassifier::new(3, L2Dist);
        classifier.fit(x.view(), y.view()).unwrap();
        let result = classifier.predict(array![[1.0, 2.0, 3.0]].view());
        assert_eq!(
            result,
            Err(EstimatorError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
    }
}
