use cxr_helpers::{validate_training_set, BinaryClassifier, EstimatorError, Float};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Binary logistic regression trained by batch gradient descent.
///
/// The model minimises the L2-regularised negative log-likelihood. Descent
/// stops when the gradient norm drops below `tol` or after `max_iter`
/// passes over the data.
#[derive(Debug, Clone)]
pub struct LogisticRegression<F: Float> {
    learning_rate: F,
    l2: F,
    max_iter: u32,
    tol: F,
    weights: Option<Array1<F>>,
    bias: F,
}

impl<F: Float> Default for LogisticRegression<F> {
    fn default() -> Self {
        Self::new(
            F::from_f64(0.1).unwrap_or_else(F::one),
            F::from_f64(1e-4).unwrap_or_else(F::zero),
            500,
            F::from_f64(1e-6).unwrap_or_else(F::zero),
        )
    }
}

impl<F: Float> LogisticRegression<F> {
    /// Creates an unfitted model.
    ///
    /// # Arguments
    ///
    /// * `learning_rate`: Gradient descent step size.
    /// * `l2`: L2 regularisation strength applied to the weights (not the
    ///   bias).
    /// * `max_iter`: Maximum number of full-batch descent steps.
    /// * `tol`: Convergence threshold on the gradient L2 norm.
    pub fn new(learning_rate: F, l2: F, max_iter: u32, tol: F) -> Self {
        Self {
            learning_rate,
            l2,
            max_iter,
            tol,
            weights: None,
            bias: F::zero(),
        }
    }

    /// The decision value `w . x + b` for each row.
    fn decision(&self, x: ArrayView2<F>) -> Result<Array1<F>, EstimatorError> {
        let weights = self.weights.as_ref().ok_or(EstimatorError::NotFitted)?;
        if x.ncols() != weights.len() {
            return Err(EstimatorError::DimensionMismatch {
                expected: weights.len(),
                actual: x.ncols(),
            });
        }
        Ok(x.dot(weights) + self.bias)
    }
}

fn sigmoid<F: Float>(z: F) -> F {
    F::one() / (F::one() + (-z).exp())
}

impl<F: Float> BinaryClassifier<F> for LogisticRegression<F> {
    fn fit(&mut self, x: ArrayView2<F>, y: ArrayView1<u8>) -> Result<(), EstimatorError> {
        if self.learning_rate <= F::zero() {
            return Err(EstimatorError::InvalidParameter(
                "learning rate must be positive",
            ));
        }
        validate_training_set(x, y)?;

        let n = F::from_usize(x.nrows()).unwrap_or_else(F::one);
        let targets: Array1<F> = y
            .iter()
            .map(|&v| if v != 0 { F::one() } else { F::zero() })
            .collect();

        let mut weights: Array1<F> = Array1::zeros(x.ncols());
        let mut bias = F::zero();

        for _ in 0..self.max_iter {
            let z = x.dot(&weights) + bias;
            let probs = z.mapv(sigmoid);
            let residual = &probs - &targets;

            // Average gradient plus the ridge term on the weights.
            let mut grad_w = x.t().dot(&residual) / n;
            grad_w = grad_w + &weights * self.l2;
            let grad_b = residual.sum() / n;

            let grad_norm = (grad_w.dot(&grad_w) + grad_b * grad_b).sqrt();
            weights = weights - &grad_w * self.learning_rate;
            bias = bias - grad_b * self.learning_rate;

            if grad_norm < self.tol {
                break;
            }
        }

        self.weights = Some(weights);
        self.bias = bias;
        Ok(())
    }

    fn predict(&self, x: ArrayView2<F>) -> Result<Array1<u8>, EstimatorError> {
        let z = self.decision(x)?;
        Ok(z.mapv(|v| u8::from(v >= F::zero())))
    }

    fn predict_proba(&self, x: ArrayView2<F>) -> Result<Array2<F>, EstimatorError> {
        let z = self.decision(x)?;
        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, &zi) in z.iter().enumerate() {
            let p1 = sigmoid(zi);
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
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<u8>) {
        (
            array![
                [-2.0, -1.5],
                [-1.5, -2.0],
                [-2.5, -2.5],
                [2.0, 1.5],
                [1.5, 2.0],
                [2.5, 2.5]
            ],
            array![0, 0, 0, 1, 1, 1],
        )
    }

    #[test]
    fn separates_two_blobs() {
        let (x, y) = separable();
        let mut model = LogisticRegression::default();
        model.fit(x.view(), y.view()).unwrap();

        let labels = model.predict(x.view()).unwrap();
        assert_eq!(labels, array![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn proba_rows_sum_to_one() {
        let (x, y) = separable();
        let mut model = LogisticRegression::default();
        model.fit(x.view(), y.view()).unwrap();

        let proba = model.predict_proba(x.view()).unwrap();
        for row in proba.rows() {
            assert_abs_diff_eq!(row[0] + row[1], 1.0, epsilon = 1e-9);
        }
        // Confident on the far positive example.
        assert!(proba[[5, 1]] > 0.9);
    }

    #[test]
    fn error_on_single_class() {
        let x = array![[1.0], [2.0]];
        let y = array![1_u8, 1];
        let mut model = LogisticRegression::default();
        assert_eq!(
            model.fit(x.view(), y.view()),
            Err(EstimatorError::SingleClassTraining)
        );
    }

    #[test]
    fn error_on_unfitted_predict() {
        let model: LogisticRegression<f64> = LogisticRegression::default();
        assert_eq!(
            model.predict(array![[0.0]].view()),
            Err(EstimatorError::NotFitted)
        );
    }

    #[test]
    fn error_on_width_mismatch() {
        let (x, y) = separable();
        let mut model = LogisticRegression::default();
        model.fit(x.view(), y.view()).unwrap();
        assert_eq!(
            model.predict(array![[1.0]].view()),
            Err(EstimatorError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn error_on_nonpositive_learning_rate() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new(0.0, 0.0, 10, 1e-6);
        assert_eq!(
            model.fit(x.view(), y.view()),
            Err(EstimatorError::InvalidParameter(
                "learning rate must be positive"
            ))
        );
    }
}
