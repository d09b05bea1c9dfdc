use cxr_helpers::{validate_training_set, BinaryClassifier, EstimatorError, Float};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::prelude::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// A linear support vector machine trained with Pegasos-style stochastic
/// sub-gradient descent on the hinge loss.
///
/// Targets are mapped to {-1, +1} internally. The step size decays as
/// `1 / (lambda * t)` over update steps `t`, and example order is
/// reshuffled every epoch from a seeded generator so runs with the same
/// seed are reproducible.
#[derive(Debug, Clone)]
pub struct LinearSvm<F: Float> {
    lambda: F,
    epochs: u32,
    seed: u64,
    weights: Option<Array1<F>>,
    bias: F,
}

impl<F: Float> LinearSvm<F> {
    /// Creates an unfitted model.
    ///
    /// # Arguments
    ///
    /// * `lambda`: Regularisation strength; also controls the step decay.
    /// * `epochs`: Number of passes over the training set.
    /// * `seed`: Seed for the per-epoch shuffling rng.
    pub fn new(lambda: F, epochs: u32, seed: u64) -> Self {
        Self {
            lambda,
            epochs,
            seed,
            weights: None,
            bias: F::zero(),
        }
    }

    /// The signed margin `w . x + b` for each row.
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

fn logistic<F: Float>(z: F) -> F {
    F::one() / (F::one() + (-z).exp())
}

impl<F: Float> BinaryClassifier<F> for LinearSvm<F> {
    fn fit(&mut self, x: ArrayView2<F>, y: ArrayView1<u8>) -> Result<(), EstimatorError> {
        if self.lambda <= F::zero() {
            return Err(EstimatorError::InvalidParameter("lambda must be positive"));
        }
        if self.epochs == 0 {
            return Err(EstimatorError::InvalidParameter("epochs must be nonzero"));
        }
        validate_training_set(x, y)?;

        // {0, 1} targets become {-1, +1} signs.
        let signs: Vec<F> = y
            .iter()
            .map(|&v| if v != 0 { F::one() } else { -F::one() })
            .collect();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..x.nrows()).collect();

        let mut weights: Array1<F> = Array1::zeros(x.ncols());
        let mut bias = F::zero();
        let mut step: u64 = 0;

        for _epoch in 0..self.epochs {
            order.shuffle(&mut rng);

            for &i in &order {
                step += 1;
                let eta = F::one()
                    / (self.lambda * F::from_u64(step).unwrap_or_else(F::one));
                let row = x.row(i);
                let margin = signs[i] * (row.dot(&weights) + bias);

                // Sub-gradient step: shrink always, push only on violation.
                let shrink = F::one() - eta * self.lambda;
                weights.mapv_inplace(|w| w * shrink);
                if margin < F::one() {
                    weights = weights + &row.mapv(|v| v * eta * signs[i]);
                    bias = bias + eta * signs[i];
                }
            }
        }

        self.weights = Some(weights);
        self.bias = bias;
        Ok(())
    }

    fn predict(&self, x: ArrayView2<F>) -> Result<Array1<u8>, EstimatorError> {
        let margins = self.decision(x)?;
        Ok(margins.mapv(|m| u8::from(m >= F::zero())))
    }

    /// Probabilities are a logistic squashing of the signed margin, not a
    /// calibrated Platt fit.
    fn predict_proba(&self, x: ArrayView2<F>) -> Result<Array2<F>, EstimatorError> {
        let margins = self.decision(x)?;
        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, &m) in margins.iter().enumerate() {
            let p1 = logistic(m);
            proba[[i, 0]] = F::one() - p1;
            proba[[i, 1]] = p1;
        }
        Ok(proba)
    }
}
