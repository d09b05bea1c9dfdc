use cxr_helpers::{validate_training_set, BinaryClassifier, EstimatorError, Float};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// AdaBoost over axis-aligned decision stumps.
///
/// Each round fits the stump with the lowest weighted error (exhaustive
/// threshold search per feature, both polarities), then reweights the
/// training rows toward the mistakes. Boosting stops early when a stump
/// is no better than chance or classifies the weighted set perfectly.
#[derive(Debug, Clone)]
pub struct AdaBoostClassifier<F: Float> {
    n_estimators: usize,
    stumps: Vec<WeightedStump<F>>,
}

#[derive(Debug, Clone)]
struct WeightedStump<F> {
    alpha: F,
    feature: usize,
    threshold: F,
    /// +1 predicts the positive class above the threshold, -1 below it.
    polarity: i8,
}

impl<F: Float> WeightedStump<F> {
    /// The stump's {-1, +1} output for one row.
    fn sign(&self, row: ArrayView1<F>) -> F {
        let above = row[self.feature] > self.threshold;
        let positive = if self.polarity >= 0 { above } else { !above };
        if positive { F::one() } else { -F::one() }
    }
}

impl<F: Float> Default for AdaBoostClassifier<F> {
    fn default() -> Self {
        Self::new(50)
    }
}

impl<F: Float> AdaBoostClassifier<F> {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            stumps: Vec::new(),
        }
    }

    /// The aggregated margin `sum_t alpha_t * h_t(x)` for each row.
    fn margins(&self, x: ArrayView2<F>) -> Result<Array1<F>, EstimatorError> {
        if self.stumps.is_empty() {
            return Err(EstimatorError::NotFitted);
        }
        let mut margins: Array1<F> = Array1::zeros(x.nrows());
        for stump in &self.stumps {
            if stump.feature >= x.ncols() {
                return Err(EstimatorError::DimensionMismatch {
                    expected: stump.feature + 1,
                    actual: x.ncols(),
                });
            }
            for (i, row) in x.rows().into_iter().enumerate() {
                margins[i] = margins[i] + stump.alpha * stump.sign(row);
            }
        }
        Ok(margins)
    }
}

/// Finds the stump minimising the weighted error on {-1, +1} signs.
fn best_stump<F: Float>(
    x: ArrayView2<F>,
    signs: &[F],
    weights: &Array1<F>,
) -> (WeightedStump<F>, F) {
    let n = x.nrows();
    let mut best = WeightedStump {
        alpha: F::zero(),
        feature: 0,
        threshold: F::zero(),
        polarity: 1,
    };
    let mut best_err = F::infinity();

    for feature in 0..x.ncols() {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_unstable_by(|&a, &b| {
            x[[a, feature]]
                .partial_cmp(&x[[b, feature]])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // err(+1, t) = sum of weights misclassified when predicting
        // positive above t. Walking the sorted rows keeps it incremental:
        // start with everything above the lowest threshold.
        let mut err_pos: F = (0..n)
            .map(|i| {
                if signs[i] > F::zero() {
                    F::zero()
                } else {
                    weights[i]
                }
            })
            .sum();

        for w in 0..n {
            let i = order[w];
            // Row i drops below the threshold; its contribution flips.
            if signs[i] > F::zero() {
                err_pos = err_pos + weights[i];
            } else {
                err_pos = err_pos - weights[i];
            }

            if w + 1 < n && x[[order[w], feature]] == x[[order[w + 1], feature]] {
                continue;
            }
            let threshold = if w + 1 < n {
                let two = F::one() + F::one();
                (x[[order[w], feature]] + x[[order[w + 1], feature]]) / two
            } else {
                x[[order[w], feature]]
            };

            let err_neg = F::one() - err_pos;
            for (polarity, err) in [(1_i8, err_pos), (-1, err_neg)] {
                if err < best_err {
                    best_err = err;
                    best = WeightedStump {
                        alpha: F::zero(),
                        feature,
                        threshold,
                        polarity,
                    };
                }
            }
        }
    }
    (best, best_err)
}

impl<F: Float> BinaryClassifier<F> for AdaBoostClassifier<F> {
    fn fit(&mut self, x: ArrayView2<F>, y: ArrayView1<u8>) -> Result<(), EstimatorError> {
        if self.n_estimators == 0 {
            return Err(EstimatorError::InvalidParameter(
                "n_estimators must be nonzero",
            ));
        }
        validate_training_set(x, y)?;

        let n = x.nrows();
        let signs: Vec<F> = y
            .iter()
            .map(|&v| if v != 0 { F::one() } else { -F::one() })
            .collect();

        let uniform = F::one() / F::from_usize(n).unwrap_or_else(F::one);
        let mut weights: Array1<F> = Array1::from_elem(n, uniform);
        let half = F::from_f64(0.5).unwrap_or_else(F::one);
        let eps = F::from_f64(1e-12).unwrap_or_else(F::zero);

        self.stumps = Vec::new();
        for _round in 0..self.n_estimators {
            let (mut stump, err) = best_stump(x, &signs, &weights);

            // No better than chance: boosting cannot make progress.
            if err >= half {
                break;
            }
            let bounded = err.max(eps);
            let alpha = half * ((F::one() - bounded) / bounded).ln();
            stump.alpha = alpha;

            // Reweight toward the mistakes and renormalise.
            for i in 0..n {
                let agreement = signs[i] * stump.sign(x.row(i));
                weights[i] = weights[i] * (-alpha * agreement).exp();
            }
            let total: F = weights.sum();
            weights = weights / total;

            let perfect = err <= eps;
            self.stumps.push(stump);
            if perfect {
                break;
            }
        }

        if self.stumps.is_empty() {
            // Even the best stump was at chance level; keep it anyway so
            // predict has something to vote with.
            let (mut stump, _) = best_stump(x, &signs, &weights);
            stump.alpha = eps;
            self.stumps.push(stump);
        }
        Ok(())
    }

    fn predict(&self, x: ArrayView2<F>) -> Result<Array1<u8>, EstimatorError> {
        let margins = self.margins(x)?;
        Ok(margins.mapv(|m| u8::from(m >= F::zero())))
    }

    /// Probabilities are a logistic squashing of the aggregated margin.
    fn predict_proba(&self, x: ArrayView2<F>) -> Result<Array2<F>, EstimatorError> {
        let margins = self.margins(x)?;
        let two = F::one() + F::one();
        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, &m) in margins.iter().enumerate() {
            let p1 = F::one() / (F::one() + (-two * m).exp());
            proba[[i, 0]] = F::one() - p1;
            proba[[i, 1]] = p1;
        }
        Ok(proba)
    }
}
