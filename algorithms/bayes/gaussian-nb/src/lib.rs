use cxr_helpers::{validate_training_set, BinaryClassifier, EstimatorError, Float};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Gaussian naive Bayes for 0/1 targets.
///
/// Each feature is modelled as an independent Gaussian per class. Fitting
/// records per-class priors, means and variances; variances are smoothed
/// by `var_smoothing` times the largest per-feature variance so constant
/// features cannot produce a zero denominator.
#[derive(Debug, Clone)]
pub struct GaussianNb<F: Float> {
    var_smoothing: F,
    classes: Option<[ClassStats<F>; 2]>,
}

#[derive(Debug, Clone)]
struct ClassStats<F: Float> {
    log_prior: F,
    mean: Array1<F>,
    var: Array1<F>,
}

impl<F: Float> Default for GaussianNb<F> {
    fn default() -> Self {
        Self::new(F::from_f64(1e-9).unwrap_or_else(F::zero))
    }
}

impl<F: Float> GaussianNb<F> {
    pub fn new(var_smoothing: F) -> Self {
        Self {
            var_smoothing,
            classes: None,
        }
    }

    /// Per-class joint log likelihood `log P(c) + sum_j log N(x_j; mu, var)`.
    fn joint_log_likelihood(
        &self,
        x: ArrayView2<F>,
    ) -> Result<Array2<F>, EstimatorError> {
        let classes = self.classes.as_ref().ok_or(EstimatorError::NotFitted)?;
        let width = classes[0].mean.len();
        if x.ncols() != width {
            return Err(EstimatorError::DimensionMismatch {
                expected: width,
                actual: x.ncols(),
            });
        }

        let half = F::from_f64(0.5).unwrap_or_else(F::one);
        let two_pi = F::from_f64(std::f64::consts::TAU).unwrap_or_else(F::one);

        let mut jll = Array2::zeros((x.nrows(), 2));
        for (c, stats) in classes.iter().enumerate() {
            for (i, row) in x.rows().into_iter().enumerate() {
                let mut acc = stats.log_prior;
                for j in 0..width {
                    let var = stats.var[j];
                    let diff = row[j] - stats.mean[j];
                    acc = acc - half * ((two_pi * var).ln() + diff * diff / var);
                }
                jll[[i, c]] = acc;
            }
        }
        Ok(jll)
    }
}

fn class_stats<F: Float>(
    x: ArrayView2<F>,
    mask: &[bool],
    count: usize,
    total: usize,
    smoothing: F,
) -> ClassStats<F> {
    let n = F::from_usize(count).unwrap_or_else(F::one);
    let width = x.ncols();

    let mut mean: Array1<F> = Array1::zeros(width);
    for (row, &keep) in x.rows().into_iter().zip(mask) {
        if keep {
            mean = mean + &row;
        }
    }
    mean = mean / n;

    let mut var: Array1<F> = Array1::zeros(width);
    for (row, &keep) in x.rows().into_iter().zip(mask) {
        if keep {
            for j in 0..width {
                let d = row[j] - mean[j];
                var[j] = var[j] + d * d;
            }
        }
    }
    var = var / n + smoothing;

    ClassStats {
        log_prior: (n / F::from_usize(total).unwrap_or_else(F::one)).ln(),
        mean,
        var,
    }
}

impl<F: Float> BinaryClassifier<F> for GaussianNb<F> {
    fn fit(&mut self, x: ArrayView2<F>, y: ArrayView1<u8>) -> Result<(), EstimatorError> {
        validate_training_set(x, y)?;

        // Smoothing floor proportional to the largest overall variance.
        let total = x.nrows();
        let nf = F::from_usize(total).unwrap_or_else(F::one);
        let grand_mean = x.mean_axis(ndarray::Axis(0)).ok_or(EstimatorError::EmptyTrainingSet)?;
        let mut max_var = F::zero();
        for j in 0..x.ncols() {
            let mut v = F::zero();
            for i in 0..total {
                let d = x[[i, j]] - grand_mean[j];
                v = v + d * d;
            }
            v = v / nf;
            if v > max_var {
                max_var = v;
            }
        }
        let smoothing = self.var_smoothing * max_var
            + F::from_f64(1e-12).unwrap_or_else(F::zero);

        let neg_mask: Vec<bool> = y.iter().map(|&v| v == 0).collect();
        let pos_mask: Vec<bool> = y.iter().map(|&v| v != 0).collect();
        let neg_count = neg_mask.iter().filter(|&&m| m).count();
        let pos_count = total - neg_count;

        self.classes = Some([
            class_stats(x, &neg_mask, neg_count, total, smoothing),
            class_stats(x, &pos_mask, pos_count, total, smoothing),
        ]);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<F>) -> Result<Array1<u8>, EstimatorError> {
        let jll = self.joint_log_likelihood(x)?;
        Ok(jll
            .rows()
            .into_iter()
            .map(|row| u8::from(row[1] > row[0]))
            .collect())
    }

    fn predict_proba(&self, x: ArrayView2<F>) -> Result<Array2<F>, EstimatorError> {
        let jll = self.joint_log_likelihood(x)?;
        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, row) in jll.rows().into_iter().enumerate() {
            // Softmax over the two log posteriors, stabilised by the max.
            let m = row[0].max(row[1]);
            let e0 = (row[0] - m).exp();
            let e1 = (row[1] - m).exp();
            proba[[i, 0]] = e0 / (e0 + e1);
            proba[[i, 1]] = e1 / (e0 + e1);
        }
        Ok(proba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use num_traits::Float as _;

    fn blobs() -> (Array2<f64>, Array1<u8>) {
        (
            array![
                [0.0, 0.2],
                [0.1, 0.0],
                [-0.1, 0.1],
                [5.0, 5.2],
                [5.1, 4.9],
                [4.9, 5.0]
            ],
            array![0, 0, 0, 1, 1, 1],
        )
    }

    #[test]
    fn recovers_cluster_membership() {
        let (x, y) = blobs();
        let mut model = GaussianNb::default();
        model.fit(x.view(), y.view()).unwrap();

        let labels = model.predict(array![[0.05, 0.05], [5.0, 5.0]].view()).unwrap();
        assert_eq!(labels, array![0, 1]);
    }

    #[test]
    fn proba_rows_sum_to_one() {
        let (x, y) = blobs();
        let mut model = GaussianNb::default();
        model.fit(x.view(), y.view()).unwrap();

        let proba = model.predict_proba(x.view()).unwrap();
        for row in proba.rows() {
            assert_abs_diff_eq!(row[0] + row[1], 1.0, epsilon = 1e-9);
        }
        assert!(proba[[0, 0]] > 0.99);
        assert!(proba[[3, 1]] > 0.99);
    }

    #[test]
    fn tolerates_constant_features() {
        // Second feature never varies; smoothing must keep it finite.
        let x = array![[0.0, 1.0], [0.1, 1.0], [5.0, 1.0], [5.1, 1.0]];
        let y = array![0_u8, 0, 1, 1];
        let mut model = GaussianNb::default();
        model.fit(x.view(), y.view()).unwrap();

        let proba = model.predict_proba(x.view()).unwrap();
        assert!(proba.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn error_on_single_class() {
        let x = array![[1.0], [2.0]];
        let y = array![0_u8, 0];
        let mut model = GaussianNb::default();
        assert_eq!(
            model.fit(x.view(), y.view()),
            Err(EstimatorError::SingleClassTraining)
        );
    }

    #[test]
    fn error_on_unfitted_predict() {
        let model: GaussianNb<f64> = GaussianNb::default();
        assert_eq!(
            model.predict(array![[0.0]].view()),
            Err(EstimatorError::NotFitted)
        );
    }
}
