use cxr_helpers::{validate_training_set, BinaryClassifier, EstimatorError, Float};
use decision_tree::DecisionTreeClassifier;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::seq::index;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// A random forest of CART trees.
///
/// Each tree is grown on a bootstrap resample of the rows and a random
/// subset of roughly sqrt(d) features chosen once per tree (the random
/// subspace method). Probabilities are the average of the per-tree leaf
/// probabilities; the forest rng is seeded so fits are reproducible.
pub struct RandomForestClassifier<F: Float> {
    n_estimators: usize,
    max_depth: usize,
    min_samples_split: usize,
    min_samples_leaf: usize,
    seed: u64,
    trees: Vec<FittedTree<F>>,
    n_features: usize,
}

struct FittedTree<F: Float> {
    features: Vec<usize>,
    tree: DecisionTreeClassifier<F>,
}

impl<F: Float> Default for RandomForestClassifier<F> {
    fn default() -> Self {
        Self::new(100, 10, 2, 1, 0)
    }
}

impl<F: Float> RandomForestClassifier<F> {
    /// Creates an unfitted forest.
    ///
    /// # Arguments
    ///
    /// * `n_estimators`: Number of trees.
    /// * `max_depth`, `min_samples_split`, `min_samples_leaf`: Passed to
    ///   every [`DecisionTreeClassifier`].
    /// * `seed`: Seed for bootstrap and feature sampling.
    pub fn new(
        n_estimators: usize,
        max_depth: usize,
        min_samples_split: usize,
        min_samples_leaf: usize,
        seed: u64,
    ) -> Self {
        Self {
            n_estimators,
            max_depth,
            min_samples_split,
            min_samples_leaf,
            seed,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    /// Copies the sampled rows and feature columns into a dense matrix.
    fn subsample(
        x: ArrayView2<F>,
        y: ArrayView1<u8>,
        rows: &[usize],
        features: &[usize],
    ) -> (Array2<F>, Array1<u8>) {
        let mut sub_x = Array2::zeros((rows.len(), features.len()));
        let mut sub_y = Array1::zeros(rows.len());
        for (r, &i) in rows.iter().enumerate() {
            sub_y[r] = y[i];
            for (c, &j) in features.iter().enumerate() {
                sub_x[[r, c]] = x[[i, j]];
            }
        }
        (sub_x, sub_y)
    }

    fn project(x: ArrayView2<F>, features: &[usize]) -> Array2<F> {
        let mut projected = Array2::zeros((x.nrows(), features.len()));
        for (c, &j) in features.iter().enumerate() {
            for r in 0..x.nrows() {
                projected[[r, c]] = x[[r, j]];
            }
        }
        projected
    }

    fn mean_p1(&self, x: ArrayView2<F>) -> Result<Array1<F>, EstimatorError> {
        if self.trees.is_empty() {
            return Err(EstimatorError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(EstimatorError::DimensionMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }

        let mut acc: Array1<F> = Array1::zeros(x.nrows());
        for fitted in &self.trees {
            let projected = Self::project(x, &fitted.features);
            let proba = fitted.tree.predict_proba(projected.view())?;
            acc = acc + &proba.column(1);
        }
        Ok(acc / F::from_usize(self.trees.len()).unwrap_or_else(F::one))
    }
}

impl<F: Float> BinaryClassifier<F> for RandomForestClassifier<F> {
    fn fit(&mut self, x: ArrayView2<F>, y: ArrayView1<u8>) -> Result<(), EstimatorError> {
        if self.n_estimators == 0 {
            return Err(EstimatorError::InvalidParameter(
                "n_estimators must be nonzero",
            ));
        }
        validate_training_set(x, y)?;

        let n = x.nrows();
        let d = x.ncols();
        let subset = ((d as f64).sqrt().ceil() as usize).clamp(1, d);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);

        self.n_features = d;
        self.trees = Vec::with_capacity(self.n_estimators);

        let mut consecutive_degenerate = 0u32;
        while self.trees.len() < self.n_estimators {
            let rows: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
            let mut features = index::sample(&mut rng, d, subset).into_vec();
            features.sort_unstable();

            let (sub_x, sub_y) = Self::subsample(x, y, &rows, &features);

            // A bootstrap draw can be single-class; resample instead of
            // failing the whole fit.
            let mut tree = DecisionTreeClassifier::new(
                self.max_depth,
                self.min_samples_split,
                self.min_samples_leaf,
            );
            match tree.fit(sub_x.view(), sub_y.view()) {
                Ok(()) => {
                    consecutive_degenerate = 0;
                    self.trees.push(FittedTree { features, tree });
                }
                Err(EstimatorError::SingleClassTraining) => {
                    consecutive_degenerate += 1;
                    if consecutive_degenerate > 1000 {
                        return Err(EstimatorError::SingleClassTraining);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn predict(&self, x: ArrayView2<F>) -> Result<Array1<u8>, EstimatorError> {
        let half = F::from_f64(0.5).unwrap_or_else(F::one);
        let p1 = self.mean_p1(x)?;
        Ok(p1.mapv(|p| u8::from(p >= half)))
    }

    fn predict_proba(&self, x: ArrayView2<F>) -> Result<Array2<F>, EstimatorError> {
        let p1 = self.mean_p1(x)?;
        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, &p) in p1.iter().enumerate() {
            proba[[i, 0]] = F::one() - p;
            proba[[i, 1]] = p;
        }
        Ok(proba)
    }
}
