use cxr_helpers::{validate_training_set, BinaryClassifier, EstimatorError, Float};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// A CART-style binary decision tree with Gini impurity splits.
///
/// Splits are exhaustive: every feature is scanned, candidate thresholds
/// are midpoints between consecutive distinct sorted values, and the
/// split with the lowest weighted Gini impurity wins. Leaves store the
/// positive-class fraction of the training rows they received, which is
/// what `predict_proba` reports.
#[derive(Debug, Clone)]
pub struct DecisionTreeClassifier<F: Float> {
    max_depth: usize,
    min_samples_split: usize,
    min_samples_leaf: usize,
    root: Option<Node<F>>,
    n_features: usize,
}

#[derive(Debug, Clone)]
enum Node<F: Float> {
    Leaf {
        p1: F,
    },
    Split {
        feature: usize,
        threshold: F,
        left: Box<Node<F>>,
        right: Box<Node<F>>,
    },
}

/// The best split found for one node, if any.
struct Split<F> {
    feature: usize,
    threshold: F,
    impurity: F,
}

impl<F: Float> Default for DecisionTreeClassifier<F> {
    fn default() -> Self {
        Self::new(10, 2, 1)
    }
}

impl<F: Float> DecisionTreeClassifier<F> {
    /// Creates an unfitted tree.
    ///
    /// # Arguments
    ///
    /// * `max_depth`: Maximum tree depth; depth 0 means a single leaf.
    /// * `min_samples_split`: Minimum rows a node needs to be considered
    ///   for splitting.
    /// * `min_samples_leaf`: Minimum rows each child of a split must keep.
    pub fn new(max_depth: usize, min_samples_split: usize, min_samples_leaf: usize) -> Self {
        Self {
            max_depth,
            min_samples_split,
            min_samples_leaf,
            root: None,
            n_features: 0,
        }
    }

    fn grow(
        &self,
        x: ArrayView2<F>,
        y: ArrayView1<u8>,
        indices: &[usize],
        depth: usize,
    ) -> Node<F> {
        let positives = indices.iter().filter(|&&i| y[i] != 0).count();
        let p1 = F::from_usize(positives).unwrap_or_else(F::zero)
            / F::from_usize(indices.len()).unwrap_or_else(F::one);

        let pure = positives == 0 || positives == indices.len();
        if pure || depth >= self.max_depth || indices.len() < self.min_samples_split {
            return Node::Leaf { p1 };
        }

        let split = match self.best_split(x, y, indices) {
            Some(split) => split,
            None => return Node::Leaf { p1 },
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| x[[i, split.feature]] <= split.threshold);

        if left_idx.len() < self.min_samples_leaf || right_idx.len() < self.min_samples_leaf {
            return Node::Leaf { p1 };
        }

        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.grow(x, y, &left_idx, depth + 1)),
            right: Box::new(self.grow(x, y, &right_idx, depth + 1)),
        }
    }

    /// Scans every feature for the threshold with the lowest weighted
    /// Gini impurity. Returns `None` when no candidate separates the rows.
    fn best_split(&self, x: ArrayView2<F>, y: ArrayView1<u8>, indices: &[usize]) -> Option<Split<F>> {
        let n = indices.len();
        let nf = F::from_usize(n).unwrap_or_else(F::one);
        let total_pos = indices.iter().filter(|&&i| y[i] != 0).count();
        let mut best: Option<Split<F>> = None;

        for feature in 0..x.ncols() {
            // Sort this node's rows by the feature value.
            let mut order: Vec<usize> = indices.to_vec();
            order.sort_unstable_by(|&a, &b| {
                x[[a, feature]]
                    .partial_cmp(&x[[b, feature]])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            // Prefix scan: after position i, rows order[..=i] go left.
            let mut left_pos = 0usize;
            for i in 0..n - 1 {
                if y[order[i]] != 0 {
                    left_pos += 1;
                }
                let a = x[[order[i], feature]];
                let b = x[[order[i + 1], feature]];
                if a == b {
                    continue;
                }

                let left_n = i + 1;
                let right_n = n - left_n;
                let right_pos = total_pos - left_pos;

                let gini = |count: usize, pos: usize| {
                    let c = F::from_usize(count).unwrap_or_else(F::one);
                    let p = F::from_usize(pos).unwrap_or_else(F::zero) / c;
                    let q = F::one() - p;
                    F::one() - p * p - q * q
                };
                let weighted = (F::from_usize(left_n).unwrap_or_else(F::zero)
                    * gini(left_n, left_pos)
                    + F::from_usize(right_n).unwrap_or_else(F::zero)
                        * gini(right_n, right_pos))
                    / nf;

                let improves = match &best {
                    Some(current) => weighted < current.impurity,
                    None => true,
                };
                if improves {
                    let two = F::one() + F::one();
                    best = Some(Split {
                        feature,
                        threshold: (a + b) / two,
                        impurity: weighted,
                    });
                }
            }
        }
        best
    }

    fn leaf_p1(&self, row: ArrayView1<F>) -> Result<F, EstimatorError> {
        let mut node = self.root.as_ref().ok_or(EstimatorError::NotFitted)?;
        if row.len() != self.n_features {
            return Err(EstimatorError::DimensionMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        loop {
            match node {
                Node::Leaf { p1 } => return Ok(*p1),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

impl<F: Float> BinaryClassifier<F> for DecisionTreeClassifier<F> {
    fn fit(&mut self, x: ArrayView2<F>, y: ArrayView1<u8>) -> Result<(), EstimatorError> {
        if self.min_samples_leaf == 0 {
            return Err(EstimatorError::InvalidParameter(
                "min_samples_leaf must be nonzero",
            ));
        }
        validate_training_set(x, y)?;

        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.n_features = x.ncols();
        self.root = Some(self.grow(x, y, &indices, 0));
        Ok(())
    }

    fn predict(&self, x: ArrayView2<F>) -> Result<Array1<u8>, EstimatorError> {
        let half = F::from_f64(0.5).unwrap_or_else(F::one);
        let mut labels = Vec::with_capacity(x.nrows());
        for row in x.rows() {
            labels.push(u8::from(self.leaf_p1(row)? >= half));
        }
        Ok(Array1::from_vec(labels))
    }

    fn predict_proba(&self, x: ArrayView2<F>) -> Result<Array2<F>, EstimatorError> {
        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, row) in x.rows().into_iter().enumerate() {
            let p1 = self.leaf_p1(row)?;
            proba[[i, 0]] = F::one() - p1;
            proba[[i, 1]] = p1;
        }
        Ok(proba)
    }
}
