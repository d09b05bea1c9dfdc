//! Principal component analysis via the snapshot method: the eigenvectors
//! of the small samples-by-samples Gram matrix give the principal axes
//! without ever forming the features-by-features covariance.

use std::error::Error;
use std::fmt::{Display, Formatter};

use cxr_helpers::Float;
use ndarray::{Array1, Array2, ArrayView2, Axis};

#[derive(Debug, Clone, PartialEq)]
pub enum PcaError {
    NotFitted,
    EmptyInput,
    /// Transform input width differs from the fitted width.
    DimensionMismatch { expected: usize, actual: usize },
    InvalidComponents,
}

impl Display for PcaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PcaError::NotFitted => write!(f, "pca has not been fitted"),
            PcaError::EmptyInput => write!(f, "cannot fit pca on an empty matrix"),
            PcaError::DimensionMismatch { expected, actual } => {
                write!(f, "expected {} features, got {}", expected, actual)
            }
            PcaError::InvalidComponents => write!(f, "component count must be nonzero"),
        }
    }
}

impl Error for PcaError {}

/// PCA projection onto the leading principal components.
///
/// The retained component count is the minimum of the requested count,
/// the sample count and the feature count; trailing components whose
/// eigenvalue is numerically zero are dropped as well.
#[derive(Debug, Clone)]
pub struct Pca<F: Float> {
    n_components: usize,
    mean: Option<Array1<F>>,
    /// Row-major components, one unit-norm principal axis per row.
    components: Option<Array2<F>>,
    explained_variance: Option<Array1<F>>,
}

impl<F: Float> Pca<F> {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            mean: None,
            components: None,
            explained_variance: None,
        }
    }

    /// Learns the mean and principal axes of `x`.
    ///
    /// # Errors
    ///
    /// Returns [`PcaError::EmptyInput`] for a matrix without rows or
    /// columns and [`PcaError::InvalidComponents`] for a zero request.
    pub fn fit(&mut self, x: ArrayView2<F>) -> Result<(), PcaError> {
        if self.n_components == 0 {
            return Err(PcaError::InvalidComponents);
        }
        let (n, d) = x.dim();
        if n == 0 || d == 0 {
            return Err(PcaError::EmptyInput);
        }

        let mean = x.mean_axis(Axis(0)).ok_or(PcaError::EmptyInput)?;
        let centred = &x - &mean;

        // Snapshot trick: eigendecompose the n-by-n Gram matrix.
        let gram = centred.dot(&centred.t());
        let (eigenvalues, eigenvectors) = jacobi_eigh(gram);

        let tiny = F::from_f64(1e-9).unwrap_or_else(F::zero);
        let denominator = F::from_usize(n.max(2) - 1).unwrap_or_else(F::one);
        let requested = self.n_components.min(n).min(d);

        let mut components = Vec::new();
        let mut variances = Vec::new();
        for k in 0..requested {
            let lambda = eigenvalues[k];
            if lambda <= tiny {
                break;
            }
            // Map the Gram eigenvector back into feature space.
            let u = eigenvectors.column(k);
            let axis = centred.t().dot(&u) / lambda.sqrt();
            components.push(axis);
            variances.push(lambda / denominator);
        }
        if components.is_empty() {
            // Degenerate but valid input (e.g. identical rows): keep one
            // arbitrary axis so transform still produces a column.
            let mut axis = Array1::zeros(d);
            axis[0] = F::one();
            components.push(axis);
            variances.push(F::zero());
        }

        let mut matrix = Array2::zeros((components.len(), d));
        for (row, axis) in components.iter().enumerate() {
            matrix.row_mut(row).assign(axis);
        }

        self.mean = Some(mean);
        self.components = Some(matrix);
        self.explained_variance = Some(Array1::from_vec(variances));
        Ok(())
    }

    /// Projects rows of `x` onto the fitted components.
    pub fn transform(&self, x: ArrayView2<F>) -> Result<Array2<F>, PcaError> {
        let mean = self.mean.as_ref().ok_or(PcaError::NotFitted)?;
        let components = self.components.as_ref().ok_or(PcaError::NotFitted)?;
        if x.ncols() != mean.len() {
            return Err(PcaError::DimensionMismatch {
                expected: mean.len(),
                actual: x.ncols(),
            });
        }
        let centred = &x - mean;
        Ok(centred.dot(&components.t()))
    }

    pub fn fit_transform(&mut self, x: ArrayView2<F>) -> Result<Array2<F>, PcaError> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Retained components, one per row, once fitted.
    pub fn components(&self) -> Option<&Array2<F>> {
        self.components.as_ref()
    }

    /// Per-component sample variance along each retained axis.
    pub fn explained_variance(&self) -> Option<&Array1<F>> {
        self.explained_variance.as_ref()
    }

    pub fn n_components_retained(&self) -> usize {
        self.components.as_ref().map_or(0, |c| c.nrows())
    }
}

/// Cyclic Jacobi eigendecomposition of a symmetric matrix. Returns the
/// eigenvalues in descending order and the matching eigenvectors as
/// columns.
fn jacobi_eigh<F: Float>(mut a: Array2<F>) -> (Array1<F>, Array2<F>) {
    let n = a.nrows();
    let mut v: Array2<F> = Array2::eye(n);
    let tol = F::from_f64(1e-12).unwrap_or_else(F::zero);
    let max_sweeps = 64;

    for _sweep in 0..max_sweeps {
        let mut off_diagonal = F::zero();
        for p in 0..n {
            for q in (p + 1)..n {
                off_diagonal = off_diagonal + a[[p, q]] * a[[p, q]];
            }
        }
        if off_diagonal <= tol {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq.abs() <= tol {
                    continue;
                }
                let app = a[[p, p]];
                let aqq = a[[q, q]];

                // Classic Jacobi rotation angle.
                let two = F::one() + F::one();
                let theta = (aqq - app) / (two * apq);
                let t = {
                    let sign = if theta >= F::zero() { F::one() } else { -F::one() };
                    sign / (theta.abs() + (theta * theta + F::one()).sqrt())
                };
                let c = F::one() / (t * t + F::one()).sqrt();
                let s = t * c;

                // Apply the rotation to rows/columns p and q.
                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    // Sort eigenpairs by decreasing eigenvalue.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        a[[j, j]]
            .partial_cmp(&a[[i, i]])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut eigenvalues = Array1::zeros(n);
    let mut eigenvectors = Array2::zeros((n, n));
    for (dst, &src) in order.iter().enumerate() {
        eigenvalues[dst] = a[[src, src]];
        eigenvectors.column_mut(dst).assign(&v.column(src));
    }
    (eigenvalues, eigenvectors)
}
