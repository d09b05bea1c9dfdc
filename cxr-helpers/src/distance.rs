use ndarray::ArrayView1;

use crate::Float;

/// A distance metric between two feature vectors.
///
/// `rdistance` is a "reduced" distance that preserves the ordering of the
/// true distance but may skip a final monotone step (the square root for
/// L2). Nearest-neighbour searches compare with `rdistance` and only
/// convert when a true distance is needed.
pub trait Distance<F: Float> {
    /// The true distance between `a` and `b`.
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F;

    /// An order-preserving surrogate for `distance`.
    fn rdistance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        self.distance(a, b)
    }

    /// Converts a reduced distance back into a true distance.
    fn rdistance_to_distance(&self, rdist: F) -> F {
        rdist
    }
}

/// Manhattan (L1) distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L1Dist;

impl<F: Float> Distance<F> for L1Dist {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| (x - y).abs())
            .sum()
    }
}

/// Euclidean (L2) distance. The reduced form is the squared distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2Dist;

impl<F: Float> Distance<F> for L2Dist {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        self.rdistance(a, b).sqrt()
    }

    fn rdistance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| (x - y) * (x - y))
            .sum()
    }

    fn rdistance_to_distance(&self, rdist: F) -> F {
        rdist.sqrt()
    }
}

/// Chebyshev (L-infinity) distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LInfDist;

impl<F: Float> Distance<F> for LInfDist {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| (x - y).abs())
            .fold(F::zero(), F::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn l2_is_euclidean() {
        let a = array![0.0_f64, 0.0];
        let b = array![3.0, 4.0];
        assert_abs_diff_eq!(L2Dist.distance(a.view(), b.view()), 5.0);
        assert_abs_diff_eq!(L2Dist.rdistance(a.view(), b.view()), 25.0);
        assert_abs_diff_eq!(L2Dist.rdistance_to_distance(25.0), 5.0);
    }

    #[test]
    fn l1_sums_absolute_differences() {
        let a = array![1.0_f64, -2.0];
        let b = array![-1.0, 1.0];
        assert_abs_diff_eq!(L1Dist.distance(a.view(), b.view()), 5.0);
    }

    #[test]
    fn linf_takes_largest_coordinate() {
        let a = array![1.0_f64, -2.0, 0.5];
        let b = array![-1.0, 1.0, 0.5];
        assert_abs_diff_eq!(LInfDist.distance(a.view(), b.view()), 3.0);
    }
}
