use serde::{Serialize, Deserialize};

use crate::math::matrix::Matrix;
use crate::regularizer::spectral::top_singular;

/// Weight penalty added to the data loss. Applied to every weight matrix
/// of a network, never to biases.
///
/// - `L1`        : `s · Σ|w|`
/// - `L2`        : `s · Σw²`
/// - `Spectral`  : `s · σ_max(W)²`, σ_max estimated by power iteration
/// - `Orthogonal`: `s · ‖WᵀW − I‖²_F`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Regularizer {
    None,
    L1 { strength: f64 },
    L2 { strength: f64 },
    Spectral { strength: f64 },
    Orthogonal { strength: f64 },
}

impl Regularizer {
    pub fn penalty(&self, w: &Matrix) -> f64 {
        match *self {
            Regularizer::None => 0.0,
            Regularizer::L1 { strength } => strength * w.data.iter().map(|x| x.abs()).sum::<f64>(),
            Regularizer::L2 { strength } => strength * w.norm_sq(),
            Regularizer::Spectral { strength } => {
                top_singular(w).map_or(0.0, |sv| strength * sv.sigma * sv.sigma)
            }
            Regularizer::Orthogonal { strength } => strength * gram_residual(w).norm_sq(),
        }
    }

    /// ∂penalty/∂W, or `None` when the penalty is identically zero.
    pub fn gradient(&self, w: &Matrix) -> Option<Matrix> {
        match *self {
            Regularizer::None => None,
            Regularizer::L1 { strength } => Some(w.map(|x| strength * sign(x))),
            Regularizer::L2 { strength } => Some(w.scale(2.0 * strength)),
            Regularizer::Spectral { strength } => {
                let sv = top_singular(w)?;
                // ∂σ/∂W = u vᵀ
                let u = Matrix::from_vec(w.rows, 1, sv.u);
                let v = Matrix::from_vec(1, w.cols, sv.v);
                Some(u.matmul(&v).scale(2.0 * strength * sv.sigma))
            }
            Regularizer::Orthogonal { strength } => {
                Some(w.matmul(&gram_residual(w)).scale(4.0 * strength))
            }
        }
    }
}

/// `WᵀW − I`
fn gram_residual(w: &Matrix) -> Matrix {
    w.transpose().matmul(w) - Matrix::identity(w.cols)
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_weights() -> Matrix {
        Matrix::from_rows(&[vec![0.3, -0.7], vec![1.2, 0.4], vec![-0.5, 0.9]])
    }

    fn assert_matches_finite_difference(reg: Regularizer) {
        let w = sample_weights();
        let analytic = reg.gradient(&w).expect("penalty has a gradient");
        let h = 1e-6;
        for i in 0..w.data.len() {
            let mut plus = w.clone();
            plus.data[i] += h;
            let mut minus = w.clone();
            minus.data[i] -= h;
            let numeric = (reg.penalty(&plus) - reg.penalty(&minus)) / (2.0 * h);
            assert!(
                (numeric - analytic.data[i]).abs() < 1e-5,
                "{:?} entry {}: numeric {} vs analytic {}",
                reg, i, numeric, analytic.data[i]
            );
        }
    }

    #[test]
    fn l1_gradient_matches_finite_difference() {
        assert_matches_finite_difference(Regularizer::L1 { strength: 0.1 });
    }

    #[test]
    fn l2_gradient_matches_finite_difference() {
        assert_matches_finite_difference(Regularizer::L2 { strength: 0.1 });
    }

    #[test]
    fn orthogonal_gradient_matches_finite_difference() {
        assert_matches_finite_difference(Regularizer::Orthogonal { strength: 0.1 });
    }

    #[test]
    fn spectral_gradient_matches_finite_difference() {
        assert_matches_finite_difference(Regularizer::Spectral { strength: 0.1 });
    }

    #[test]
    fn spectral_penalty_of_diagonal_matrix() {
        let w = Matrix::from_rows(&[vec![3.0, 0.0], vec![0.0, 1.0]]);
        let reg = Regularizer::Spectral { strength: 0.5 };
        assert!((reg.penalty(&w) - 4.5).abs() < 1e-9);
        let g = reg.gradient(&w).unwrap();
        assert!((g.get(0, 0) - 3.0).abs() < 1e-9);
        assert!(g.get(1, 1).abs() < 1e-9);
    }

    #[test]
    fn orthogonal_penalty_vanishes_on_orthonormal_columns() {
        let w = Matrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0], vec![0.0, 0.0]]);
        let reg = Regularizer::Orthogonal { strength: 1.0 };
        assert!(reg.penalty(&w).abs() < 1e-12);
    }

    #[test]
    fn none_has_no_gradient() {
        assert!(Regularizer::None.gradient(&sample_weights()).is_none());
        assert_eq!(Regularizer::None.penalty(&sample_weights()), 0.0);
    }
}
