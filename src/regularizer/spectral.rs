use crate::math::matrix::Matrix;

const MAX_ITERATIONS: usize = 100;
const TOLERANCE: f64 = 1e-10;

/// Leading singular triple of a matrix: `W v = σ u`.
#[derive(Debug, Clone)]
pub struct SingularTriple {
    pub sigma: f64,
    pub u: Vec<f64>,
    pub v: Vec<f64>,
}

/// Estimates the largest singular value by power iteration on `WᵀW`,
/// starting from the normalised all-ones vector so results are
/// deterministic. Returns `None` for the zero matrix.
pub fn top_singular(w: &Matrix) -> Option<SingularTriple> {
    if w.rows == 0 || w.cols == 0 {
        return None;
    }
    let mut v = vec![1.0 / (w.cols as f64).sqrt(); w.cols];
    for _ in 0..MAX_ITERATIONS {
        let u = normalized(mat_vec(w, &v))?;
        let next = normalized(mat_t_vec(w, &u))?;
        let delta: f64 = next.iter().zip(&v).map(|(a, b)| (a - b).powi(2)).sum::<f64>().sqrt();
        v = next;
        if delta < TOLERANCE {
            break;
        }
    }
    let wv = mat_vec(w, &v);
    let sigma = norm(&wv);
    if sigma == 0.0 {
        return None;
    }
    let u = wv.into_iter().map(|x| x / sigma).collect();
    Some(SingularTriple { sigma, u, v })
}

fn mat_vec(w: &Matrix, v: &[f64]) -> Vec<f64> {
    (0..w.rows)
        .map(|r| w.row(r).iter().zip(v).map(|(a, b)| a * b).sum())
        .collect()
}

fn mat_t_vec(w: &Matrix, u: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; w.cols];
    for (r, &ur) in u.iter().enumerate() {
        for (o, &a) in out.iter_mut().zip(w.row(r)) {
            *o += a * ur;
        }
    }
    out
}

fn norm(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

fn normalized(x: Vec<f64>) -> Option<Vec<f64>> {
    let n = norm(&x);
    if n == 0.0 {
        None
    } else {
        Some(x.into_iter().map(|v| v / n).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_largest_singular_value() {
        let w = Matrix::from_rows(&[vec![2.0, 0.0], vec![0.0, 5.0], vec![0.0, 0.0]]);
        let sv = top_singular(&w).unwrap();
        assert!((sv.sigma - 5.0).abs() < 1e-9);
        assert!((sv.v[1].abs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_matrix_has_no_triple() {
        assert!(top_singular(&Matrix::zeros(3, 3)).is_none());
    }
}
