use crate::math::matrix::Matrix;

/// Softmax followed by categorical cross-entropy, batched over rows.
pub struct SoftmaxCrossEntropy;

/// Keeps `ln` finite when a probability underflows to zero.
const EPS: f64 = 1e-12;

impl SoftmaxCrossEntropy {
    /// Row-wise softmax with the max subtracted for numerical stability.
    pub fn softmax(logits: &Matrix) -> Matrix {
        let mut probs = logits.clone();
        for r in 0..probs.rows {
            let row = &mut probs.data[r * probs.cols..(r + 1) * probs.cols];
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mut total = 0.0;
            for v in row.iter_mut() {
                *v = (*v - max).exp();
                total += *v;
            }
            for v in row.iter_mut() {
                *v /= total;
            }
        }
        probs
    }

    /// Mean cross-entropy over the batch: `-1/n · Σ y · ln(p + ε)`.
    pub fn loss(probs: &Matrix, labels: &Matrix) -> f64 {
        if probs.rows == 0 {
            return 0.0;
        }
        let total: f64 = probs
            .data
            .iter()
            .zip(&labels.data)
            .map(|(p, y)| -y * (p + EPS).ln())
            .sum();
        total / probs.rows as f64
    }

    /// ∂loss/∂logits for the mean loss: `(p - y) / n`.
    pub fn gradient(probs: &Matrix, labels: &Matrix) -> Matrix {
        let n = probs.rows.max(1) as f64;
        probs.zip_map(labels, |p, y| (p - y) / n)
    }

    /// Number of rows whose argmax matches the label's argmax.
    pub fn correct(probs: &Matrix, labels: &Matrix) -> usize {
        (0..probs.rows)
            .filter(|&r| probs.argmax_row(r) == labels.argmax_row(r))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_rows_sum_to_one() {
        let logits = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![1000.0, 1000.0, 1000.0]]);
        let p = SoftmaxCrossEntropy::softmax(&logits);
        for r in 0..2 {
            let s: f64 = p.row(r).iter().sum();
            assert!((s - 1.0).abs() < 1e-12);
        }
        assert!((p.get(1, 0) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn uniform_prediction_costs_ln_classes() {
        let p = SoftmaxCrossEntropy::softmax(&Matrix::zeros(2, 4));
        let y = Matrix::from_rows(&[vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 0.0, 1.0, 0.0]]);
        let loss = SoftmaxCrossEntropy::loss(&p, &y);
        assert!((loss - 4f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn gradient_is_scaled_difference() {
        let p = Matrix::from_rows(&[vec![0.25, 0.75], vec![0.25, 0.75]]);
        let y = Matrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0]]);
        let g = SoftmaxCrossEntropy::gradient(&p, &y);
        assert_eq!(g.data, vec![0.125, -0.125, -0.375, 0.375]);
        assert_eq!(SoftmaxCrossEntropy::correct(&p, &y), 1);
    }
}
