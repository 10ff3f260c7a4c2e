use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::math::matrix::Matrix;
use crate::layers::Mode;

/// Inverted dropout. `rate` is the probability of zeroing a unit; kept
/// units are scaled by `1 / (1 - rate)` so evaluation is the identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dropout {
    pub rate: f64,
    #[serde(skip)]
    mask: Option<Matrix>,
}

impl Dropout {
    pub fn new(rate: f64) -> Dropout {
        assert!((0.0..1.0).contains(&rate), "dropout rate must lie in [0, 1), got {}", rate);
        Dropout { rate, mask: None }
    }

    pub fn forward<R: Rng + ?Sized>(&mut self, input: &Matrix, mode: Mode, rng: &mut R) -> Matrix {
        if mode == Mode::Eval || self.rate == 0.0 {
            self.mask = None;
            return input.clone();
        }
        let keep = 1.0 - self.rate;
        let data = (0..input.data.len())
            .map(|_| if rng.gen::<f64>() < keep { 1.0 / keep } else { 0.0 })
            .collect();
        let mask = Matrix::from_vec(input.rows, input.cols, data);
        let out = input.hadamard(&mask);
        self.mask = Some(mask);
        out
    }

    pub fn backward(&self, grad_output: &Matrix) -> Matrix {
        match &self.mask {
            Some(mask) => grad_output.hadamard(mask),
            None => grad_output.clone(),
        }
    }
}
