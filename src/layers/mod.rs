pub mod conv2d;
pub mod dense;
pub mod dropout;

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::math::matrix::Matrix;

pub use conv2d::Conv2d;
pub use dense::Dense;
pub use dropout::Dropout;

/// Whether a forward pass is part of a training step.
///
/// Training mode caches what backprop needs and enables dropout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// Gradients for one parametrised layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrads {
    pub weights: Matrix,
    pub biases: Matrix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    Dense(Dense),
    Conv2d(Conv2d),
    Dropout(Dropout),
}

impl Layer {
    pub fn forward<R: Rng + ?Sized>(&mut self, input: &Matrix, mode: Mode, rng: &mut R) -> Matrix {
        match self {
            Layer::Dense(l) => l.forward(input, mode),
            Layer::Conv2d(l) => l.forward(input, mode),
            Layer::Dropout(l) => l.forward(input, mode, rng),
        }
    }

    /// Returns parameter gradients (if the layer has parameters) and the
    /// gradient with respect to the layer input.
    pub fn backward(&self, grad_output: &Matrix) -> (Option<ParamGrads>, Matrix) {
        match self {
            Layer::Dense(l) => {
                let (g, dx) = l.backward(grad_output);
                (Some(g), dx)
            }
            Layer::Conv2d(l) => {
                let (g, dx) = l.backward(grad_output);
                (Some(g), dx)
            }
            Layer::Dropout(l) => (None, l.backward(grad_output)),
        }
    }

    /// `(weights, biases)` for parametrised layers.
    pub fn params(&self) -> Option<(&Matrix, &Matrix)> {
        match self {
            Layer::Dense(l) => Some((&l.weights, &l.biases)),
            Layer::Conv2d(l) => Some((&l.weights, &l.biases)),
            Layer::Dropout(_) => None,
        }
    }

    pub fn params_mut(&mut self) -> Option<(&mut Matrix, &mut Matrix)> {
        match self {
            Layer::Dense(l) => Some((&mut l.weights, &mut l.biases)),
            Layer::Conv2d(l) => Some((&mut l.weights, &mut l.biases)),
            Layer::Dropout(_) => None,
        }
    }
}
