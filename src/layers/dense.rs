use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};
use crate::layers::{Mode, ParamGrads};

/// Fully connected layer: `a = act(x·W + b)` over a batch of row vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    /// Shape `input_size × size`.
    pub weights: Matrix,
    /// Shape `1 × size`.
    pub biases: Matrix,
    pub activation: ActivationFunction,
    #[serde(skip)]
    cache: Option<DenseCache>,
}

#[derive(Debug, Clone)]
struct DenseCache {
    input: Matrix,
    pre: Matrix, // z = xW + b, needed for the activation derivative
}

impl Dense {
    /// He init for ReLU layers, Xavier for everything else; zero biases.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Dense {
        let weights = match activation {
            ActivationFunction::ReLU => Matrix::he(input_size, size, rng),
            ActivationFunction::Identity => Matrix::xavier(input_size, size, rng),
        };
        Dense {
            weights,
            biases: Matrix::zeros(1, size),
            activation,
            cache: None,
        }
    }

    pub fn forward(&mut self, input: &Matrix, mode: Mode) -> Matrix {
        let z = input.matmul(&self.weights).add_row(&self.biases);
        let a = z.map(|x| self.activation.function(x));
        self.cache = match mode {
            Mode::Train => Some(DenseCache { input: input.clone(), pre: z }),
            Mode::Eval => None,
        };
        a
    }

    /// Takes ∂L/∂a for this layer's output and returns the parameter
    /// gradients plus ∂L/∂x for the layer below.
    pub fn backward(&self, grad_output: &Matrix) -> (ParamGrads, Matrix) {
        let cache = self
            .cache
            .as_ref()
            .expect("Dense::backward called without a training-mode forward pass");
        let act_derivative = cache.pre.map(|x| self.activation.derivative(x));
        let delta = grad_output.hadamard(&act_derivative);

        let grads = ParamGrads {
            weights: cache.input.transpose().matmul(&delta),
            biases: delta.sum_rows(),
        };
        let grad_input = delta.matmul(&self.weights.transpose());
        (grads, grad_input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_layer() -> Dense {
        Dense {
            weights: Matrix::from_rows(&[vec![1.0, -1.0], vec![0.5, 2.0]]),
            biases: Matrix::from_vec(1, 2, vec![0.0, 0.5]),
            activation: ActivationFunction::ReLU,
            cache: None,
        }
    }

    #[test]
    fn forward_applies_affine_then_relu() {
        let mut layer = fixed_layer();
        let x = Matrix::from_rows(&[vec![1.0, 1.0]]);
        // z = [1.5, 1.5]
        assert_eq!(layer.forward(&x, Mode::Eval).data, vec![1.5, 1.5]);
        let x = Matrix::from_rows(&[vec![-2.0, 0.0]]);
        // z = [-2.0, 2.5]
        assert_eq!(layer.forward(&x, Mode::Eval).data, vec![0.0, 2.5]);
    }

    #[test]
    fn backward_masks_inactive_units() {
        let mut layer = fixed_layer();
        let x = Matrix::from_rows(&[vec![-2.0, 0.0]]);
        layer.forward(&x, Mode::Train);
        let (grads, grad_in) = layer.backward(&Matrix::from_rows(&[vec![1.0, 1.0]]));
        // First unit is inactive, so only column 1 carries gradient.
        assert_eq!(grads.biases.data, vec![0.0, 1.0]);
        assert_eq!(grads.weights.data, vec![0.0, -2.0, 0.0, 0.0]);
        assert_eq!(grad_in.data, vec![-1.0, 2.0]);
    }
}
