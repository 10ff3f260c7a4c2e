use crate::{math::matrix::Matrix, layers::ParamGrads};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }

    /// Applies one SGD update to a layer's parameters given its gradients.
    pub fn step(&self, weights: &mut Matrix, biases: &mut Matrix, grads: &ParamGrads) {
        weights.add_scaled(&grads.weights, -self.learning_rate);
        biases.add_scaled(&grads.biases, -self.learning_rate);
    }
}
