use std::path::Path;

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::layers::{Layer, Mode, ParamGrads};
use crate::math::matrix::Matrix;
use crate::optim::sgd::Sgd;

/// Gradients for every parametrised layer of a network, in layer order.
/// Dropout layers have no entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub layers: Vec<ParamGrads>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
}

impl Network {
    pub fn new(layers: Vec<Layer>) -> Network {
        Network { layers }
    }

    /// Forward pass over a batch; returns the logits.
    pub fn forward<R: Rng + ?Sized>(&mut self, input: &Matrix, mode: Mode, rng: &mut R) -> Matrix {
        let mut current = input.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current, mode, rng);
        }
        current
    }

    /// Backpropagates ∂L/∂logits through the layers cached by the last
    /// training-mode forward pass.
    pub fn backward(&self, grad_logits: &Matrix) -> Gradients {
        let mut grads = Vec::new();
        let mut delta = grad_logits.clone();
        for layer in self.layers.iter().rev() {
            let (param_grads, grad_input) = layer.backward(&delta);
            if let Some(g) = param_grads {
                grads.push(g);
            }
            delta = grad_input;
        }
        grads.reverse();
        Gradients { layers: grads }
    }

    /// Weight matrices of the parametrised layers, in layer order.
    pub fn weights(&self) -> impl Iterator<Item = &Matrix> + '_ {
        self.layers.iter().filter_map(|l| l.params().map(|(w, _)| w))
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .filter_map(|l| l.params())
            .map(|(w, b)| w.data.len() + b.data.len())
            .sum()
    }

    pub fn apply_gradients(&mut self, grads: &Gradients, optimizer: &Sgd) {
        let params = self.layers.iter_mut().filter_map(|l| l.params_mut());
        for ((weights, biases), g) in params.zip(&grads.layers) {
            optimizer.step(weights, biases, g);
        }
    }

    /// Overwrites this network's parameters with `other`'s. Both networks
    /// must share an architecture.
    pub fn copy_parameters_from(&mut self, other: &Network) {
        let dst = self.layers.iter_mut().filter_map(|l| l.params_mut());
        let src = other.layers.iter().filter_map(|l| l.params());
        for ((dw, db), (sw, sb)) in dst.zip(src) {
            dw.data.copy_from_slice(&sw.data);
            db.data.copy_from_slice(&sb.data);
        }
    }

    /// Serializes the network weights to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a network from a JSON file previously written by `save_json`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Network> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunction;
    use crate::layers::{Dense, Dropout};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_network(rng: &mut StdRng) -> Network {
        Network::new(vec![
            Layer::Dense(Dense::new(4, 3, ActivationFunction::ReLU, rng)),
            Layer::Dropout(Dropout::new(0.5)),
            Layer::Dense(Dense::new(3, 2, ActivationFunction::Identity, rng)),
        ])
    }

    #[test]
    fn backward_yields_one_entry_per_parametrised_layer() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut net = small_network(&mut rng);
        let x = Matrix::from_vec(5, 4, vec![0.5; 20]);
        let logits = net.forward(&x, Mode::Train, &mut rng);
        assert_eq!((logits.rows, logits.cols), (5, 2));
        let grads = net.backward(&Matrix::from_vec(5, 2, vec![0.1; 10]));
        assert_eq!(grads.layers.len(), 2);
        assert_eq!((grads.layers[0].weights.rows, grads.layers[0].weights.cols), (4, 3));
        assert_eq!((grads.layers[1].weights.rows, grads.layers[1].weights.cols), (3, 2));
        assert_eq!(net.parameter_count(), 4 * 3 + 3 + 3 * 2 + 2);
    }

    #[test]
    fn copy_parameters_makes_outputs_agree() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut a = small_network(&mut rng);
        let mut b = small_network(&mut rng);
        b.copy_parameters_from(&a);
        let x = Matrix::from_vec(2, 4, vec![1.0, -1.0, 0.5, 2.0, 0.0, 0.3, -0.2, 1.0]);
        assert_eq!(a.forward(&x, Mode::Eval, &mut rng), b.forward(&x, Mode::Eval, &mut rng));
    }

    #[test]
    fn json_round_trip_preserves_predictions() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut net = small_network(&mut rng);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        net.save_json(&path).unwrap();
        let mut loaded = Network::load_json(&path).unwrap();
        let x = Matrix::from_vec(1, 4, vec![0.2, 0.4, 0.6, 0.8]);
        assert_eq!(net.forward(&x, Mode::Eval, &mut rng), loaded.forward(&x, Mode::Eval, &mut rng));
    }
}
