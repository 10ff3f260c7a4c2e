use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::RunConfig;
use crate::data::Batch;
use crate::layers::Mode;
use crate::loss::SoftmaxCrossEntropy;
use crate::model::ModelKind;
use crate::network::{Gradients, Network};
use crate::optim::Sgd;
use crate::regularizer::Regularizer;
use crate::train::metrics::StreamingAccuracy;

/// Loss and hit counts for one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutput {
    /// Cross-entropy plus the weight penalty.
    pub loss: f64,
    pub correct: usize,
    pub total: usize,
}

impl StepOutput {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

/// Forward and backward pass over `batch` without touching the parameters.
///
/// The penalty is summed over every weight matrix and its gradient is added
/// to the matching weight gradients. Used directly by gradient towers, each
/// on its own network replica.
pub fn compute_gradients(
    network: &mut Network,
    regularizer: &Regularizer,
    batch: &Batch,
    rng: &mut StdRng,
) -> (Gradients, StepOutput) {
    let logits = network.forward(&batch.images, Mode::Train, rng);
    let probs = SoftmaxCrossEntropy::softmax(&logits);
    let penalty: f64 = network.weights().map(|w| regularizer.penalty(w)).sum();
    let output = StepOutput {
        loss: SoftmaxCrossEntropy::loss(&probs, &batch.labels) + penalty,
        correct: SoftmaxCrossEntropy::correct(&probs, &batch.labels),
        total: batch.len(),
    };

    let mut grads = network.backward(&SoftmaxCrossEntropy::gradient(&probs, &batch.labels));
    for (g, w) in grads.layers.iter_mut().zip(network.weights()) {
        if let Some(reg) = regularizer.gradient(w) {
            g.weights.add_scaled(&reg, 1.0);
        }
    }
    (grads, output)
}

/// Everything one sweep entry trains: the network, its penalty, the
/// optimizer, and a streaming accuracy that is reset per phase.
///
/// Built fresh for each entry so no state leaks between runs.
#[derive(Debug, Clone)]
pub struct Trainer {
    kind: ModelKind,
    network: Network,
    regularizer: Regularizer,
    optimizer: Sgd,
    accuracy: StreamingAccuracy,
    rng: StdRng,
}

impl Trainer {
    pub fn new(kind: ModelKind, config: &RunConfig) -> Trainer {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let network = kind.build_network(config, &mut rng);
        Trainer {
            kind,
            network,
            regularizer: kind.regularizer(config),
            optimizer: Sgd::new(config.learning_rate),
            accuracy: StreamingAccuracy::default(),
            rng,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn regularizer(&self) -> Regularizer {
        self.regularizer
    }

    pub fn compute_gradients(&mut self, batch: &Batch) -> (Gradients, StepOutput) {
        compute_gradients(&mut self.network, &self.regularizer, batch, &mut self.rng)
    }

    pub fn apply_gradients(&mut self, grads: &Gradients) {
        self.network.apply_gradients(grads, &self.optimizer);
    }

    /// One optimizer step. Updates the streaming accuracy and returns the loss.
    pub fn train_step(&mut self, batch: &Batch) -> f64 {
        let (grads, out) = self.compute_gradients(batch);
        self.apply_gradients(&grads);
        self.accuracy.update(out.correct, out.total);
        out.loss
    }

    /// Loss without updating parameters; dropout is disabled.
    pub fn eval_step(&mut self, batch: &Batch) -> f64 {
        let logits = self.network.forward(&batch.images, Mode::Eval, &mut self.rng);
        let probs = SoftmaxCrossEntropy::softmax(&logits);
        self.accuracy.update(SoftmaxCrossEntropy::correct(&probs, &batch.labels), batch.len());
        let penalty: f64 = self.network.weights().map(|w| self.regularizer.penalty(w)).sum();
        SoftmaxCrossEntropy::loss(&probs, &batch.labels) + penalty
    }

    /// Folds hits counted elsewhere (gradient towers) into the accuracy.
    pub fn record_accuracy(&mut self, correct: usize, total: usize) {
        self.accuracy.update(correct, total);
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy.value()
    }

    pub fn reset_accuracy(&mut self) {
        self.accuracy.reset();
    }

    pub fn snapshot(&self) -> Network {
        self.network.clone()
    }

    pub fn restore(&mut self, snapshot: &Network) {
        self.network.copy_parameters_from(snapshot);
    }
}
