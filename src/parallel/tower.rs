use std::panic;
use std::thread;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::Batch;
use crate::layers::ParamGrads;
use crate::network::{Gradients, Network};
use crate::train::trainer::{compute_gradients, StepOutput, Trainer};

/// Splits a batch into at most `towers` contiguous, near-equal shards.
/// No shard is empty, so a short batch yields fewer shards.
pub fn shard_batch(batch: &Batch, towers: usize) -> Vec<Batch> {
    let n = batch.len();
    let parts = towers.clamp(1, n.max(1));
    let (base, extra) = (n / parts, n % parts);
    let mut shards = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let len = base + usize::from(i < extra);
        if len == 0 {
            break;
        }
        shards.push(batch.slice(start, start + len));
        start += len;
    }
    shards
}

/// Element-wise mean of per-tower gradients.
///
/// Every entry must describe the same architecture. Returns `None` for an
/// empty slice. Each averaged value equals the arithmetic mean of the
/// tower values at that position.
pub fn average_gradients(tower_grads: &[Gradients]) -> Option<Gradients> {
    let (first, rest) = tower_grads.split_first()?;
    let mut sum = first.clone();
    for grads in rest {
        for (acc, g) in sum.layers.iter_mut().zip(&grads.layers) {
            acc.weights.add_scaled(&g.weights, 1.0);
            acc.biases.add_scaled(&g.biases, 1.0);
        }
    }
    let scale = 1.0 / tower_grads.len() as f64;
    let layers = sum
        .layers
        .into_iter()
        .map(|g| ParamGrads { weights: g.weights.scale(scale), biases: g.biases.scale(scale) })
        .collect();
    Some(Gradients { layers })
}

/// Aggregate of one data-parallel step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TowerStep {
    /// Mean of the tower losses.
    pub loss: f64,
    /// Mean of the per-tower batch accuracies.
    pub accuracy: f64,
    pub correct: usize,
    pub total: usize,
}

struct Replica {
    network: Network,
    rng: StdRng,
}

/// Network replicas that compute gradients for shards of a batch in
/// parallel. The averaged gradient is applied once to the trainer, then
/// every replica is re-synchronised from it.
pub struct TowerSet {
    replicas: Vec<Replica>,
}

impl TowerSet {
    pub fn new(trainer: &Trainer, towers: usize, seed: u64) -> TowerSet {
        let replicas = (0..towers.max(1))
            .map(|i| Replica {
                network: trainer.snapshot(),
                rng: StdRng::seed_from_u64(seed.wrapping_add(1 + i as u64)),
            })
            .collect();
        TowerSet { replicas }
    }

    pub fn step(&mut self, trainer: &mut Trainer, batch: &Batch) -> TowerStep {
        let shards = shard_batch(batch, self.replicas.len());
        let regularizer = trainer.regularizer();

        let results: Vec<(Gradients, StepOutput)> = thread::scope(|s| {
            let handles: Vec<_> = self
                .replicas
                .iter_mut()
                .zip(&shards)
                .map(|(replica, shard)| {
                    s.spawn(move || {
                        compute_gradients(&mut replica.network, &regularizer, shard, &mut replica.rng)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| panic::resume_unwind(e)))
                .collect()
        });

        let (grads, outputs): (Vec<Gradients>, Vec<StepOutput>) = results.into_iter().unzip();
        if let Some(avg) = average_gradients(&grads) {
            trainer.apply_gradients(&avg);
        }
        for replica in &mut self.replicas {
            replica.network.copy_parameters_from(trainer.network());
        }

        let towers = outputs.len().max(1) as f64;
        let correct = outputs.iter().map(|o| o.correct).sum();
        let total = outputs.iter().map(|o| o.total).sum();
        trainer.record_accuracy(correct, total);
        TowerStep {
            loss: outputs.iter().map(|o| o.loss).sum::<f64>() / towers,
            accuracy: outputs.iter().map(StepOutput::accuracy).sum::<f64>() / towers,
            correct,
            total,
        }
    }
}
