use std::fs;
use std::sync::Arc;
use std::time::Instant;

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::context::ExperimentContext;
use crate::data::{BatchLoader, Dataset};
use crate::error::Result;
use crate::network::Network;
use crate::parallel::TowerSet;
use crate::train::early_stopping::{Decision, EarlyStopping};
use crate::train::metrics::{Metrics, MetricsAccumulator, TEST_ACC, TRAIN_ACC, TRAIN_LOSS, VAL_ACC, VAL_LOSS};
use crate::train::trainer::Trainer;

/// What one run did, returned to the sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub experiment_name: String,
    pub epochs_run: usize,
    /// Optimizer steps taken; also the step axis of every metrics write.
    pub global_step: usize,
    pub train_steps: usize,
    pub val_steps: usize,
    pub best_epoch: Option<usize>,
    pub best_val_acc: f64,
    pub stopped_early: bool,
    pub test_acc: Option<f64>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    fn new(experiment_name: &str) -> RunSummary {
        RunSummary {
            experiment_name: experiment_name.to_owned(),
            epochs_run: 0,
            global_step: 0,
            train_steps: 0,
            val_steps: 0,
            best_epoch: None,
            best_val_acc: 0.0,
            stopped_early: false,
            test_acc: None,
            elapsed_ms: 0,
        }
    }
}

pub struct TrainedRun {
    pub trainer: Trainer,
    pub summary: RunSummary,
}

fn loader(data: &Arc<Dataset>, config: &RunConfig) -> BatchLoader {
    BatchLoader::new(Arc::clone(data), config.batch_size).prefetch(config.prefetch_buffer)
}

/// Trains until `EPOCHS` is reached or validation accuracy stalls.
///
/// Per epoch: one training pass, one validation pass, then one write of the
/// averaged metrics at the current global step. With more than one tower the
/// training metrics are also written every `LOG_INTERVAL` steps. Afterwards
/// the best-validation parameters are restored, optionally saved, and scored
/// on the test split.
///
/// Only writes; never starts or finishes the writer.
pub fn train(mut trainer: Trainer, config: &RunConfig, ctx: &mut ExperimentContext) -> Result<TrainedRun> {
    let started = Instant::now();
    let phase_cap = config.max_steps_per_phase.unwrap_or(usize::MAX);
    let train_loader = loader(&ctx.splits.train, config).shuffle(config.seed);
    let val_loader = loader(&ctx.splits.val, config);

    let mut towers = (config.towers > 1).then(|| TowerSet::new(&trainer, config.towers, config.seed));
    info!(
        experiment = %config.experiment_name,
        model = %trainer.kind(),
        params = trainer.network().parameter_count(),
        towers = config.towers,
        train_batches = train_loader.num_batches(),
        "training"
    );

    let mut early = EarlyStopping::new(config.required_improvement);
    let mut best: Option<Network> = None;
    let mut summary = RunSummary::new(&config.experiment_name);
    let mut step = 0;

    for epoch in 0..config.epochs {
        let epoch_start = Instant::now();
        let mut metrics = MetricsAccumulator::new();

        trainer.reset_accuracy();
        for batch in train_loader.epoch(epoch).take(phase_cap) {
            let loss = match towers.as_mut() {
                Some(towers) => {
                    let out = towers.step(&mut trainer, &batch);
                    metrics.push(TRAIN_ACC, out.accuracy);
                    out.loss
                }
                None => trainer.train_step(&batch),
            };
            metrics.push(TRAIN_LOSS, loss);
            step += 1;
            summary.train_steps += 1;
            debug!(epoch, step, loss, "train step");

            if towers.is_some() && step % config.log_interval == 0 {
                ctx.writer.write(&metrics.mean(), step)?;
                metrics = MetricsAccumulator::new();
            }
        }
        if towers.is_none() {
            metrics.set(TRAIN_ACC, trainer.accuracy());
        }

        trainer.reset_accuracy();
        for (batch_index, batch) in val_loader.epoch(epoch).take(phase_cap).enumerate() {
            let loss = trainer.eval_step(&batch);
            metrics.push(VAL_LOSS, loss);
            summary.val_steps += 1;
            debug!(epoch, batch = batch_index, loss, "validation step");
        }
        let val_acc = trainer.accuracy();
        metrics.set(VAL_ACC, val_acc);

        let decision = early.observe(epoch, val_acc);
        if decision == Decision::Improved {
            best = Some(trainer.snapshot());
        }

        let reduced = metrics.mean();
        ctx.writer.write(&reduced, step)?;
        summary.epochs_run = epoch + 1;
        info!(
            epoch,
            step,
            elapsed_ms = epoch_start.elapsed().as_millis() as u64,
            metrics = ?reduced,
            "epoch done"
        );

        if decision == Decision::Stop {
            info!(
                epoch,
                best_epoch = ?early.best_epoch(),
                best_val_acc = early.best_score(),
                "no validation improvement, stopping early"
            );
            summary.stopped_early = true;
            break;
        }
    }

    summary.global_step = step;
    summary.best_epoch = early.best_epoch();
    summary.best_val_acc = early.best_score();

    if let Some(best) = &best {
        trainer.restore(best);
        debug!(best_epoch = ?summary.best_epoch, "restored best parameters");
    }

    if let Some(dir) = &ctx.checkpoint_dir {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{:03}-{}.json", ctx.run_index + 1, config.experiment_name));
        trainer.network().save_json(&path)?;
        info!(path = %path.display(), "saved best network");
    }

    if let Some(test) = &ctx.splits.test {
        trainer.reset_accuracy();
        for batch in loader(test, config).epoch(0).take(phase_cap) {
            trainer.eval_step(&batch);
        }
        let test_acc = trainer.accuracy();
        ctx.writer.write(&Metrics::from([(TEST_ACC.to_string(), test_acc)]), step)?;
        summary.test_acc = Some(test_acc);
        info!(test_acc, "test evaluation");
    }

    summary.elapsed_ms = started.elapsed().as_millis() as u64;
    Ok(TrainedRun { trainer, summary })
}
