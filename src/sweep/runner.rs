use tracing::{info, info_span};

use crate::context::ExperimentContext;
use crate::error::Result;
use crate::sweep::plan::SweepEntry;
use crate::train::driver::{train, RunSummary};
use crate::train::trainer::Trainer;

/// Trains every entry in order, each with a freshly built trainer.
///
/// The writer is started per entry (except in trial runs) and finished
/// after it, then finished once more after the loop. A failing entry stops
/// the sweep with its error.
pub fn run_sweep(entries: Vec<SweepEntry>, ctx: &mut ExperimentContext) -> Result<Vec<RunSummary>> {
    info!(entries = entries.len(), trial = ctx.trial_run, "starting sweep");
    let mut summaries = Vec::with_capacity(entries.len());

    for (index, SweepEntry { kind, mut config }) in entries.into_iter().enumerate() {
        config.experiment_name = kind.name().to_owned();
        config.validate()?;
        kind.check(&config)?;
        let _span = info_span!("run", index, experiment = %config.experiment_name).entered();

        ctx.run_index = index;
        if !ctx.trial_run {
            ctx.writer.start(&config)?;
        }
        let trainer = Trainer::new(kind, &config);
        let run = train(trainer, &config, ctx);
        // Close the run even when training failed.
        ctx.writer.fin()?;
        let run = run?;

        info!(
            best_val_acc = run.summary.best_val_acc,
            test_acc = ?run.summary.test_acc,
            epochs = run.summary.epochs_run,
            "run complete"
        );
        summaries.push(run.summary);
    }

    ctx.writer.fin()?;
    info!("sweep complete");
    Ok(summaries)
}
