use ferrite_sweep::data::DataSource;
use ferrite_sweep::train::train;
use ferrite_sweep::writer::MemoryWriter;
use ferrite_sweep::{ExperimentContext, ModelKind, RunConfig, Trainer};

fn frozen_config(patience: usize) -> RunConfig {
    RunConfig {
        experiment_name: "Baseline".into(),
        epochs: 50,
        batch_size: 10,
        image_height: 4,
        image_width: 4,
        num_classes: 3,
        hidden_units: 5,
        // Parameters never move, so validation accuracy is flat.
        learning_rate: 0.0,
        required_improvement: patience,
        ..RunConfig::default()
    }
}

#[test]
fn flat_validation_stops_after_patience_plus_one_epochs() {
    for patience in [0, 2, 4] {
        let cfg = frozen_config(patience);
        let splits = DataSource::Synthetic { train: 30, validation: 20, test: 0, seed: 1 }.load(&cfg).unwrap();
        let mut ctx = ExperimentContext::new(Box::new(MemoryWriter::new()), splits);

        let run = train(Trainer::new(ModelKind::Baseline, &cfg), &cfg, &mut ctx).unwrap();
        let summary = run.summary;
        assert!(summary.stopped_early);
        assert!(summary.best_epoch.unwrap_or(0) == 0);
        let first_stale = summary.best_epoch.map_or(0, |b| b + 1);
        assert_eq!(summary.epochs_run, first_stale + patience + 1);
    }
}

#[test]
fn epoch_budget_bounds_training() {
    let cfg = RunConfig { epochs: 3, required_improvement: 100, learning_rate: 0.1, ..frozen_config(0) };
    let splits = DataSource::Synthetic { train: 30, validation: 10, test: 10, seed: 2 }.load(&cfg).unwrap();
    let memory = MemoryWriter::new();
    let events = memory.events();
    let mut ctx = ExperimentContext::new(Box::new(memory), splits);

    let run = train(Trainer::new(ModelKind::L1Reg, &cfg), &cfg, &mut ctx).unwrap();
    assert_eq!(run.summary.epochs_run, 3);
    assert!(!run.summary.stopped_early);
    assert_eq!(run.summary.train_steps, 9);
    assert_eq!(run.summary.val_steps, 3);
    let test_acc = run.summary.test_acc.unwrap();
    assert!((0.0..=1.0).contains(&test_acc));
    // Three epoch writes and the test write; the driver never starts or ends a run.
    assert_eq!(events.lock().unwrap().len(), 4);
}
