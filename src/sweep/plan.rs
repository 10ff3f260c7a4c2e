use serde::{Serialize, Deserialize};

use crate::config::RunConfig;
use crate::model::ModelKind;

/// Fixed strengths tried for the orthogonality penalty.
pub const ORTHOGONAL_STRENGTHS: [f64; 3] = [0.1, 0.001, 0.0001];
/// Fixed drop probabilities tried for the dropout model.
pub const DROPOUT_RATES: [f64; 3] = [0.5, 0.8, 0.1];

/// One (model, hyperparameters) pair of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub kind: ModelKind,
    pub config: RunConfig,
}

impl SweepEntry {
    pub fn new(kind: ModelKind, config: RunConfig) -> SweepEntry {
        SweepEntry { kind, config }
    }
}

/// One entry per flat model, all sharing `config`.
pub fn base_entries(config: &RunConfig) -> Vec<SweepEntry> {
    [
        ModelKind::Baseline,
        ModelKind::L1Reg,
        ModelKind::L2Reg,
        ModelKind::Dropout,
        ModelKind::SpectralReg,
        ModelKind::OrthogonalReg,
    ]
    .into_iter()
    .map(|kind| SweepEntry::new(kind, config.clone()))
    .collect()
}

/// Hyperparameter variants for one base entry.
///
/// The baseline has none. The orthogonal penalty gets fixed strengths, the
/// dropout model fixed drop rates, and every other penalty its base
/// strength scaled by 10, 100, 1/10 and 1/100.
pub fn variants(entry: &SweepEntry) -> Vec<SweepEntry> {
    let with = |edit: fn(&mut RunConfig, f64), value: f64| {
        let mut config = entry.config.clone();
        edit(&mut config, value);
        SweepEntry::new(entry.kind, config)
    };
    let set_reg: fn(&mut RunConfig, f64) = |c, v| c.reg_constant = v;
    let scale_reg: fn(&mut RunConfig, f64) = |c, v| c.reg_constant *= v;
    match entry.kind {
        ModelKind::Baseline | ModelKind::Baseline2D => Vec::new(),
        ModelKind::OrthogonalReg => ORTHOGONAL_STRENGTHS
            .iter()
            .map(|&s| with(set_reg, s))
            .collect(),
        ModelKind::Dropout => DROPOUT_RATES
            .iter()
            .map(|&r| with(|c, v| c.dropout_constant = v, r))
            .collect(),
        ModelKind::L1Reg | ModelKind::L2Reg | ModelKind::SpectralReg => vec![
            with(scale_reg, 10.0),
            with(scale_reg, 100.0),
            with(|c, v| c.reg_constant /= v, 10.0),
            with(|c, v| c.reg_constant /= v, 100.0),
        ],
    }
}

/// The base entries followed by all of their variants.
pub fn expand(base: Vec<SweepEntry>) -> Vec<SweepEntry> {
    let extra: Vec<SweepEntry> = base.iter().flat_map(variants).collect();
    let mut entries = base;
    entries.extend(extra);
    entries
}

/// Entries a run will train.
///
/// A trial run trains only the convolutional baseline with smoke-test
/// settings. `only` keeps the entries of a single model kind.
pub fn plan(config: &RunConfig, trial: bool, only: Option<ModelKind>) -> Vec<SweepEntry> {
    let entries = if trial {
        vec![SweepEntry::new(ModelKind::Baseline2D, config.clone().trial())]
    } else {
        expand(base_entries(config))
    };
    match only {
        Some(kind) => entries.into_iter().filter(|e| e.kind == kind).collect(),
        None => entries,
    }
}
