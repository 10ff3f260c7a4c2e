pub mod plan;
pub mod runner;

pub use plan::{base_entries, expand, plan, variants, SweepEntry};
pub use runner::run_sweep;
