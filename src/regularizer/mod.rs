pub mod penalty;
pub mod spectral;

pub use penalty::Regularizer;
