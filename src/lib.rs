pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod regularizer;
pub mod config;
pub mod data;
pub mod model;
pub mod train;
pub mod parallel;
pub mod writer;
pub mod context;
pub mod sweep;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use network::network::Network;
pub use loss::cross_entropy::SoftmaxCrossEntropy;
pub use optim::sgd::Sgd;
pub use regularizer::penalty::Regularizer;
pub use config::{RunConfig, Settings};
pub use context::ExperimentContext;
pub use error::{Error, Result};
pub use model::kind::ModelKind;
pub use train::driver::{train, RunSummary};
pub use train::trainer::Trainer;
pub use sweep::{plan, run_sweep, SweepEntry};
pub use writer::{MetricsWriter, WriterEvent};
