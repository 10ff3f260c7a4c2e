pub mod kind;

pub use kind::ModelKind;
