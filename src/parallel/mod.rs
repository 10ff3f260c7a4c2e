pub mod tower;

pub use tower::{average_gradients, shard_batch, TowerSet, TowerStep};
