use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::dataset::{Batch, Dataset};

/// Mini-batch loader that assembles batches on a background thread.
///
/// Each call to [`BatchLoader::epoch`] starts one pass over the dataset. At
/// most `prefetch` batches are materialised ahead of the consumer. The pass
/// ends when the iterator returns `None`; dropping it early stops the
/// producer.
#[derive(Debug, Clone)]
pub struct BatchLoader {
    dataset: Arc<Dataset>,
    batch_size: usize,
    prefetch: usize,
    shuffle_seed: Option<u64>,
}

impl BatchLoader {
    pub fn new(dataset: Arc<Dataset>, batch_size: usize) -> BatchLoader {
        assert!(batch_size > 0, "batch_size must be at least 1");
        BatchLoader { dataset, batch_size, prefetch: 1, shuffle_seed: None }
    }

    pub fn prefetch(mut self, depth: usize) -> Self {
        self.prefetch = depth.max(1);
        self
    }

    /// Reshuffle every pass, deterministically from `seed` and the epoch.
    pub fn shuffle(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn epoch(&self, epoch: usize) -> Prefetch {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
        if let Some(seed) = self.shuffle_seed {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(epoch as u64));
            indices.shuffle(&mut rng);
        }

        let (tx, rx) = mpsc::sync_channel(self.prefetch);
        let dataset = Arc::clone(&self.dataset);
        let batch_size = self.batch_size;
        let worker = thread::spawn(move || {
            for chunk in indices.chunks(batch_size) {
                // Receiver gone: the consumer stopped early.
                if tx.send(dataset.batch(chunk)).is_err() {
                    break;
                }
            }
        });

        Prefetch { rx: Some(rx), worker: Some(worker), remaining: self.num_batches() }
    }
}

/// Iterator over one pass of prefetched batches.
pub struct Prefetch {
    rx: Option<Receiver<Batch>>,
    worker: Option<JoinHandle<()>>,
    remaining: usize,
}

impl Iterator for Prefetch {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let batch = self.rx.as_ref()?.recv().ok()?;
        self.remaining = self.remaining.saturating_sub(1);
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl Drop for Prefetch {
    fn drop(&mut self) {
        // Disconnect first so a producer blocked on a full channel wakes up.
        drop(self.rx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::{one_hot, ImageShape};
    use crate::math::matrix::Matrix;

    fn counting_dataset(n: usize) -> Arc<Dataset> {
        let images = Matrix::from_vec(n, 1, (0..n).map(|i| i as f64).collect());
        let labels = one_hot(&vec![0u8; n], 2).unwrap();
        Arc::new(Dataset::new(images, labels, ImageShape::grayscale(1, 1)).unwrap())
    }

    #[test]
    fn unshuffled_pass_visits_rows_in_order() {
        let loader = BatchLoader::new(counting_dataset(7), 3).prefetch(2);
        let sizes: Vec<usize> = loader.epoch(0).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        let seen: Vec<f64> = loader.epoch(0).flat_map(|b| b.images.data).collect();
        assert_eq!(seen, (0..7).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn shuffled_pass_is_a_permutation() {
        let loader = BatchLoader::new(counting_dataset(50), 8).shuffle(9);
        let mut seen: Vec<f64> = loader.epoch(1).flat_map(|b| b.images.data).collect();
        assert_ne!(seen, (0..50).map(|i| i as f64).collect::<Vec<_>>());
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, (0..50).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn dropping_early_releases_the_producer() {
        let loader = BatchLoader::new(counting_dataset(1_000), 1).prefetch(1);
        let mut pass = loader.epoch(0);
        assert_eq!(pass.size_hint(), (1_000, Some(1_000)));
        assert!(pass.next().is_some());
        drop(pass); // must not hang
    }
}
