use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::dataset::{one_hot, Dataset, ImageShape};
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// Deterministic MNIST-shaped stand-in for runs without the IDX files.
///
/// Pixels are split into `num_classes` contiguous bands; an image of class
/// `c` lights band `c` on a faint noise floor, so the classes are easy to
/// separate but not identical.
pub fn synthetic_dataset(
    n: usize,
    shape: ImageShape,
    num_classes: usize,
    seed: u64,
) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let len = shape.len();
    let mut labels = Vec::with_capacity(n);
    let mut data = Vec::with_capacity(n * len);
    for _ in 0..n {
        let class = rng.gen_range(0..num_classes);
        let label = u8::try_from(class)
            .map_err(|_| Error::dataset(format!("class {class} does not fit a byte label")))?;
        labels.push(label);
        for p in 0..len {
            let band = p * num_classes / len;
            let level = if band == class { 0.8 } else { 0.0 };
            data.push(level + rng.gen::<f64>() * 0.2);
        }
    }
    Dataset::new(Matrix::from_vec(n, len, data), one_hot(&labels, num_classes)?, shape)
}
