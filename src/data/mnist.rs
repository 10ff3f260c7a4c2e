use std::path::Path;

use tracing::info;

use crate::data::dataset::{one_hot, Dataset, ImageShape};
use crate::data::idx::{parse_images, parse_labels, IdxImages};
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
pub const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
pub const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
pub const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

/// Examples carved off the end of the training file for validation.
pub const VALIDATION_SIZE: usize = 10_000;

/// Scales pixels to [0, 1] and adds the trailing channel dimension.
pub fn images_to_matrix(images: &IdxImages) -> Matrix {
    let data = images.pixels.iter().map(|&p| p as f64 / 255.0).collect();
    Matrix::from_vec(images.count, images.image_len(), data)
}

/// Loads one images/labels file pair from `dir`.
pub fn load_pair(
    dir: &Path,
    images_file: &str,
    labels_file: &str,
    num_classes: usize,
) -> Result<Dataset> {
    let images = parse_images(&std::fs::read(dir.join(images_file))?)?;
    let labels = parse_labels(&std::fs::read(dir.join(labels_file))?)?;
    if images.count != labels.len() {
        return Err(Error::dataset(format!(
            "{images_file} holds {} images but {labels_file} holds {} labels",
            images.count,
            labels.len()
        )));
    }
    Dataset::new(
        images_to_matrix(&images),
        one_hot(&labels, num_classes)?,
        ImageShape::grayscale(images.rows, images.cols),
    )
}

/// Train, validation and test splits from an MNIST directory.
///
/// The test pair is optional; a directory holding only the training files
/// yields `test = None`.
pub fn load_mnist(dir: &Path, num_classes: usize) -> Result<(Dataset, Dataset, Option<Dataset>)> {
    let full = load_pair(dir, TRAIN_IMAGES, TRAIN_LABELS, num_classes)?;
    let (train, val) = full.split_tail(VALIDATION_SIZE)?;

    let test = if dir.join(TEST_IMAGES).exists() && dir.join(TEST_LABELS).exists() {
        Some(load_pair(dir, TEST_IMAGES, TEST_LABELS, num_classes)?)
    } else {
        None
    };
    info!(
        dir = %dir.display(),
        train = train.len(),
        val = val.len(),
        test = test.as_ref().map_or(0, |t| t.len()),
        "loaded MNIST"
    );
    Ok((train, val, test))
}
