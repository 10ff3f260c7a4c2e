use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// Height × width × channels of one image. Pixels are flattened in HWC
/// order, so a single-channel image has a trailing channel dimension of 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageShape {
    pub fn grayscale(height: usize, width: usize) -> ImageShape {
        ImageShape { height, width, channels: 1 }
    }

    pub fn len(&self) -> usize {
        self.height * self.width * self.channels
    }
}

/// One mini-batch: `images` is `n × shape.len()`, `labels` is `n × classes`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub images: Matrix,
    pub labels: Matrix,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.images.rows
    }

    pub fn is_empty(&self) -> bool {
        self.images.rows == 0
    }

    /// Contiguous rows `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> Batch {
        Batch {
            images: self.images.slice_rows(start, end),
            labels: self.labels.slice_rows(start, end),
        }
    }
}

/// An in-memory labelled image set with one-hot labels.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub images: Matrix,
    pub labels: Matrix,
    pub shape: ImageShape,
}

impl Dataset {
    pub fn new(images: Matrix, labels: Matrix, shape: ImageShape) -> Result<Dataset> {
        if images.rows != labels.rows {
            return Err(Error::dataset(format!(
                "{} images but {} labels",
                images.rows, labels.rows
            )));
        }
        if images.cols != shape.len() {
            return Err(Error::dataset(format!(
                "images have {} values each, expected {}x{}x{}",
                images.cols, shape.height, shape.width, shape.channels
            )));
        }
        Ok(Dataset { images, labels, shape })
    }

    pub fn len(&self) -> usize {
        self.images.rows
    }

    pub fn is_empty(&self) -> bool {
        self.images.rows == 0
    }

    pub fn num_classes(&self) -> usize {
        self.labels.cols
    }

    pub fn batch(&self, indices: &[usize]) -> Batch {
        Batch {
            images: self.images.select_rows(indices),
            labels: self.labels.select_rows(indices),
        }
    }

    /// Splits off the last `n` examples, preserving order in both halves.
    /// Returns `(head, tail)`.
    pub fn split_tail(self, n: usize) -> Result<(Dataset, Dataset)> {
        let total = self.len();
        if n > total {
            return Err(Error::dataset(format!(
                "cannot reserve {n} examples from a dataset of {total}"
            )));
        }
        let cut = total - n;
        let head = Dataset {
            images: self.images.slice_rows(0, cut),
            labels: self.labels.slice_rows(0, cut),
            shape: self.shape,
        };
        let tail = Dataset {
            images: self.images.slice_rows(cut, total),
            labels: self.labels.slice_rows(cut, total),
            shape: self.shape,
        };
        Ok((head, tail))
    }
}

/// One-hot encodes class indices into an `n × num_classes` matrix.
pub fn one_hot(labels: &[u8], num_classes: usize) -> Result<Matrix> {
    let mut out = Matrix::zeros(labels.len(), num_classes);
    for (i, &class) in labels.iter().enumerate() {
        let class = class as usize;
        if class >= num_classes {
            return Err(Error::dataset(format!(
                "label at index {i}: class {class} is out of range for {num_classes} classes"
            )));
        }
        out.set(i, class, 1.0);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_hot_places_single_one_per_row() {
        let m = one_hot(&[0, 3], 10).unwrap();
        let mut first = vec![0.0; 10];
        first[0] = 1.0;
        let mut second = vec![0.0; 10];
        second[3] = 1.0;
        assert_eq!(m.row(0), first.as_slice());
        assert_eq!(m.row(1), second.as_slice());
    }

    #[test]
    fn one_hot_rejects_out_of_range_class() {
        assert!(one_hot(&[10], 10).is_err());
    }

    #[test]
    fn split_tail_reserves_last_examples_in_order() {
        let n = 60_000;
        let images = Matrix::from_vec(n, 1, (0..n).map(|i| i as f64).collect());
        let labels = one_hot(&vec![1u8; n], 2).unwrap();
        let ds = Dataset::new(images, labels, ImageShape::grayscale(1, 1)).unwrap();

        let (train, val) = ds.split_tail(10_000).unwrap();
        assert_eq!(train.len(), 50_000);
        assert_eq!(val.len(), 10_000);
        assert!(train.images.data.iter().enumerate().all(|(i, &v)| v == i as f64));
        assert!(val.images.data.iter().enumerate().all(|(i, &v)| v == (50_000 + i) as f64));
    }

    #[test]
    fn new_rejects_mismatched_counts() {
        let images = Matrix::zeros(3, 4);
        let labels = Matrix::zeros(2, 10);
        assert!(Dataset::new(images, labels, ImageShape::grayscale(2, 2)).is_err());
    }
}
