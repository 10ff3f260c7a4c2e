use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};
use crate::layers::{Mode, ParamGrads};

/// Valid-padding 2-D convolution over channel-last images.
///
/// Each batch row holds one `height × width × channels` image flattened in
/// HWC order; the output row is `out_h × out_w × filters`, also HWC. The
/// convolution is lowered to a single matmul through im2col.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conv2d {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub kernel: usize,
    pub stride: usize,
    /// Shape `(kernel · kernel · channels) × filters`.
    pub weights: Matrix,
    /// Shape `1 × filters`.
    pub biases: Matrix,
    pub activation: ActivationFunction,
    #[serde(skip)]
    cache: Option<ConvCache>,
}

#[derive(Debug, Clone)]
struct ConvCache {
    batch: usize,
    patches: Matrix,
    pre: Matrix,
}

impl Conv2d {
    #[allow(clippy::too_many_arguments)]
    pub fn new<R: Rng + ?Sized>(
        height: usize,
        width: usize,
        channels: usize,
        filters: usize,
        kernel: usize,
        stride: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Conv2d {
        assert!(kernel <= height && kernel <= width, "kernel larger than input");
        assert!(stride > 0, "stride must be at least 1");
        let fan_in = kernel * kernel * channels;
        let weights = match activation {
            ActivationFunction::ReLU => Matrix::he(fan_in, filters, rng),
            ActivationFunction::Identity => Matrix::xavier(fan_in, filters, rng),
        };
        Conv2d {
            height,
            width,
            channels,
            kernel,
            stride,
            weights,
            biases: Matrix::zeros(1, filters),
            activation,
            cache: None,
        }
    }

    pub fn filters(&self) -> usize {
        self.weights.cols
    }

    pub fn output_dims(&self) -> (usize, usize) {
        (
            (self.height - self.kernel) / self.stride + 1,
            (self.width - self.kernel) / self.stride + 1,
        )
    }

    /// Flattened length of one output image.
    pub fn output_size(&self) -> usize {
        let (oh, ow) = self.output_dims();
        oh * ow * self.filters()
    }

    fn input_size(&self) -> usize {
        self.height * self.width * self.channels
    }

    /// Offset into a flattened input image for patch position `(oy, ox)`,
    /// kernel tap `(ky, kx)` and channel `ch`.
    #[inline]
    fn input_offset(&self, oy: usize, ox: usize, ky: usize, kx: usize, ch: usize) -> usize {
        let y = oy * self.stride + ky;
        let x = ox * self.stride + kx;
        (y * self.width + x) * self.channels + ch
    }

    fn im2col(&self, input: &Matrix) -> Matrix {
        let (oh, ow) = self.output_dims();
        let patch_len = self.kernel * self.kernel * self.channels;
        let mut patches = Matrix::zeros(input.rows * oh * ow, patch_len);
        for s in 0..input.rows {
            let image = input.row(s);
            for oy in 0..oh {
                for ox in 0..ow {
                    let r = (s * oh + oy) * ow + ox;
                    let dst = &mut patches.data[r * patch_len..(r + 1) * patch_len];
                    let mut c = 0;
                    for ky in 0..self.kernel {
                        for kx in 0..self.kernel {
                            for ch in 0..self.channels {
                                dst[c] = image[self.input_offset(oy, ox, ky, kx, ch)];
                                c += 1;
                            }
                        }
                    }
                }
            }
        }
        patches
    }

    fn col2im(&self, grad_patches: &Matrix, batch: usize) -> Matrix {
        let (oh, ow) = self.output_dims();
        let patch_len = grad_patches.cols;
        let mut grad_input = Matrix::zeros(batch, self.input_size());
        for s in 0..batch {
            for oy in 0..oh {
                for ox in 0..ow {
                    let r = (s * oh + oy) * ow + ox;
                    let src = &grad_patches.data[r * patch_len..(r + 1) * patch_len];
                    let mut c = 0;
                    for ky in 0..self.kernel {
                        for kx in 0..self.kernel {
                            for ch in 0..self.channels {
                                let idx = s * self.input_size() + self.input_offset(oy, ox, ky, kx, ch);
                                grad_input.data[idx] += src[c];
                                c += 1;
                            }
                        }
                    }
                }
            }
        }
        grad_input
    }

    pub fn forward(&mut self, input: &Matrix, mode: Mode) -> Matrix {
        assert_eq!(
            input.cols,
            self.input_size(),
            "Conv2d expects {}x{}x{} inputs",
            self.height, self.width, self.channels
        );
        let batch = input.rows;
        let patches = self.im2col(input);
        let z = patches.matmul(&self.weights).add_row(&self.biases);
        let a = z.map(|x| self.activation.function(x));
        self.cache = match mode {
            Mode::Train => Some(ConvCache { batch, patches, pre: z }),
            Mode::Eval => None,
        };
        // (batch · oh · ow) × filters is already batch rows of HWC data.
        Matrix::from_vec(batch, self.output_size(), a.data)
    }

    pub fn backward(&self, grad_output: &Matrix) -> (ParamGrads, Matrix) {
        let cache = self
            .cache
            .as_ref()
            .expect("Conv2d::backward called without a training-mode forward pass");
        let g = Matrix::from_vec(cache.pre.rows, self.filters(), grad_output.data.clone());
        let delta = g.hadamard(&cache.pre.map(|x| self.activation.derivative(x)));

        let grads = ParamGrads {
            weights: cache.patches.transpose().matmul(&delta),
            biases: delta.sum_rows(),
        };
        let grad_patches = delta.matmul(&self.weights.transpose());
        (grads, self.col2im(&grad_patches, cache.batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summing_kernel(stride: usize) -> Conv2d {
        Conv2d {
            height: 3,
            width: 3,
            channels: 1,
            kernel: 2,
            stride,
            weights: Matrix::from_vec(4, 1, vec![1.0; 4]),
            biases: Matrix::zeros(1, 1),
            activation: ActivationFunction::Identity,
            cache: None,
        }
    }

    #[test]
    fn output_shape_follows_stride() {
        assert_eq!(summing_kernel(1).output_dims(), (2, 2));
        assert_eq!(summing_kernel(2).output_dims(), (1, 1));
    }

    #[test]
    fn forward_sums_each_window() {
        let mut conv = summing_kernel(1);
        let image = Matrix::from_vec(1, 9, (1..=9).map(f64::from).collect());
        let out = conv.forward(&image, Mode::Eval);
        // Windows: [1,2,4,5] [2,3,5,6] [4,5,7,8] [5,6,8,9]
        assert_eq!(out.data, vec![12.0, 16.0, 24.0, 28.0]);
    }

    #[test]
    fn backward_scatters_to_overlapping_pixels() {
        let mut conv = summing_kernel(1);
        let image = Matrix::from_vec(1, 9, vec![0.0; 9]);
        conv.forward(&image, Mode::Train);
        let (grads, grad_in) = conv.backward(&Matrix::from_vec(1, 4, vec![1.0; 4]));
        // The centre pixel is covered by all four windows, corners by one.
        assert_eq!(grad_in.data, vec![1.0, 2.0, 1.0, 2.0, 4.0, 2.0, 1.0, 2.0, 1.0]);
        assert_eq!(grads.biases.data, vec![4.0]);
        assert_eq!(grads.weights.data, vec![0.0; 4]);
    }
}
