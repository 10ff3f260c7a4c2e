use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::ActivationFunction;
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::layers::{Conv2d, Dense, Dropout, Layer};
use crate::network::Network;
use crate::regularizer::Regularizer;

const CONV_FILTERS: usize = 8;
const CONV_KERNEL: usize = 3;
const CONV_STRIDE: usize = 2;

/// The model variants a sweep can train.
///
/// All flat variants share one MLP (`input → HIDDEN_UNITS ReLU → classes`)
/// and differ only in their penalty or dropout. `Baseline2D` keeps the
/// image's spatial layout and starts with a strided convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    Baseline,
    L1Reg,
    L2Reg,
    Dropout,
    SpectralReg,
    OrthogonalReg,
    Baseline2D,
}

impl ModelKind {
    pub const ALL: [ModelKind; 7] = [
        ModelKind::Baseline,
        ModelKind::L1Reg,
        ModelKind::L2Reg,
        ModelKind::Dropout,
        ModelKind::SpectralReg,
        ModelKind::OrthogonalReg,
        ModelKind::Baseline2D,
    ];

    /// Name recorded as the run's `EXPERIMENT_NAME`.
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Baseline => "Baseline",
            ModelKind::L1Reg => "L1Reg",
            ModelKind::L2Reg => "L2Reg",
            ModelKind::Dropout => "Dropout",
            ModelKind::SpectralReg => "SpectralReg",
            ModelKind::OrthogonalReg => "OrthogonalReg",
            ModelKind::Baseline2D => "Baseline2D",
        }
    }

    pub fn regularizer(&self, config: &RunConfig) -> Regularizer {
        let strength = config.reg_constant;
        match self {
            ModelKind::L1Reg => Regularizer::L1 { strength },
            ModelKind::L2Reg => Regularizer::L2 { strength },
            ModelKind::SpectralReg => Regularizer::Spectral { strength },
            ModelKind::OrthogonalReg => Regularizer::Orthogonal { strength },
            ModelKind::Baseline | ModelKind::Dropout | ModelKind::Baseline2D => Regularizer::None,
        }
    }

    /// Rejects configs this architecture cannot be built from.
    pub fn check(&self, config: &RunConfig) -> Result<()> {
        if *self == ModelKind::Baseline2D
            && (config.image_height < CONV_KERNEL || config.image_width < CONV_KERNEL)
        {
            return Err(Error::config(format!(
                "{self} needs images of at least {CONV_KERNEL}x{CONV_KERNEL}, got {}x{}",
                config.image_height, config.image_width
            )));
        }
        Ok(())
    }

    pub fn build_network<R: Rng + ?Sized>(&self, config: &RunConfig, rng: &mut R) -> Network {
        let hidden = config.hidden_units;
        let classes = config.num_classes;
        match self {
            ModelKind::Baseline2D => {
                let conv = Conv2d::new(
                    config.image_height,
                    config.image_width,
                    1,
                    CONV_FILTERS,
                    CONV_KERNEL,
                    CONV_STRIDE,
                    ActivationFunction::ReLU,
                    rng,
                );
                let flat = conv.output_size();
                Network::new(vec![
                    Layer::Conv2d(conv),
                    Layer::Dense(Dense::new(flat, hidden, ActivationFunction::ReLU, rng)),
                    Layer::Dense(Dense::new(hidden, classes, ActivationFunction::Identity, rng)),
                ])
            }
            _ => {
                let mut layers = vec![Layer::Dense(Dense::new(
                    config.input_size(),
                    hidden,
                    ActivationFunction::ReLU,
                    rng,
                ))];
                if *self == ModelKind::Dropout {
                    layers.push(Layer::Dropout(Dropout::new(config.dropout_constant)));
                }
                layers.push(Layer::Dense(Dense::new(hidden, classes, ActivationFunction::Identity, rng)));
                Network::new(layers)
            }
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ModelKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::config(format!("unknown model kind '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("orthogonalreg".parse::<ModelKind>().unwrap(), ModelKind::OrthogonalReg);
        assert_eq!("Baseline2D".parse::<ModelKind>().unwrap(), ModelKind::Baseline2D);
        assert!("Unknown".parse::<ModelKind>().is_err());
    }

    #[test]
    fn only_dropout_variant_has_a_dropout_layer() {
        let cfg = RunConfig { hidden_units: 4, ..RunConfig::default() };
        let mut rng = StdRng::seed_from_u64(0);
        for kind in ModelKind::ALL {
            let net = kind.build_network(&cfg, &mut rng);
            let has_dropout = net.layers.iter().any(|l| matches!(l, Layer::Dropout(_)));
            assert_eq!(has_dropout, kind == ModelKind::Dropout, "{kind}");
        }
    }

    #[test]
    fn conv_variant_flattens_into_dense_head() {
        let cfg = RunConfig { hidden_units: 4, ..RunConfig::default() };
        let net = ModelKind::Baseline2D.build_network(&cfg, &mut StdRng::seed_from_u64(0));
        // 28x28 with a stride-2 3x3 kernel gives 13x13 positions.
        let (w, _) = net.layers[1].params().unwrap();
        assert_eq!(w.rows, 13 * 13 * CONV_FILTERS);
    }

    #[test]
    fn conv_variant_rejects_images_smaller_than_its_kernel() {
        let cfg = RunConfig { image_height: 2, image_width: 2, ..RunConfig::default() };
        assert!(matches!(ModelKind::Baseline2D.check(&cfg), Err(Error::Config(_))));
        assert!(ModelKind::Baseline.check(&cfg).is_ok());
        let cfg = RunConfig { image_height: 3, image_width: 3, ..RunConfig::default() };
        assert!(ModelKind::Baseline2D.check(&cfg).is_ok());
    }

    #[test]
    fn regularizer_follows_kind() {
        let cfg = RunConfig { reg_constant: 0.5, ..RunConfig::default() };
        assert_eq!(ModelKind::L2Reg.regularizer(&cfg), Regularizer::L2 { strength: 0.5 });
        assert_eq!(ModelKind::Dropout.regularizer(&cfg), Regularizer::None);
    }
}
