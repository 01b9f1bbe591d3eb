use crate::effects::blur::{GaussianKernel, blur_premul};
use crate::effects::color_matrix::{IDENTITY_COLOR_MATRIX, apply_in_place};
use crate::foundation::error::StrataResult;

/// Bitmap effect applied to a node's rendered subtree.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    /// Gaussian blur. `radius` is in local units; `sigma` defaults to half the radius.
    Blur {
        /// Kernel radius.
        radius: u32,
        /// Standard deviation override.
        #[serde(default)]
        sigma: Option<f32>,
    },
    /// 4x5 color matrix on straight color.
    ColorMatrix {
        /// Row-major matrix; the fifth column is an offset.
        matrix: [f32; 20],
    },
}

impl Effect {
    /// Blur effect with the default sigma.
    pub fn blur(radius: u32) -> Self {
        Self::Blur {
            radius,
            sigma: None,
        }
    }

    /// Extra space the effect may paint outside the input bounds.
    pub fn padding(&self) -> f64 {
        match self {
            Self::Blur { radius, .. } => f64::from(*radius),
            Self::ColorMatrix { .. } => 0.0,
        }
    }

    /// `true` when applying the effect leaves every pixel unchanged.
    pub fn is_identity(&self) -> bool {
        match self {
            Self::Blur { radius, .. } => *radius == 0,
            Self::ColorMatrix { matrix } => *matrix == IDENTITY_COLOR_MATRIX,
        }
    }

    /// Run the effect in software over a premultiplied buffer rendered at `scale` device pixels
    /// per local unit.
    pub(crate) fn apply(
        &self,
        src: &[u8],
        width: u32,
        height: u32,
        scale: f64,
    ) -> StrataResult<Vec<u8>> {
        match self {
            Self::Blur { radius, sigma } => {
                let scale = if scale.is_finite() && scale > 0.0 {
                    scale
                } else {
                    1.0
                };
                let r = (f64::from(*radius) * scale).round().max(0.0) as u32;
                let sigma = sigma.map(|s| (f64::from(s) * scale) as f32);
                let kernel = GaussianKernel::new(r, sigma)?;
                blur_premul(src, width, height, &kernel)
            }
            Self::ColorMatrix { matrix } => {
                let mut out = src.to_vec();
                apply_in_place(&mut out, matrix);
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/effect.rs"]
mod tests;
