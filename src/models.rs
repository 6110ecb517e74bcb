//! Supported segmentation models and their fixed preprocessing parameters

use crate::error::{ExtractorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Release that hosts the published ONNX weights for every supported model
const MODEL_RELEASE_URL: &str = "https://github.com/danielgatis/rembg/releases/download/v0.0.0";

/// Model identifiers accepted by the service and the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ModelKind {
    /// General purpose U2-Net
    #[serde(rename = "u2net")]
    #[cfg_attr(feature = "cli", value(name = "u2net"))]
    U2Net,
    /// Lightweight U2-Net
    #[serde(rename = "u2netp")]
    #[cfg_attr(feature = "cli", value(name = "u2netp"))]
    U2NetP,
    /// U2-Net trained for human segmentation
    #[serde(rename = "u2net_human_seg")]
    #[cfg_attr(feature = "cli", value(name = "u2net_human_seg"))]
    U2NetHumanSeg,
    /// U2-Net trained for clothing parsing (upper body, lower body, full body)
    #[serde(rename = "u2net_cloth_seg")]
    #[cfg_attr(feature = "cli", value(name = "u2net_cloth_seg"))]
    U2NetClothSeg,
    /// IS-Net general use model
    #[serde(rename = "isnet-general-use")]
    #[cfg_attr(feature = "cli", value(name = "isnet-general-use"))]
    IsNetGeneralUse,
}

impl ModelKind {
    /// Every supported model, in the order the service advertises them
    pub const ALL: [ModelKind; 5] = [
        ModelKind::U2Net,
        ModelKind::U2NetP,
        ModelKind::U2NetHumanSeg,
        ModelKind::U2NetClothSeg,
        ModelKind::IsNetGeneralUse,
    ];

    /// Stable identifier used on the wire and on the command line
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::U2Net => "u2net",
            Self::U2NetP => "u2netp",
            Self::U2NetHumanSeg => "u2net_human_seg",
            Self::U2NetClothSeg => "u2net_cloth_seg",
            Self::IsNetGeneralUse => "isnet-general-use",
        }
    }

    /// Identifiers of all supported models
    #[must_use]
    pub fn ids() -> Vec<&'static str> {
        Self::ALL.iter().map(|kind| kind.as_str()).collect()
    }

    /// File name of the ONNX weights inside the model cache
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.onnx", self.as_str())
    }

    /// Download URL of the ONNX weights
    #[must_use]
    pub fn download_url(self) -> String {
        format!("{MODEL_RELEASE_URL}/{}", self.file_name())
    }

    /// Number of channels in the model's first output
    ///
    /// The clothing model predicts four classes (background, upper body,
    /// lower body, full body); the others predict a single foreground map.
    #[must_use]
    pub fn output_channels(self) -> usize {
        match self {
            Self::U2NetClothSeg => 4,
            _ => 1,
        }
    }

    /// Preprocessing parameters the model was trained with
    #[must_use]
    pub fn preprocessing_config(self) -> PreprocessingConfig {
        match self {
            Self::U2Net | Self::U2NetP | Self::U2NetHumanSeg => PreprocessingConfig {
                target_size: [320, 320],
                normalization_mean: IMAGENET_MEAN,
                normalization_std: IMAGENET_STD,
            },
            Self::U2NetClothSeg => PreprocessingConfig {
                target_size: [768, 768],
                normalization_mean: IMAGENET_MEAN,
                normalization_std: IMAGENET_STD,
            },
            Self::IsNetGeneralUse => PreprocessingConfig {
                target_size: [1024, 1024],
                normalization_mean: [0.5, 0.5, 0.5],
                normalization_std: [1.0, 1.0, 1.0],
            },
        }
    }

    /// Tensor shapes for this model, logged when a backend session comes up
    #[must_use]
    pub fn info(self) -> ModelInfo {
        let [width, height] = self.preprocessing_config().target_size;
        ModelInfo {
            name: self.as_str().to_string(),
            input_shape: (1, 3, height as usize, width as usize),
            output_shape: (1, self.output_channels(), height as usize, width as usize),
        }
    }
}

impl Default for ModelKind {
    fn default() -> Self {
        Self::U2Net
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ExtractorError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                ExtractorError::invalid_config(format!(
                    "Unknown model '{}'. Supported: {}",
                    wanted,
                    Self::ids().join(", ")
                ))
            })
    }
}

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Tensor preparation parameters for a model
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingConfig {
    /// Input width and height expected by the model
    pub target_size: [u32; 2],
    /// Per-channel mean subtracted after scaling to 0..1
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation divided out after mean subtraction
    pub normalization_std: [f32; 3],
}

/// Model information and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ids_are_stable() {
        assert_eq!(
            ModelKind::ids(),
            vec![
                "u2net",
                "u2netp",
                "u2net_human_seg",
                "u2net_cloth_seg",
                "isnet-general-use"
            ]
        );
    }

    #[test]
    fn test_model_kind_parsing() {
        assert_eq!("u2net".parse::<ModelKind>().unwrap(), ModelKind::U2Net);
        assert_eq!(
            " ISNET-general-use ".parse::<ModelKind>().unwrap(),
            ModelKind::IsNetGeneralUse
        );

        let err = "silueta".parse::<ModelKind>().unwrap_err();
        assert!(err.to_string().contains("silueta"));
        assert!(err.to_string().contains("u2net_cloth_seg"));
    }

    #[test]
    fn test_model_kind_round_trips_through_display() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.to_string().parse::<ModelKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_default_model() {
        assert_eq!(ModelKind::default(), ModelKind::U2Net);
    }

    #[test]
    fn test_download_url() {
        assert_eq!(ModelKind::U2NetP.file_name(), "u2netp.onnx");
        assert_eq!(
            ModelKind::U2NetP.download_url(),
            "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2netp.onnx"
        );
    }

    #[test]
    fn test_preprocessing_configs() {
        let u2net = ModelKind::U2Net.preprocessing_config();
        assert_eq!(u2net.target_size, [320, 320]);
        assert_eq!(u2net.normalization_mean, [0.485, 0.456, 0.406]);

        let cloth = ModelKind::U2NetClothSeg.preprocessing_config();
        assert_eq!(cloth.target_size, [768, 768]);

        let isnet = ModelKind::IsNetGeneralUse.preprocessing_config();
        assert_eq!(isnet.target_size, [1024, 1024]);
        assert_eq!(isnet.normalization_std, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_model_info_shapes() {
        let info = ModelKind::U2NetClothSeg.info();
        assert_eq!(info.name, "u2net_cloth_seg");
        assert_eq!(info.input_shape, (1, 3, 768, 768));
        assert_eq!(info.output_shape, (1, 4, 768, 768));

        assert_eq!(ModelKind::U2Net.info().output_shape, (1, 1, 320, 320));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&ModelKind::U2NetHumanSeg).unwrap();
        assert_eq!(json, "\"u2net_human_seg\"");
        let kind: ModelKind = serde_json::from_str("\"isnet-general-use\"").unwrap();
        assert_eq!(kind, ModelKind::IsNetGeneralUse);
    }
}
