use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Decoded 8-bit RGB image, row-major (height × width × 3).
pub type PixelGrid = image::RgbImage;

/// One face found by the detector, in source-image pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceDescriptor {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceDescriptor {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// Face model requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaceModel {
    #[default]
    Auto,
    Refined,
    Detailed,
}

impl FaceModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaceModel::Auto => "auto",
            FaceModel::Refined => "refined",
            FaceModel::Detailed => "detailed",
        }
    }
}

impl fmt::Display for FaceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaceModel {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(FaceModel::Auto),
            "refined" => Ok(FaceModel::Refined),
            "detailed" => Ok(FaceModel::Detailed),
            other => Err(ParamError::UnknownFaceModel(other.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("blend_strength must be between 0.0 and 1.0 (got {0})")]
    BlendStrengthOutOfRange(f32),
    #[error("Invalid face_model: {0:?} (expected auto, refined or detailed)")]
    UnknownFaceModel(String),
}

/// Validated swap parameters. Only constructible through [`SwapParameters::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapParameters {
    blend_strength: f32,
    preserve_identity: bool,
    face_model: FaceModel,
}

impl SwapParameters {
    pub const DEFAULT_BLEND_STRENGTH: f32 = 0.8;
    pub const DEFAULT_PREVIEW_BLEND_STRENGTH: f32 = 0.5;

    pub fn new(
        blend_strength: f32,
        preserve_identity: bool,
        face_model: FaceModel,
    ) -> Result<Self, ParamError> {
        // NaN fails the range check too.
        if !(0.0..=1.0).contains(&blend_strength) {
            return Err(ParamError::BlendStrengthOutOfRange(blend_strength));
        }
        Ok(Self {
            blend_strength,
            preserve_identity,
            face_model,
        })
    }

    /// Validate raw form values, parsing the model name.
    pub fn parse(
        blend_strength: f32,
        preserve_identity: bool,
        face_model: &str,
    ) -> Result<Self, ParamError> {
        let params = Self::new(blend_strength, preserve_identity, FaceModel::Auto)?;
        Ok(Self {
            face_model: face_model.parse()?,
            ..params
        })
    }

    pub fn blend_strength(&self) -> f32 {
        self.blend_strength
    }

    pub fn preserve_identity(&self) -> bool {
        self.preserve_identity
    }

    pub fn face_model(&self) -> FaceModel {
        self.face_model
    }
}

impl Default for SwapParameters {
    fn default() -> Self {
        Self {
            blend_strength: Self::DEFAULT_BLEND_STRENGTH,
            preserve_identity: true,
            face_model: FaceModel::Auto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_model_parse() {
        assert_eq!("auto".parse::<FaceModel>(), Ok(FaceModel::Auto));
        assert_eq!("refined".parse::<FaceModel>(), Ok(FaceModel::Refined));
        assert_eq!("detailed".parse::<FaceModel>(), Ok(FaceModel::Detailed));
    }

    #[test]
    fn test_face_model_rejects_unknown_and_case_variants() {
        assert!("fast".parse::<FaceModel>().is_err());
        assert!("Auto".parse::<FaceModel>().is_err());
        assert!("".parse::<FaceModel>().is_err());
    }

    #[test]
    fn test_face_model_display_matches_wire_name() {
        for model in [FaceModel::Auto, FaceModel::Refined, FaceModel::Detailed] {
            assert_eq!(model.to_string().parse::<FaceModel>(), Ok(model));
        }
    }

    #[test]
    fn test_face_descriptor_json_shape() {
        let face = FaceDescriptor {
            x: 1.0,
            y: 2.0,
            width: 3.0,
            height: 4.0,
            confidence: 0.5,
            landmarks: None,
        };
        let json = serde_json::to_value(&face).unwrap();
        assert_eq!(json["width"], 3.0);
        assert_eq!(json["confidence"], 0.5);
        assert!(json["landmarks"].is_null());
    }

    #[test]
    fn test_blend_strength_bounds_inclusive() {
        assert!(SwapParameters::new(0.0, true, FaceModel::Auto).is_ok());
        assert!(SwapParameters::new(1.0, true, FaceModel::Auto).is_ok());
    }

    #[test]
    fn test_blend_strength_out_of_range() {
        assert_eq!(
            SwapParameters::new(-0.1, true, FaceModel::Auto),
            Err(ParamError::BlendStrengthOutOfRange(-0.1))
        );
        assert!(SwapParameters::new(1.5, true, FaceModel::Auto).is_err());
        assert!(SwapParameters::new(f32::NAN, true, FaceModel::Auto).is_err());
    }

    #[test]
    fn test_parse_validates_both_fields() {
        let p = SwapParameters::parse(0.3, false, "detailed").unwrap();
        assert_eq!(p.face_model(), FaceModel::Detailed);
        assert!(!p.preserve_identity());
        assert!((p.blend_strength() - 0.3).abs() < 1e-6);

        assert!(matches!(
            SwapParameters::parse(0.3, true, "ultra"),
            Err(ParamError::UnknownFaceModel(_))
        ));
        assert!(matches!(
            SwapParameters::parse(2.0, true, "auto"),
            Err(ParamError::BlendStrengthOutOfRange(_))
        ));
    }

    #[test]
    fn test_descriptor_area_clamps_negative() {
        let face = FaceDescriptor {
            x: 0.0, y: 0.0, width: -5.0, height: 10.0,
            confidence: 0.9, landmarks: None,
        };
        assert_eq!(face.area(), 0.0);
    }
}
