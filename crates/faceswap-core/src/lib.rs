//! faceswap-core — Image pipeline for the face-swap service.
//!
//! Decodes uploads into RGB pixel grids, finds faces with SCRFD running on
//! ONNX Runtime, and applies the blend/enhancement transform before
//! re-encoding to JPEG.

pub mod analyzer;
pub mod codec;
pub mod detector;
pub mod swap;
pub mod types;

pub use analyzer::FaceAnalyzer;
pub use codec::{decode, encode_jpeg, CodecError, FULL_QUALITY, PREVIEW_QUALITY};
pub use detector::{DetectorError, FaceDetector};
pub use swap::{enhance, FaceSwapper};
pub use types::{FaceDescriptor, FaceModel, ParamError, PixelGrid, SwapParameters};

use std::path::PathBuf;

/// File name of the SCRFD detection model inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";

/// Model directory used when none is configured.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/app/models")
}
