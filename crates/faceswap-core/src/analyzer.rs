use crate::detector::DetectorError;
use crate::types::{FaceDescriptor, PixelGrid};

/// A face-analysis backend.
///
/// Implementations are loaded once and reused for every request. An empty
/// result means no face was found; it is not an error.
pub trait FaceAnalyzer: Send {
    fn detect(&mut self, grid: &PixelGrid) -> Result<Vec<FaceDescriptor>, DetectorError>;

    /// Short backend name for logs and status output.
    fn name(&self) -> &str {
        "analyzer"
    }
}
