//! Test doubles and fixtures shared by the daemon's unit tests.

use crate::registry::AnalyzerLoader;
use faceswap_core::{DetectorError, FaceAnalyzer, FaceDescriptor, PixelGrid};
use image::{ImageFormat, Rgb};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Analyzer that "finds" one face in any non-uniform image.
///
/// Solid-colour images have no faces. Call count is shared across clones.
#[derive(Clone)]
pub struct FakeAnalyzer {
    calls: Arc<AtomicUsize>,
    failure: Option<String>,
}

impl FakeAnalyzer {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            failure: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FaceAnalyzer for FakeAnalyzer {
    fn detect(&mut self, grid: &PixelGrid) -> Result<Vec<FaceDescriptor>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = &self.failure {
            return Err(DetectorError::InferenceFailed(msg.clone()));
        }
        let first = grid.get_pixel_checked(0, 0).copied();
        if grid.pixels().all(|p| Some(*p) == first) {
            return Ok(Vec::new());
        }
        Ok(vec![FaceDescriptor {
            x: grid.width() as f32 * 0.25,
            y: grid.height() as f32 * 0.25,
            width: grid.width() as f32 * 0.5,
            height: grid.height() as f32 * 0.5,
            confidence: 0.93,
            landmarks: None,
        }])
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Loader handing out clones of one [`FakeAnalyzer`], or failing.
pub struct FakeLoader {
    pub analyzer: FakeAnalyzer,
    pub fail: bool,
    pub loads: Arc<AtomicUsize>,
}

impl FakeLoader {
    pub fn new(analyzer: FakeAnalyzer) -> Self {
        Self {
            analyzer,
            fail: false,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn broken() -> Self {
        Self {
            fail: true,
            ..Self::new(FakeAnalyzer::new())
        }
    }
}

impl AnalyzerLoader for FakeLoader {
    fn load(&self) -> Result<Box<dyn FaceAnalyzer>, DetectorError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DetectorError::ModelNotFound("/app/models/det_10g.onnx".into()));
        }
        Ok(Box::new(self.analyzer.clone()))
    }

    fn describe(&self) -> String {
        "fake loader".into()
    }
}

pub fn solid(width: u32, height: u32) -> PixelGrid {
    PixelGrid::from_pixel(width, height, Rgb([120, 60, 200]))
}

/// Smooth gradient: survives JPEG with small per-sample error.
pub fn textured(width: u32, height: u32) -> PixelGrid {
    PixelGrid::from_fn(width, height, |x, y| {
        Rgb([
            (40 + x * 120 / width.max(1)) as u8,
            (60 + y * 100 / height.max(1)) as u8,
            90,
        ])
    })
}

pub fn png(grid: &PixelGrid) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    grid.write_to(&mut buf, ImageFormat::Png)
        .expect("png encoding of test fixture");
    buf.into_inner()
}
