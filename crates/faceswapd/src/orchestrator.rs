//! Request pipeline for `/face-swap` and `/face-swap/preview`.

use crate::error::SwapError;
use crate::registry::{LoadedModels, ModelRegistry};
use crate::stats::ProcessingStats;
use axum::body::Bytes;
use faceswap_core::{
    codec, enhance, CodecError, FaceDescriptor, PixelGrid, SwapParameters, FULL_QUALITY,
    PREVIEW_QUALITY,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Raw form values for one swap request. Validation happens in the pipeline.
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub image: Bytes,
    pub target_face: Option<Bytes>,
    pub blend_strength: f32,
    pub preserve_identity: bool,
    pub face_model: String,
}

impl SwapRequest {
    pub fn new(image: impl Into<Bytes>) -> Self {
        let defaults = SwapParameters::default();
        Self {
            image: image.into(),
            target_face: None,
            blend_strength: defaults.blend_strength(),
            preserve_identity: defaults.preserve_identity(),
            face_model: defaults.face_model().to_string(),
        }
    }
}

pub struct SwapOutcome {
    pub request_id: Uuid,
    pub jpeg: Vec<u8>,
    /// Wall time from request start to encoded output, in seconds.
    pub processing_time: f64,
    pub params: SwapParameters,
}

pub struct Orchestrator {
    registry: Arc<ModelRegistry>,
    stats: Arc<ProcessingStats>,
    processing_delay: Duration,
    timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ModelRegistry>,
        stats: Arc<ProcessingStats>,
        processing_delay: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            stats,
            processing_delay,
            timeout,
        }
    }

    /// Run the full pipeline. Every call counts as exactly one success or failure.
    pub async fn face_swap(&self, req: SwapRequest) -> Result<SwapOutcome, SwapError> {
        let request_id = Uuid::new_v4();
        let started = self.stats.record_start();

        match self.run(req).await {
            Ok((jpeg, params)) => {
                let processing_time = started.elapsed().as_secs_f64();
                self.stats.record_success(processing_time);
                tracing::info!(
                    %request_id,
                    processing_time,
                    bytes = jpeg.len(),
                    "face swap completed"
                );
                Ok(SwapOutcome {
                    request_id,
                    jpeg,
                    processing_time,
                    params,
                })
            }
            Err(e) => {
                self.stats.record_failure();
                tracing::warn!(%request_id, kind = e.kind(), error = %e, "face swap failed");
                Err(e)
            }
        }
    }

    async fn run(&self, req: SwapRequest) -> Result<(Vec<u8>, SwapParameters), SwapError> {
        let models = self
            .registry
            .models()
            .await
            .ok_or_else(|| SwapError::ServiceUnavailable("Models not initialized".into()))?;

        let params =
            SwapParameters::parse(req.blend_strength, req.preserve_identity, &req.face_model)?;
        if req.image.is_empty() {
            return Err(SwapError::InvalidArgument("Empty image file".into()));
        }

        tracing::info!(
            blend_strength = params.blend_strength(),
            preserve_identity = params.preserve_identity(),
            face_model = %params.face_model(),
            "processing face swap"
        );

        let jpeg = tokio::time::timeout(self.timeout, self.process(models, req, params))
            .await
            .map_err(|_| SwapError::Timeout(self.timeout))??;
        Ok((jpeg, params))
    }

    async fn process(
        &self,
        models: LoadedModels,
        req: SwapRequest,
        params: SwapParameters,
    ) -> Result<Vec<u8>, SwapError> {
        let source = decode_blocking(req.image)
            .await?
            .map_err(|_| SwapError::InvalidArgument("Invalid image format".into()))?;

        let detection = models.analyzer.detect(source).await?;
        let source = detection.grid;
        let Some(first) = detection.faces.into_iter().next() else {
            return Err(SwapError::NoFaceFound("No faces found in the image".into()));
        };

        let target = match req.target_face.filter(|b| !b.is_empty()) {
            Some(bytes) => reference_face(&models, bytes).await?,
            None => first,
        };

        if !self.processing_delay.is_zero() {
            tokio::time::sleep(self.processing_delay).await;
        }

        let swapper = Arc::clone(&models.swapper);
        tokio::task::spawn_blocking(move || {
            let mut result = swapper.swap(&source, &target, &params);
            enhance(&mut result);
            codec::encode_jpeg(&result, FULL_QUALITY)
        })
        .await
        .map_err(|e| SwapError::Internal(e.to_string()))?
        .map_err(|e| SwapError::Internal(e.to_string()))
    }
}

/// First face of the uploaded reference image.
async fn reference_face(models: &LoadedModels, bytes: Bytes) -> Result<FaceDescriptor, SwapError> {
    let grid = decode_blocking(bytes)
        .await?
        .map_err(|e| SwapError::Internal(format!("target_face: {e}")))?;
    let detection = models.analyzer.detect(grid).await?;
    detection
        .faces
        .into_iter()
        .next()
        .ok_or_else(|| SwapError::NoFaceFound("No face found in the reference image".into()))
}

async fn decode_blocking(bytes: Bytes) -> Result<Result<PixelGrid, CodecError>, SwapError> {
    tokio::task::spawn_blocking(move || codec::decode(&bytes))
        .await
        .map_err(|e| SwapError::Internal(e.to_string()))
}

/// Fast path: decode, enhance, re-encode at preview quality. No face detection.
pub async fn preview(image: Bytes, blend_strength: f32) -> Result<Vec<u8>, SwapError> {
    tracing::debug!(blend_strength, bytes = image.len(), "face swap preview");
    tokio::task::spawn_blocking(move || {
        let mut grid = codec::decode(&image)?;
        enhance(&mut grid);
        codec::encode_jpeg(&grid, PREVIEW_QUALITY)
    })
    .await
    .map_err(|e| SwapError::Internal(e.to_string()))?
    .map_err(|e| SwapError::Internal(e.to_string()))
}
