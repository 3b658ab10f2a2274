//! HTTP surface: routes, multipart form parsing, JSON status documents.

use crate::config::Config;
use crate::error::SwapError;
use crate::gpu::GpuInfo;
use crate::orchestrator::{self, Orchestrator, SwapRequest};
use crate::registry::ModelRegistry;
use crate::stats::ProcessingStats;
use axum::body::{Body, Bytes};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::header::{self, HeaderName};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use faceswap_core::SwapParameters;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const SERVICE_NAME: &str = "face-swap";
const PREVIEW_SERVICE_NAME: &str = "face-swap-preview";

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<ModelRegistry>,
    pub stats: Arc<ProcessingStats>,
    pub orchestrator: Arc<Orchestrator>,
    pub gpu: GpuInfo,
}

impl AppState {
    pub fn new(config: Config, registry: Arc<ModelRegistry>, gpu: GpuInfo) -> Self {
        let stats = Arc::new(ProcessingStats::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&registry),
            Arc::clone(&stats),
            config.processing_delay,
            config.processing_timeout,
        ));
        Self {
            config: Arc::new(config),
            registry,
            stats,
            orchestrator,
            gpu,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/face-swap", post(face_swap))
        .route("/face-swap/preview", post(face_swap_preview))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let snap = state.stats.snapshot();
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "gpu_available": state.gpu.available,
        "gpu_memory_gb": state.gpu.memory_gb,
        "models_loaded": state.registry.is_ready().await,
        "model_state": state.registry.state().await,
        "device": state.gpu.device(),
        "workers": state.config.workers,
        "stats": {
            "total_requests": snap.total_requests,
            "successful_requests": snap.successful_requests,
            "failed_requests": snap.failed_requests,
            "average_processing_time": snap.total_processing_time / snap.total_requests.max(1) as f64,
            "last_request": snap.last_request_time,
        },
    }))
}

async fn stats(State(state): State<AppState>) -> Json<Value> {
    let snap = state.stats.snapshot();
    Json(json!({
        "service": SERVICE_NAME,
        "uptime": snap.uptime_secs,
        "last_request": snap.last_request_time,
        "requests": {
            "total": snap.total_requests,
            "successful": snap.successful_requests,
            "failed": snap.failed_requests,
            "success_rate": snap.success_rate,
        },
        "performance": {
            "total_processing_time": snap.total_processing_time,
            "average_processing_time": snap.avg_latency,
            "requests_per_second": snap.requests_per_second,
        },
        "system": {
            "device": state.gpu.device(),
            "gpu_available": state.gpu.available,
            "workers": state.config.workers,
            "model_path": state.registry.model_dir().display().to_string(),
        },
    }))
}

async fn face_swap(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, SwapError> {
    let mut form = UploadForm::read(multipart).await?;
    let base = SwapRequest::new(form.require_file("image")?);
    let req = SwapRequest {
        target_face: form.take_file("target_face"),
        blend_strength: form.float("blend_strength", base.blend_strength)?,
        preserve_identity: form.boolean("preserve_identity", base.preserve_identity)?,
        face_model: form.value("face_model")?.unwrap_or(base.face_model.clone()),
        ..base
    };

    let outcome = state.orchestrator.face_swap(req).await?;
    Response::builder()
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header("X-Processing-Time", outcome.processing_time.to_string())
        .header("X-Service", SERVICE_NAME)
        .header("X-Model", outcome.params.face_model().as_str())
        .header("X-Blend-Strength", outcome.params.blend_strength().to_string())
        .header("X-Request-Id", outcome.request_id.to_string())
        .body(Body::from(outcome.jpeg))
        .map_err(|e| SwapError::Internal(e.to_string()))
}

async fn face_swap_preview(multipart: Multipart) -> Result<Response, SwapError> {
    let mut form = UploadForm::read(multipart).await?;
    let image = form.require_file("image")?;
    let blend_strength = form.float("blend_strength", SwapParameters::DEFAULT_PREVIEW_BLEND_STRENGTH)?;

    let jpeg = orchestrator::preview(image, blend_strength).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (HeaderName::from_static("x-service"), PREVIEW_SERVICE_NAME),
        ],
        jpeg,
    )
        .into_response())
}

/// Buffered multipart fields, keyed by name. Later duplicates win.
struct UploadForm {
    fields: HashMap<String, Bytes>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, SwapError> {
        let mut fields = HashMap::new();
        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let data = field.bytes().await.map_err(malformed)?;
            fields.insert(name, data);
        }
        Ok(Self { fields })
    }

    fn take_file(&mut self, name: &str) -> Option<Bytes> {
        self.fields.remove(name)
    }

    fn require_file(&mut self, name: &str) -> Result<Bytes, SwapError> {
        self.take_file(name)
            .ok_or_else(|| SwapError::InvalidArgument(format!("Missing required field: {name}")))
    }

    fn text(&self, name: &str) -> Result<Option<String>, SwapError> {
        self.fields
            .get(name)
            .map(|raw| {
                std::str::from_utf8(raw)
                    .map(|s| s.trim().to_string())
                    .map_err(|_| SwapError::InvalidArgument(format!("{name} must be UTF-8 text")))
            })
            .transpose()
    }

    /// Non-empty text value, or `None` when absent or blank.
    fn value(&self, name: &str) -> Result<Option<String>, SwapError> {
        Ok(self.text(name)?.filter(|s| !s.is_empty()))
    }

    fn float(&self, name: &str, default: f32) -> Result<f32, SwapError> {
        match self.value(name)? {
            None => Ok(default),
            Some(v) => v
                .parse()
                .map_err(|_| SwapError::InvalidArgument(format!("{name} must be a number, got {v:?}"))),
        }
    }

    fn boolean(&self, name: &str, default: bool) -> Result<bool, SwapError> {
        match self.value(name)? {
            None => Ok(default),
            Some(v) => parse_bool(&v)
                .ok_or_else(|| SwapError::InvalidArgument(format!("{name} must be a boolean, got {v:?}"))),
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn malformed(e: MultipartError) -> SwapError {
    SwapError::InvalidArgument(format!("malformed multipart body: {}", e.body_text()))
}
