//! Model lifecycle: loads the analysis and swap models once at startup and
//! hands out handles to them while the service is ready.

use crate::engine::{spawn_engine, AnalyzerHandle, Engine, EngineError};
use faceswap_core::{DetectorError, FaceAnalyzer, FaceDetector, FaceSwapper};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Builds the face-analysis backend. Called at most once per process.
pub trait AnalyzerLoader: Send + Sync {
    fn load(&self) -> Result<Box<dyn FaceAnalyzer>, DetectorError>;

    fn describe(&self) -> String;
}

/// Loads the SCRFD detector from the model directory.
pub struct ScrfdLoader {
    model_path: PathBuf,
    intra_threads: usize,
}

impl ScrfdLoader {
    pub fn new(model_path: impl Into<PathBuf>, intra_threads: usize) -> Self {
        Self {
            model_path: model_path.into(),
            intra_threads,
        }
    }
}

impl AnalyzerLoader for ScrfdLoader {
    fn load(&self) -> Result<Box<dyn FaceAnalyzer>, DetectorError> {
        let detector = FaceDetector::load(&self.model_path.to_string_lossy(), self.intra_threads)?;
        Ok(Box::new(detector))
    }

    fn describe(&self) -> String {
        format!("scrfd:{}", self.model_path.display())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Uninitialized,
    Ready,
    Failed,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("face analyzer: {0}")]
    Load(#[from] DetectorError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("model loading task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Handles to the loaded models, cloned out per request.
#[derive(Clone)]
pub struct LoadedModels {
    pub analyzer: AnalyzerHandle,
    pub swapper: Arc<FaceSwapper>,
}

struct Slots {
    state: LifecycleState,
    engine: Option<Engine>,
    swapper: Option<Arc<FaceSwapper>>,
}

/// Owner of the analysis engine and swap model.
pub struct ModelRegistry {
    loader: Arc<dyn AnalyzerLoader>,
    model_dir: PathBuf,
    load_delay: Duration,
    attempted: AtomicBool,
    slots: RwLock<Slots>,
}

impl ModelRegistry {
    pub fn new(
        loader: Arc<dyn AnalyzerLoader>,
        model_dir: impl Into<PathBuf>,
        load_delay: Duration,
    ) -> Self {
        Self {
            loader,
            model_dir: model_dir.into(),
            load_delay,
            attempted: AtomicBool::new(false),
            slots: RwLock::new(Slots {
                state: LifecycleState::Uninitialized,
                engine: None,
                swapper: None,
            }),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Load all models. Returns `false` on failure instead of erroring; the
    /// service keeps running in a not-ready state.
    ///
    /// Only the first call does any work. Later calls report current readiness.
    pub async fn initialize(&self) -> bool {
        if self.attempted.swap(true, Ordering::SeqCst) {
            tracing::warn!("model initialization already ran; ignoring repeat call");
            return self.is_ready().await;
        }

        tracing::info!(loader = %self.loader.describe(), "initializing face analysis models");
        match self.load().await {
            Ok((engine, swapper)) => {
                let mut slots = self.slots.write().await;
                slots.engine = Some(engine);
                slots.swapper = Some(Arc::new(swapper));
                slots.state = LifecycleState::Ready;
                tracing::info!("models initialized");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to initialize models");
                self.slots.write().await.state = LifecycleState::Failed;
                false
            }
        }
    }

    async fn load(&self) -> Result<(Engine, FaceSwapper), RegistryError> {
        let loader = Arc::clone(&self.loader);
        let analyzer = tokio::task::spawn_blocking(move || loader.load()).await??;
        let engine = spawn_engine(analyzer)?;

        tracing::info!(model_dir = %self.model_dir.display(), "loading face swap model");
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        Ok((engine, FaceSwapper::load(&self.model_dir)))
    }

    /// Release loaded models. Safe to call repeatedly or before `initialize`.
    pub async fn shutdown(&self) {
        let engine = {
            let mut slots = self.slots.write().await;
            slots.swapper = None;
            slots.state = LifecycleState::Uninitialized;
            slots.engine.take()
        };

        let Some(engine) = engine else {
            tracing::debug!("no models loaded; nothing to release");
            return;
        };
        match tokio::task::spawn_blocking(move || engine.stop()).await {
            Ok(()) => tracing::info!("analysis models released"),
            Err(e) => tracing::error!(error = %e, "failed to stop analysis thread"),
        }
    }

    pub async fn state(&self) -> LifecycleState {
        self.slots.read().await.state
    }

    pub async fn is_ready(&self) -> bool {
        self.state().await == LifecycleState::Ready
    }

    /// Model handles, or `None` unless the registry is ready.
    pub async fn models(&self) -> Option<LoadedModels> {
        let slots = self.slots.read().await;
        if slots.state != LifecycleState::Ready {
            return None;
        }
        Some(LoadedModels {
            analyzer: slots.engine.as_ref()?.handle(),
            swapper: Arc::clone(slots.swapper.as_ref()?),
        })
    }
}
