use faceswap_core::{DetectorError, FaceAnalyzer, FaceDescriptor, PixelGrid};
use std::thread::JoinHandle;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("analysis thread exited")]
    ChannelClosed,
    #[error("failed to spawn analysis thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Source grid handed back to the caller along with the faces found in it.
pub struct Detection {
    pub grid: PixelGrid,
    pub faces: Vec<FaceDescriptor>,
}

/// Messages sent from request handlers to the analysis thread.
enum EngineRequest {
    Detect {
        grid: PixelGrid,
        reply: oneshot::Sender<Result<Detection, DetectorError>>,
    },
}

/// Clone-safe handle to the analysis thread.
#[derive(Clone)]
pub struct AnalyzerHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl AnalyzerHandle {
    /// Run face detection on `grid`. The grid is returned with the result.
    pub async fn detect(&self, grid: PixelGrid) -> Result<Detection, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Detect {
                grid,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }
}

/// Running analysis thread. Dropping every [`AnalyzerHandle`] stops it.
pub struct Engine {
    handle: AnalyzerHandle,
    thread: JoinHandle<()>,
}

impl Engine {
    pub fn handle(&self) -> AnalyzerHandle {
        self.handle.clone()
    }

    /// Close the request channel and wait for the thread to drop the analyzer.
    ///
    /// Blocks until in-flight requests holding a handle clone have finished.
    pub fn stop(self) {
        let Engine { handle, thread } = self;
        drop(handle);
        if thread.join().is_err() {
            tracing::error!("analysis thread panicked");
        }
    }
}

/// Spawn the analysis thread that owns `analyzer` for its whole lifetime.
pub fn spawn_engine(mut analyzer: Box<dyn FaceAnalyzer>) -> Result<Engine, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);
    let backend = analyzer.name().to_string();

    let thread = std::thread::Builder::new()
        .name("faceswap-analysis".into())
        .spawn(move || {
            tracing::info!(backend = %backend, "analysis thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Detect { grid, reply } => {
                        let started = std::time::Instant::now();
                        let result = analyzer.detect(&grid).map(|faces| {
                            tracing::debug!(
                                faces = faces.len(),
                                width = grid.width(),
                                height = grid.height(),
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "detection finished"
                            );
                            Detection { grid, faces }
                        });
                        let _ = reply.send(result);
                    }
                }
            }
            drop(analyzer);
            tracing::info!("analysis thread exiting");
        })?;

    Ok(Engine {
        handle: AnalyzerHandle { tx },
        thread,
    })
}
