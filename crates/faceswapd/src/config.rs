use std::path::PathBuf;
use std::time::Duration;

/// Service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Whether GPU use is allowed at all.
    pub gpu_enabled: bool,
    /// Number of async runtime worker threads.
    pub workers: usize,
    /// Listen address for the HTTP server.
    pub bind_addr: String,
    /// Intra-op threads for the detection session.
    pub detector_threads: usize,
    /// Simulated swap-model load latency during startup.
    pub model_load_delay: Duration,
    /// Simulated swap-model latency per request.
    pub processing_delay: Duration,
    /// Upper bound on decode + detect + transform + encode for one request.
    pub processing_timeout: Duration,
    /// Maximum accepted request body size.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from the process environment with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            model_dir: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(faceswap_core::default_model_dir),
            gpu_enabled: lookup("GPU_ENABLED")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            workers: (parsed("WORKERS", 2) as usize).max(1),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            detector_threads: (parsed("DETECTOR_THREADS", 2) as usize).max(1),
            model_load_delay: Duration::from_millis(parsed("MODEL_LOAD_DELAY_MS", 2000)),
            processing_delay: Duration::from_millis(parsed("PROCESSING_DELAY_MS", 2000)),
            processing_timeout: Duration::from_secs(parsed("PROCESSING_TIMEOUT_SECS", 120).max(1)),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", 32 * 1024 * 1024) as usize,
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> PathBuf {
        self.model_dir.join(faceswap_core::SCRFD_MODEL_FILE)
    }
}
