/// Accelerator availability, probed once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuInfo {
    pub available: bool,
    /// Total memory of the first GPU, in GiB rounded to two decimals.
    pub memory_gb: f64,
}

impl GpuInfo {
    pub fn none() -> Self {
        Self {
            available: false,
            memory_gb: 0.0,
        }
    }

    pub fn device(&self) -> &'static str {
        if self.available {
            "cuda"
        } else {
            "cpu"
        }
    }

    /// Query `nvidia-smi` for the first GPU. Any failure means no GPU.
    pub async fn probe(enabled: bool) -> Self {
        if !enabled {
            tracing::info!("GPU disabled via GPU_ENABLED");
            return Self::none();
        }

        let output = tokio::process::Command::new("nvidia-smi")
            .args(["--query-gpu=memory.total", "--format=csv,noheader,nounits"])
            .output()
            .await;

        let info = match output {
            Ok(out) if out.status.success() => {
                match parse_memory_mib(&String::from_utf8_lossy(&out.stdout)) {
                    Some(mib) => Self {
                        available: true,
                        memory_gb: (mib / 1024.0 * 100.0).round() / 100.0,
                    },
                    None => Self::none(),
                }
            }
            Ok(out) => {
                tracing::debug!(status = %out.status, "nvidia-smi reported no usable GPU");
                Self::none()
            }
            Err(e) => {
                tracing::debug!(error = %e, "nvidia-smi not available");
                Self::none()
            }
        };

        tracing::info!(device = info.device(), memory_gb = info.memory_gb, "GPU probe finished");
        info
    }
}

/// First line of `nvidia-smi --query-gpu=memory.total` output, in MiB.
fn parse_memory_mib(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())?
        .parse()
        .ok()
}
