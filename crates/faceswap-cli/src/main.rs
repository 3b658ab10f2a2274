use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use faceswap_core::{
    codec, enhance, FaceDetector, FaceModel, FaceSwapper, SwapParameters, FULL_QUALITY,
    PREVIEW_QUALITY, SCRFD_MODEL_FILE,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "faceswap", about = "Face-swap pipeline on local files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces and print them as JSON
    Detect {
        image: PathBuf,
        /// Directory containing det_10g.onnx
        #[arg(long, env = "MODEL_PATH", default_value = "/app/models")]
        model_dir: PathBuf,
        /// ONNX intra-op threads
        #[arg(long, env = "DETECTOR_THREADS", default_value_t = 2)]
        threads: usize,
    },
    /// Run the full swap pipeline and write a JPEG
    Swap {
        image: PathBuf,
        output: PathBuf,
        /// Reference face image
        #[arg(long)]
        target: Option<PathBuf>,
        /// Blend strength in [0, 1]
        #[arg(long, default_value_t = SwapParameters::DEFAULT_BLEND_STRENGTH)]
        blend: f32,
        /// Face model: auto, refined or detailed
        #[arg(long, default_value = "auto")]
        model: String,
        #[arg(long, env = "MODEL_PATH", default_value = "/app/models")]
        model_dir: PathBuf,
        #[arg(long, env = "DETECTOR_THREADS", default_value_t = 2)]
        threads: usize,
    },
    /// Enhance and re-encode at preview quality, without detection
    Preview { image: PathBuf, output: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect {
            image,
            model_dir,
            threads,
        } => {
            let mut detector = load_detector(&model_dir, threads)?;
            let grid = read_image(&image)?;
            let faces = detector.detect(&grid)?;
            println!("{}", serde_json::to_string_pretty(&faces)?);
        }
        Commands::Swap {
            image,
            output,
            target,
            blend,
            model,
            model_dir,
            threads,
        } => {
            let face_model: FaceModel = model.parse()?;
            let params = SwapParameters::new(blend, true, face_model)?;
            let mut detector = load_detector(&model_dir, threads)?;

            let source = read_image(&image)?;
            let faces = detector.detect(&source)?;
            let Some(first) = faces.into_iter().next() else {
                bail!("no faces found in {}", image.display());
            };

            let target_face = match target {
                Some(path) => {
                    let reference = read_image(&path)?;
                    match detector.detect(&reference)?.into_iter().next() {
                        Some(face) => face,
                        None => bail!("no face found in reference {}", path.display()),
                    }
                }
                None => first,
            };

            let swapper = FaceSwapper::load(&model_dir);
            let mut result = swapper.swap(&source, &target_face, &params);
            enhance(&mut result);
            write_jpeg(&output, &result, FULL_QUALITY)?;
            println!("Wrote {}", output.display());
        }
        Commands::Preview { image, output } => {
            let mut grid = read_image(&image)?;
            enhance(&mut grid);
            write_jpeg(&output, &grid, PREVIEW_QUALITY)?;
            println!("Wrote {}", output.display());
        }
    }

    Ok(())
}

fn load_detector(model_dir: &Path, threads: usize) -> Result<FaceDetector> {
    let path = model_dir.join(SCRFD_MODEL_FILE);
    FaceDetector::load(&path.to_string_lossy(), threads.max(1))
        .with_context(|| format!("loading detector from {}", path.display()))
}

fn read_image(path: &Path) -> Result<faceswap_core::PixelGrid> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    codec::decode(&bytes).with_context(|| format!("decoding {}", path.display()))
}

fn write_jpeg(path: &Path, grid: &faceswap_core::PixelGrid, quality: u8) -> Result<()> {
    let jpeg = codec::encode_jpeg(grid, quality)?;
    std::fs::write(path, jpeg).with_context(|| format!("writing {}", path.display()))
}
