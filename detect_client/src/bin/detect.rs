//! Detection client binary.
//!
use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use detect_client::{
    config::{ClientConfig, BACKEND_URL_ENV, DEFAULT_BACKEND_URL},
    sensors::{CaptureConstraints, Facing},
    DetectionWorkflow, HttpDetectionClient,
};
use env_logger::TimestampPrecision;

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Base URL of the detection service
    #[clap(long, env = BACKEND_URL_ENV, default_value = DEFAULT_BACKEND_URL)]
    backend_url: String,

    /// Request timeout in seconds
    #[clap(long, default_value = "30")]
    timeout_secs: u64,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect objects in an image file or a camera snapshot
    Run {
        /// Image file to analyze
        #[clap(long, conflicts_with = "camera", required_unless_present = "camera")]
        image: Option<PathBuf>,

        /// Take a snapshot from the camera instead
        #[clap(long)]
        camera: bool,

        /// Video device to capture from
        #[clap(long, default_value = "/dev/video0")]
        device: String,

        #[clap(long, default_value = "1280")]
        width: u32,

        #[clap(long, default_value = "720")]
        height: u32,

        /// Facing mode of the camera, `user` or `environment`
        #[clap(long, default_value = "user")]
        facing: Facing,

        /// Where to save the annotated image
        #[clap(long, default_value = "annotated.png")]
        output: PathBuf,

        /// Directory to export `detection_results.json` to
        #[clap(long)]
        export_dir: Option<PathBuf>,
    },

    /// Check whether the detection service is up
    Health,

    /// Show information about the detection model
    ModelInfo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let config = ClientConfig {
        backend_url: args.backend_url,
        timeout: Duration::from_secs(args.timeout_secs),
        ..ClientConfig::default()
    };
    let client = HttpDetectionClient::new(&config.backend_url, config.timeout)?;

    match args.command {
        Command::Health => {
            let health = client.health().await?;
            println!("{} ({}): {}", health.service, health.version, health.status);
        }
        Command::ModelInfo => {
            let info = client.model_info().await?;
            println!("{} ({}, {})", info.model_name, info.model_type, info.framework);
            println!("Classes: {}", info.classes.join(", "));
            println!("Input size: {}x{}", info.input_size[0], info.input_size[1]);
        }
        Command::Run {
            image,
            camera,
            device,
            width,
            height,
            facing,
            output,
            export_dir,
        } => {
            let config = ClientConfig {
                camera: CaptureConstraints {
                    device,
                    width,
                    height,
                    facing,
                },
                ..config
            };
            let mut workflow = DetectionWorkflow::new(client, config.progress_interval);

            match image {
                Some(path) => workflow.load_file(path)?,
                None if camera => capture_snapshot(&mut workflow, &config.camera)?,
                None => bail!("either --image or --camera is required"),
            }

            let result = workflow.submit().await?;
            println!("Total detections: {}", result.detections.len());
            println!(
                "Processing time: {}",
                result.processing_time.as_deref().unwrap_or("N/A")
            );
            for detection in result.detections.iter() {
                println!("  {}", detection.label());
            }

            workflow.render()?.save(&output)?;
            log::info!("Saved annotated image to {}", output.display());

            if let Some(dir) = export_dir {
                if let Some(artifact) = workflow.export()? {
                    artifact.save(dir)?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(feature = "v4l")]
fn capture_snapshot(
    workflow: &mut DetectionWorkflow<HttpDetectionClient>,
    constraints: &CaptureConstraints,
) -> Result<()> {
    let camera = detect_client::sensors::V4lCamera::open(constraints)?;
    workflow.open_camera(Box::new(camera));
    workflow.capture()?;
    Ok(())
}

#[cfg(not(feature = "v4l"))]
fn capture_snapshot(
    _workflow: &mut DetectionWorkflow<HttpDetectionClient>,
    _constraints: &CaptureConstraints,
) -> Result<()> {
    bail!("camera support requires the `v4l` feature")
}
