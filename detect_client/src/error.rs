//! Error types of the detection workflow.
use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a user-supplied file or snapshot into an [`ImageSource`](crate::source::ImageSource).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported media type {0:?}, expected an image")]
    UnsupportedMediaType(String),

    #[error("malformed data URI: {0}")]
    MalformedDataUri(&'static str),

    #[error("invalid base64 payload in data URI: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Failure of a request to the detection service.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Detection failed: {status}")]
    RequestFailed { status: String },

    #[error("Detection failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Failure to grab a snapshot from a camera.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera device error: {0}")]
    Device(String),

    #[error("camera returned no frame")]
    NoFrame,
}

/// Failure to render the annotated view.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Failure to export a detection result.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no detection result to export")]
    NoResult,

    #[error("failed to serialize detection result: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by [`DetectionWorkflow`](crate::workflow::DetectionWorkflow).
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Please select an image first")]
    NoImageSelected,

    #[error("A detection is already in progress")]
    AlreadyAnalyzing,

    #[error("Camera is not open")]
    CameraClosed,

    #[error("Nothing to render, run a detection first")]
    NotReady,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
