//! Detection workflow client.
//!
//! Acquire an image from a file or a camera, send it to a detection service, draw the returned
//! bounding boxes onto the image and export the result.
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod progress;
pub mod render;
pub mod sensors;
pub mod source;
pub mod status;
pub mod workflow;

pub use client::{DetectionClient, HttpDetectionClient};
pub use common::protocol::{BBox, Detection, DetectionResult};
pub use status::SystemStatus;
pub use workflow::DetectionWorkflow;
