//! Transport to the remote detection service.
use std::time::Duration;

use async_trait::async_trait;
use common::protocol::{DetectionResult, HealthStatus, ModelInfo};
use reqwest::{multipart, Client, Response};

use crate::{error::DetectError, source::ImageSource};

/// Name of the multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// Anything that can run detection on an image.
#[async_trait]
pub trait DetectionClient {
    async fn detect(&self, source: &ImageSource) -> Result<DetectionResult, DetectError>;
}

/// Client of the HTTP detection service.
#[derive(Clone, Debug)]
pub struct HttpDetectionClient {
    client: Client,
    base_url: String,
}

impl HttpDetectionClient {
    /// Create a client for the service at `base_url`, e.g. `http://localhost:8001`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DetectError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", &self.base_url, path)
    }

    /// Query the health check endpoint.
    pub async fn health(&self) -> Result<HealthStatus, DetectError> {
        let resp = self.client.get(self.endpoint("health")).send().await?;
        Ok(ensure_success(resp)?.json().await?)
    }

    /// Query information about the model behind the service.
    pub async fn model_info(&self) -> Result<ModelInfo, DetectError> {
        let resp = self.client.get(self.endpoint("model-info")).send().await?;
        Ok(ensure_success(resp)?.json().await?)
    }
}

#[async_trait]
impl DetectionClient for HttpDetectionClient {
    async fn detect(&self, source: &ImageSource) -> Result<DetectionResult, DetectError> {
        let part = multipart::Part::stream(source.payload().clone())
            .file_name(source.origin_filename().to_owned())
            .mime_str(source.mime_type())?;
        let form = multipart::Form::new().part(IMAGE_FIELD, part);

        let url = self.endpoint("detect");
        log::debug!(
            "Posting {} ({} bytes) to {}",
            source.origin_filename(),
            source.payload().len(),
            &url
        );

        let resp = self.client.post(&url).multipart(form).send().await?;
        let result: DetectionResult = ensure_success(resp)?.json().await?;

        log::info!(
            "Received {} detections (processing time {})",
            result.detections.len(),
            result.processing_time.as_deref().unwrap_or("N/A")
        );

        Ok(result)
    }
}

/// Turn non-success responses into [`DetectError::RequestFailed`] carrying the status text.
fn ensure_success(resp: Response) -> Result<Response, DetectError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let status = status
        .canonical_reason()
        .map(str::to_owned)
        .unwrap_or_else(|| status.as_str().to_owned());
    log::warn!("Detection service answered with {}", &status);

    Err(DetectError::RequestFailed { status })
}
