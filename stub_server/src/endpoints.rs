//! Endpoints of HTTP server.
//!
use std::time::Instant;

use axum::{
    extract::Multipart,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{DetectResponse, DetectionResult, HealthStatus, ModelInfo};
use image::GenericImageView;
use serde_json::{json, Value};

use crate::mock::{mock_detections, model_info as mock_model_info, MODEL_VERSION};

pub const SERVICE_NAME: &str = "Eleven11 Detection API";
pub const SERVICE_VERSION: &str = "1.0.0";

/// Multipart field carrying the uploaded image.
const IMAGE_FIELD: &str = "image";

/// Error answered as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log::warn!("{}: {}", self.status, &self.detail);
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

/// Service banner.
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "endpoints": {
            "detection": "/api/detect",
            "health": "/api/health",
            "model_info": "/api/model-info"
        }
    }))
}

/// Health check endpoint.
pub async fn healthcheck() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_owned(),
        service: SERVICE_NAME.to_owned(),
        version: SERVICE_VERSION.to_owned(),
    })
}

pub async fn model_info() -> Json<ModelInfo> {
    Json(mock_model_info())
}

/// Detect objects in the image uploaded as multipart field `image`.
pub async fn detect(mut multipart: Multipart) -> Result<Json<DetectResponse>, ApiError> {
    let start = Instant::now();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, err.to_string()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            log::debug!("Skipping field {:?}", field.name());
            continue;
        }

        let is_image = field
            .content_type()
            .map_or(false, |mime| mime.starts_with("image/"));
        if !is_image {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "File must be an image",
            ));
        }

        let data = field
            .bytes()
            .await
            .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
        let image = image::load_from_memory(&data).map_err(|err| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                format!("Error processing image: {err}"),
            )
        })?;
        let (width, height) = image.dimensions();
        log::info!("Processing image: {}x{}", width, height);

        let detections = mock_detections(width, height);
        let elapsed = start.elapsed().as_secs_f64();
        log::info!(
            "Detection completed: {} objects found in {:.3}s",
            detections.len(),
            elapsed
        );

        let result = DetectionResult {
            detections,
            processing_time: Some(format!("{elapsed:.3}s")),
        };
        return Ok(Json(DetectResponse::new(
            result,
            [width, height],
            MODEL_VERSION,
        )));
    }

    Err(ApiError::new(
        StatusCode::UNPROCESSABLE_ENTITY,
        "missing multipart field `image`",
    ))
}
