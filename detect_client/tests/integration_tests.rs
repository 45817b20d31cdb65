use std::{io::Cursor, net::SocketAddr, time::Duration};

use axum::{http::StatusCode, routing::post, Json, Router};
use detect_client::{
    error::WorkflowError, source::ImageSource, DetectionWorkflow, HttpDetectionClient,
    SystemStatus,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::json;

type Error = Box<dyn std::error::Error>;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(10);

fn png_source(width: u32, height: u32) -> Result<ImageSource, Error> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height)).write_to(&mut buf, ImageFormat::Png)?;
    Ok(ImageSource::from_bytes(
        "station.png",
        buf.into_inner(),
        Some("image/png"),
    )?)
}

async fn workflow_for(
    router: Router,
) -> Result<(SocketAddr, DetectionWorkflow<HttpDetectionClient>), Error> {
    let (addr, _handle) = stub_server::spawn_server(router, "127.0.0.1:0").await?;
    let client = HttpDetectionClient::new(&format!("http://{addr}"), Duration::from_secs(5))?;
    Ok((addr, DetectionWorkflow::new(client, PROGRESS_INTERVAL)))
}

#[tokio::test]
async fn test_detect_against_stub_server() -> Result<(), Error> {
    let (_, mut workflow) = workflow_for(stub_server::app()).await?;
    let progress = workflow.progress();
    workflow.load_source(png_source(200, 100)?)?;
    assert_eq!(workflow.status(), SystemStatus::FileLoaded);

    let result = workflow.submit().await?;
    assert_eq!(result.detections.len(), 3);
    assert!(result.processing_time.is_some());

    assert_eq!(workflow.status(), SystemStatus::Complete);
    assert_eq!(workflow.progress_value(), 100.0);
    assert_eq!(progress.borrow().percent, 100.0);
    assert!(workflow.error_message().is_none());

    let annotated = workflow.render()?;
    assert_eq!(annotated.dimensions(), (200, 100));

    let artifact = workflow.export()?.ok_or("expected an export")?;
    let exported: serde_json::Value = serde_json::from_str(&artifact.contents)?;
    assert_eq!(exported["detections"].as_array().map(Vec::len), Some(3));
    assert!(exported.get("model_version").is_none());

    Ok(())
}

#[tokio::test]
async fn test_empty_result() -> Result<(), Error> {
    let router = Router::new().route(
        "/api/detect",
        post(|| async { Json(json!({ "success": true, "detections": [] })) }),
    );
    let (_, mut workflow) = workflow_for(router).await?;
    workflow.load_source(png_source(64, 64)?)?;

    let result = workflow.submit().await?;
    assert!(result.detections.is_empty());
    assert!(result.processing_time.is_none());
    assert_eq!(workflow.status(), SystemStatus::Complete);

    // Nothing drawn but the image itself
    let annotated = workflow.render()?;
    assert!(annotated.pixels().all(|pixel| pixel.0 == [0, 0, 0]));

    Ok(())
}

#[tokio::test]
async fn test_server_error_is_surfaced() -> Result<(), Error> {
    let router = Router::new().route(
        "/api/detect",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let (_, mut workflow) = workflow_for(router).await?;
    workflow.load_source(png_source(64, 64)?)?;

    let err = workflow
        .submit()
        .await
        .err()
        .ok_or("expected the request to fail")?;
    assert!(matches!(err, WorkflowError::Detect(_)));

    assert_eq!(workflow.status(), SystemStatus::Error);
    assert_eq!(
        workflow.error_message(),
        Some("Detection failed: Internal Server Error")
    );
    assert!(workflow.result().is_none());
    assert_eq!(workflow.progress_value(), 0.0);
    assert!(workflow.export()?.is_none());

    // The image stays loaded and can be resubmitted
    assert!(workflow.source().is_some());

    Ok(())
}

#[tokio::test]
async fn test_unreachable_service() -> Result<(), Error> {
    // Bind and release a port so nothing listens on it
    let addr = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?;
    let client = HttpDetectionClient::new(&format!("http://{addr}"), Duration::from_secs(5))?;
    let mut workflow = DetectionWorkflow::new(client, PROGRESS_INTERVAL);
    workflow.load_source(png_source(8, 8)?)?;

    assert!(workflow.submit().await.is_err());
    assert_eq!(workflow.status(), SystemStatus::Error);
    assert!(workflow
        .error_message()
        .map_or(false, |msg| msg.starts_with("Detection failed:")));

    Ok(())
}

#[tokio::test]
async fn test_service_info() -> Result<(), Error> {
    let (addr, workflow) = workflow_for(stub_server::app()).await?;
    let client = workflow.client();
    assert_eq!(client.base_url(), format!("http://{addr}"));

    let health = client.health().await?;
    assert_eq!(health.status, "healthy");

    let info = client.model_info().await?;
    assert_eq!(info.input_size, [640, 640]);
    assert!(info.classes.iter().any(|class| class == "oxygen_tank"));

    Ok(())
}
