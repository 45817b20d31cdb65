use std::io::Cursor;

use common::protocol::{DetectResponse, HealthStatus, ModelInfo};
use image::{DynamicImage, ImageFormat, RgbImage};
use reqwest::{multipart, StatusCode};
use stub_server::{app, spawn_server};

type Error = Box<dyn std::error::Error>;

fn jpeg_bytes(width: u32, height: u32) -> Result<Vec<u8>, Error> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height)).write_to(&mut buf, ImageFormat::Jpeg)?;
    Ok(buf.into_inner())
}

fn image_form(data: Vec<u8>, mime: &str) -> Result<multipart::Form, Error> {
    let part = multipart::Part::bytes(data)
        .file_name("upload.jpg")
        .mime_str(mime)?;
    Ok(multipart::Form::new().part("image", part))
}

#[tokio::test]
async fn test_detect_scales_boxes_to_image() -> Result<(), Error> {
    let (addr, _handle) = spawn_server(app(), "127.0.0.1:0").await?;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/api/detect"))
        .multipart(image_form(jpeg_bytes(640, 480)?, "image/jpeg")?)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: DetectResponse = resp.json().await?;
    assert!(body.success);
    assert_eq!(body.total_detections, 3);
    assert_eq!(body.image_dimensions, Some([640, 480]));
    assert_eq!(body.result.detections.len(), 3);
    assert!(body
        .result
        .processing_time
        .as_deref()
        .map_or(false, |time| time.ends_with('s')));

    Ok(())
}

#[tokio::test]
async fn test_detect_rejects_non_images() -> Result<(), Error> {
    let (addr, _handle) = spawn_server(app(), "127.0.0.1:0").await?;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/detect");

    let resp = client
        .post(&url)
        .multipart(image_form(b"hello".to_vec(), "text/plain")?)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["detail"], "File must be an image");

    let resp = client
        .post(&url)
        .multipart(image_form(vec![0, 1, 2, 3], "image/jpeg")?)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let form = multipart::Form::new().text("other", "value");
    let resp = client.post(&url).multipart(form).send().await?;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    Ok(())
}

#[tokio::test]
async fn test_info_endpoints() -> Result<(), Error> {
    let (addr, _handle) = spawn_server(app(), "127.0.0.1:0").await?;
    let client = reqwest::Client::new();

    let health: HealthStatus = client
        .get(format!("http://{addr}/api/health"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(health.status, "healthy");

    let info: ModelInfo = client
        .get(format!("http://{addr}/api/model-info"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(info.classes.len(), 3);

    let banner: serde_json::Value = client
        .get(format!("http://{addr}/api/"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(banner["endpoints"]["detection"], "/api/detect");

    Ok(())
}
