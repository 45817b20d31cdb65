//! Normalization of user-supplied images.
//!
//! Uploaded files and camera snapshots both end up as an [`ImageSource`]: a data URI that can be
//! displayed as a preview and a binary payload that is sent to the detection service.
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use image::ImageFormat;

use crate::error::SourceError;

/// Base name of images captured from a camera.
const CAPTURE_BASENAME: &str = "webcam-capture";

/// MIME type reported for files which are not recognized as images.
const UNKNOWN_MIME: &str = "application/octet-stream";

/// Canonical in-memory representation of a selected or captured image.
///
/// Cloning is cheap, the payload buffer is shared.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageSource {
    display_uri: String,
    payload: Bytes,
    mime_type: String,
    origin_filename: String,
}

impl ImageSource {
    /// Load an image file from disk.
    ///
    /// The MIME type is derived from the file extension and, if that is inconclusive, from the
    /// file content. Anything that is not an image is rejected. The content itself is not decoded.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| SourceError::Read {
            path: path.to_owned(),
            source,
        })?;

        let mime_type = ImageFormat::from_path(path)
            .ok()
            .or_else(|| image::guess_format(&data).ok())
            .map(mime_for_format)
            .ok_or_else(|| SourceError::UnsupportedMediaType(UNKNOWN_MIME.to_owned()))?;

        let origin_filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_owned());

        log::debug!(
            "Loaded {} ({}, {} bytes)",
            path.display(),
            &mime_type,
            data.len()
        );

        Ok(Self::new(origin_filename, Bytes::from(data), mime_type))
    }

    /// Wrap an in-memory upload.
    ///
    /// Without an explicit MIME type the content is sniffed.
    pub fn from_bytes(
        filename: impl Into<String>,
        data: impl Into<Bytes>,
        mime_type: Option<&str>,
    ) -> Result<Self, SourceError> {
        let data = data.into();
        let mime_type = match mime_type {
            Some(mime) if is_image_mime(mime) => mime.to_owned(),
            Some(mime) => return Err(SourceError::UnsupportedMediaType(mime.to_owned())),
            None => image::guess_format(&data)
                .map(mime_for_format)
                .map_err(|_| SourceError::UnsupportedMediaType(UNKNOWN_MIME.to_owned()))?,
        };

        Ok(Self::new(filename.into(), data, mime_type))
    }

    /// Decode a camera snapshot given as `data:<mime>;base64,<data>`.
    pub fn from_data_uri(uri: &str) -> Result<Self, SourceError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or(SourceError::MalformedDataUri("missing `data:` scheme"))?;
        let (header, encoded) = rest
            .split_once(',')
            .ok_or(SourceError::MalformedDataUri("missing `,` separator"))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or(SourceError::MalformedDataUri("only base64 payloads are supported"))?;

        if mime_type.is_empty() {
            return Err(SourceError::MalformedDataUri("missing media type"));
        }
        if !is_image_mime(mime_type) {
            return Err(SourceError::UnsupportedMediaType(mime_type.to_owned()));
        }

        let payload = STANDARD.decode(encoded)?;
        let origin_filename = format!("{CAPTURE_BASENAME}.{}", extension_for_mime(mime_type));

        Ok(Self {
            display_uri: uri.to_owned(),
            payload: Bytes::from(payload),
            mime_type: mime_type.to_owned(),
            origin_filename,
        })
    }

    fn new(origin_filename: String, payload: Bytes, mime_type: String) -> Self {
        Self {
            display_uri: encode_data_uri(&mime_type, &payload),
            payload,
            mime_type,
            origin_filename,
        }
    }

    /// Data URI suitable for previews.
    pub fn display_uri(&self) -> &str {
        &self.display_uri
    }

    /// Binary payload to upload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn origin_filename(&self) -> &str {
        &self.origin_filename
    }
}

/// Encode binary data as base64 data URI.
pub fn encode_data_uri(mime_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(data))
}

fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .strip_prefix("image/")
        .map_or(false, |subtype| !subtype.is_empty())
}

fn mime_for_format(format: ImageFormat) -> String {
    match format {
        ImageFormat::Png => "image/png".to_owned(),
        ImageFormat::Jpeg => "image/jpeg".to_owned(),
        ImageFormat::Gif => "image/gif".to_owned(),
        ImageFormat::WebP => "image/webp".to_owned(),
        ImageFormat::Bmp => "image/bmp".to_owned(),
        ImageFormat::Tiff => "image/tiff".to_owned(),
        ImageFormat::Ico => "image/x-icon".to_owned(),
        other => format!(
            "image/{}",
            other.extensions_str().first().copied().unwrap_or("unknown")
        ),
    }
}

fn extension_for_mime(mime_type: &str) -> &str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/x-icon" => "ico",
        other => other
            .strip_prefix("image/")
            .and_then(|subtype| subtype.split(|c| c == '+' || c == ';').next())
            .filter(|ext| !ext.is_empty())
            .unwrap_or("img"),
    }
}

#[cfg(test)]
mod test {

    use std::io::Cursor;

    use image::{DynamicImage, Rgb, RgbImage};

    use super::*;

    fn png_bytes() -> Vec<u8> {
        let image = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut buf, ImageFormat::Png)
            .expect("encode png");
        buf.into_inner()
    }

    #[test]
    fn test_file_and_snapshot_converge() -> Result<(), SourceError> {
        let data = png_bytes();
        let uri = encode_data_uri("image/png", &data);

        let uploaded = ImageSource::from_bytes("upload.png", data.clone(), Some("image/png"))?;
        let captured = ImageSource::from_data_uri(&uri)?;

        assert_eq!(uploaded.payload(), captured.payload());
        assert_eq!(uploaded.mime_type(), captured.mime_type());
        assert_eq!(uploaded.display_uri(), captured.display_uri());
        assert_eq!(captured.origin_filename(), "webcam-capture.png");

        Ok(())
    }

    #[test]
    fn test_jpeg_snapshot_filename() -> Result<(), SourceError> {
        let source = ImageSource::from_data_uri("data:image/jpeg;base64,/9j/4AAQ")?;
        assert_eq!(source.origin_filename(), "webcam-capture.jpg");
        assert_eq!(source.mime_type(), "image/jpeg");
        assert_eq!(&source.payload()[..3], &[0xff, 0xd8, 0xff]);

        Ok(())
    }

    #[test]
    fn test_sniffs_mime_without_hint() -> Result<(), SourceError> {
        let source = ImageSource::from_bytes("blob", png_bytes(), None)?;
        assert_eq!(source.mime_type(), "image/png");
        assert!(source.display_uri().starts_with("data:image/png;base64,"));

        Ok(())
    }

    #[test]
    fn test_rejects_non_images() {
        assert!(matches!(
            ImageSource::from_bytes("notes.txt", b"hello".to_vec(), Some("text/plain")),
            Err(SourceError::UnsupportedMediaType(mime)) if mime == "text/plain"
        ));
        assert!(matches!(
            ImageSource::from_bytes("notes.txt", b"hello".to_vec(), None),
            Err(SourceError::UnsupportedMediaType(_))
        ));
        assert!(matches!(
            ImageSource::from_data_uri("data:text/plain;base64,aGVsbG8="),
            Err(SourceError::UnsupportedMediaType(_))
        ));
    }

    #[test]
    fn test_malformed_data_uris() {
        for uri in [
            "image/png;base64,AAAA",
            "data:image/png;base64",
            "data:image/png,AAAA",
            "data:;base64,AAAA",
        ] {
            assert!(
                matches!(
                    ImageSource::from_data_uri(uri),
                    Err(SourceError::MalformedDataUri(_))
                ),
                "{uri}"
            );
        }
        assert!(matches!(
            ImageSource::from_data_uri("data:image/png;base64,!!!"),
            Err(SourceError::Base64(_))
        ));
    }

    #[test]
    fn test_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("frame.png");
        std::fs::write(&path, png_bytes())?;

        let source = ImageSource::from_file(&path)?;
        assert_eq!(source.origin_filename(), "frame.png");
        assert_eq!(source.mime_type(), "image/png");

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "no image")?;
        assert!(matches!(
            ImageSource::from_file(&text),
            Err(SourceError::UnsupportedMediaType(_))
        ));

        assert!(matches!(
            ImageSource::from_file(dir.path().join("missing.png")),
            Err(SourceError::Read { .. })
        ));

        Ok(())
    }
}
