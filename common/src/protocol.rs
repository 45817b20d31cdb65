//! Wire format of the detection service.
//!
//! `POST /api/detect` answers with a JSON body whose required part is modelled by
//! [`DetectionResult`]. The service adds a few informational fields which are captured by
//! [`DetectResponse`] on the server side and ignored by clients.
use serde::{Deserialize, Serialize, Serializer};

/// Axis-aligned bounding box in source-image pixels.
///
/// On the wire a box is a four-element array `[x, y, width, height]`.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(from = "[f64; 4]", into = "[WireCoord; 4]")]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl From<[f64; 4]> for BBox {
    fn from([x, y, width, height]: [f64; 4]) -> Self {
        Self::new(x, y, width, height)
    }
}

impl From<BBox> for [WireCoord; 4] {
    fn from(bbox: BBox) -> Self {
        [
            WireCoord(bbox.x),
            WireCoord(bbox.y),
            WireCoord(bbox.width),
            WireCoord(bbox.height),
        ]
    }
}

/// Largest magnitude below which every whole `f64` is exactly an integer.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Box coordinate on the wire. Whole numbers are written without fraction, as the service sends
/// them.
#[derive(Clone, Copy, Debug)]
pub struct WireCoord(f64);

impl Serialize for WireCoord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self.0;
        if value.fract() == 0.0 && value.abs() < MAX_SAFE_INTEGER {
            serializer.serialize_i64(value as i64)
        } else {
            serializer.serialize_f64(value)
        }
    }
}

/// One detected object.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Detection {
    pub bbox: BBox,
    pub class_name: String,
    pub confidence: f64,
}

impl Detection {
    pub fn new(class_name: impl Into<String>, confidence: f64, bbox: BBox) -> Self {
        Self {
            bbox,
            class_name: class_name.into(),
            confidence,
        }
    }

    /// Human readable label, e.g. `Toolbox 94.2%`.
    ///
    /// The percentage has one decimal, exact ties are rounded away from zero.
    pub fn label(&self) -> String {
        format!(
            "{} {:.1}%",
            self.class_name,
            round_tenths(self.confidence * 100.0)
        )
    }
}

/// Break exact ties at the second decimal away from zero. Anything else is left to the
/// formatter, which rounds the exact decimal value of `value`.
fn round_tenths(value: f64) -> f64 {
    let scaled = value * 10.0;
    if scaled.fract().abs() == 0.5 && scaled / 10.0 == value {
        scaled.round() / 10.0
    } else {
        value
    }
}

/// Detections returned for a single image.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DetectionResult {
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub processing_time: Option<String>,
}

/// Full response body of `POST /api/detect` as produced by the service.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DetectResponse {
    pub success: bool,
    #[serde(flatten)]
    pub result: DetectionResult,
    pub total_detections: usize,
    #[serde(default)]
    pub image_dimensions: Option<[u32; 2]>,
    pub model_version: String,
}

impl DetectResponse {
    pub fn new(result: DetectionResult, image_dimensions: [u32; 2], model_version: &str) -> Self {
        Self {
            success: true,
            total_detections: result.detections.len(),
            result,
            image_dimensions: Some(image_dimensions),
            model_version: model_version.to_owned(),
        }
    }
}

/// Body of `GET /api/health`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Body of `GET /api/model-info`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub model_type: String,
    pub framework: String,
    pub classes: Vec<String>,
    pub input_size: [u32; 2],
    pub description: String,
}
