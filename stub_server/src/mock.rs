//! Fixed detections used in place of a real model.
use common::protocol::{BBox, Detection, ModelInfo};

pub const MODEL_VERSION: &str = "YOLOv8n-space-v1.0";

/// Class name, confidence and box as fractions `[x, y, width, height]` of the image size.
const MOCK_DETECTIONS: &[(&str, f64, [f64; 4])] = &[
    ("fire_extinguisher", 0.942, [0.15, 0.25, 0.12, 0.3]),
    ("oxygen_tank", 0.887, [0.65, 0.15, 0.08, 0.4]),
    ("toolkit", 0.915, [0.35, 0.55, 0.15, 0.2]),
];

/// Detections for an image of the given size, boxes snapped to whole pixels.
pub fn mock_detections(width: u32, height: u32) -> Vec<Detection> {
    let (width, height) = (width as f64, height as f64);

    MOCK_DETECTIONS
        .iter()
        .map(|(class_name, confidence, [x, y, w, h])| {
            let bbox = BBox::new(
                (x * width).trunc(),
                (y * height).trunc(),
                (w * width).trunc(),
                (h * height).trunc(),
            );
            Detection::new(*class_name, *confidence, bbox)
        })
        .collect()
}

pub fn model_info() -> ModelInfo {
    ModelInfo {
        model_name: MODEL_VERSION.to_owned(),
        model_type: "Object Detection".to_owned(),
        framework: "YOLOv8".to_owned(),
        classes: MOCK_DETECTIONS
            .iter()
            .map(|(class_name, _, _)| class_name.to_string())
            .collect(),
        input_size: [640, 640],
        description: "Specialized model for detecting space station safety equipment".to_owned(),
    }
}
