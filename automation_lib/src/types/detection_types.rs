use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bounding box in normalized coordinates [0.0, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32, // Top-left x
    pub y1: f32, // Top-left y
    pub x2: f32, // Bottom-right x
    pub y2: f32, // Bottom-right y
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Get center coordinates
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// Single detection result from the object detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_name: String,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32, class_name: impl Into<String>) -> Self {
        Self {
            bbox,
            confidence,
            class_name: class_name.into(),
        }
    }
}

/// Count detections per class name at or above `min_confidence`
pub fn count_by_class(detections: &[Detection], min_confidence: f32) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for detection in detections.iter().filter(|d| d.confidence >= min_confidence) {
        *counts.entry(detection.class_name.clone()).or_insert(0) += 1;
    }
    counts
}
