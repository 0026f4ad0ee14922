use face_dataset::PixelValues;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary "Attractive" attribute as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prediction {
    #[serde(rename = "Attractive")]
    Attractive,
    #[serde(rename = "Not attractive")]
    NotAttractive,
}

impl Prediction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prediction::Attractive => "Attractive",
            Prediction::NotAttractive => "Not attractive",
        }
    }

    /// Numeric form stored in drift records.
    pub fn as_flag(&self) -> u8 {
        match self {
            Prediction::Attractive => 1,
            Prediction::NotAttractive => 0,
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier over preprocessed pixel values.
pub trait InferenceModel: Send + Sync {
    fn predict(&self, pixel_values: &PixelValues) -> Prediction;
    fn describe(&self) -> String;
}

pub const DEFAULT_MODEL_THRESHOLD: f32 = 0.5;

/// Brightness threshold used when no trained classifier is injected.
///
/// Its predictions say nothing about the attribute itself: bright images come
/// back `Attractive`, dark ones `NotAttractive`. Inject a trained
/// [`InferenceModel`] through `AppState` for meaningful results. Scores the
/// mean normalized intensity; inputs are assumed to lie in [-1, 1].
#[derive(Debug, Clone, Copy)]
pub struct HeuristicModel {
    threshold: f32,
}

impl HeuristicModel {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn score(&self, pixel_values: &PixelValues) -> f32 {
        if pixel_values.data.is_empty() {
            return 0.0;
        }
        let mean = pixel_values.data.iter().sum::<f32>() / pixel_values.data.len() as f32;
        ((mean + 1.0) / 2.0).clamp(0.0, 1.0)
    }
}

impl Default for HeuristicModel {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_THRESHOLD)
    }
}

impl InferenceModel for HeuristicModel {
    fn predict(&self, pixel_values: &PixelValues) -> Prediction {
        if self.score(pixel_values) >= self.threshold {
            Prediction::Attractive
        } else {
            Prediction::NotAttractive
        }
    }

    fn describe(&self) -> String {
        format!("heuristic(threshold={})", self.threshold)
    }
}
