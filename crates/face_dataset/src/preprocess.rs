//! Image preprocessing: decoded image → normalized CHW pixel values.

use crate::types::{DatasetResult, FaceDatasetError, PixelValues};
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::Path;

/// Turns a decoded image into the model's input representation.
///
/// Implementations are shared across loader threads, so `preprocess` takes
/// `&self` and must not keep per-call state.
pub trait ImagePreprocessor: Send + Sync {
    fn preprocess(&self, image: &DynamicImage) -> DatasetResult<PixelValues>;

    fn describe(&self) -> String {
        "custom".to_string()
    }
}

/// Decode an image from disk.
pub fn open_image(path: &Path) -> DatasetResult<DynamicImage> {
    image::open(path).map_err(|e| FaceDatasetError::Load {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Resize, rescale and normalize the way the ViT-base image processor does.
#[derive(Debug, Clone)]
pub struct VitPreprocessor {
    /// Output (width, height). `None` keeps the source size.
    pub size: Option<(u32, u32)>,
    pub filter: FilterType,
    pub rescale_factor: f32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for VitPreprocessor {
    fn default() -> Self {
        Self {
            size: Some((224, 224)),
            filter: FilterType::Triangle,
            rescale_factor: 1.0 / 255.0,
            mean: [0.5, 0.5, 0.5],
            std: [0.5, 0.5, 0.5],
        }
    }
}

impl ImagePreprocessor for VitPreprocessor {
    fn preprocess(&self, image: &DynamicImage) -> DatasetResult<PixelValues> {
        if self.std.iter().any(|s| *s == 0.0) {
            return Err(FaceDatasetError::InvalidConfig(
                "normalization std must be non-zero".to_string(),
            ));
        }
        let rgb = image.to_rgb8();
        let rgb = match self.size {
            Some((w, h)) if rgb.dimensions() != (w, h) => {
                image::imageops::resize(&rgb, w, h, self.filter)
            }
            _ => rgb,
        };
        let (width, height) = rgb.dimensions();
        let plane = (width * height) as usize;
        let mut data = vec![0.0f32; plane * 3];
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let base = (y * width + x) as usize;
            for c in 0..3 {
                let v = pixel[c] as f32 * self.rescale_factor;
                data[c * plane + base] = (v - self.mean[c]) / self.std[c];
            }
        }
        Ok(PixelValues {
            data,
            channels: 3,
            height: height as usize,
            width: width as usize,
        })
    }

    fn describe(&self) -> String {
        let size = self
            .size
            .map(|(w, h)| format!("{w}x{h}"))
            .unwrap_or_else(|| "source".to_string());
        format!(
            "vit size={} filter={:?} rescale={:.5} mean={:?} std={:?}",
            size, self.filter, self.rescale_factor, self.mean, self.std
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct VitPreprocessorBuilder {
    inner: VitPreprocessor,
}

impl VitPreprocessorBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn size(mut self, size: Option<(u32, u32)>) -> Self {
        self.inner.size = size;
        self
    }
    pub fn filter(mut self, filter: FilterType) -> Self {
        self.inner.filter = filter;
        self
    }
    pub fn normalize(mut self, mean: [f32; 3], std: [f32; 3]) -> Self {
        self.inner.mean = mean;
        self.inner.std = std;
        self
    }
    pub fn build(self) -> VitPreprocessor {
        self.inner
    }
}
