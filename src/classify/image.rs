// src/classify/image.rs
//! Civic-problem image classifier. The label set is fixed by the model's
//! training directory: one sub-directory per class, indexed in sorted order.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Model input edge length (square RGB input).
pub const INPUT_SIZE: u32 = 224;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLabels {
    labels: Vec<String>,
}

impl ImageLabels {
    pub fn new(mut labels: Vec<String>) -> Result<Self> {
        labels.retain(|l| !l.trim().is_empty());
        if labels.is_empty() {
            bail!("image classifier needs at least one label");
        }
        Ok(Self { labels })
    }

    /// Class names from the training directory: sub-directory names, sorted.
    pub fn from_train_dir(dir: &Path) -> Result<Self> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Self::new(names)
    }

    /// One label per line, in class-index order.
    pub fn from_labels_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading labels from {}", path.display()))?;
        Self::new(content.lines().map(|l| l.trim().to_string()).collect())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Label of the highest score. `None` when the score count differs from
    /// the label count (model and labels disagree).
    pub fn pick(&self, scores: &[f32]) -> Option<&str> {
        if scores.len() != self.labels.len() {
            return None;
        }
        argmax(scores).and_then(|i| self.get(i))
    }
}

/// Index of the largest finite score; first one wins on ties.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &s) in scores.iter().enumerate() {
        if !s.is_finite() {
            continue;
        }
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}

/// Given image bytes, return one label from the fixed category set.
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, image_bytes: &[u8]) -> Result<String>;
}

#[cfg(feature = "image-model")]
pub use onnx::OnnxImageClassifier;

#[cfg(feature = "image-model")]
mod onnx {
    use super::{ImageClassifier, ImageLabels, INPUT_SIZE};
    use anyhow::{anyhow, Context, Result};
    use image::imageops::FilterType;
    use ndarray::Array4;
    use ort::session::Session;
    use ort::value::TensorRef;
    use std::path::Path;
    use std::sync::Mutex;

    /// ONNX export of the fine-tuned civic-problems model.
    /// Input: NHWC float32 `[1, 224, 224, 3]` scaled to `[0, 1]`.
    pub struct OnnxImageClassifier {
        session: Mutex<Session>,
        labels: ImageLabels,
    }

    impl OnnxImageClassifier {
        pub fn new(model_path: &Path, labels: ImageLabels) -> Result<Self> {
            let session = Session::builder()
                .map_err(|e| anyhow!("onnx session builder: {e}"))?
                .with_intra_threads(1)
                .map_err(|e| anyhow!("onnx thread count: {e}"))?
                .commit_from_file(model_path)
                .map_err(|e| anyhow!("loading {}: {e}", model_path.display()))?;
            Ok(Self {
                session: Mutex::new(session),
                labels,
            })
        }

        fn preprocess(image_bytes: &[u8]) -> Result<Array4<f32>> {
            let img = image::load_from_memory(image_bytes)
                .context("decoding image")?
                .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Nearest)
                .to_rgb8();
            let side = INPUT_SIZE as usize;
            Ok(Array4::from_shape_fn((1, side, side, 3), |(_, y, x, c)| {
                img.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
            }))
        }
    }

    impl ImageClassifier for OnnxImageClassifier {
        fn classify(&self, image_bytes: &[u8]) -> Result<String> {
            let input = Self::preprocess(image_bytes)?;
            let tensor =
                TensorRef::from_array_view(&input).map_err(|e| anyhow!("input tensor: {e}"))?;

            let mut session = self
                .session
                .lock()
                .map_err(|e| anyhow!("onnx session lock: {e}"))?;
            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| anyhow!("onnx inference: {e}"))?;
            let (_shape, scores) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| anyhow!("output tensor: {e}"))?;

            self.labels
                .pick(scores)
                .map(str::to_string)
                .ok_or_else(|| anyhow!("model produced {} scores for {} labels", scores.len(), self.labels.len()))
        }
    }
}
