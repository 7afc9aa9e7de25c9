//! Classify one image into a civic-problem category with the local ONNX model.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use nirvana_intake::classify::image::{ImageClassifier, ImageLabels, OnnxImageClassifier};

/// Predict the civic-problem class of a photo.
#[derive(Parser, Debug)]
#[command(name = "classify-image", version, about, long_about = None)]
struct Cli {
    /// ONNX export of the image model.
    model: PathBuf,
    /// Training directory (one sub-directory per class) or a labels file
    /// with one class per line.
    labels: PathBuf,
    /// Image to classify (JPEG or PNG).
    image: PathBuf,
}

fn load_labels(path: &Path) -> Result<ImageLabels> {
    if path.is_dir() {
        ImageLabels::from_train_dir(path)
    } else {
        ImageLabels::from_labels_file(path)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    nirvana_intake::telemetry::init_tracing();

    let labels = load_labels(&cli.labels)?;
    tracing::info!(target: "classify", classes = labels.len(), "labels loaded");

    let classifier = OnnxImageClassifier::new(&cli.model, labels)?;
    let bytes = std::fs::read(&cli.image)
        .with_context(|| format!("reading {}", cli.image.display()))?;
    let predicted = classifier.classify(&bytes)?;

    println!("Predicted class: {predicted}");
    Ok(())
}
