//! Classifier input and output checks used by `fer classify` and `fer input`.

use std::path::Path;

use anyhow::{Context, Result};
use fer_model::checkpoint::TensorStats;
use fer_model::preprocess::{face_tensor, pixels_tensor};
use fer_model::{EmotionTable, Prediction};
use ndarray::Array4;

const BAR_WIDTH: usize = 40;

/// Where a classifier input comes from.
#[derive(Debug, Clone, Copy)]
pub enum InputSource<'a> {
    /// Face crop in any format `image` can decode.
    Image(&'a Path),
    /// Text file holding one FER2013 CSV `pixels` field.
    Pixels(&'a Path),
}

pub fn input_tensor(source: InputSource<'_>) -> Result<Array4<f32>> {
    match source {
        InputSource::Image(path) => {
            let img = image::open(path)
                .with_context(|| format!("decoding image {}", path.display()))?;
            Ok(face_tensor(&img))
        }
        InputSource::Pixels(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading pixels from {}", path.display()))?;
            pixels_tensor(raw.trim())
                .with_context(|| format!("parsing pixels from {}", path.display()))
        }
    }
}

/// Value statistics of a classifier input; `None` only for an empty tensor.
pub fn input_stats(tensor: &Array4<f32>) -> Option<TensorStats> {
    let values: Vec<f32> = tensor.iter().copied().collect();
    TensorStats::from_values(&values)
}

pub fn classify_logits(table: &EmotionTable, logits: &[f32]) -> Result<Prediction> {
    table
        .classify(logits)
        .with_context(|| format!("classifying {} logits", logits.len()))
}

/// One line per class: label, probability and a bar, top class marked.
pub fn prediction_lines(table: &EmotionTable, prediction: &Prediction) -> Vec<String> {
    table
        .iter()
        .zip(&prediction.probabilities)
        .enumerate()
        .map(|(i, (emotion, &p))| {
            let mark = if i == prediction.index { '*' } else { ' ' };
            let bar = "#".repeat((p * BAR_WIDTH as f32).round() as usize);
            format!("{mark} {:<10} {:>6.2}% {bar}", emotion.name, p * 100.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fer-diagnose-{}-{}", std::process::id(), name))
    }

    #[test]
    fn confident_prediction_marks_top_class() {
        let table = EmotionTable::fer2013();
        let pred = classify_logits(&table, &[0.0, 0.0, 0.0, 9.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(pred.index, 3);
        assert!(!pred.is_near_uniform());

        let lines = prediction_lines(&table, &pred);
        assert_eq!(lines.len(), 7);
        assert!(lines[3].starts_with("* happy"));
        assert!(lines[0].starts_with("  angry"));
    }

    #[test]
    fn flat_logits_are_near_uniform() {
        let table = EmotionTable::fer2013();
        let pred = classify_logits(&table, &[0.1; 7]).unwrap();
        assert!(pred.is_near_uniform());
    }

    #[test]
    fn wrong_logit_count_is_an_error() {
        let table = EmotionTable::fer2013();
        let err = classify_logits(&table, &[1.0, 2.0]).unwrap_err();
        assert!(err.to_string().contains("2 logits"));
    }

    #[test]
    fn pixels_file_becomes_input_tensor() {
        let path = temp_path("pixels.txt");
        let row = vec!["255"; 48 * 48].join(" ");
        std::fs::write(&path, format!("{row}\n")).unwrap();

        let tensor = input_tensor(InputSource::Pixels(&path)).unwrap();
        assert_eq!(tensor.shape(), &[1, 1, 48, 48]);
        let stats = input_stats(&tensor).unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 1.0);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn image_file_becomes_input_tensor() {
        let path = temp_path("face.png");
        image::RgbImage::from_pixel(96, 64, image::Rgb([0, 0, 0]))
            .save(&path)
            .unwrap();

        let tensor = input_tensor(InputSource::Image(&path)).unwrap();
        assert_eq!(tensor.shape(), &[1, 1, 48, 48]);
        assert_eq!(input_stats(&tensor).unwrap().max, 0.0);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn truncated_pixels_rejected() {
        let path = temp_path("short.txt");
        std::fs::write(&path, "1 2 3").unwrap();
        assert!(input_tensor(InputSource::Pixels(&path)).is_err());
        std::fs::remove_file(&path).ok();
    }
}
