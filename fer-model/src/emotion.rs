use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmotionError {
    #[error("emotion table is empty")]
    Empty,

    #[error("duplicate emotion label: {0}")]
    DuplicateLabel(String),

    #[error("expected {expected} logits, got {found}")]
    LogitCount { expected: usize, found: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emotion {
    pub name: String,
    pub display: String,
    /// Overlay color, BGR.
    pub color: [u8; 3],
}

impl Emotion {
    fn new(name: &str, display: &str, color: [u8; 3]) -> Self {
        Self {
            name: name.to_string(),
            display: display.to_string(),
            color,
        }
    }
}

/// Class labels in model output order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EmotionTable {
    emotions: Vec<Emotion>,
}

impl EmotionTable {
    pub fn new(emotions: Vec<Emotion>) -> Result<Self, EmotionError> {
        if emotions.is_empty() {
            return Err(EmotionError::Empty);
        }
        for (i, e) in emotions.iter().enumerate() {
            if emotions[..i].iter().any(|o| o.name == e.name) {
                return Err(EmotionError::DuplicateLabel(e.name.clone()));
            }
        }
        Ok(Self { emotions })
    }

    /// The seven FER2013 classes.
    pub fn fer2013() -> Self {
        Self {
            emotions: vec![
                Emotion::new("angry", "生气", [0, 0, 255]),
                Emotion::new("disgust", "厌恶", [0, 255, 0]),
                Emotion::new("fear", "恐惧", [255, 0, 255]),
                Emotion::new("happy", "开心", [0, 255, 255]),
                Emotion::new("sad", "悲伤", [255, 0, 0]),
                Emotion::new("surprise", "惊讶", [255, 165, 0]),
                Emotion::new("neutral", "中性", [128, 128, 128]),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.emotions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emotions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Emotion> {
        self.emotions.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.emotions.iter().position(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Emotion> {
        self.emotions.iter()
    }

    /// Softmax the classifier output and pick the top class.
    pub fn classify(&self, logits: &[f32]) -> Result<Prediction, EmotionError> {
        if logits.len() != self.len() {
            return Err(EmotionError::LogitCount {
                expected: self.len(),
                found: logits.len(),
            });
        }
        let probabilities = softmax(logits);
        let (index, &probability) = probabilities
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, &f32)>, (i, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })
            .ok_or(EmotionError::Empty)?;
        Ok(Prediction {
            index,
            probability,
            probabilities,
        })
    }
}

impl Default for EmotionTable {
    fn default() -> Self {
        Self::fer2013()
    }
}

impl<'de> Deserialize<'de> for EmotionTable {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let emotions = Vec::<Emotion>::deserialize(deserializer)?;
        Self::new(emotions).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub probability: f32,
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// An untrained or collapsed classifier spreads probability almost evenly.
    pub fn is_near_uniform(&self) -> bool {
        let n = self.probabilities.len() as f32;
        let mean = self.probabilities.iter().sum::<f32>() / n;
        let var = self
            .probabilities
            .iter()
            .map(|p| (p - mean).powi(2))
            .sum::<f32>()
            / n;
        var.sqrt() < 0.1
    }
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fer2013_order() {
        let table = EmotionTable::fer2013();
        let names: Vec<_> = table.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            ["angry", "disgust", "fear", "happy", "sad", "surprise", "neutral"]
        );
        assert_eq!(table.index_of("happy"), Some(3));
        assert_eq!(table.get(5).unwrap().color, [255, 165, 0]);
    }

    #[test]
    fn classify_picks_argmax() {
        let table = EmotionTable::fer2013();
        let pred = table
            .classify(&[0.1, 0.0, -1.0, 4.0, 0.2, 0.3, 1.0])
            .unwrap();
        assert_eq!(pred.index, 3);
        let total: f32 = pred.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(!pred.is_near_uniform());
    }

    #[test]
    fn flat_logits_are_near_uniform() {
        let table = EmotionTable::fer2013();
        let pred = table.classify(&[0.01; 7]).unwrap();
        assert!(pred.is_near_uniform());
        assert_eq!(pred.index, 0);
    }

    #[test]
    fn softmax_handles_large_logits() {
        let p = softmax(&[1000.0, 1000.0]);
        assert_eq!(p, vec![0.5, 0.5]);
    }

    #[test]
    fn logit_count_checked() {
        let err = EmotionTable::fer2013().classify(&[1.0, 2.0]).unwrap_err();
        assert_eq!(err, EmotionError::LogitCount { expected: 7, found: 2 });
    }

    #[test]
    fn rejects_duplicates_and_empty() {
        assert_eq!(EmotionTable::new(vec![]), Err(EmotionError::Empty));
        let e = Emotion::new("happy", "happy", [0, 0, 0]);
        assert_eq!(
            EmotionTable::new(vec![e.clone(), e]),
            Err(EmotionError::DuplicateLabel("happy".into()))
        );
    }
}
