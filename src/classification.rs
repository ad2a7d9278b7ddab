use serde::Serialize;

use crate::error::{ProbeError, Result};
use crate::labels::ClassLabels;
use crate::pipeline::ModelOutput;

/// Softmax over one row of scores, shifted by the maximum so large logits
/// do not overflow.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the first maximum, `None` for an empty slice.
pub fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[derive(Clone, Debug, Serialize)]
pub struct Prediction {
    pub image: String,
    pub predicted_class: usize,
    pub class_name: String,
    pub confidence: f32,
    pub raw_output: Vec<f32>,
    pub probabilities: Vec<f32>,
    pub output_shape: Vec<usize>,
}

impl Prediction {
    pub fn from_output(
        image: impl Into<String>,
        output: ModelOutput,
        labels: &ClassLabels,
    ) -> Result<Self> {
        let probabilities = softmax(&output.values);
        let predicted_class = argmax(&probabilities).ok_or(ProbeError::EmptyOutput)?;
        Ok(Prediction {
            image: image.into(),
            predicted_class,
            class_name: labels.name(predicted_class).into_owned(),
            confidence: probabilities[predicted_class],
            raw_output: output.values,
            probabilities,
            output_shape: output.shape,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutputStats {
    pub shape: Vec<usize>,
    pub min: f32,
    pub max: f32,
    pub num_classes: usize,
}

impl OutputStats {
    pub fn of(prediction: &Prediction) -> Self {
        let raw = &prediction.raw_output;
        OutputStats {
            shape: prediction.output_shape.clone(),
            min: raw.iter().copied().fold(f32::INFINITY, f32::min),
            max: raw.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            num_classes: raw.len(),
        }
    }
}
