use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::classification::Prediction;

pub const DEFAULT_CLASS_NAMES: [&str; 4] = [
    "Bình thường",
    "Bệnh đốm nâu",
    "Bệnh phấn trắng",
    "Bệnh thối rễ",
];

/// Index 0 is the healthy leaf class.
const HEALTHY_CLASS: usize = 0;

/// Class names in model output order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassLabels(Vec<String>);

impl ClassLabels {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ClassLabels(names.into_iter().map(Into::into).collect())
    }

    /// Falls back to `Class {index}` for outputs the label list does not cover.
    pub fn name(&self, index: usize) -> Cow<'_, str> {
        match self.0.get(index) {
            Some(name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(format!("Class {index}")),
        }
    }

    pub fn is_healthy(&self, index: usize) -> bool {
        index == HEALTHY_CLASS
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ClassLabels {
    fn default() -> Self {
        ClassLabels::new(DEFAULT_CLASS_NAMES)
    }
}

/// One-line verdict in the style shown to app users.
///
/// The percentage is read from the raw score of the predicted class: a score
/// above 1.0 is a logit and is shown capped at 99.9, anything else is taken
/// as a probability the model already produced.
pub fn verdict(labels: &ClassLabels, prediction: &Prediction) -> String {
    let score = prediction
        .raw_output
        .get(prediction.predicted_class)
        .copied()
        .unwrap_or(prediction.confidence);
    let percent = if score > 1.0 {
        (score * 100.0).min(99.9)
    } else {
        score * 100.0
    };
    if labels.is_healthy(prediction.predicted_class) {
        format!(
            "🌱 {} - Lá cây khỏe mạnh! ({percent:.1}%)",
            prediction.class_name
        )
    } else {
        format!("🔴 {} - Cần xử lý ngay ({percent:.1}%)", prediction.class_name)
    }
}
