pub mod classification;
pub mod config;
pub mod dataset;
pub mod error;
pub mod labels;
pub mod pipeline;
pub mod probe;
pub mod report;
pub mod transformer;

pub use classification::{argmax, softmax, OutputStats, Prediction};
pub use config::ProbeConfig;
pub use dataset::{sample_images, TestCategory};
pub use error::{ProbeError, Result, TransformError};
pub use labels::ClassLabels;
pub use pipeline::{ImageClassifier, ModelOutput, TransformationPipeline};
pub use probe::{run, CategoryResult};

use serde::{Deserialize, Serialize};

pub const MODEL_PATH: &str = "leafcare_mbv2.onnx";
pub const INPUT_SIZE: usize = 224;
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ImageSize {
    pub width: usize,
    pub height: usize,
}

impl ImageSize {
    pub fn square(side: usize) -> Self {
        ImageSize {
            width: side,
            height: side,
        }
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        ImageSize::square(INPUT_SIZE)
    }
}
