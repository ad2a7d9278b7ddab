use std::path::Path;

use image::RgbImage;
use tract_onnx::prelude::*;
use tracing::{debug, info};

use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};
use crate::transformer::{apply_steps, ImageTransform};
use crate::ImageSize;

pub type TractSimplePlan =
    SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// The first output tensor of one forward pass, flattened.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelOutput {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

/// Anything that turns a decoded leaf image into class scores.
pub trait ImageClassifier {
    fn infer(&self, image: RgbImage) -> Result<ModelOutput>;
}

pub struct TransformationPipeline {
    steps: Vec<ImageTransform>,
    model: TractSimplePlan,
}

impl TransformationPipeline {
    pub fn new(steps: Vec<ImageTransform>, model: TractSimplePlan) -> Self {
        TransformationPipeline { steps, model }
    }

    pub fn from_config(config: &ProbeConfig) -> Result<Self> {
        let model = TransformationPipeline::load_model(
            &config.model_path,
            &config.image_size,
            config.output_name.as_deref(),
        )?;
        Ok(TransformationPipeline::new(config.steps(), model))
    }

    pub fn load_model(
        path: &Path,
        image_size: &ImageSize,
        output_name: Option<&str>,
    ) -> Result<TractSimplePlan> {
        if !path.exists() {
            return Err(ProbeError::ModelNotFound(path.to_path_buf()));
        }
        let input_shape = tvec!(1, 3, image_size.height, image_size.width);
        let mut model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(ProbeError::Model)?
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), input_shape))
            .map_err(ProbeError::Model)?;
        if let Some(name) = output_name {
            model = model
                .with_output_names(vec![name])
                .map_err(ProbeError::Model)?;
        }
        let plan = model
            .into_optimized()
            .and_then(|m| m.into_runnable())
            .map_err(ProbeError::Model)?;
        info!(path = %path.display(), "model loaded");
        Ok(plan)
    }

    pub fn transform_image(&self, image: RgbImage) -> Result<Tensor> {
        Ok(apply_steps(&self.steps, image)?)
    }
}

impl ImageClassifier for TransformationPipeline {
    fn infer(&self, image: RgbImage) -> Result<ModelOutput> {
        let image_tensor = self.transform_image(image)?;
        let result = self
            .model
            .run(tvec!(image_tensor))
            .map_err(ProbeError::Model)?;
        if result.len() > 1 {
            debug!(
                outputs = result.len(),
                "model returned several outputs, using the first"
            );
        }
        let first = result.first().ok_or(ProbeError::EmptyOutput)?;
        let view = first.to_array_view::<f32>().map_err(ProbeError::Model)?;
        let values: Vec<f32> = view.iter().copied().collect();
        debug!(
            shape = ?first.shape(),
            scores = ?&values[..values.len().min(10)],
            "raw scores"
        );
        Ok(ModelOutput {
            shape: first.shape().to_vec(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use image::Rgb;

    use super::*;
    use crate::transformer::default_steps;
    use crate::{IMAGENET_MEAN, IMAGENET_STD};

    /// `pooled` (GlobalAveragePool, output 0) and `activated` (Relu, output 1)
    /// over one `f32[1, 3, 2, 2]` input.
    fn two_outputs_model() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/two_outputs.onnx")
    }

    fn pipeline(output_name: Option<&str>) -> TransformationPipeline {
        let size = ImageSize::square(2);
        let model =
            TransformationPipeline::load_model(&two_outputs_model(), &size, output_name).unwrap();
        TransformationPipeline::new(default_steps(&size, IMAGENET_MEAN, IMAGENET_STD), model)
    }

    fn leaf() -> RgbImage {
        RgbImage::from_pixel(6, 4, Rgb([255, 0, 128]))
    }

    fn normalized() -> [f32; 3] {
        let pixel = [255.0, 0.0, 128.0];
        let mut out = [0.0; 3];
        for c in 0..3 {
            out[c] = (pixel[c] / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
        out
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-4, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn missing_model_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leafcare_mbv2.onnx");
        let err = TransformationPipeline::load_model(&path, &ImageSize::default(), None)
            .err()
            .unwrap();
        assert!(matches!(err, ProbeError::ModelNotFound(p) if p == path));
    }

    #[test]
    fn garbage_model_file_is_a_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.onnx");
        std::fs::write(&path, b"not a protobuf graph").unwrap();
        let err = TransformationPipeline::load_model(&path, &ImageSize::default(), None)
            .err()
            .unwrap();
        assert!(matches!(err, ProbeError::Model(_)));
    }

    #[test]
    fn transform_image_matches_model_input() {
        let tensor = pipeline(None).transform_image(leaf()).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 2, 2]);
    }

    #[test]
    fn infer_reads_the_first_of_several_outputs() {
        let output = pipeline(None).infer(leaf()).unwrap();
        assert_eq!(output.shape, vec![1, 3, 1, 1]);
        assert_close(&output.values, &normalized());
    }

    #[test]
    fn infer_flattens_a_named_output() {
        let output = pipeline(Some("activated")).infer(leaf()).unwrap();
        assert_eq!(output.shape, vec![1, 3, 2, 2]);
        let [r, _, b] = normalized();
        let expected: Vec<f32> = [r, 0.0, b]
            .iter()
            .flat_map(|v| std::iter::repeat(*v).take(4))
            .collect();
        assert_close(&output.values, &expected);
    }

    #[test]
    fn unknown_output_name_is_a_model_error() {
        let size = ImageSize::square(2);
        let err = TransformationPipeline::load_model(&two_outputs_model(), &size, Some("logits"))
            .err()
            .unwrap();
        assert!(matches!(err, ProbeError::Model(_)));
    }
}
