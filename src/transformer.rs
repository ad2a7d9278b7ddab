use enum_dispatch::enum_dispatch;
use image::imageops::{crop_imm, resize, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tract_onnx::prelude::{tract_ndarray, tract_ndarray::Array4, tract_ndarray::Ix4, Tensor};
use tract_onnx::tract_core::ndarray::Array;
use tracing::debug;

use crate::error::TransformError;
use crate::{ImageSize, IMAGENET_MEAN, IMAGENET_STD};

#[enum_dispatch]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ImageTransform {
    ResizeRgbImage(ResizeRgbImage),
    ResizeRgbImageAspectRatio(ResizeRgbImageAspectRatio),
    CenterCrop(CenterCrop),
    ToArray(ToArray),
    Normalization(Normalization),
    Transpose(Transpose),
    ToTensor(ToTensor),
}

#[enum_dispatch(ImageTransform)]
pub trait GenericTransform {
    fn transform(
        &self,
        input: ImageTransformResult,
    ) -> Result<ImageTransformResult, TransformError>;
}

#[derive(Serialize, Deserialize)]
#[serde(remote = "FilterType")]
enum FilterOption {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

fn unsupported(step: &'static str, input: &ImageTransformResult) -> TransformError {
    TransformError::UnsupportedInput {
        step,
        kind: input.kind(),
    }
}

/// Resizes to an exact size, ignoring the aspect ratio.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResizeRgbImage {
    pub image_size: ImageSize,
    #[serde(with = "FilterOption")]
    pub filter: FilterType,
}

impl GenericTransform for ResizeRgbImage {
    fn transform(
        &self,
        input: ImageTransformResult,
    ) -> Result<ImageTransformResult, TransformError> {
        match input {
            ImageTransformResult::RgbImage(image) => Ok(resize(
                &image,
                self.image_size.width as u32,
                self.image_size.height as u32,
                self.filter,
            )
            .into()),
            other => Err(unsupported("ResizeRgbImage", &other)),
        }
    }
}

/// Resizes so that the shorter side matches `100 * size / scale`, keeping
/// the aspect ratio.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResizeRgbImageAspectRatio {
    pub image_size: ImageSize,
    pub scale: f32,
    #[serde(with = "FilterOption")]
    pub filter: FilterType,
}

impl GenericTransform for ResizeRgbImageAspectRatio {
    fn transform(
        &self,
        input: ImageTransformResult,
    ) -> Result<ImageTransformResult, TransformError> {
        match input {
            ImageTransformResult::RgbImage(image) => {
                let (width, height) = image.dimensions();
                let width = width as f32;
                let height = height as f32;
                let new_height = 100.0 * (self.image_size.height as f32) / self.scale;
                let new_width = 100.0 * (self.image_size.width as f32) / self.scale;

                let (final_width, final_height) = if height > width {
                    (new_width, new_height * height / width)
                } else {
                    (new_width * width / height, new_height)
                };

                Ok(resize(&image, final_width as u32, final_height as u32, self.filter).into())
            }
            other => Err(unsupported("ResizeRgbImageAspectRatio", &other)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CenterCrop {
    pub crop_size: ImageSize,
}

impl GenericTransform for CenterCrop {
    fn transform(
        &self,
        input: ImageTransformResult,
    ) -> Result<ImageTransformResult, TransformError> {
        match input {
            ImageTransformResult::RgbImage(image) => {
                let (width, height) = image.dimensions();
                let crop_width = self.crop_size.width as u32;
                let crop_height = self.crop_size.height as u32;
                if crop_width > width || crop_height > height {
                    return Err(TransformError::CropTooLarge {
                        crop_width,
                        crop_height,
                        width,
                        height,
                    });
                }
                let left = (width - crop_width) / 2;
                let top = (height - crop_height) / 2;
                Ok(crop_imm(&image, left, top, crop_width, crop_height)
                    .to_image()
                    .into())
            }
            other => Err(unsupported("CenterCrop", &other)),
        }
    }
}

/// Converts an RGB image into an `f32[1, 3, H, W]` array of raw 0..255 values.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToArray {}

impl GenericTransform for ToArray {
    fn transform(
        &self,
        input: ImageTransformResult,
    ) -> Result<ImageTransformResult, TransformError> {
        match input {
            ImageTransformResult::RgbImage(image) => {
                let (width, height) = image.dimensions();
                let arr = tract_ndarray::Array4::from_shape_fn(
                    (1_usize, 3_usize, height as usize, width as usize),
                    |(_, c, y, x)| image[(x as _, y as _)][c] as f32,
                );
                Ok(ImageTransformResult::Array4(arr))
            }
            ImageTransformResult::Tensor(tensor) => {
                let dyn_arr = tensor
                    .into_array::<f32>()
                    .map_err(|e| TransformError::Shape(format!("{e:#}")))?;
                let arr4 = dyn_arr
                    .into_dimensionality::<Ix4>()
                    .map_err(|e| TransformError::Shape(e.to_string()))?;
                Ok(ImageTransformResult::Array4(arr4))
            }
            // already an array
            arr @ ImageTransformResult::Array4(_) => Ok(arr),
        }
    }
}

/// Per-channel `(x - sub) / div`, with `x` first scaled to 0..1 when
/// `zeroone` is set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Normalization {
    pub sub: [f32; 3],
    pub div: [f32; 3],
    pub zeroone: bool,
}

impl Normalization {
    pub fn imagenet() -> Self {
        Normalization {
            sub: IMAGENET_MEAN,
            div: IMAGENET_STD,
            zeroone: true,
        }
    }
}

impl GenericTransform for Normalization {
    fn transform(
        &self,
        input: ImageTransformResult,
    ) -> Result<ImageTransformResult, TransformError> {
        match input {
            ImageTransformResult::Array4(arr) => {
                if arr.shape()[1] != 3 {
                    return Err(TransformError::Shape(format!(
                        "normalization expects 3 channels, got {}",
                        arr.shape()[1]
                    )));
                }
                let sub = Array::from_shape_vec((1, 3, 1, 1), self.sub.to_vec())
                    .map_err(|e| TransformError::Shape(e.to_string()))?;
                let div = Array::from_shape_vec((1, 3, 1, 1), self.div.to_vec())
                    .map_err(|e| TransformError::Shape(e.to_string()))?;
                let new_arr = if self.zeroone {
                    (arr / 255.0 - sub) / div
                } else {
                    (arr - sub) / div
                };
                Ok(ImageTransformResult::Array4(new_arr))
            }
            other => Err(unsupported("Normalization", &other)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transpose {
    pub axes: [usize; 4],
}

impl GenericTransform for Transpose {
    fn transform(
        &self,
        input: ImageTransformResult,
    ) -> Result<ImageTransformResult, TransformError> {
        match input {
            ImageTransformResult::Array4(arr) => {
                let mut seen = [false; 4];
                for &axis in &self.axes {
                    if axis >= 4 || std::mem::replace(&mut seen[axis], true) {
                        return Err(TransformError::Shape(format!(
                            "invalid axes permutation {:?}",
                            self.axes
                        )));
                    }
                }
                Ok(ImageTransformResult::Array4(arr.permuted_axes(self.axes)))
            }
            ImageTransformResult::Tensor(tensor) => {
                let tensor = tensor
                    .permute_axes(&self.axes)
                    .map_err(|e| TransformError::Shape(format!("{e:#}")))?;
                Ok(ImageTransformResult::Tensor(tensor))
            }
            other => Err(unsupported("Transpose", &other)),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToTensor {}

impl GenericTransform for ToTensor {
    fn transform(
        &self,
        input: ImageTransformResult,
    ) -> Result<ImageTransformResult, TransformError> {
        match input {
            image @ ImageTransformResult::RgbImage(_) => {
                ToArray {}.transform(image).and_then(|arr| self.transform(arr))
            }
            ImageTransformResult::Array4(arr4) => {
                // permuted arrays must be laid out again before becoming a tensor
                let arr4 = arr4.as_standard_layout().into_owned();
                Ok(ImageTransformResult::Tensor(arr4.into()))
            }
            // already a tensor
            tensor @ ImageTransformResult::Tensor(_) => Ok(tensor),
        }
    }
}

pub enum ImageTransformResult {
    RgbImage(RgbImage),
    Array4(Array4<f32>),
    Tensor(Tensor),
}

impl ImageTransformResult {
    pub fn shape(&self) -> Vec<usize> {
        match self {
            ImageTransformResult::RgbImage(image) => {
                let (width, height) = image.dimensions();
                vec![width as usize, height as usize]
            }
            ImageTransformResult::Array4(array) => array.shape().to_vec(),
            ImageTransformResult::Tensor(tensor) => tensor.shape().to_vec(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ImageTransformResult::RgbImage(_) => "RgbImage",
            ImageTransformResult::Array4(_) => "Array4",
            ImageTransformResult::Tensor(_) => "Tensor",
        }
    }
}

impl From<RgbImage> for ImageTransformResult {
    fn from(rgb_image: RgbImage) -> Self {
        ImageTransformResult::RgbImage(rgb_image)
    }
}

impl From<Tensor> for ImageTransformResult {
    fn from(tensor: Tensor) -> Self {
        ImageTransformResult::Tensor(tensor)
    }
}

/// The chain the leaf model was trained with: exact bicubic resize, then
/// ImageNet normalization in NCHW order.
pub fn default_steps(
    image_size: &ImageSize,
    mean: [f32; 3],
    std: [f32; 3],
) -> Vec<ImageTransform> {
    vec![
        ResizeRgbImage {
            image_size: image_size.clone(),
            filter: FilterType::CatmullRom,
        }
        .into(),
        ToArray {}.into(),
        Normalization {
            sub: mean,
            div: std,
            zeroone: true,
        }
        .into(),
        ToTensor {}.into(),
    ]
}

/// Runs every step in order and coerces the final value into a tensor.
pub fn apply_steps(steps: &[ImageTransform], image: RgbImage) -> Result<Tensor, TransformError> {
    let mut result = ImageTransformResult::RgbImage(image);

    for step in steps {
        result = step.transform(result)?;
        debug!(shape = ?result.shape(), "transform step applied");
    }

    match (ToTensor {}).transform(result)? {
        ImageTransformResult::Tensor(t) => Ok(t),
        other => Err(TransformError::Shape(format!(
            "expected a tensor after preprocessing, got {}",
            other.kind()
        ))),
    }
}
