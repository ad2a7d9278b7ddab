use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("{step} is not implemented for {kind}")]
    UnsupportedInput {
        step: &'static str,
        kind: &'static str,
    },

    #[error("crop {crop_width}x{crop_height} does not fit into image {width}x{height}")]
    CropTooLarge {
        crop_width: u32,
        crop_height: u32,
        width: u32,
        height: u32,
    },

    #[error("shape error: {0}")]
    Shape(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("model error")]
    Model(#[source] anyhow::Error),

    #[error("cannot read image {}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("model produced an empty output")]
    EmptyOutput,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProbeError>;
