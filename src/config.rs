use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::dataset::{default_categories, TestCategory, DEFAULT_TEST_ROOT};
use crate::error::{ProbeError, Result};
use crate::labels::ClassLabels;
use crate::transformer::{default_steps, ImageTransform};
use crate::{ImageSize, IMAGENET_MEAN, IMAGENET_STD, MODEL_PATH};

/// Everything a probe run needs. Every field has a default, so an empty
/// JSON object is a valid configuration.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub model_path: PathBuf,
    /// Graph output to read; the model's own outputs when unset.
    pub output_name: Option<String>,
    pub image_size: ImageSize,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    /// Replaces the resize + normalize chain built from the fields above.
    pub preprocessing: Option<Vec<ImageTransform>>,
    pub class_names: ClassLabels,
    pub categories: Vec<TestCategory>,
    pub samples_per_category: usize,
    pub extension: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            model_path: PathBuf::from(MODEL_PATH),
            output_name: None,
            image_size: ImageSize::default(),
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
            preprocessing: None,
            class_names: ClassLabels::default(),
            categories: default_categories(Path::new(DEFAULT_TEST_ROOT)),
            samples_per_category: 3,
            extension: "jpg".to_string(),
        }
    }
}

impl ProbeConfig {
    /// Parses a JSON file. Not validated, so command-line overrides can
    /// still fix fields before [`ProbeConfig::validate`] runs.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.image_size.width == 0 || self.image_size.height == 0 {
            return Err(ProbeError::Config(format!(
                "image size must be positive, got {}x{}",
                self.image_size.width, self.image_size.height
            )));
        }
        if self.std.iter().any(|s| *s == 0.0) {
            return Err(ProbeError::Config(format!(
                "std components must be non-zero, got {:?}",
                self.std
            )));
        }
        if self.samples_per_category == 0 {
            return Err(ProbeError::Config(
                "samples_per_category must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn steps(&self) -> Vec<ImageTransform> {
        match &self.preprocessing {
            Some(steps) => steps.clone(),
            None => default_steps(&self.image_size, self.mean, self.std),
        }
    }

    /// Moves every category folder under a new root, keeping its last path
    /// component.
    pub fn rebase_categories(&mut self, root: &Path) {
        for category in &mut self.categories {
            let leaf = category
                .dir
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(&category.name));
            category.dir = root.join(leaf);
        }
    }
}

/// Values given on the command line; each one replaces the file's value.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub model: Option<PathBuf>,
    pub test_root: Option<PathBuf>,
    pub limit: Option<usize>,
}

impl Overrides {
    pub fn apply(self, config: &mut ProbeConfig) {
        if let Some(model) = self.model {
            config.model_path = model;
        }
        if let Some(root) = self.test_root {
            config.rebase_categories(&root);
        }
        if let Some(limit) = self.limit {
            config.samples_per_category = limit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config: ProbeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.model_path, PathBuf::from("leafcare_mbv2.onnx"));
        assert_eq!(config.image_size, ImageSize::square(224));
        assert_eq!(config.samples_per_category, 3);
        assert_eq!(config.categories.len(), 3);
        assert_eq!(config.steps().len(), 4);
        config.validate().unwrap();
    }

    #[test]
    fn file_overrides_selected_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.json");
        fs::write(
            &path,
            r#"{
                "model_path": "models/leaf.onnx",
                "output_name": "logits",
                "class_names": ["healthy", "spot", "mildew"],
                "categories": [{"name": "Healthy", "dir": "data/healthy"}],
                "samples_per_category": 5
            }"#,
        )
        .unwrap();

        let config = ProbeConfig::from_file(&path).unwrap();
        assert_eq!(config.model_path, PathBuf::from("models/leaf.onnx"));
        assert_eq!(config.output_name.as_deref(), Some("logits"));
        assert_eq!(config.class_names.name(2), "mildew");
        assert_eq!(config.categories, vec![TestCategory::new("Healthy", "data/healthy")]);
        assert_eq!(config.samples_per_category, 5);
        assert_eq!(config.extension, "jpg");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = ProbeConfig::default();
        config.std = [0.2, 0.0, 0.2];
        assert!(matches!(config.validate(), Err(ProbeError::Config(_))));

        let mut config = ProbeConfig::default();
        config.samples_per_category = 0;
        assert!(matches!(config.validate(), Err(ProbeError::Config(_))));

        let mut config = ProbeConfig::default();
        config.image_size.height = 0;
        assert!(matches!(config.validate(), Err(ProbeError::Config(_))));
    }

    #[test]
    fn limit_override_repairs_a_zero_sample_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.json");
        fs::write(&path, r#"{ "samples_per_category": 0 }"#).unwrap();

        let mut config = ProbeConfig::from_file(&path).unwrap();
        assert!(matches!(config.validate(), Err(ProbeError::Config(_))));

        Overrides {
            limit: Some(3),
            ..Overrides::default()
        }
        .apply(&mut config);
        config.validate().unwrap();
        assert_eq!(config.samples_per_category, 3);
    }

    #[test]
    fn overrides_replace_model_and_root() {
        let mut config = ProbeConfig::default();
        Overrides {
            model: Some(PathBuf::from("exports/leaf.onnx")),
            test_root: Some(PathBuf::from("samples")),
            limit: None,
        }
        .apply(&mut config);
        assert_eq!(config.model_path, PathBuf::from("exports/leaf.onnx"));
        assert_eq!(config.categories[0].dir, PathBuf::from("samples/Healthy"));
        assert_eq!(config.samples_per_category, 3);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.json");
        fs::write(&path, "{ \"samples_per_category\": \"three\" }").unwrap();
        assert!(matches!(
            ProbeConfig::from_file(&path),
            Err(ProbeError::ConfigParse(_))
        ));
    }

    #[test]
    fn unset_output_name_is_not_serialized() {
        let json = serde_json::to_string(&ProbeConfig::default()).unwrap();
        assert!(!json.contains("output_name"));
        assert!(!json.contains("preprocessing"));
    }

    #[test]
    fn categories_move_to_a_new_root() {
        let mut config = ProbeConfig::default();
        config.rebase_categories(Path::new("/data/leaves"));
        assert_eq!(config.categories[1].dir, PathBuf::from("/data/leaves/Powdery"));
    }
}
