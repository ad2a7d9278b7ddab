use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::classification::{OutputStats, Prediction};
use crate::config::ProbeConfig;
use crate::dataset::sample_images;
use crate::error::{ProbeError, Result};
use crate::pipeline::ImageClassifier;
use crate::report;

#[derive(Clone, Debug, Serialize)]
pub struct CategoryResult {
    pub category: String,
    pub prediction: Prediction,
}

/// Decodes one image file and classifies it.
pub fn classify_file<C: ImageClassifier>(
    classifier: &C,
    path: &Path,
    config: &ProbeConfig,
) -> Result<Prediction> {
    let image = image::open(path)
        .map_err(|source| ProbeError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    let output = classifier.infer(image)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Prediction::from_output(name, output, &config.class_names)
}

/// Classifies the samples of every category and writes the report to `out`.
///
/// Missing folders and images that fail to decode or classify are reported
/// and skipped; only write failures end the run early.
pub fn run<C: ImageClassifier, W: Write>(
    config: &ProbeConfig,
    classifier: &C,
    out: &mut W,
) -> Result<Vec<CategoryResult>> {
    report::print_header(out)?;

    let mut results = Vec::new();
    for category in &config.categories {
        let sampled = sample_images(
            &category.dir,
            &config.extension,
            config.samples_per_category,
        );
        let files = match sampled {
            Ok(files) => files,
            Err(ProbeError::DirectoryNotFound(dir)) => {
                warn!(
                    category = %category.name,
                    dir = %dir.display(),
                    "skipping missing directory"
                );
                report::print_missing_dir(out, &dir)?;
                continue;
            }
            Err(err) => return Err(err),
        };

        report::print_category_header(out, category)?;
        info!(category = %category.name, images = files.len(), "testing category");

        for file in files {
            match classify_file(classifier, &file, config) {
                Ok(prediction) => {
                    report::print_result(out, &prediction, &config.class_names)?;
                    results.push(CategoryResult {
                        category: category.name.clone(),
                        prediction,
                    });
                }
                Err(err) => {
                    error!(image = %file.display(), error = %err, "classification failed");
                    report::print_failure(out, &file, &err)?;
                }
            }
        }
    }

    report::print_summary(out, &config.categories, &results)?;
    if let Some(first) = results.first() {
        report::print_output_format(out, &OutputStats::of(&first.prediction))?;
    }
    Ok(results)
}
