use std::error::Error;
use std::io::{self, Write};
use std::path::Path;

use crate::classification::{OutputStats, Prediction};
use crate::dataset::TestCategory;
use crate::labels::{verdict, ClassLabels};
use crate::probe::CategoryResult;

const RAW_PREVIEW: usize = 5;

fn rule(out: &mut impl Write, ch: char, width: usize) -> io::Result<()> {
    writeln!(out, "{}", ch.to_string().repeat(width))
}

/// `[a, b, c]` with four decimals per value.
pub fn format_values(values: &[f32]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.4}")).collect();
    format!("[{}]", parts.join(", "))
}

pub fn print_header(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "\n🔍 Testing model with sample images...")?;
    rule(out, '=', 60)
}

pub fn print_category_header(
    out: &mut impl Write,
    category: &TestCategory,
) -> io::Result<()> {
    writeln!(out, "\n📁 Testing {} images:", category.name)?;
    rule(out, '-', 40)
}

pub fn print_missing_dir(out: &mut impl Write, dir: &Path) -> io::Result<()> {
    writeln!(out, "❌ Directory not found: {}", dir.display())
}

/// The error and each of its sources, `: `-separated.
pub fn print_failure(out: &mut impl Write, path: &Path, err: &dyn Error) -> io::Result<()> {
    write!(out, "❌ Error testing {}: {err}", path.display())?;
    let mut source = err.source();
    while let Some(cause) = source {
        write!(out, ": {cause}")?;
        source = cause.source();
    }
    writeln!(out)
}

pub fn print_result(
    out: &mut impl Write,
    prediction: &Prediction,
    labels: &ClassLabels,
) -> io::Result<()> {
    let raw = &prediction.raw_output;
    writeln!(out, "  📸 {}", prediction.image)?;
    writeln!(
        out,
        "     Predicted: {} ({:.3})",
        prediction.class_name, prediction.confidence
    )?;
    writeln!(out, "     Raw output shape: {:?}", prediction.output_shape)?;
    writeln!(
        out,
        "     Raw output values: {}...",
        format_values(&raw[..raw.len().min(RAW_PREVIEW)])
    )?;
    writeln!(
        out,
        "     Probabilities: {}",
        format_values(&prediction.probabilities)
    )?;
    writeln!(out, "     {}", verdict(labels, prediction))?;
    writeln!(out)
}

/// Per-category list of predictions; categories without results are left out.
pub fn print_summary(
    out: &mut impl Write,
    categories: &[TestCategory],
    results: &[CategoryResult],
) -> io::Result<()> {
    writeln!(out, "\n📊 SUMMARY:")?;
    rule(out, '=', 60)?;
    for category in categories {
        let mut matching = results
            .iter()
            .filter(|r| r.category == category.name)
            .peekable();
        if matching.peek().is_none() {
            continue;
        }
        writeln!(out, "\n{}:", category.name)?;
        for r in matching {
            writeln!(
                out,
                "  - {} ({:.3})",
                r.prediction.class_name, r.prediction.confidence
            )?;
        }
    }
    Ok(())
}

pub fn print_output_format(out: &mut impl Write, stats: &OutputStats) -> io::Result<()> {
    writeln!(out, "\n🔧 Model output format:")?;
    writeln!(out, "  - Output shape: {:?}", stats.shape)?;
    writeln!(out, "  - Output range: [{:.3}, {:.3}]", stats.min, stats.max)?;
    writeln!(out, "  - Number of classes: {}", stats.num_classes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(image: &str, class: usize, confidence: f32) -> Prediction {
        let labels = ClassLabels::default();
        Prediction {
            image: image.to_string(),
            predicted_class: class,
            class_name: labels.name(class).into_owned(),
            confidence,
            raw_output: vec![2.0, -1.0, 0.5, 0.25, 0.125, 3.0],
            probabilities: vec![0.5, 0.5],
            output_shape: vec![1, 6],
        }
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn result_block_previews_five_raw_values() {
        let labels = ClassLabels::default();
        let prediction = prediction("leaf_01.jpg", 0, 0.8771);
        let text = render(|out| print_result(out, &prediction, &labels));
        assert!(text.contains("📸 leaf_01.jpg"));
        assert!(text.contains("Predicted: Bình thường (0.877)"));
        assert!(text.contains("Raw output shape: [1, 6]"));
        assert!(text.contains("Raw output values: [2.0000, -1.0000, 0.5000, 0.2500, 0.1250]..."));
        assert!(text.contains("Probabilities: [0.5000, 0.5000]"));
        assert!(text.contains("🌱 Bình thường - Lá cây khỏe mạnh! (99.9%)"));
    }

    #[test]
    fn summary_skips_empty_categories() {
        let categories = vec![
            TestCategory::new("Healthy", "h"),
            TestCategory::new("Powdery", "p"),
            TestCategory::new("Rust", "r"),
        ];
        let results = vec![
            CategoryResult {
                category: "Rust".to_string(),
                prediction: prediction("r1.jpg", 1, 0.61),
            },
            CategoryResult {
                category: "Healthy".to_string(),
                prediction: prediction("h1.jpg", 0, 0.99),
            },
        ];
        let text = render(|out| print_summary(out, &categories, &results));
        assert!(!text.contains("Powdery"));
        let healthy = text.find("Healthy:").unwrap();
        let rust = text.find("Rust:").unwrap();
        assert!(healthy < rust);
        assert!(text.contains("  - Bệnh đốm nâu (0.610)"));
    }

    #[test]
    fn failure_lists_every_cause() {
        let err = crate::ProbeError::Model(anyhow::anyhow!("shape mismatch").context("run plan"));
        let text = render(|out| print_failure(out, Path::new("Rust/leaf.jpg"), &err));
        assert_eq!(
            text,
            "❌ Error testing Rust/leaf.jpg: model error: run plan: shape mismatch\n"
        );
    }

    #[test]
    fn output_format_lines() {
        let stats = OutputStats {
            shape: vec![1, 3],
            min: -2.5,
            max: 4.0,
            num_classes: 3,
        };
        let text = render(|out| print_output_format(out, &stats));
        assert!(text.contains("Output shape: [1, 3]"));
        assert!(text.contains("Output range: [-2.500, 4.000]"));
        assert!(text.contains("Number of classes: 3"));
    }
}
