use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};

/// A labelled folder of sample leaves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCategory {
    pub name: String,
    pub dir: PathBuf,
}

impl TestCategory {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        TestCategory {
            name: name.into(),
            dir: dir.into(),
        }
    }
}

pub const DEFAULT_TEST_ROOT: &str = "Test/Test";

/// Healthy, Powdery and Rust, each in a same-named folder under `root`.
pub fn default_categories(root: &Path) -> Vec<TestCategory> {
    ["Healthy", "Powdery", "Rust"]
        .into_iter()
        .map(|name| TestCategory::new(name, root.join(name)))
        .collect()
}

/// The first `limit` files in `dir` with the given extension, by file name.
pub fn sample_images(dir: &Path, extension: &str, limit: usize) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ProbeError::DirectoryNotFound(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    files.truncate(limit);
    Ok(files)
}
