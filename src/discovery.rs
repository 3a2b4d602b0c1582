use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{PrepError, Result};

pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg"];

/// Extension of written images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless PNG, file stem kept and extension replaced.
    Png,
    /// Keep the source file name as-is.
    Source,
}

/// An image found under the input root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub path: PathBuf,
    /// Path relative to the input root, e.g. `train/patient00001/study1/view1_frontal.jpg`
    pub relative: PathBuf,
}

impl SourceImage {
    pub fn output_name(&self, format: OutputFormat) -> Option<String> {
        derive_output_name(&self.relative, format)
    }
}

pub fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Builds the flat output name for a path relative to the input root.
///
/// With at least three segments (`patient/study/view.jpg`) the two parents
/// are prefixed: `patient_study_view.png`. Shallower paths fall back to the
/// bare file name, so two shallow files with the same leaf collide.
pub fn derive_output_name(relative: &Path, format: OutputFormat) -> Option<String> {
    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let file_name = match format {
        OutputFormat::Source => segments.last()?.clone(),
        OutputFormat::Png => {
            let stem = Path::new(segments.last()?).file_stem()?.to_string_lossy();
            format!("{stem}.png")
        }
    };

    let n = segments.len();
    if n >= 3 {
        Some(format!("{}_{}_{}", segments[n - 3], segments[n - 2], file_name))
    } else {
        Some(file_name)
    }
}

/// Recursively lists images under `root` in file-name order.
pub fn discover(root: &Path, extensions: &[String], limit: Option<usize>) -> Result<Vec<SourceImage>> {
    if !root.exists() {
        return Err(PrepError::MissingInputDir(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(PrepError::NotADirectory(root.to_path_buf()));
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {e}");
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || !has_image_extension(path, extensions) {
            continue;
        }

        if limit.is_some_and(|limit| images.len() >= limit) {
            break;
        }

        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        images.push(SourceImage {
            path: path.to_path_buf(),
            relative: relative.to_path_buf(),
        });
    }

    tracing::debug!("discovered {} images under {}", images.len(), root.display());
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn exts() -> Vec<String> {
        DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn deep_paths_use_patient_and_study() {
        let rel = Path::new("train/patient00001/study1/view1_frontal.jpg");
        assert_eq!(
            derive_output_name(rel, OutputFormat::Png).as_deref(),
            Some("patient00001_study1_view1_frontal.png")
        );
        assert_eq!(
            derive_output_name(rel, OutputFormat::Source).as_deref(),
            Some("patient00001_study1_view1_frontal.jpg")
        );
    }

    #[test]
    fn exactly_three_segments() {
        let rel = Path::new("patient00001/study1/view1_frontal.jpg");
        assert_eq!(
            derive_output_name(rel, OutputFormat::Source).as_deref(),
            Some("patient00001_study1_view1_frontal.jpg")
        );
    }

    #[test]
    fn shallow_paths_fall_back_to_file_name() {
        assert_eq!(
            derive_output_name(Path::new("study1/view1.jpg"), OutputFormat::Source).as_deref(),
            Some("view1.jpg")
        );
        assert_eq!(
            derive_output_name(Path::new("view1.JPG"), OutputFormat::Png).as_deref(),
            Some("view1.png")
        );
    }

    #[test]
    fn extension_filter_ignores_case() {
        let exts = exts();
        assert!(has_image_extension(Path::new("a/b.JPG"), &exts));
        assert!(has_image_extension(Path::new("a/b.jpg"), &exts));
        assert!(!has_image_extension(Path::new("a/b.png"), &exts));
        assert!(!has_image_extension(Path::new("a/jpg"), &exts));
    }

    #[test]
    fn discovers_recursively_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for rel in [
            "train/patient00002/study1/view1_frontal.jpg",
            "train/patient00001/study1/view1_frontal.jpg",
            "train/patient00001/study1/view2_lateral.JPG",
            "train/patient00001/study1/notes.txt",
        ] {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"").unwrap();
        }

        let found = discover(root, &exts(), None).unwrap();
        let rels: Vec<_> = found.iter().map(|s| s.relative.clone()).collect();
        assert_eq!(
            rels,
            vec![
                PathBuf::from("train/patient00001/study1/view1_frontal.jpg"),
                PathBuf::from("train/patient00001/study1/view2_lateral.JPG"),
                PathBuf::from("train/patient00002/study1/view1_frontal.jpg"),
            ]
        );

        let limited = discover(root, &exts(), Some(1)).unwrap();
        assert_eq!(limited.len(), 1);

        let none = discover(root, &exts(), Some(0)).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&dir.path().join("nope"), &exts(), None).unwrap_err();
        assert!(matches!(err, PrepError::MissingInputDir(_)));
    }
}
