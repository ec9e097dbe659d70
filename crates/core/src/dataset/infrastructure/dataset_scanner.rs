use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::dataset::domain::labeled_image::{label_for, LabeledImage};
use crate::shared::constants::IMAGE_EXTENSIONS;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("dataset directory not found: {0}")]
    NotFound(PathBuf),
    #[error("dataset path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("failed to read dataset directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("failed to resolve dataset directory {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Recursively list every image under `root`, labeled by parent directory.
///
/// Images directly under `root` take the name of the resolved root, so
/// `.` or `people/..` label them by the directory they point at.
///
/// Files are matched by extension (case-insensitive) and returned sorted by
/// path so runs over the same tree are reproducible.
pub fn scan(root: &Path) -> Result<Vec<LabeledImage>, ScanError> {
    if !root.exists() {
        return Err(ScanError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let root_label = root_label(root)?;
    let mut images = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }
        let label = if entry.depth() == 1 {
            root_label.clone()
        } else {
            label_for(entry.path())
        };
        match label {
            Some(label) => images.push(LabeledImage {
                path: entry.into_path(),
                label,
            }),
            None => log::warn!(
                "Skipping {}: no directory name to label it",
                entry.path().display()
            ),
        }
    }

    images.sort();
    log::debug!("Found {} images under {}", images.len(), root.display());
    Ok(images)
}

/// Name of the directory `root` resolves to; `None` for the filesystem root.
fn root_label(root: &Path) -> Result<Option<String>, ScanError> {
    let resolved = root.canonicalize().map_err(|source| ScanError::Resolve {
        path: root.to_path_buf(),
        source,
    })?;
    Ok(resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned()))
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[rstest]
    #[case("a.jpg", true)]
    #[case("a.JPEG", true)]
    #[case("a.png", true)]
    #[case("a.webp", true)]
    #[case("a.txt", false)]
    #[case("jpg", false)]
    fn test_is_image(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_image(Path::new(name)), expected);
    }

    #[test]
    fn test_scan_labels_by_parent_directory() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "alice/1.jpg");
        touch(tmp.path(), "alice/2.png");
        touch(tmp.path(), "bob/1.jpg");
        touch(tmp.path(), "bob/notes.txt");

        let images = scan(tmp.path()).unwrap();
        let labels: Vec<&str> = images.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["alice", "alice", "bob"]);
        for image in &images {
            assert_eq!(
                image.path.parent().unwrap().file_name().unwrap().to_str(),
                Some(image.label.as_str())
            );
        }
    }

    #[test]
    fn test_scan_is_sorted() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "zed/b.jpg");
        touch(tmp.path(), "amy/c.jpg");
        touch(tmp.path(), "zed/a.jpg");

        let images = scan(tmp.path()).unwrap();
        let paths: Vec<PathBuf> = images.iter().map(|i| i.path.clone()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn test_scan_nested_uses_immediate_parent() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "alice/holiday/1.jpg");
        let images = scan(tmp.path()).unwrap();
        assert_eq!(images[0].label, "holiday");
    }

    #[test]
    fn test_scan_top_level_file_uses_root_name() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("faces");
        touch(&root, "group.jpg");
        touch(&root, "alice/1.jpg");

        let images = scan(&root).unwrap();
        let labels: Vec<&str> = images.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["alice", "faces"]);
    }

    #[test]
    fn test_scan_top_level_file_under_unnamed_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("faces");
        touch(&root, "group.jpg");
        touch(&root, "alice/1.jpg");
        fs::create_dir_all(root.join("sub")).unwrap();

        // `faces/sub/..` has no file name of its own, like `.`
        let unnamed = root.join("sub").join("..");
        assert!(unnamed.file_name().is_none());

        let images = scan(&unnamed).unwrap();
        let labels: Vec<&str> = images.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["alice", "faces"]);
        assert!(images.iter().any(|i| i.path.ends_with("group.jpg")));
    }

    #[test]
    fn test_scan_empty_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(scan(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_scan_missing_root() {
        let result = scan(Path::new("/nonexistent/dataset"));
        assert!(matches!(result, Err(ScanError::NotFound(_))));
    }

    #[test]
    fn test_scan_file_root() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "file.jpg");
        let result = scan(&tmp.path().join("file.jpg"));
        assert!(matches!(result, Err(ScanError::NotADirectory(_))));
    }
}
