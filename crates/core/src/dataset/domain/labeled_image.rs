use std::path::{Path, PathBuf};

/// An image file paired with the identity it depicts.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LabeledImage {
    pub path: PathBuf,
    pub label: String,
}

/// Name of the immediate parent directory of `path`.
///
/// `dataset/alice/001.jpg` → `alice`. Returns `None` for paths with no
/// named parent (e.g. `001.jpg` or `/001.jpg`).
pub fn label_for(path: &Path) -> Option<String> {
    path.parent()?
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("dataset/alice/001.jpg", Some("alice"))]
    #[case("/data/faces/bob smith/a.png", Some("bob smith"))]
    #[case("dataset/alice/nested/002.jpg", Some("nested"))]
    #[case("001.jpg", None)]
    #[case("/001.jpg", None)]
    fn test_label_for(#[case] path: &str, #[case] expected: Option<&str>) {
        assert_eq!(label_for(Path::new(path)).as_deref(), expected);
    }

    #[test]
    fn test_sorts_by_path_first() {
        let mut images = vec![
            LabeledImage {
                path: PathBuf::from("d/zed/a.jpg"),
                label: "zed".to_string(),
            },
            LabeledImage {
                path: PathBuf::from("d/amy/b.jpg"),
                label: "amy".to_string(),
            },
        ];
        images.sort();
        assert_eq!(images[0].label, "amy");
    }
}
