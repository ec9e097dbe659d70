//! On-disk form of [`FaceEncodings`].
//!
//! Bincode files start with the little-endian format version followed by
//! the record. JSON files are an object `{"version": .., "encodings": ..}`.
//! Readers sniff the format from the first byte, so the extension does
//! not have to match.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::ENCODINGS_FORMAT_VERSION;
use crate::storage::domain::face_encodings::{EncodingsError, FaceEncodings};

#[derive(Error, Debug)]
pub enum EncodingsFileError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bincode encoding failed: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported encodings file version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("invalid encodings file: {0}")]
    Invalid(#[from] EncodingsError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Bincode,
    Json,
}

impl OutputFormat {
    /// An explicit choice wins; otherwise `.json` files get JSON.
    pub fn for_path(path: &Path, explicit: Option<OutputFormat>) -> Self {
        if let Some(format) = explicit {
            return format;
        }
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::Json
        } else {
            Self::Bincode
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bincode => write!(f, "bincode"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bincode" | "bin" => Ok(Self::Bincode),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Unknown output format: {s}. Expected 'bincode' or 'json'"
            )),
        }
    }
}

#[derive(Serialize)]
struct JsonEnvelopeRef<'a> {
    version: u32,
    encodings: &'a FaceEncodings,
}

#[derive(Deserialize)]
struct JsonVersion {
    version: u32,
}

#[derive(Deserialize)]
struct JsonEnvelope {
    encodings: FaceEncodings,
}

/// Write `encodings` to `path`, replacing any existing file only once the
/// new contents are fully on disk.
pub fn write(
    path: &Path,
    encodings: &FaceEncodings,
    format: OutputFormat,
) -> Result<(), EncodingsFileError> {
    let temp_path = part_path(path);
    let result = write_inner(path, &temp_path, encodings, format);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_inner(
    path: &Path,
    temp_path: &Path,
    encodings: &FaceEncodings,
    format: OutputFormat,
) -> Result<(), EncodingsFileError> {
    let file = fs::File::create(temp_path).map_err(io_err(temp_path))?;
    let mut writer = BufWriter::new(file);

    match format {
        OutputFormat::Bincode => {
            bincode::serialize_into(&mut writer, &ENCODINGS_FORMAT_VERSION)?;
            bincode::serialize_into(&mut writer, encodings)?;
        }
        OutputFormat::Json => {
            let envelope = JsonEnvelopeRef {
                version: ENCODINGS_FORMAT_VERSION,
                encodings,
            };
            serde_json::to_writer(&mut writer, &envelope)?;
        }
    }

    writer.flush().map_err(io_err(temp_path))?;
    drop(writer);

    fs::rename(temp_path, path).map_err(io_err(path))?;
    log::debug!("Wrote {} encodings to {} ({format})", encodings.len(), path.display());
    Ok(())
}

pub fn read(path: &Path) -> Result<FaceEncodings, EncodingsFileError> {
    let bytes = fs::read(path).map_err(io_err(path))?;

    let encodings = if looks_like_json(&bytes) {
        let JsonVersion { version } = serde_json::from_slice(&bytes)?;
        check_version(version)?;
        serde_json::from_slice::<JsonEnvelope>(&bytes)?.encodings
    } else {
        let mut reader = bytes.as_slice();
        let version: u32 = bincode::deserialize_from(&mut reader)?;
        check_version(version)?;
        bincode::deserialize_from(&mut reader)?
    };

    encodings.validate()?;
    Ok(encodings)
}

fn check_version(found: u32) -> Result<(), EncodingsFileError> {
    if found != ENCODINGS_FORMAT_VERSION {
        return Err(EncodingsFileError::UnsupportedVersion {
            found,
            expected: ENCODINGS_FORMAT_VERSION,
        });
    }
    Ok(())
}

fn looks_like_json(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'{')
}

/// `out/faces.bin` → `out/faces.bin.part`
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

fn io_err(path: &Path) -> impl Fn(std::io::Error) -> EncodingsFileError + '_ {
    move |source| EncodingsFileError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::domain::embedding::Embedding;
    use crate::storage::domain::face_encodings::EncodingStructure;
    use rstest::rstest;
    use tempfile::TempDir;

    fn sample(structure: EncodingStructure) -> FaceEncodings {
        let embeddings = (0..12)
            .map(|i| Embedding::normalized(vec![i as f32, 1.0, (i % 3) as f32]))
            .collect();
        let names = (0..12).map(|i| format!("p{}", i % 4)).collect();
        FaceEncodings::build(structure, embeddings, names, 2).unwrap()
    }

    #[rstest]
    #[case(OutputFormat::Bincode, EncodingStructure::List)]
    #[case(OutputFormat::Bincode, EncodingStructure::KdTree)]
    #[case(OutputFormat::Json, EncodingStructure::List)]
    #[case(OutputFormat::Json, EncodingStructure::KdTree)]
    fn test_read_returns_written_record(
        #[case] format: OutputFormat,
        #[case] structure: EncodingStructure,
    ) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("encodings.out");
        let encodings = sample(structure);

        write(&path, &encodings, format).unwrap();
        let restored = read(&path).unwrap();

        assert_eq!(restored, encodings);
        assert_eq!(restored.structure(), structure);
        assert!(!part_path(&path).exists());
    }

    #[test]
    fn test_json_layout_has_named_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("encodings.json");
        write(&path, &sample(EncodingStructure::List), OutputFormat::Json).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["version"], ENCODINGS_FORMAT_VERSION);
        assert_eq!(value["encodings"]["encoding_structure"], "list");
        assert_eq!(value["encodings"]["names"].as_array().unwrap().len(), 12);
    }

    #[test]
    fn test_rejects_other_bincode_version() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("old.bin");
        let mut bytes = bincode::serialize(&(ENCODINGS_FORMAT_VERSION + 1)).unwrap();
        bytes.extend(bincode::serialize(&sample(EncodingStructure::List)).unwrap());
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            read(&path),
            Err(EncodingsFileError::UnsupportedVersion { found, .. }) if found == ENCODINGS_FORMAT_VERSION + 1
        ));
    }

    #[test]
    fn test_rejects_other_json_version() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("old.json");
        fs::write(&path, br#"{"version": 0, "encodings": null}"#).unwrap();
        assert!(matches!(
            read(&path),
            Err(EncodingsFileError::UnsupportedVersion { found: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_mismatched_lengths_on_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        let body = format!(
            r#"{{"version": {ENCODINGS_FORMAT_VERSION}, "encodings": {{
                "encodings": {{"List": [[1.0, 0.0]]}},
                "names": ["a", "b"],
                "encoding_structure": "list"
            }}}}"#
        );
        fs::write(&path, body).unwrap();
        assert!(matches!(read(&path), Err(EncodingsFileError::Invalid(_))));
    }

    #[test]
    fn test_rejects_tree_with_broken_layout() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tampered.json");
        let body = format!(
            r#"{{"version": {ENCODINGS_FORMAT_VERSION}, "encodings": {{
                "encodings": {{"KdTree": {{
                    "dim": 2, "leaf_size": 40,
                    "points": [[1.0, 0.0]], "order": [], "nodes": []
                }}}},
                "names": ["a"],
                "encoding_structure": "kdtree"
            }}}}"#
        );
        fs::write(&path, body).unwrap();
        assert!(matches!(read(&path), Err(EncodingsFileError::Invalid(_))));
    }

    #[test]
    fn test_rejects_tampered_bincode_tree() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tampered.bin");
        let mut value = serde_json::to_value(sample(EncodingStructure::KdTree)).unwrap();
        value["encodings"]["KdTree"]["order"][0] = serde_json::json!(99);
        let tampered: FaceEncodings = serde_json::from_value(value).unwrap();
        let mut bytes = bincode::serialize(&ENCODINGS_FORMAT_VERSION).unwrap();
        bytes.extend(bincode::serialize(&tampered).unwrap());
        fs::write(&path, bytes).unwrap();

        assert!(matches!(read(&path), Err(EncodingsFileError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            read(Path::new("/nonexistent/encodings.bin")),
            Err(EncodingsFileError::Io { .. })
        ));
    }

    #[test]
    fn test_failed_write_leaves_no_part_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing_dir").join("encodings.bin");
        let result = write(&path, &sample(EncodingStructure::List), OutputFormat::Bincode);
        assert!(result.is_err());
        assert!(!part_path(&path).exists());
    }

    #[test]
    fn test_overwrites_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("encodings.bin");
        fs::write(&path, b"stale").unwrap();
        write(&path, &sample(EncodingStructure::KdTree), OutputFormat::Bincode).unwrap();
        assert_eq!(read(&path).unwrap().structure(), EncodingStructure::KdTree);
    }

    #[rstest]
    #[case("out.json", None, OutputFormat::Json)]
    #[case("out.JSON", None, OutputFormat::Json)]
    #[case("out.pickle", None, OutputFormat::Bincode)]
    #[case("out", None, OutputFormat::Bincode)]
    #[case("out.json", Some(OutputFormat::Bincode), OutputFormat::Bincode)]
    #[case("out.bin", Some(OutputFormat::Json), OutputFormat::Json)]
    fn test_format_for_path(
        #[case] path: &str,
        #[case] explicit: Option<OutputFormat>,
        #[case] expected: OutputFormat,
    ) {
        assert_eq!(OutputFormat::for_path(Path::new(path), explicit), expected);
    }

    #[rstest]
    #[case("bincode", OutputFormat::Bincode)]
    #[case("BIN", OutputFormat::Bincode)]
    #[case("json", OutputFormat::Json)]
    fn test_format_from_str(#[case] input: &str, #[case] expected: OutputFormat) {
        assert_eq!(input.parse::<OutputFormat>().unwrap(), expected);
    }

    #[test]
    fn test_format_from_str_rejects_unknown() {
        assert!("pickle".parse::<OutputFormat>().is_err());
    }
}
