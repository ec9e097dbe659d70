use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embedding::domain::embedding::{squared_distance, Embedding};
use crate::indexing::kd_tree::{IndexError, KdTree};

#[derive(Error, Debug, PartialEq)]
pub enum EncodingsError {
    #[error("{embeddings} embeddings but {names} names")]
    LengthMismatch { embeddings: usize, names: usize },
    #[error("structure tag is {tagged} but encodings are stored as {stored}")]
    StructureMismatch {
        tagged: EncodingStructure,
        stored: EncodingStructure,
    },
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// How the embeddings are laid out in the output file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingStructure {
    #[default]
    List,
    KdTree,
}

impl fmt::Display for EncodingStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::KdTree => write!(f, "kdtree"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EncodingStore {
    List(Vec<Embedding>),
    KdTree(KdTree),
}

impl EncodingStore {
    pub fn structure(&self) -> EncodingStructure {
        match self {
            Self::List(_) => EncodingStructure::List,
            Self::KdTree(_) => EncodingStructure::KdTree,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::List(list) => list.len(),
            Self::KdTree(tree) => tree.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every detected face in a dataset, paired with its identity label.
///
/// `names[i]` labels the i-th stored embedding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceEncodings {
    encodings: EncodingStore,
    names: Vec<String>,
    encoding_structure: EncodingStructure,
}

impl FaceEncodings {
    pub fn new_list(
        embeddings: Vec<Embedding>,
        names: Vec<String>,
    ) -> Result<Self, EncodingsError> {
        check_lengths(embeddings.len(), names.len())?;
        Ok(Self {
            encodings: EncodingStore::List(embeddings),
            names,
            encoding_structure: EncodingStructure::List,
        })
    }

    pub fn new_kdtree(
        embeddings: Vec<Embedding>,
        names: Vec<String>,
        leaf_size: usize,
    ) -> Result<Self, EncodingsError> {
        check_lengths(embeddings.len(), names.len())?;
        let points = embeddings.into_iter().map(Embedding::into_values).collect();
        let tree = KdTree::build(points, leaf_size)?;
        Ok(Self {
            encodings: EncodingStore::KdTree(tree),
            names,
            encoding_structure: EncodingStructure::KdTree,
        })
    }

    pub fn build(
        structure: EncodingStructure,
        embeddings: Vec<Embedding>,
        names: Vec<String>,
        leaf_size: usize,
    ) -> Result<Self, EncodingsError> {
        match structure {
            EncodingStructure::List => Self::new_list(embeddings, names),
            EncodingStructure::KdTree => Self::new_kdtree(embeddings, names, leaf_size),
        }
    }

    /// Re-check the invariants of a deserialized record.
    pub fn validate(&self) -> Result<(), EncodingsError> {
        check_lengths(self.encodings.len(), self.names.len())?;
        let stored = self.encodings.structure();
        if stored != self.encoding_structure {
            return Err(EncodingsError::StructureMismatch {
                tagged: self.encoding_structure,
                stored,
            });
        }
        if let EncodingStore::KdTree(tree) = &self.encodings {
            tree.validate()?;
        }
        Ok(())
    }

    pub fn structure(&self) -> EncodingStructure {
        self.encoding_structure
    }

    pub fn store(&self) -> &EncodingStore {
        &self.encodings
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Stored embeddings in insertion order, whatever the structure.
    pub fn embeddings(&self) -> Vec<&[f32]> {
        match &self.encodings {
            EncodingStore::List(list) => list.iter().map(Embedding::values).collect(),
            EncodingStore::KdTree(tree) => tree.points().iter().map(Vec::as_slice).collect(),
        }
    }

    /// Labels of the `k` stored faces closest to `probe`, nearest first.
    pub fn nearest(&self, probe: &[f32], k: usize) -> Result<Vec<(String, f32)>, EncodingsError> {
        let hits = match &self.encodings {
            EncodingStore::List(list) => brute_force(list, probe, k)?,
            EncodingStore::KdTree(tree) => tree.query(probe, k)?,
        };
        Ok(hits
            .into_iter()
            .map(|(i, dist)| (self.names[i].clone(), dist))
            .collect())
    }
}

fn check_lengths(embeddings: usize, names: usize) -> Result<(), EncodingsError> {
    if embeddings != names {
        return Err(EncodingsError::LengthMismatch { embeddings, names });
    }
    Ok(())
}

fn brute_force(
    list: &[Embedding],
    probe: &[f32],
    k: usize,
) -> Result<Vec<(usize, f32)>, IndexError> {
    if let Some(first) = list.first() {
        if first.len() != probe.len() {
            return Err(IndexError::DimensionMismatch {
                index: 0,
                expected: first.len(),
                got: probe.len(),
            });
        }
    }

    let mut scored: Vec<(usize, f32)> = list
        .iter()
        .enumerate()
        .map(|(i, e)| (i, squared_distance(e.values(), probe)))
        .collect();
    scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    scored.truncate(k);
    Ok(scored.into_iter().map(|(i, d)| (i, d.sqrt())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn sample() -> (Vec<Embedding>, Vec<String>) {
        let mut embeddings = Vec::new();
        let mut names = Vec::new();
        for i in 0..60 {
            let t = i as f32 * 0.37;
            embeddings.push(Embedding::normalized(vec![
                t.sin(),
                t.cos(),
                (2.0 * t).sin(),
                (0.5 * t).cos(),
            ]));
            names.push(format!("person{}", i % 7));
        }
        (embeddings, names)
    }

    #[test]
    fn test_list_and_kdtree_hold_same_embeddings() {
        let (embeddings, names) = sample();
        let list = FaceEncodings::new_list(embeddings.clone(), names.clone()).unwrap();
        let tree = FaceEncodings::new_kdtree(embeddings, names, 3).unwrap();

        assert_eq!(list.embeddings(), tree.embeddings());
        assert_eq!(list.names(), tree.names());
        assert_eq!(list.structure(), EncodingStructure::List);
        assert_eq!(tree.structure(), EncodingStructure::KdTree);
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    #[case(60)]
    fn test_nearest_agrees_between_structures(#[case] k: usize) {
        let (embeddings, names) = sample();
        let list = FaceEncodings::new_list(embeddings.clone(), names.clone()).unwrap();
        let tree = FaceEncodings::new_kdtree(embeddings, names, 5).unwrap();

        for probe in [[0.1, 0.9, 0.2, 0.3], [-0.5, 0.0, 0.5, 0.5]] {
            let a = list.nearest(&probe, k).unwrap();
            let b = tree.nearest(&probe, k).unwrap();
            assert_eq!(a.len(), k);
            for ((name_a, dist_a), (name_b, dist_b)) in a.iter().zip(b.iter()) {
                assert_eq!(name_a, name_b);
                assert_relative_eq!(dist_a, dist_b, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_nearest_finds_own_label() {
        let (embeddings, names) = sample();
        let probe = embeddings[12].values().to_vec();
        let encodings = FaceEncodings::new_kdtree(embeddings, names.clone(), 40).unwrap();
        let hits = encodings.nearest(&probe, 1).unwrap();
        assert_eq!(hits[0].0, names[12]);
        assert_relative_eq!(hits[0].1, 0.0);
    }

    #[rstest]
    #[case(EncodingStructure::List)]
    #[case(EncodingStructure::KdTree)]
    fn test_length_mismatch_rejected(#[case] structure: EncodingStructure) {
        let (embeddings, mut names) = sample();
        names.pop();
        assert_eq!(
            FaceEncodings::build(structure, embeddings, names, 40),
            Err(EncodingsError::LengthMismatch {
                embeddings: 60,
                names: 59
            })
        );
    }

    #[rstest]
    #[case(EncodingStructure::List)]
    #[case(EncodingStructure::KdTree)]
    fn test_empty_dataset_is_valid(#[case] structure: EncodingStructure) {
        let encodings = FaceEncodings::build(structure, Vec::new(), Vec::new(), 40).unwrap();
        assert!(encodings.is_empty());
        assert!(encodings.nearest(&[0.0; 4], 3).unwrap().is_empty());
        assert!(encodings.validate().is_ok());
    }

    #[test]
    fn test_validate_catches_tampered_structure() {
        let (embeddings, names) = sample();
        let mut encodings = FaceEncodings::new_list(embeddings, names).unwrap();
        encodings.encoding_structure = EncodingStructure::KdTree;
        assert!(matches!(
            encodings.validate(),
            Err(EncodingsError::StructureMismatch { .. })
        ));
    }

    #[test]
    fn test_nearest_rejects_wrong_dimension() {
        let (embeddings, names) = sample();
        let list = FaceEncodings::new_list(embeddings, names).unwrap();
        assert!(list.nearest(&[1.0, 0.0], 1).is_err());
    }

    #[rstest]
    #[case(EncodingStructure::List, "list")]
    #[case(EncodingStructure::KdTree, "kdtree")]
    fn test_structure_display(#[case] structure: EncodingStructure, #[case] expected: &str) {
        assert_eq!(structure.to_string(), expected);
    }

    #[test]
    fn test_structure_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&EncodingStructure::KdTree).unwrap(),
            "\"kdtree\""
        );
    }
}
