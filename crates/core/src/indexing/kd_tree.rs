//! Exact k-nearest-neighbor index over fixed-length vectors.
//!
//! The tree splits on the dimension with the widest spread at the median
//! point until a node holds at most `leaf_size` points. Points are kept in
//! insertion order; leaves reference them through a permutation, so query
//! results are insertion indices.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embedding::domain::embedding::squared_distance;

#[derive(Error, Debug, PartialEq)]
pub enum IndexError {
    #[error("leaf size must be at least 1")]
    InvalidLeafSize,
    #[error("point {index} has {got} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },
    #[error("malformed tree: {0}")]
    Malformed(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        start: usize,
        end: usize,
    },
    Split {
        axis: usize,
        value: f32,
        left: usize,
        right: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KdTree {
    dim: usize,
    leaf_size: usize,
    points: Vec<Vec<f32>>,
    order: Vec<usize>,
    nodes: Vec<Node>,
}

impl KdTree {
    pub fn build(points: Vec<Vec<f32>>, leaf_size: usize) -> Result<Self, IndexError> {
        if leaf_size == 0 {
            return Err(IndexError::InvalidLeafSize);
        }
        let dim = points.first().map_or(0, Vec::len);
        if let Some((index, p)) = points.iter().enumerate().find(|(_, p)| p.len() != dim) {
            return Err(IndexError::DimensionMismatch {
                index,
                expected: dim,
                got: p.len(),
            });
        }

        let mut tree = Self {
            dim,
            leaf_size,
            order: (0..points.len()).collect(),
            points,
            nodes: Vec::new(),
        };
        if !tree.points.is_empty() {
            tree.build_node(0, tree.points.len());
        }
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Stored points in insertion order.
    pub fn points(&self) -> &[Vec<f32>] {
        &self.points
    }

    /// Checks the layout of a deserialized tree so that queries cannot
    /// index out of bounds or loop.
    ///
    /// Children always have larger ids than their parent, as `build` lays
    /// them out, which rules out cycles.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.leaf_size == 0 {
            return Err(IndexError::InvalidLeafSize);
        }
        if let Some((index, p)) = self
            .points
            .iter()
            .enumerate()
            .find(|(_, p)| p.len() != self.dim)
        {
            return Err(IndexError::DimensionMismatch {
                index,
                expected: self.dim,
                got: p.len(),
            });
        }

        let n = self.points.len();
        if self.order.len() != n {
            return Err(IndexError::Malformed(format!(
                "order has {} entries for {n} points",
                self.order.len()
            )));
        }
        let mut seen = vec![false; n];
        for &i in &self.order {
            if i >= n || std::mem::replace(&mut seen[i], true) {
                return Err(IndexError::Malformed(format!(
                    "order is not a permutation (index {i})"
                )));
            }
        }

        if n > 0 && self.nodes.is_empty() {
            return Err(IndexError::Malformed(
                "no nodes for a non-empty tree".to_string(),
            ));
        }
        for (id, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Leaf { start, end } => {
                    if start > end || end > n {
                        return Err(IndexError::Malformed(format!(
                            "leaf {id} covers {start}..{end} of {n} points"
                        )));
                    }
                }
                Node::Split {
                    axis, left, right, ..
                } => {
                    if axis >= self.dim {
                        return Err(IndexError::Malformed(format!(
                            "split {id} on axis {axis} of {}",
                            self.dim
                        )));
                    }
                    let count = self.nodes.len();
                    if left <= id || right <= id || left >= count || right >= count {
                        return Err(IndexError::Malformed(format!(
                            "split {id} has children {left} and {right} of {count} nodes"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// The `k` nearest points to `query` as `(insertion index, euclidean distance)`,
    /// nearest first. Ties are broken by lower index.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, IndexError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                index: 0,
                expected: self.dim,
                got: query.len(),
            });
        }

        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.search(0, query, k, &mut heap);

        let mut found: Vec<Candidate> = heap.into_vec();
        found.sort();
        Ok(found
            .into_iter()
            .map(|c| (c.index, c.dist_sq.sqrt()))
            .collect())
    }

    /// Builds the subtree over `order[start..end]`, returning its node id.
    fn build_node(&mut self, start: usize, end: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { start, end });

        if end - start <= self.leaf_size {
            return id;
        }
        let Some(axis) = self.widest_axis(start, end) else {
            return id;
        };

        let mid = start + (end - start) / 2;
        let points = &self.points;
        self.order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
            points[a][axis].total_cmp(&points[b][axis])
        });
        let value = self.points[self.order[mid]][axis];

        let left = self.build_node(start, mid);
        let right = self.build_node(mid, end);
        self.nodes[id] = Node::Split {
            axis,
            value,
            left,
            right,
        };
        id
    }

    /// Dimension with the largest value range, or `None` if all points coincide.
    fn widest_axis(&self, start: usize, end: usize) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for axis in 0..self.dim {
            let (lo, hi) = self.order[start..end].iter().fold(
                (f32::INFINITY, f32::NEG_INFINITY),
                |(lo, hi), &i| {
                    let v = self.points[i][axis];
                    (lo.min(v), hi.max(v))
                },
            );
            let spread = hi - lo;
            if spread > 0.0 && best.map_or(true, |(_, s)| spread > s) {
                best = Some((axis, spread));
            }
        }
        best.map(|(axis, _)| axis)
    }

    fn search(&self, node: usize, query: &[f32], k: usize, heap: &mut BinaryHeap<Candidate>) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for &index in &self.order[start..end] {
                    let candidate = Candidate {
                        dist_sq: squared_distance(&self.points[index], query),
                        index,
                    };
                    if heap.len() < k {
                        heap.push(candidate);
                    } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                        heap.pop();
                        heap.push(candidate);
                    }
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[axis] - value;
                let (near, far) = if diff < 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };
                self.search(near, query, k, heap);

                let plane_dist_sq = diff * diff;
                let must_visit = heap.len() < k
                    || heap
                        .peek()
                        .is_some_and(|worst| plane_dist_sq <= worst.dist_sq);
                if must_visit {
                    self.search(far, query, k, heap);
                }
            }
        }
    }
}

/// Max-heap entry: the worst candidate sits on top.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    dist_sq: f32,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist_sq
            .total_cmp(&other.dist_sq)
            .then(self.index.cmp(&other.index))
    }
}
