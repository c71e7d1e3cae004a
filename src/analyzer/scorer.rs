//! Isolation-forest scoring over fitted tree dumps.
//!
//! Scores follow the usual isolation-forest decision function: negative and
//! low values mark vectors that are isolated in few splits.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const TREE_LEAF: i64 = -1;

/// Fitted vector-to-score model. Lower scores are more anomalous.
pub trait Scorer: Send + Sync {
    fn n_features(&self) -> usize;

    /// Score one vector; `input.len()` must equal `n_features()`.
    fn score(&self, input: &[f32]) -> f64;

    fn score_batch(&self, inputs: &[Vec<f32>]) -> Result<Vec<f64>, PipelineError> {
        let expected = self.n_features();
        if let Some(bad) = inputs.iter().find(|v| v.len() != expected) {
            return Err(PipelineError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }
        Ok(inputs.par_iter().map(|v| self.score(v)).collect())
    }
}

/// Average path length of an unsuccessful BST search over `n` samples.
pub fn average_path_length(n: u64) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Parallel node arrays of one fitted tree. Leaves have both children set to -1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNodes {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub n_node_samples: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    /// Input columns this tree was fitted on; `feature` indexes into this list.
    #[serde(default)]
    pub features: Option<Vec<usize>>,
    pub tree: TreeNodes,
}

impl IsolationTree {
    fn column(&self, node: usize) -> usize {
        let f = self.tree.feature[node] as usize;
        match &self.features {
            Some(map) => map[f],
            None => f,
        }
    }

    /// Depth of the reached leaf plus the expected depth of its unsplit samples.
    pub fn path_length(&self, input: &[f32]) -> f64 {
        let t = &self.tree;
        let mut node = 0usize;
        let mut depth = 0u32;

        while t.children_left[node] != TREE_LEAF {
            let x = input[self.column(node)] as f64;
            node = if x <= t.threshold[node] {
                t.children_left[node] as usize
            } else {
                t.children_right[node] as usize
            };
            depth += 1;
        }

        depth as f64 + average_path_length(t.n_node_samples[node])
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        let t = &self.tree;
        let len = t.children_left.len();
        if len == 0 {
            return Err("tree has no nodes".into());
        }
        if [t.children_right.len(), t.feature.len(), t.threshold.len(), t.n_node_samples.len()]
            .iter()
            .any(|&l| l != len)
        {
            return Err("tree node arrays differ in length".into());
        }

        let width = match &self.features {
            Some(map) => {
                if let Some(&c) = map.iter().find(|&&c| c >= n_features) {
                    return Err(format!("feature subset references column {c} of {n_features}"));
                }
                map.len()
            }
            None => n_features,
        };

        for node in 0..len {
            let (left, right) = (t.children_left[node], t.children_right[node]);
            if left == TREE_LEAF && right == TREE_LEAF {
                continue;
            }
            // children always come after their parent, which also rules out cycles
            let in_range = |c: i64| c > node as i64 && (c as usize) < len;
            if !in_range(left) || !in_range(right) {
                return Err(format!("node {node} has invalid children ({left}, {right})"));
            }
            let f = t.feature[node];
            if f < 0 || f as usize >= width {
                return Err(format!("node {node} splits on feature {f} of {width}"));
            }
        }
        Ok(())
    }
}

/// Fitted isolation forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Subtracted from the raw score so the fitted contamination sits at zero.
    pub offset: f64,
    pub max_samples: u64,
    pub n_features: usize,
    pub estimators: Vec<IsolationTree>,
}

impl IsolationForest {
    pub fn validate(&self) -> Result<(), String> {
        if self.estimators.is_empty() {
            return Err("forest has no estimators".into());
        }
        if self.n_features == 0 {
            return Err("n_features must be positive".into());
        }
        for (i, tree) in self.estimators.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| format!("estimator {i}: {e}"))?;
        }
        Ok(())
    }

    /// Raw score in `[-1, 0)`, before the offset.
    pub fn score_samples(&self, input: &[f32]) -> f64 {
        let depth_sum: f64 = self.estimators.iter().map(|t| t.path_length(input)).sum();
        let denominator = self.estimators.len() as f64 * average_path_length(self.max_samples);
        let ratio = if denominator != 0.0 {
            depth_sum / denominator
        } else {
            1.0
        };
        -(2f64.powf(-ratio))
    }
}

impl Scorer for IsolationForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn score(&self, input: &[f32]) -> f64 {
        self.score_samples(input) - self.offset
    }
}


#[cfg(test)]
mod tests {
    use super::testing::stump_forest;
    use super::*;

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!((average_path_length(256) - 10.244_770_92).abs() < 1e-6);
    }

    #[test]
    fn test_isolated_sample_scores_lower() {
        let forest = stump_forest(1, 0, 0.5, 0.0);
        forest.validate().unwrap();

        let isolated = forest.score(&[0.0]);
        let common = forest.score(&[1.0]);
        assert!((isolated - -0.934_58).abs() < 1e-4);
        assert!(isolated < common);
    }

    #[test]
    fn test_offset_shifts_decision() {
        let raw = stump_forest(1, 0, 0.5, 0.0);
        let shifted = stump_forest(1, 0, 0.5, -0.5);
        let x = [1.0f32];
        assert!((shifted.score(&x) - (raw.score(&x) + 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_feature_subset_mapping() {
        let mut forest = stump_forest(3, 0, 0.5, 0.0);
        forest.estimators[0].features = Some(vec![2]);
        forest.validate().unwrap();

        // Only column 2 matters
        assert_eq!(forest.score(&[9.0, 9.0, 0.0]), forest.score(&[-9.0, -9.0, 0.0]));
        assert!(forest.score(&[9.0, 9.0, 0.0]) < forest.score(&[0.0, 0.0, 9.0]));
    }

    #[test]
    fn test_threshold_is_inclusive_on_the_left() {
        let forest = stump_forest(1, 0, 0.5, 0.0);
        assert_eq!(forest.score(&[0.5]), forest.score(&[0.0]));
    }

    #[test]
    fn test_score_batch_checks_dimension() {
        let forest = stump_forest(2, 0, 0.5, 0.0);
        let err = forest.score_batch(&[vec![0.0, 0.0], vec![0.0]]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DimensionMismatch { expected: 2, actual: 1 }
        ));

        let scores = forest.score_batch(&[vec![0.0, 0.0], vec![1.0, 0.0]]).unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[0] < scores[1]);
    }

    #[test]
    fn test_validate_rejects_malformed_trees() {
        let mut backwards = stump_forest(1, 0, 0.5, 0.0);
        backwards.estimators[0].tree.children_left[0] = 0;
        assert!(backwards.validate().is_err());

        let mut bad_feature = stump_forest(1, 0, 0.5, 0.0);
        bad_feature.estimators[0].tree.feature[0] = 4;
        assert!(bad_feature.validate().is_err());

        let mut short = stump_forest(1, 0, 0.5, 0.0);
        short.estimators[0].tree.threshold.pop();
        assert!(short.validate().is_err());
    }
}
