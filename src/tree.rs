use serde::Deserialize;

use crate::error::ForecastError;

/// Serialized form of a fitted sklearn `DecisionTreeRegressor`, exported as
/// parallel node arrays (the layout of `tree_.feature`, `tree_.threshold`,
/// `tree_.children_left/right`, `tree_.value`).
#[derive(Debug, Clone, Deserialize)]
pub struct TreeSpec {
    pub feature: Vec<i32>,
    pub threshold: Vec<f64>,
    pub children_left: Vec<i32>,
    pub children_right: Vec<i32>,
    pub value: Vec<f64>,
    pub n_features: usize,
}

#[derive(Debug, Clone)]
struct TreeNode {
    /// Feature index to split on (negative for leaf nodes).
    feature: i32,
    /// Split threshold; features <= threshold go left.
    threshold: f64,
    left_child: i32,
    right_child: i32,
    /// Predicted enrollment at this node (meaningful for leaves).
    value: f64,
}

impl TreeNode {
    fn is_leaf(&self) -> bool {
        self.feature < 0
    }
}

/// A decision-tree regressor, inference only.
///
/// The tree is trained and exported elsewhere; this side never refits.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
    n_features: usize,
}

impl RegressionTree {
    /// Build a tree from its serialized node arrays.
    pub fn from_spec(spec: TreeSpec) -> Result<Self, ForecastError> {
        let n = spec.feature.len();
        if n == 0 {
            return Err(ForecastError::InvalidData("empty tree".into()));
        }
        if spec.threshold.len() != n
            || spec.children_left.len() != n
            || spec.children_right.len() != n
            || spec.value.len() != n
        {
            return Err(ForecastError::InvalidData(
                "inconsistent tree node array lengths".into(),
            ));
        }

        let nodes: Vec<TreeNode> = (0..n)
            .map(|i| TreeNode {
                feature: spec.feature[i],
                threshold: spec.threshold[i],
                left_child: spec.children_left[i],
                right_child: spec.children_right[i],
                value: spec.value[i],
            })
            .collect();

        for (i, node) in nodes.iter().enumerate() {
            if node.is_leaf() {
                continue;
            }
            if node.feature as usize >= spec.n_features {
                return Err(ForecastError::InvalidData(format!(
                    "split on feature {} but tree has {} features",
                    node.feature, spec.n_features
                )));
            }
            for child in [node.left_child, node.right_child] {
                if child < 0 || child as usize >= n {
                    return Err(ForecastError::InvalidData(format!(
                        "child index {child} out of range for {n} nodes"
                    )));
                }
                // sklearn emits nodes in preorder: children always come
                // after their parent. Enforcing that rules out cycles, so
                // traversal in predict() and depth() always terminates.
                if child as usize <= i {
                    return Err(ForecastError::InvalidData(format!(
                        "child index {child} does not come after parent node {i}"
                    )));
                }
            }
        }

        Ok(Self {
            nodes,
            n_features: spec.n_features,
        })
    }

    /// Predict a single sample by root-to-leaf traversal.
    ///
    /// `features` length must equal `n_features`; checked by the caller
    /// (the encoder produces exactly that many columns).
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if node.is_leaf() {
                return node.value;
            }
            let feat_val = features.get(node.feature as usize).copied().unwrap_or(0.0);
            idx = if feat_val <= node.threshold {
                node.left_child as usize
            } else {
                node.right_child as usize
            };
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        self.node_depth(0)
    }

    fn node_depth(&self, idx: usize) -> usize {
        let node = &self.nodes[idx];
        if node.is_leaf() {
            return 0;
        }
        let left = self.node_depth(node.left_child as usize);
        let right = self.node_depth(node.right_child as usize);
        1 + left.max(right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> RegressionTree {
        // f[0] <= 0.5 -> 120.0, else -> 900.0
        RegressionTree::from_spec(TreeSpec {
            feature: vec![0, -2, -2],
            threshold: vec![0.5, -2.0, -2.0],
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            value: vec![510.0, 120.0, 900.0],
            n_features: 1,
        })
        .unwrap()
    }

    #[test]
    fn predicts_left_and_right() {
        let tree = stump();
        assert_eq!(tree.predict(&[0.0]), 120.0);
        assert_eq!(tree.predict(&[1.0]), 900.0);
        // On the threshold goes left.
        assert_eq!(tree.predict(&[0.5]), 120.0);
    }

    #[test]
    fn structure_counts() {
        let tree = stump();
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_features(), 1);
    }

    #[test]
    fn single_leaf_tree_is_constant() {
        let tree = RegressionTree::from_spec(TreeSpec {
            feature: vec![-2],
            threshold: vec![-2.0],
            children_left: vec![-1],
            children_right: vec![-1],
            value: vec![73.0],
            n_features: 4,
        })
        .unwrap();
        assert_eq!(tree.predict(&[0.0, 0.0, 0.0, 1.0]), 73.0);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn inconsistent_arrays_rejected() {
        let result = RegressionTree::from_spec(TreeSpec {
            feature: vec![0, -2],
            threshold: vec![0.5],
            children_left: vec![1, -1],
            children_right: vec![2, -1],
            value: vec![0.0, 0.0],
            n_features: 1,
        });
        assert!(result.is_err());
    }

    #[test]
    fn self_referential_child_rejected() {
        // A node pointing at itself would make predict() loop forever.
        let result = RegressionTree::from_spec(TreeSpec {
            feature: vec![0],
            threshold: vec![0.5],
            children_left: vec![0],
            children_right: vec![0],
            value: vec![0.0],
            n_features: 1,
        });
        assert!(result.is_err());
    }

    #[test]
    fn backward_child_edge_rejected() {
        // node 1 routes back to the root: in range, but cyclic.
        let result = RegressionTree::from_spec(TreeSpec {
            feature: vec![0, 0, -2],
            threshold: vec![0.5, 0.2, -2.0],
            children_left: vec![1, 0, -1],
            children_right: vec![2, 2, -1],
            value: vec![0.0, 0.0, 10.0],
            n_features: 1,
        });
        assert!(result.is_err());
    }

    #[test]
    fn dangling_child_rejected() {
        let result = RegressionTree::from_spec(TreeSpec {
            feature: vec![0],
            threshold: vec![0.5],
            children_left: vec![5],
            children_right: vec![6],
            value: vec![0.0],
            n_features: 1,
        });
        assert!(result.is_err());
    }
}
