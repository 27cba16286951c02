use serde::{Deserialize, Serialize};

use super::{CostPredictor, CostQuery, PredictError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Goes `left` when `features[feature] <= threshold`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Regression tree stored as a flat node array rooted at index 0.
/// Children always sit after their parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn validate(&self) -> Result<(), PredictError> {
        if self.nodes.is_empty() {
            return Err(PredictError::MalformedModel("empty tree".to_string()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= 3 {
                        return Err(PredictError::MalformedModel(format!(
                            "node {idx} splits on unknown feature {feature}"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(PredictError::MalformedModel(format!(
                            "node {idx} has non-finite threshold"
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(PredictError::MalformedModel(format!(
                                "node {idx} points at invalid child {child}"
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(PredictError::MalformedModel(format!(
                            "leaf {idx} has non-finite value"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn evaluate(&self, features: &[f64; 3]) -> Result<f64, PredictError> {
        let mut idx = 0;
        // Children are strictly after parents, so a walk never exceeds the node count.
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let Some(x) = features.get(*feature) else {
                        return Err(PredictError::MalformedModel(format!(
                            "unknown feature {feature}"
                        )));
                    };
                    idx = if *x <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(PredictError::MalformedModel(format!(
                        "dangling node index {idx}"
                    )))
                }
            }
        }
        Err(PredictError::MalformedModel(
            "tree walk did not reach a leaf".to_string(),
        ))
    }
}

/// Bagged ensemble; the prediction is the mean of all tree outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub trees: Vec<RegressionTree>,
}

impl ForestModel {
    pub fn validate(&self) -> Result<(), PredictError> {
        if self.trees.is_empty() {
            return Err(PredictError::MalformedModel(
                "forest has no trees".to_string(),
            ));
        }
        self.trees.iter().try_for_each(RegressionTree::validate)
    }
}

impl CostPredictor for ForestModel {
    fn predict(&self, query: &CostQuery) -> Result<f64, PredictError> {
        if self.trees.is_empty() {
            return Err(PredictError::MalformedModel(
                "forest has no trees".to_string(),
            ));
        }
        let features = query.features();
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.evaluate(&features)?;
        }
        let value = total / self.trees.len() as f64;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(PredictError::NonFinite(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature: usize, threshold: f64, low: f64, high: f64) -> RegressionTree {
        RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: low },
                TreeNode::Leaf { value: high },
            ],
        }
    }

    fn query(distance: f64, traffic: f64, quality_inverse: f64) -> CostQuery {
        CostQuery {
            distance,
            traffic,
            quality_inverse,
        }
    }

    #[test]
    fn forest_averages_tree_outputs() {
        let forest = ForestModel {
            trees: vec![stump(0, 50.0, 10.0, 30.0), stump(1, 40.0, 20.0, 60.0)],
        };
        forest.validate().expect("valid forest");
        assert_eq!(forest.predict(&query(20.0, 80.0, 1.0)), Ok(35.0));
        assert_eq!(forest.predict(&query(90.0, 10.0, 1.0)), Ok(25.0));
    }

    #[test]
    fn threshold_is_inclusive_on_the_left() {
        let tree = stump(2, 5.0, 1.0, 2.0);
        assert_eq!(tree.evaluate(&[0.0, 0.0, 5.0]), Ok(1.0));
        assert_eq!(tree.evaluate(&[0.0, 0.0, 5.5]), Ok(2.0));
    }

    #[test]
    fn backward_child_pointer_is_rejected() {
        let tree = RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 1,
                },
                TreeNode::Leaf { value: 1.0 },
            ],
        };
        assert!(tree.validate().is_err());
        assert!(tree.evaluate(&[2.0, 0.0, 0.0]).is_ok());
        assert!(tree.evaluate(&[0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn empty_forest_cannot_predict() {
        let forest = ForestModel::default();
        assert!(forest.validate().is_err());
        assert!(forest.predict(&query(1.0, 1.0, 1.0)).is_err());
    }

    #[test]
    fn tree_json_uses_tagged_nodes() {
        let json = r#"{"nodes":[{"kind":"leaf","value":4.5}]}"#;
        let tree: RegressionTree = serde_json::from_str(json).expect("parse");
        assert_eq!(tree.evaluate(&[0.0, 0.0, 0.0]), Ok(4.5));
    }
}
