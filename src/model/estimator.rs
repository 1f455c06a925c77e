//! Final stage of a pipeline: turns an encoded row into a prediction.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{InferenceError, LoadError};

/// Scalar produced by one inference call.
///
/// Integral class labels stay integral on the wire (`1`, not `1.0`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Prediction {
    Integer(i64),
    Float(f64),
    Label(String),
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prediction::Integer(v) => write!(f, "{v}"),
            Prediction::Float(v) => write!(f, "{v}"),
            Prediction::Label(v) => f.write_str(v),
        }
    }
}

fn default_threshold() -> f64 {
    0.5
}

fn default_learning_rate() -> f64 {
    1.0
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Estimator {
    LinearRegression {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    /// One coefficient row means binary (sigmoid against `threshold`),
    /// several rows mean one-vs-rest argmax over `classes`.
    LogisticRegression {
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
        classes: Vec<Prediction>,
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
    GradientBoostedTrees {
        #[serde(default)]
        base_score: f64,
        #[serde(default = "default_learning_rate")]
        learning_rate: f64,
        trees: Vec<Tree>,
    },
}

#[derive(Deserialize, Debug, Clone)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

/// Node 0 is the root. Children always sit after their parent.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// Rows with `x[feature] <= threshold` go left.
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

impl Tree {
    fn evaluate(&self, x: &[f64]) -> Result<f64, InferenceError> {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = x.get(*feature).ok_or_else(|| {
                        InferenceError::Internal(format!("tree split on missing column {feature}"))
                    })?;
                    idx = if *v <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(InferenceError::Internal(format!(
                        "tree node {idx} out of range"
                    )));
                }
            }
        }
    }

    fn validate(&self, tree_idx: usize, width: usize) -> Result<(), LoadError> {
        if self.nodes.is_empty() {
            return Err(LoadError::Invalid(format!("tree {tree_idx} has no nodes")));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= width {
                        return Err(LoadError::Invalid(format!(
                            "tree {tree_idx} node {idx} splits on column {feature}, but rows have {width} columns"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(LoadError::Invalid(format!(
                            "tree {tree_idx} node {idx} has a non-finite threshold"
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(LoadError::Invalid(format!(
                                "tree {tree_idx} node {idx} points to invalid child {child}"
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(LoadError::Invalid(format!(
                            "tree {tree_idx} leaf {idx} has a non-finite value"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn dot(weights: &[f64], x: &[f64]) -> f64 {
    weights.iter().zip(x).map(|(w, v)| w * v).sum()
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn finite(value: f64) -> Result<f64, InferenceError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InferenceError::Internal(format!(
            "estimator produced non-finite output {value}"
        )))
    }
}

impl Estimator {
    /// Checks the estimator against the width of the encoded rows it will see.
    pub fn validate(&self, width: usize) -> Result<(), LoadError> {
        match self {
            Estimator::LinearRegression { coefficients, .. } => {
                if coefficients.len() != width {
                    return Err(LoadError::Invalid(format!(
                        "linear regression has {} coefficients for {width} columns",
                        coefficients.len()
                    )));
                }
            }
            Estimator::LogisticRegression {
                coefficients,
                intercepts,
                classes,
                threshold,
            } => {
                if coefficients.is_empty() {
                    return Err(LoadError::Invalid(
                        "logistic regression has no coefficient rows".to_string(),
                    ));
                }
                if let Some(row) = coefficients.iter().find(|row| row.len() != width) {
                    return Err(LoadError::Invalid(format!(
                        "logistic regression row has {} coefficients for {width} columns",
                        row.len()
                    )));
                }
                if intercepts.len() != coefficients.len() {
                    return Err(LoadError::Invalid(format!(
                        "logistic regression has {} intercepts for {} coefficient rows",
                        intercepts.len(),
                        coefficients.len()
                    )));
                }
                let expected_classes = if coefficients.len() == 1 {
                    2
                } else {
                    coefficients.len()
                };
                if classes.len() != expected_classes {
                    return Err(LoadError::Invalid(format!(
                        "logistic regression expects {expected_classes} classes, got {}",
                        classes.len()
                    )));
                }
                if !(0.0..=1.0).contains(threshold) {
                    return Err(LoadError::Invalid(format!(
                        "logistic regression threshold {threshold} is outside [0, 1]"
                    )));
                }
            }
            Estimator::GradientBoostedTrees { trees, .. } => {
                if trees.is_empty() {
                    return Err(LoadError::Invalid(
                        "gradient boosted trees has no trees".to_string(),
                    ));
                }
                for (idx, tree) in trees.iter().enumerate() {
                    tree.validate(idx, width)?;
                }
            }
        }
        Ok(())
    }

    pub fn predict(&self, x: &[f64]) -> Result<Prediction, InferenceError> {
        match self {
            Estimator::LinearRegression {
                coefficients,
                intercept,
            } => {
                let y = finite(dot(coefficients, x) + intercept)?;
                Ok(Prediction::Float(y))
            }
            Estimator::LogisticRegression {
                coefficients,
                intercepts,
                classes,
                threshold,
            } => {
                let class = if coefficients.len() == 1 {
                    let p = finite(sigmoid(dot(&coefficients[0], x) + intercepts[0]))?;
                    usize::from(p >= *threshold)
                } else {
                    let mut best = (0, f64::NEG_INFINITY);
                    for (idx, (row, b)) in coefficients.iter().zip(intercepts).enumerate() {
                        let z = finite(dot(row, x) + b)?;
                        if z > best.1 {
                            best = (idx, z);
                        }
                    }
                    best.0
                };
                classes.get(class).cloned().ok_or_else(|| {
                    InferenceError::Internal(format!("class index {class} out of range"))
                })
            }
            Estimator::GradientBoostedTrees {
                base_score,
                learning_rate,
                trees,
            } => {
                let mut sum = 0.0;
                for tree in trees {
                    sum += tree.evaluate(x)?;
                }
                let y = finite(base_score + learning_rate * sum)?;
                Ok(Prediction::Float(y))
            }
        }
    }
}
