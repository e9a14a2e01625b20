/// Frozen model artifacts and their prediction rules
use serde::Deserialize;
use std::path::Path;

use crate::error::ModelLoadError;
use crate::inference::{Classifier, Prediction};

// Feature layout shared with the training notebook: [temperature, humidity]
const FEATURE_COUNT: usize = 2;

/// Model artifact as exported after training
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    /// Fixed temperature bands, no confidence
    Threshold {
        hot_at_or_above: f64,
        cold_below: f64,
    },
    /// Flattened binary decision tree
    ///
    /// Node 0 is the root. A split sends `x[feature] <= threshold` left.
    /// A leaf holds one weight per class; the prediction is the heaviest
    /// class and the confidence its share of the leaf.
    DecisionTree {
        classes: Vec<String>,
        nodes: Vec<TreeNode>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

impl ModelArtifact {
    /// Read and validate an artifact file
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ModelLoadError> {
        let artifact: ModelArtifact = serde_json::from_str(raw)?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Structural checks so prediction can never index out of bounds or loop
    fn validate(&self) -> Result<(), ModelLoadError> {
        match self {
            ModelArtifact::Threshold {
                hot_at_or_above,
                cold_below,
            } => {
                if !hot_at_or_above.is_finite() || !cold_below.is_finite() {
                    return Err(ModelLoadError::Invalid("thresholds must be finite".into()));
                }
                if cold_below > hot_at_or_above {
                    return Err(ModelLoadError::Invalid(format!(
                        "cold_below ({}) is above hot_at_or_above ({})",
                        cold_below, hot_at_or_above
                    )));
                }
            }
            ModelArtifact::DecisionTree { classes, nodes } => {
                if classes.is_empty() {
                    return Err(ModelLoadError::Invalid("tree has no classes".into()));
                }
                if nodes.is_empty() {
                    return Err(ModelLoadError::Invalid("tree has no nodes".into()));
                }

                for (index, node) in nodes.iter().enumerate() {
                    match node {
                        TreeNode::Split {
                            feature,
                            threshold,
                            left,
                            right,
                        } => {
                            if *feature >= FEATURE_COUNT {
                                return Err(ModelLoadError::Invalid(format!(
                                    "node {} splits on unknown feature {}",
                                    index, feature
                                )));
                            }
                            if !threshold.is_finite() {
                                return Err(ModelLoadError::Invalid(format!(
                                    "node {} has a non-finite threshold",
                                    index
                                )));
                            }
                            // Children must point forward, which also rules out cycles
                            for child in [*left, *right] {
                                if child <= index || child >= nodes.len() {
                                    return Err(ModelLoadError::Invalid(format!(
                                        "node {} has invalid child {}",
                                        index, child
                                    )));
                                }
                            }
                        }
                        TreeNode::Leaf { value } => {
                            if value.len() != classes.len() {
                                return Err(ModelLoadError::Invalid(format!(
                                    "leaf {} has {} weights for {} classes",
                                    index,
                                    value.len(),
                                    classes.len()
                                )));
                            }
                            if value.iter().any(|w| !w.is_finite() || *w < 0.0) {
                                return Err(ModelLoadError::Invalid(format!(
                                    "leaf {} has a negative or non-finite weight",
                                    index
                                )));
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

impl Classifier for ModelArtifact {
    fn predict(&self, features: &[f64]) -> Prediction {
        let temperature = features.first().copied().unwrap_or(f64::NAN);

        match self {
            ModelArtifact::Threshold {
                hot_at_or_above,
                cold_below,
            } => {
                let label = if temperature >= *hot_at_or_above {
                    "Hot"
                } else if temperature < *cold_below {
                    "Cold"
                } else {
                    "Normal"
                };
                Prediction {
                    label: label.to_string(),
                    confidence: None,
                }
            }
            ModelArtifact::DecisionTree { classes, nodes } => {
                let mut index = 0;
                loop {
                    match &nodes[index] {
                        TreeNode::Split {
                            feature,
                            threshold,
                            left,
                            right,
                        } => {
                            let x = features.get(*feature).copied().unwrap_or(f64::NAN);
                            index = if x <= *threshold { *left } else { *right };
                        }
                        TreeNode::Leaf { value } => return leaf_prediction(classes, value),
                    }
                }
            }
        }
    }
}

fn leaf_prediction(classes: &[String], weights: &[f64]) -> Prediction {
    let total: f64 = weights.iter().filter(|w| w.is_finite() && **w > 0.0).sum();

    // First heaviest class wins ties, matching argmax
    let best = weights
        .iter()
        .enumerate()
        .fold(None::<(usize, f64)>, |best, (i, &w)| match best {
            Some((_, bw)) if bw >= w => best,
            _ => Some((i, w)),
        });

    match best {
        Some((i, w)) => Prediction {
            label: classes[i].clone(),
            confidence: if total > 0.0 { Some(w / total) } else { None },
        },
        None => Prediction {
            label: String::new(),
            confidence: None,
        },
    }
}
