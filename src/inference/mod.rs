pub mod model;

use log::info;
use std::path::Path;

use crate::error::ModelLoadError;
use crate::models::{Classification, Label, SensorReading};

pub use model::ModelArtifact;

/// Raw classifier output before it is mapped onto [`Label`]
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: Option<f64>,
}

/// A frozen, side-effect free classifier
///
/// `features` is `[temperature, humidity]`.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &[f64]) -> Prediction;
}

/// Wraps the classifier loaded at startup
pub struct InferenceEngine {
    classifier: Box<dyn Classifier>,
}

impl InferenceEngine {
    pub fn new(classifier: Box<dyn Classifier>) -> Self {
        InferenceEngine { classifier }
    }

    /// Load the model artifact at `path`
    ///
    /// There is no inference without a model, so callers treat the error
    /// as fatal.
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let artifact = ModelArtifact::load(path)?;
        match &artifact {
            ModelArtifact::Threshold {
                hot_at_or_above,
                cold_below,
            } => info!(
                "Loaded threshold model (hot >= {:.1}°C, cold < {:.1}°C)",
                hot_at_or_above, cold_below
            ),
            ModelArtifact::DecisionTree { classes, nodes } => info!(
                "Loaded decision tree model ({} nodes, classes {:?})",
                nodes.len(),
                classes
            ),
        }
        Ok(Self::new(Box::new(artifact)))
    }

    /// Classify one reading
    pub fn classify(&self, reading: &SensorReading) -> Classification {
        let prediction = self
            .classifier
            .predict(&[reading.temperature, reading.humidity]);

        Classification {
            label: Label::from_model_label(&prediction.label),
            confidence: prediction
                .confidence
                .filter(|c| c.is_finite())
                .map(|c| c.clamp(0.0, 1.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use time::OffsetDateTime;

    struct Fixed(&'static str, Option<f64>);

    impl Classifier for Fixed {
        fn predict(&self, _features: &[f64]) -> Prediction {
            Prediction {
                label: self.0.to_string(),
                confidence: self.1,
            }
        }
    }

    fn reading(temperature: f64) -> SensorReading {
        SensorReading {
            timestamp: OffsetDateTime::UNIX_EPOCH,
            temperature,
            humidity: 50.0,
        }
    }

    #[test]
    fn maps_labels_and_sanitizes_confidence() {
        let engine = InferenceEngine::new(Box::new(Fixed("Panas", Some(1.7))));
        let c = engine.classify(&reading(35.0));
        assert_eq!(c.label, Label::Hot);
        assert_eq!(c.confidence, Some(1.0));

        let engine = InferenceEngine::new(Box::new(Fixed("Normal", Some(f64::NAN))));
        assert_eq!(engine.classify(&reading(25.0)).confidence, None);

        let engine = InferenceEngine::new(Box::new(Fixed("???", None)));
        let c = engine.classify(&reading(25.0));
        assert_eq!(c.label, Label::Unknown);
        assert_eq!(c.confidence, None);
    }

    #[test]
    fn loads_artifact_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"kind": "threshold", "hot_at_or_above": 32.0, "cold_below": 20.0}}"#
        )
        .unwrap();

        let engine = InferenceEngine::load(file.path()).unwrap();
        assert_eq!(engine.classify(&reading(33.0)).label, Label::Hot);
        assert_eq!(engine.classify(&reading(10.0)).label, Label::Cold);
    }

    #[test]
    fn bundled_model_classifies_the_usual_range() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("iot_temp_model.json");
        let engine = InferenceEngine::load(&path).unwrap();

        let hot = engine.classify(&reading(35.0));
        assert_eq!(hot.label, Label::Hot);
        assert!(hot.confidence.unwrap() > 0.9);
        assert_eq!(engine.classify(&reading(27.0)).label, Label::Normal);
        assert_eq!(engine.classify(&reading(18.0)).label, Label::Cold);
    }

    #[test]
    fn missing_artifact_is_an_io_error() {
        let result = InferenceEngine::load(Path::new("/nonexistent/iot_temp_model.json"));
        assert!(matches!(result, Err(ModelLoadError::Io { .. })));
    }
}
