//! Loader and inference for the pre-trained health-risk classifier.
//!
//! The artifact is a JSON bundle exported from the training notebook:
//!
//! ```json
//! {
//!   "model": { "kind": "logistic_regression", "coefficients": [[...]], "intercepts": [...] },
//!   "scaler": { "mean": [...], "scale": [...] },
//!   "feature_names": ["pH", "Total_Cases", "TDS", "F", "NO3", "Cl", "EC in μS/cm"],
//!   "classes": ["High Risk", "Low Risk", "Medium Risk", "No Risk"],
//!   "accuracy": 0.93
//! }
//! ```
//!
//! A `decision_tree` model kind is also accepted. The bundle is loaded once;
//! there is no refresh at runtime.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use super::RiskLabel;

pub const FEATURE_COUNT: usize = 7;

/// Feature order the model was trained on.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] =
    ["pH", "Total_Cases", "TDS", "F", "NO3", "Cl", "EC in μS/cm"];

/// Optional inputs and the training-set medians substituted when absent.
pub const OPTIONAL_FEATURE_DEFAULTS: [(&str, f64); 5] = [
    ("tds", 414.0),
    ("fluoride", 0.35),
    ("nitrate", 13.0),
    ("chloride", 50.0),
    ("ec", 643.0),
];

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model: failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model: malformed artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Model: invalid artifact: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    fn transform(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| if *s == 0.0 { v - m } else { (v - m) / s })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeNode {
    /// `None` marks a leaf.
    #[serde(default)]
    pub feature: Option<usize>,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub left: Option<usize>,
    #[serde(default)]
    pub right: Option<usize>,
    /// Per-class sample counts (or weights) at a leaf.
    #[serde(default)]
    pub value: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    LogisticRegression {
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
    },
    DecisionTree {
        nodes: Vec<TreeNode>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelBundle {
    pub model: Estimator,
    pub scaler: StandardScaler,
    pub feature_names: Vec<String>,
    pub classes: Vec<RiskLabel>,
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl ModelBundle {
    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        let bundle: ModelBundle = serde_json::from_str(&raw)?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let n_classes = self.classes.len();
        if n_classes == 0 {
            return Err(ModelError::Invalid("no classes".into()));
        }
        if self.feature_names.len() != FEATURE_COUNT {
            return Err(ModelError::Invalid(format!(
                "expected {FEATURE_COUNT} feature names, got {}",
                self.feature_names.len()
            )));
        }
        if self.scaler.mean.len() != FEATURE_COUNT || self.scaler.scale.len() != FEATURE_COUNT {
            return Err(ModelError::Invalid("scaler dimensions do not match features".into()));
        }

        match &self.model {
            Estimator::LogisticRegression {
                coefficients,
                intercepts,
            } => {
                if coefficients.len() != n_classes || intercepts.len() != n_classes {
                    return Err(ModelError::Invalid(format!(
                        "logistic regression needs one coefficient row and intercept per class ({n_classes})"
                    )));
                }
                if coefficients.iter().any(|row| row.len() != FEATURE_COUNT) {
                    return Err(ModelError::Invalid(
                        "coefficient rows must have one weight per feature".into(),
                    ));
                }
            }
            Estimator::DecisionTree { nodes } => {
                if nodes.is_empty() {
                    return Err(ModelError::Invalid("decision tree has no nodes".into()));
                }
                for (i, node) in nodes.iter().enumerate() {
                    match node.feature {
                        Some(feature) => {
                            let in_range = |child: Option<usize>| {
                                child.is_some_and(|c| c < nodes.len() && c != i)
                            };
                            if feature >= FEATURE_COUNT || !in_range(node.left) || !in_range(node.right)
                            {
                                return Err(ModelError::Invalid(format!(
                                    "decision tree node {i} has an invalid split"
                                )));
                            }
                        }
                        None => {
                            if node.value.len() != n_classes {
                                return Err(ModelError::Invalid(format!(
                                    "decision tree leaf {i} must carry {n_classes} class values"
                                )));
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Class probabilities in `classes` order.
    pub fn predict_proba(&self, features: &[f64; FEATURE_COUNT]) -> Vec<f64> {
        let x = self.scaler.transform(features);
        match &self.model {
            Estimator::LogisticRegression {
                coefficients,
                intercepts,
            } => {
                let scores: Vec<f64> = coefficients
                    .iter()
                    .zip(intercepts)
                    .map(|(w, b)| w.iter().zip(&x).map(|(wi, xi)| wi * xi).sum::<f64>() + b)
                    .collect();
                softmax(&scores)
            }
            Estimator::DecisionTree { nodes } => {
                let mut idx = 0;
                // bounded walk; validate() rejects self-loops but not longer cycles
                for _ in 0..nodes.len() {
                    let node = &nodes[idx];
                    match (node.feature, node.left, node.right) {
                        (Some(f), Some(l), Some(r)) => {
                            idx = if x[f] <= node.threshold { l } else { r };
                        }
                        _ => break,
                    }
                }
                normalize(&nodes[idx].value, self.classes.len())
            }
        }
    }
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

fn normalize(values: &[f64], n_classes: usize) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return vec![1.0 / n_classes as f64; n_classes];
    }
    values.iter().map(|v| v / total).collect()
}

/// Successful inference result.
#[derive(Debug, Clone, Serialize)]
pub struct RiskPrediction {
    pub predicted_risk_level: RiskLabel,
    pub probabilities: BTreeMap<String, f64>,
    pub confidence: f64,
    pub input_features: BTreeMap<String, f64>,
    pub interpretation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ModelUnavailable,
    InvalidInput,
}

/// Error payload returned in place of a prediction.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionFailure {
    pub error: String,
    pub predicted_risk_level: Option<RiskLabel>,
    pub probabilities: Option<BTreeMap<String, f64>>,
    pub confidence: Option<f64>,
    #[serde(skip)]
    pub kind: FailureKind,
}

impl PredictionFailure {
    fn new(kind: FailureKind, error: String) -> Self {
        Self {
            error,
            predicted_risk_level: None,
            probabilities: None,
            confidence: None,
            kind,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PredictionOutcome {
    Success(RiskPrediction),
    Failure(PredictionFailure),
}

impl PredictionOutcome {
    pub fn success(self) -> Option<RiskPrediction> {
        match self {
            PredictionOutcome::Success(p) => Some(p),
            PredictionOutcome::Failure(_) => None,
        }
    }
}

/// Resolves the raw request map into the model's feature vector.
///
/// `ph` is required; `cases` falls back to `total_cases` and then 0; the
/// optional water-quality readings fall back to [`OPTIONAL_FEATURE_DEFAULTS`].
/// Explicit `null` counts as absent.
pub fn resolve_features(input: &Map<String, Value>) -> Result<[f64; FEATURE_COUNT], String> {
    let present = |key: &str| input.get(key).filter(|v| !v.is_null());

    let ph = present("ph").ok_or_else(|| "pH is required for prediction".to_string())?;
    let ph = numeric("ph", ph)?;
    let cases = match present("cases").or_else(|| present("total_cases")) {
        Some(v) => numeric("cases", v)?,
        None => 0.0,
    };

    let mut features = [ph, cases, 0.0, 0.0, 0.0, 0.0, 0.0];
    for (slot, (key, default)) in features[2..].iter_mut().zip(OPTIONAL_FEATURE_DEFAULTS) {
        *slot = match present(key) {
            Some(v) => numeric(key, v)?,
            None => default,
        };
    }
    Ok(features)
}

fn numeric(key: &str, value: &Value) -> Result<f64, String> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("feature '{key}' must be numeric"))
}

/// The loaded classifier, or the reason it is unavailable.
pub struct RiskModel {
    bundle: Option<ModelBundle>,
    load_error: Option<String>,
}

impl RiskModel {
    /// Loads the artifact. Failure is logged and remembered, never fatal.
    pub fn load(path: &Path) -> Self {
        match ModelBundle::from_path(path) {
            Ok(bundle) => {
                tracing::info!(
                    path = %path.display(),
                    accuracy = ?bundle.accuracy,
                    classes = bundle.classes.len(),
                    "Health risk prediction model loaded"
                );
                Self::from_bundle(bundle)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Health risk prediction model unavailable; predictions will return errors"
                );
                Self {
                    bundle: None,
                    load_error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn from_bundle(bundle: ModelBundle) -> Self {
        Self {
            bundle: Some(bundle),
            load_error: None,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            bundle: None,
            load_error: Some("no model configured".into()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.bundle.is_some()
    }

    pub fn bundle(&self) -> Option<&ModelBundle> {
        self.bundle.as_ref()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn predict(&self, input: &Map<String, Value>) -> PredictionOutcome {
        let Some(bundle) = &self.bundle else {
            return PredictionOutcome::Failure(PredictionFailure::new(
                FailureKind::ModelUnavailable,
                "Model not loaded. Please train and save the model first.".into(),
            ));
        };

        let features = match resolve_features(input) {
            Ok(features) => features,
            Err(e) => {
                return PredictionOutcome::Failure(PredictionFailure::new(
                    FailureKind::InvalidInput,
                    format!("Prediction failed: {e}"),
                ))
            }
        };

        let probabilities = bundle.predict_proba(&features);
        // first maximum wins ties
        let (best, confidence) = probabilities.iter().copied().enumerate().fold(
            (0, f64::NEG_INFINITY),
            |(bi, bp), (i, p)| if p > bp { (i, p) } else { (bi, bp) },
        );
        let label = bundle.classes[best];

        PredictionOutcome::Success(RiskPrediction {
            predicted_risk_level: label,
            probabilities: bundle
                .classes
                .iter()
                .zip(&probabilities)
                .map(|(c, p)| (c.as_str().to_string(), *p))
                .collect(),
            confidence,
            input_features: bundle
                .feature_names
                .iter()
                .zip(features)
                .map(|(name, v)| (name.replace('μ', "u"), v))
                .collect(),
            interpretation: format!(
                "{} Prediction confidence: {:.1}%",
                label.interpretation(),
                confidence * 100.0
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names() -> Vec<String> {
        FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
    }

    fn identity_scaler() -> StandardScaler {
        StandardScaler {
            mean: vec![0.0; FEATURE_COUNT],
            scale: vec![1.0; FEATURE_COUNT],
        }
    }

    /// Splits on case count: <= 5 is Low Risk, otherwise mostly High Risk.
    fn case_split_tree() -> ModelBundle {
        let leaf = |value: Vec<f64>| TreeNode {
            feature: None,
            threshold: 0.0,
            left: None,
            right: None,
            value,
        };
        ModelBundle {
            model: Estimator::DecisionTree {
                nodes: vec![
                    TreeNode {
                        feature: Some(1),
                        threshold: 5.0,
                        left: Some(1),
                        right: Some(2),
                        value: vec![],
                    },
                    leaf(vec![0.0, 10.0, 0.0, 0.0]),
                    leaf(vec![0.0, 0.0, 2.0, 8.0]),
                ],
            },
            scaler: identity_scaler(),
            feature_names: names(),
            classes: RiskLabel::ALL.to_vec(),
            accuracy: Some(0.9),
        }
    }

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_optionals_take_documented_defaults() {
        let features = resolve_features(&input(json!({ "ph": 7.2, "cases": 3 }))).unwrap();
        assert_eq!(features, [7.2, 3.0, 414.0, 0.35, 13.0, 50.0, 643.0]);

        let model = RiskModel::from_bundle(case_split_tree());
        let prediction = model
            .predict(&input(json!({ "ph": 7.2, "cases": 3, "ec": null })))
            .success()
            .unwrap();
        let f = &prediction.input_features;
        assert_eq!(f["pH"], 7.2);
        assert_eq!(f["Total_Cases"], 3.0);
        assert_eq!(f["TDS"], 414.0);
        assert_eq!(f["F"], 0.35);
        assert_eq!(f["NO3"], 13.0);
        assert_eq!(f["Cl"], 50.0);
        assert_eq!(f["EC in uS/cm"], 643.0);
    }

    #[test]
    fn cases_alias_and_string_numbers() {
        let features =
            resolve_features(&input(json!({ "ph": "6.5", "total_cases": 9, "tds": "300" })))
                .unwrap();
        assert_eq!(features[0], 6.5);
        assert_eq!(features[1], 9.0);
        assert_eq!(features[2], 300.0);

        let features = resolve_features(&input(json!({ "ph": 7 }))).unwrap();
        assert_eq!(features[1], 0.0);
    }

    #[test]
    fn missing_ph_is_an_input_error() {
        let model = RiskModel::from_bundle(case_split_tree());
        match model.predict(&input(json!({ "cases": 3 }))) {
            PredictionOutcome::Failure(f) => {
                assert_eq!(f.kind, FailureKind::InvalidInput);
                assert_eq!(f.error, "Prediction failed: pH is required for prediction");
                assert!(f.predicted_risk_level.is_none());
            }
            PredictionOutcome::Success(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn non_numeric_feature_is_an_input_error() {
        let err = resolve_features(&input(json!({ "ph": 7.0, "nitrate": "lots" }))).unwrap_err();
        assert!(err.contains("nitrate"));
    }

    #[test]
    fn unloaded_model_returns_error_payload() {
        let model = RiskModel::unavailable();
        assert!(!model.is_loaded());
        let outcome = model.predict(&input(json!({ "ph": 7.0, "cases": 1 })));
        let payload = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            payload["error"],
            json!("Model not loaded. Please train and save the model first.")
        );
        assert_eq!(payload["predicted_risk_level"], Value::Null);
        assert_eq!(payload["probabilities"], Value::Null);
        assert_eq!(payload["confidence"], Value::Null);
    }

    #[test]
    fn tree_walks_to_the_right_leaf() {
        let model = RiskModel::from_bundle(case_split_tree());
        let low = model
            .predict(&input(json!({ "ph": 7.2, "cases": 5 })))
            .success()
            .unwrap();
        assert_eq!(low.predicted_risk_level, RiskLabel::LowRisk);
        assert_eq!(low.confidence, 1.0);

        let high = model
            .predict(&input(json!({ "ph": 7.2, "cases": 12 })))
            .success()
            .unwrap();
        assert_eq!(high.predicted_risk_level, RiskLabel::HighRisk);
        assert!((high.confidence - 0.8).abs() < 1e-12);
        assert!((high.probabilities["Medium Risk"] - 0.2).abs() < 1e-12);
        assert!(high.interpretation.ends_with("Prediction confidence: 80.0%"));
    }

    #[test]
    fn logistic_regression_is_a_softmax_over_scores() {
        let bundle = ModelBundle {
            model: Estimator::LogisticRegression {
                coefficients: vec![vec![0.0; FEATURE_COUNT]; 4],
                intercepts: vec![0.0, 0.0, 0.0, 3f64.ln()],
            },
            scaler: identity_scaler(),
            feature_names: names(),
            classes: RiskLabel::ALL.to_vec(),
            accuracy: None,
        };
        bundle.validate().unwrap();
        let p = RiskModel::from_bundle(bundle)
            .predict(&input(json!({ "ph": 7.0, "cases": 2 })))
            .success()
            .unwrap();
        assert_eq!(p.predicted_risk_level, RiskLabel::HighRisk);
        assert!((p.confidence - 0.5).abs() < 1e-9);
        let total: f64 = p.probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn validation_rejects_shape_mismatches() {
        let mut bundle = case_split_tree();
        bundle.feature_names.pop();
        assert!(bundle.validate().is_err());

        let mut bundle = case_split_tree();
        bundle.model = Estimator::LogisticRegression {
            coefficients: vec![vec![0.0; FEATURE_COUNT]; 3],
            intercepts: vec![0.0; 4],
        };
        assert!(bundle.validate().is_err());

        let mut bundle = case_split_tree();
        if let Estimator::DecisionTree { nodes } = &mut bundle.model {
            nodes[0].right = Some(9);
        }
        assert!(bundle.validate().is_err());
    }

    #[test]
    fn bundle_parses_from_json() {
        let raw = json!({
            "model": { "kind": "logistic_regression",
                       "coefficients": [[0,0,0,0,0,0,0],[0,0,0,0,0,0,0]],
                       "intercepts": [0.0, 1.0] },
            "scaler": { "mean": [0,0,0,0,0,0,0], "scale": [1,1,1,1,1,1,1] },
            "feature_names": FEATURE_NAMES,
            "classes": ["No Risk", "High Risk"],
            "accuracy": 0.75
        });
        let bundle: ModelBundle = serde_json::from_value(raw).unwrap();
        bundle.validate().unwrap();
        assert_eq!(bundle.classes, vec![RiskLabel::NoRisk, RiskLabel::HighRisk]);
    }

    #[test]
    fn missing_artifact_degrades_to_unloaded() {
        let model = RiskModel::load(Path::new("/nonexistent/model.json"));
        assert!(!model.is_loaded());
        assert!(model.load_error().is_some());
    }
}
