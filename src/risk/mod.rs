//! Risk scoring: the pre-trained classifier and the threshold fallback.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod classifier;
pub mod threshold;

pub use classifier::{PredictionOutcome, RiskModel};
pub use threshold::{compute_risk, ThresholdRisk};

/// Classifier output label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLabel {
    #[serde(rename = "No Risk")]
    NoRisk,
    #[serde(rename = "Low Risk")]
    LowRisk,
    #[serde(rename = "Medium Risk")]
    MediumRisk,
    #[serde(rename = "High Risk")]
    HighRisk,
}

impl RiskLabel {
    pub const ALL: [RiskLabel; 4] = [
        RiskLabel::NoRisk,
        RiskLabel::LowRisk,
        RiskLabel::MediumRisk,
        RiskLabel::HighRisk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLabel::NoRisk => "No Risk",
            RiskLabel::LowRisk => "Low Risk",
            RiskLabel::MediumRisk => "Medium Risk",
            RiskLabel::HighRisk => "High Risk",
        }
    }

    /// Numeric code used by older API clients.
    pub fn legacy_code(self) -> i32 {
        match self {
            RiskLabel::NoRisk => 0,
            RiskLabel::LowRisk => 1,
            RiskLabel::MediumRisk => 2,
            RiskLabel::HighRisk => 3,
        }
    }

    /// Collapses the four classifier labels onto the threshold scale.
    pub fn as_threshold(self) -> ThresholdRisk {
        match self {
            RiskLabel::NoRisk | RiskLabel::LowRisk => ThresholdRisk::Low,
            RiskLabel::MediumRisk => ThresholdRisk::Medium,
            RiskLabel::HighRisk => ThresholdRisk::High,
        }
    }

    pub fn interpretation(self) -> &'static str {
        match self {
            RiskLabel::NoRisk => "Water quality and health indicators suggest minimal risk. Conditions are within acceptable ranges.",
            RiskLabel::LowRisk => "Some concerns identified. Preventive monitoring recommended.",
            RiskLabel::MediumRisk => "Moderate risk detected. Intervention and closer monitoring advised.",
            RiskLabel::HighRisk => "Significant risk identified. Immediate action and investigation required.",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RiskLabel::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown risk level '{s}'"))
    }
}
