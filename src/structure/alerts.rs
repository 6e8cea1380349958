use serde::Serialize;

use crate::risk::{RiskLabel, ThresholdRisk};
use crate::structure::reports::Report;

/// Alert derived on read from a stored report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub timestamp: String,
    pub message: String,
    pub risk: ThresholdRisk,
    pub location_name: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub details: String,
    pub ai_prediction: Option<RiskLabel>,
}

impl Alert {
    /// The alert for `report`, if either its threshold risk or its AI label
    /// is Medium or High. The higher of the two levels is reported.
    pub fn from_report(report: &Report) -> Option<Self> {
        let threshold = report.threshold_risk();
        let ai = report.ai_prediction.map(RiskLabel::as_threshold);
        let risk = ai.map_or(threshold, |ai| ai.max(threshold));
        if !risk.is_alert() {
            return None;
        }

        let details = [
            report.cases.map(|c| format!("cases={c}")),
            report.turbidity.map(|t| format!("turbidity={t:?}")),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");

        Some(Alert {
            timestamp: report.timestamp.clone(),
            message: format!("{} Risk Alert", risk.as_str()),
            risk,
            location_name: report
                .location_name
                .clone()
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            lat: report.lat,
            lng: report.lng,
            details,
            ai_prediction: report.ai_prediction,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct AlertList {
    pub alerts: Vec<Alert>,
}
