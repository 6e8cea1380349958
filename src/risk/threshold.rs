use serde::Serialize;

const HIGH_CASES: i64 = 10;
const MEDIUM_CASES: i64 = 5;
const HIGH_TURBIDITY: f64 = 20.0;
const MEDIUM_TURBIDITY: f64 = 10.0;

/// Outcome of the threshold rule. Ordered so the larger level wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ThresholdRisk {
    Low,
    Medium,
    High,
}

impl ThresholdRisk {
    pub fn as_str(self) -> &'static str {
        match self {
            ThresholdRisk::Low => "Low",
            ThresholdRisk::Medium => "Medium",
            ThresholdRisk::High => "High",
        }
    }

    pub fn is_alert(self) -> bool {
        self >= ThresholdRisk::Medium
    }
}

/// Fallback rule on case count and turbidity. Missing inputs never raise
/// the level.
pub fn compute_risk(cases: Option<i64>, turbidity: Option<f64>) -> ThresholdRisk {
    let cases_above = |limit: i64| cases.is_some_and(|c| c > limit);
    let turbidity_above = |limit: f64| turbidity.is_some_and(|t| t > limit);

    if cases_above(HIGH_CASES) || turbidity_above(HIGH_TURBIDITY) {
        ThresholdRisk::High
    } else if cases_above(MEDIUM_CASES) || turbidity_above(MEDIUM_TURBIDITY) {
        ThresholdRisk::Medium
    } else {
        ThresholdRisk::Low
    }
}
