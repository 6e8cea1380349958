use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::db::Document;
use crate::risk::{compute_risk, RiskLabel, ThresholdRisk};

/// A field report as stored and listed.
///
/// Deserialization is lossy: `/data/reports` shares the collection, so a
/// field of the wrong shape reads as `None` instead of hiding the row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default, deserialize_with = "lossy_timestamp")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "lossy_text")]
    pub reporter: Option<String>,
    #[serde(default, deserialize_with = "lossy_text")]
    pub location_name: Option<String>,
    #[serde(default, deserialize_with = "lossy_float")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lossy_float")]
    pub lng: Option<f64>,
    #[serde(default, deserialize_with = "lossy_text")]
    pub symptoms: Option<String>,
    #[serde(default, deserialize_with = "lossy_int")]
    pub cases: Option<i64>,
    #[serde(default, deserialize_with = "lossy_float")]
    pub turbidity: Option<f64>,
    #[serde(default, deserialize_with = "lossy_float")]
    pub ph: Option<f64>,
    #[serde(default, deserialize_with = "lossy_float")]
    pub chlorine: Option<f64>,
    #[serde(default, deserialize_with = "lossy_float")]
    pub tds: Option<f64>,
    #[serde(default, deserialize_with = "lossy_float")]
    pub fluoride: Option<f64>,
    #[serde(default, deserialize_with = "lossy_float")]
    pub nitrate: Option<f64>,
    #[serde(default, deserialize_with = "lossy_float")]
    pub chloride: Option<f64>,
    #[serde(default, deserialize_with = "lossy_float")]
    pub ec: Option<f64>,
    #[serde(default, deserialize_with = "lossy_label")]
    pub ai_prediction: Option<RiskLabel>,
    #[serde(default, deserialize_with = "lossy_float")]
    pub ai_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lossy_text")]
    pub created_at: Option<String>,
}

fn lossy_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(text(Some(&Value::deserialize(d)?)).unwrap_or_default())
}

fn lossy_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(text(Some(&Value::deserialize(d)?)))
}

fn lossy_float<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(to_float(Some(&Value::deserialize(d)?)))
}

fn lossy_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(to_int(Some(&Value::deserialize(d)?)))
}

fn lossy_label<'de, D: Deserializer<'de>>(d: D) -> Result<Option<RiskLabel>, D::Error> {
    Ok(text(Some(&Value::deserialize(d)?)).and_then(|s| s.parse().ok()))
}

/// Checks a raw report document's `ai_prediction` and rewrites it to the
/// canonical label. Null or absent is allowed.
pub fn normalize_ai_prediction(doc: &mut Document) -> Result<(), String> {
    let label = match doc.get("ai_prediction") {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::String(s)) => s.parse::<RiskLabel>().ok(),
        Some(_) => None,
    };
    match label {
        Some(label) => {
            doc.insert("ai_prediction".into(), Value::String(label.as_str().to_string()));
            Ok(())
        }
        None => Err(format!(
            "ai_prediction must be null or one of: {}",
            RiskLabel::ALL.map(RiskLabel::as_str).join(", ")
        )),
    }
}

impl Report {
    /// Builds a report from a loosely typed submission (JSON or form).
    /// Numeric fields that are missing, empty or unparsable become `None`.
    pub fn from_submission(input: &Map<String, Value>, timestamp: String) -> Self {
        let float = |key: &str| to_float(input.get(key));
        Report {
            timestamp: timestamp.clone(),
            reporter: text(input.get("reporter")),
            location_name: text(input.get("location_name")),
            lat: float("lat"),
            lng: float("lng"),
            symptoms: text(input.get("symptoms")),
            cases: to_int(input.get("cases")),
            turbidity: float("turbidity"),
            ph: float("ph"),
            chlorine: float("chlorine"),
            tds: float("tds"),
            fluoride: float("fluoride"),
            nitrate: float("nitrate"),
            chloride: float("chloride"),
            ec: float("ec"),
            ai_prediction: None,
            ai_confidence: None,
            created_at: Some(timestamp),
        }
    }

    pub fn threshold_risk(&self) -> ThresholdRisk {
        compute_risk(self.cases, self.turbidity)
    }

    /// Classifier input, or `None` when pH or the case count is missing.
    pub fn feature_input(&self) -> Option<Map<String, Value>> {
        let (ph, cases) = (self.ph?, self.cases?);
        let mut input = Map::new();
        input.insert("ph".into(), ph.into());
        input.insert("cases".into(), cases.into());
        for (key, value) in [
            ("tds", self.tds),
            ("fluoride", self.fluoride),
            ("nitrate", self.nitrate),
            ("chloride", self.chloride),
            ("ec", self.ec),
        ] {
            if let Some(v) = value {
                input.insert(key.into(), v.into());
            }
        }
        Some(input)
    }

    pub fn to_document(&self) -> serde_json::Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Document::new()),
        }
    }

    /// Reads a stored document back, dropping `_id`. Only a non-object
    /// yields `None`; misshapen fields read as empty.
    pub fn from_document(mut doc: Document) -> Option<Self> {
        doc.remove("_id");
        serde_json::from_value(Value::Object(doc)).ok()
    }
}

pub fn to_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

pub fn to_float(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|f: &f64| f.is_finite())
}

pub fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Response body of `POST /api/report`.
#[derive(Debug, Serialize)]
pub struct ReportCreated {
    pub status: &'static str,
    pub id: Option<String>,
    pub risk: ThresholdRisk,
    pub ai_prediction: Option<RiskLabel>,
    pub ai_confidence: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ReportList {
    pub items: Vec<Report>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn numeric_fields_are_normalized() {
        let input = map(json!({
            "reporter": "asha",
            "cases": "12",
            "turbidity": "",
            "ph": 7.2,
            "lat": "26.1",
            "lng": "east",
            "chlorine": null
        }));
        let report = Report::from_submission(&input, "ts".into());
        assert_eq!(report.reporter.as_deref(), Some("asha"));
        assert_eq!(report.cases, Some(12));
        assert_eq!(report.turbidity, None);
        assert_eq!(report.ph, Some(7.2));
        assert_eq!(report.lat, Some(26.1));
        assert_eq!(report.lng, None);
        assert_eq!(report.chlorine, None);
        assert_eq!(report.created_at.as_deref(), Some("ts"));
    }

    #[test]
    fn int_conversion_rules() {
        assert_eq!(to_int(Some(&json!(7))), Some(7));
        assert_eq!(to_int(Some(&json!(7.9))), Some(7));
        assert_eq!(to_int(Some(&json!(" 3 "))), Some(3));
        assert_eq!(to_int(Some(&json!("3.5"))), None);
        assert_eq!(to_int(Some(&json!(""))), None);
        assert_eq!(to_int(None), None);
    }

    #[test]
    fn feature_input_needs_ph_and_cases() {
        let mut report = Report {
            ph: Some(7.0),
            ..Report::default()
        };
        assert!(report.feature_input().is_none());

        report.cases = Some(4);
        report.nitrate = Some(20.0);
        let input = report.feature_input().unwrap();
        assert_eq!(input["ph"], json!(7.0));
        assert_eq!(input["cases"], json!(4));
        assert_eq!(input["nitrate"], json!(20.0));
        assert!(!input.contains_key("tds"));
    }

    #[test]
    fn misshapen_documents_still_read() {
        let doc = map(json!({
            "_id": "7",
            "cases": "many",
            "ph": "7.5",
            "turbidity": [1],
            "ai_prediction": "Catastrophic",
            "reporter": 42
        }));
        let report = Report::from_document(doc).unwrap();
        assert_eq!(report.timestamp, "");
        assert_eq!(report.cases, None);
        assert_eq!(report.ph, Some(7.5));
        assert_eq!(report.turbidity, None);
        assert_eq!(report.ai_prediction, None);
        assert_eq!(report.reporter.as_deref(), Some("42"));
    }

    #[test]
    fn ai_prediction_is_validated_and_canonicalized() {
        let mut doc = map(json!({ "ai_prediction": "high risk" }));
        normalize_ai_prediction(&mut doc).unwrap();
        assert_eq!(doc["ai_prediction"], json!("High Risk"));

        let mut doc = map(json!({ "ai_prediction": null }));
        assert!(normalize_ai_prediction(&mut doc).is_ok());
        assert!(normalize_ai_prediction(&mut Document::new()).is_ok());

        let mut doc = map(json!({ "ai_prediction": "Catastrophic" }));
        assert!(normalize_ai_prediction(&mut doc).is_err());
        let mut doc = map(json!({ "ai_prediction": 3 }));
        assert!(normalize_ai_prediction(&mut doc).is_err());
    }

    #[test]
    fn document_round_trip_drops_id() {
        let report = Report {
            timestamp: "2024-05-01T00:00:00.000000Z".into(),
            cases: Some(3),
            ai_prediction: Some(RiskLabel::MediumRisk),
            ..Report::default()
        };
        let mut doc = report.to_document().unwrap();
        assert_eq!(doc["ai_prediction"], json!("Medium Risk"));
        doc.insert("_id".into(), json!("1"));
        assert_eq!(Report::from_document(doc), Some(report));
    }
}
