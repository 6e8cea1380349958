use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::risk::RiskLabel;
use crate::structure::reports::Report;

/// Column order of the mirror file. The first ten columns are the legacy
/// layout; the rest track the stored report shape.
pub const MIRROR_FIELDS: [&str; 17] = [
    "timestamp",
    "reporter",
    "symptoms",
    "cases",
    "turbidity",
    "ph",
    "chlorine",
    "lat",
    "lng",
    "location_name",
    "tds",
    "fluoride",
    "nitrate",
    "chloride",
    "ec",
    "ai_prediction",
    "ai_confidence",
];

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("Mirror: I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mirror: CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Append-only CSV copy of submitted reports.
///
/// All file access goes through one process-level lock so concurrent
/// submissions never interleave rows.
pub struct ReportMirror {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ReportMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_parent(&self) -> Result<(), MirrorError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    pub fn append(&self, report: &Report) -> Result<(), MirrorError> {
        let _guard = self.guard();
        self.ensure_parent()?;

        let needs_header = fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);
        if needs_header {
            writer.write_record(MIRROR_FIELDS)?;
        }
        writer.write_record(to_row(report))?;
        writer.flush()?;
        Ok(())
    }

    /// Truncates the file back to its header row.
    pub fn reset(&self) -> Result<(), MirrorError> {
        let _guard = self.guard();
        self.ensure_parent()?;
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(MIRROR_FIELDS)?;
        writer.flush()?;
        Ok(())
    }

    /// The last `limit` rows, newest first. A missing file reads as empty.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<Report>, MirrorError> {
        let _guard = self.guard();
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        let headers = reader.headers()?.clone();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |name: &str| column(&headers, &record, name);
            rows.push(Report {
                timestamp: field("timestamp").unwrap_or_default().to_string(),
                reporter: field("reporter").map(str::to_string),
                location_name: field("location_name").map(str::to_string),
                lat: field("lat").and_then(|v| v.parse().ok()),
                lng: field("lng").and_then(|v| v.parse().ok()),
                symptoms: field("symptoms").map(str::to_string),
                cases: field("cases").and_then(|v| v.parse().ok()),
                turbidity: field("turbidity").and_then(|v| v.parse().ok()),
                ph: field("ph").and_then(|v| v.parse().ok()),
                chlorine: field("chlorine").and_then(|v| v.parse().ok()),
                tds: field("tds").and_then(|v| v.parse().ok()),
                fluoride: field("fluoride").and_then(|v| v.parse().ok()),
                nitrate: field("nitrate").and_then(|v| v.parse().ok()),
                chloride: field("chloride").and_then(|v| v.parse().ok()),
                ec: field("ec").and_then(|v| v.parse().ok()),
                ai_prediction: field("ai_prediction").and_then(|v| v.parse::<RiskLabel>().ok()),
                ai_confidence: field("ai_confidence").and_then(|v| v.parse().ok()),
                created_at: None,
            });
        }

        let skip = rows.len().saturating_sub(limit);
        let mut recent: Vec<Report> = rows.into_iter().skip(skip).collect();
        recent.reverse();
        Ok(recent)
    }
}

fn column<'r>(headers: &csv::StringRecord, record: &'r csv::StringRecord, name: &str) -> Option<&'r str> {
    headers
        .iter()
        .position(|h| h == name)
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

/// Floats keep a fractional part (`25.0`, not `25`).
fn opt_float(value: Option<f64>) -> String {
    value.map(|v| format!("{v:?}")).unwrap_or_default()
}

fn to_row(report: &Report) -> [String; 17] {
    [
        report.timestamp.clone(),
        opt(&report.reporter),
        opt(&report.symptoms),
        opt(&report.cases),
        opt_float(report.turbidity),
        opt_float(report.ph),
        opt_float(report.chlorine),
        opt_float(report.lat),
        opt_float(report.lng),
        opt(&report.location_name),
        opt_float(report.tds),
        opt_float(report.fluoride),
        opt_float(report.nitrate),
        opt_float(report.chloride),
        opt_float(report.ec),
        report
            .ai_prediction
            .map(|label| label.as_str().to_string())
            .unwrap_or_default(),
        opt_float(report.ai_confidence),
    ]
}
