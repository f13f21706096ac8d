//! Quality measurement models: field evaluations and laboratory samples

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::threshold::QualityMetric;
use crate::error::{EngineError, EngineResult};
use crate::types::{checked_sum, hundred};

/// Measured percentage per metric
pub type QualityMeasurement = BTreeMap<QualityMetric, Decimal>;

/// Quality check done in the field at intake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEvaluation {
    pub reception_id: Uuid,
    pub measurements: QualityMeasurement,
    /// Once locked, the evaluation can no longer be edited
    pub locked: bool,
    pub evaluated_at: DateTime<Utc>,
}

/// Laboratory sample lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LabSampleStatus {
    Drying,
    Analysis,
    /// Result entered; terminal
    Completed,
}

impl LabSampleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabSampleStatus::Drying => "drying",
            LabSampleStatus::Analysis => "analysis",
            LabSampleStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "drying" => Some(LabSampleStatus::Drying),
            "analysis" => Some(LabSampleStatus::Analysis),
            "completed" => Some(LabSampleStatus::Completed),
            _ => None,
        }
    }

    /// Only forward, single-step transitions are allowed
    pub fn can_transition_to(&self, next: LabSampleStatus) -> bool {
        matches!(
            (self, next),
            (LabSampleStatus::Drying, LabSampleStatus::Analysis)
                | (LabSampleStatus::Analysis, LabSampleStatus::Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LabSampleStatus::Completed)
    }
}

/// Laboratory sample taken from a reception
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabSample {
    pub id: Uuid,
    pub reception_id: Uuid,
    pub status: LabSampleStatus,
    pub wet_weight: Decimal,
    pub dried_weight: Decimal,
    /// Defect percentages, write-once on result entry
    pub defects: QualityMeasurement,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LabSample {
    /// Humidity lost while drying the sample, in percent.
    ///
    /// Zero unless both weights are positive.
    pub fn humidity_percent(&self) -> Decimal {
        lab_humidity_percent(self.wet_weight, self.dried_weight)
    }

    /// Defects plus the humidity derived from the sample weights
    pub fn measurement(&self) -> QualityMeasurement {
        let mut measured = self.defects.clone();
        measured.insert(QualityMetric::Humidity, self.humidity_percent());
        measured
    }
}

/// `(wet - dry) / wet * 100` when both are positive, else zero
pub fn lab_humidity_percent(wet_weight: Decimal, dried_weight: Decimal) -> Decimal {
    if wet_weight > Decimal::ZERO && dried_weight > Decimal::ZERO {
        wet_weight
            .checked_sub(dried_weight)
            .and_then(|loss| loss.checked_div(wet_weight))
            .and_then(|ratio| ratio.checked_mul(hundred()))
            .unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    }
}

/// Where the measurement used for a reconciliation came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualitySource {
    FieldEvaluation { measurements: QualityMeasurement },
    LabSample {
        sample_id: Uuid,
        measurements: QualityMeasurement,
    },
}

impl QualitySource {
    pub fn measurements(&self) -> &QualityMeasurement {
        match self {
            QualitySource::FieldEvaluation { measurements } => measurements,
            QualitySource::LabSample { measurements, .. } => measurements,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualitySource::FieldEvaluation { .. } => "field_evaluation",
            QualitySource::LabSample { .. } => "lab_sample",
        }
    }
}

/// Pick the authoritative measurement for a reception.
///
/// The most recently completed lab sample wins over the field evaluation.
/// Samples not yet completed are never used for quality.
pub fn select_quality_source(
    field: Option<&FieldEvaluation>,
    samples: &[LabSample],
) -> Option<QualitySource> {
    let latest_lab = samples
        .iter()
        .filter(|s| s.status.is_terminal())
        .max_by(|a, b| {
            a.completed_at
                .cmp(&b.completed_at)
                .then_with(|| a.id.cmp(&b.id))
        });

    if let Some(sample) = latest_lab {
        return Some(QualitySource::LabSample {
            sample_id: sample.id,
            measurements: sample.measurement(),
        });
    }

    field.map(|f| QualitySource::FieldEvaluation {
        measurements: f.measurements.clone(),
    })
}

/// Net mass removed by laboratory sampling across all samples of a reception.
///
/// Returns `(Σ wet, Σ dried, Σ wet - Σ dried)`.
pub fn sample_totals(samples: &[LabSample]) -> EngineResult<(Decimal, Decimal, Decimal)> {
    let wet = checked_sum(samples.iter().map(|s| s.wet_weight), "sample wet weight")?;
    let dried = checked_sum(samples.iter().map(|s| s.dried_weight), "sample dried weight")?;
    let net_loss = wet
        .checked_sub(dried)
        .ok_or_else(|| EngineError::overflow("net sample loss"))?;
    Ok((wet, dried, net_loss))
}
