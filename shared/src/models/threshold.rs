//! Quality threshold models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Quality metrics measured on a reception
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QualityMetric {
    Humidity,
    Mold,
    /// Violet (unfermented) beans
    Violet,
    Slate,
    Trash,
    Insect,
    Germinated,
    Impurity,
}

impl QualityMetric {
    pub const ALL: [QualityMetric; 8] = [
        QualityMetric::Humidity,
        QualityMetric::Mold,
        QualityMetric::Violet,
        QualityMetric::Slate,
        QualityMetric::Trash,
        QualityMetric::Insect,
        QualityMetric::Germinated,
        QualityMetric::Impurity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityMetric::Humidity => "humidity",
            QualityMetric::Mold => "mold",
            QualityMetric::Violet => "violet",
            QualityMetric::Slate => "slate",
            QualityMetric::Trash => "trash",
            QualityMetric::Insect => "insect",
            QualityMetric::Germinated => "germinated",
            QualityMetric::Impurity => "impurity",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

impl std::fmt::Display for QualityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityMetric::Humidity => write!(f, "Humidity"),
            QualityMetric::Mold => write!(f, "Mold"),
            QualityMetric::Violet => write!(f, "Violet Defect"),
            QualityMetric::Slate => write!(f, "Slate"),
            QualityMetric::Trash => write!(f, "Trash"),
            QualityMetric::Insect => write!(f, "Insect Damage"),
            QualityMetric::Germinated => write!(f, "Germinated"),
            QualityMetric::Impurity => write!(f, "Impurity"),
        }
    }
}

/// Percentage above which a metric triggers a discount.
///
/// Rows are versioned: an edit inserts a new version, older versions stay as
/// history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityThreshold {
    pub commodity_type: String,
    pub metric: QualityMetric,
    pub threshold_percent: Decimal,
    pub enabled: bool,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

/// The part of a threshold the calculator needs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ThresholdRule {
    pub metric: QualityMetric,
    pub threshold_percent: Decimal,
    pub enabled: bool,
}

impl From<&QualityThreshold> for ThresholdRule {
    fn from(t: &QualityThreshold) -> Self {
        ThresholdRule {
            metric: t.metric,
            threshold_percent: t.threshold_percent,
            enabled: t.enabled,
        }
    }
}
