//! Anomaly detection widget.
//!
//! Accepts either a pre-aggregated severity `summary` or derives one from
//! the item list. The item list may arrive as `anomalies` or `detected`.

use serde::{Deserialize, Serialize};

use super::{
    confidence_from_probability, count, decode, flag, list, text_or_na, Capped, Normalizer, Widget, WidgetKind,
    DISPLAY_LIMIT, FALLBACK_CONFIDENCE,
};
use crate::error::NormalizeError;
use crate::render::Summary;
use crate::types::{WidgetSettings, WidgetsConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnomalyParams {
    pub scope: String,
    pub days: u32,
}

impl Default for AnomalyParams {
    fn default() -> Self {
        Self {
            scope: "sales".to_string(),
            days: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawAnomalies {
    #[serde(deserialize_with = "count")]
    detected_anomalies: Option<u64>,
    #[serde(alias = "detected", deserialize_with = "list")]
    anomalies: Vec<RawAnomaly>,
    summary: Option<RawSeveritySummary>,
    confidence: Option<f64>,
    #[serde(deserialize_with = "flag")]
    using_fallback: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawAnomaly {
    id: Option<String>,
    date: Option<String>,
    metric: Option<String>,
    value: Option<f64>,
    expected: Option<f64>,
    severity: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSeveritySummary {
    #[serde(deserialize_with = "count")]
    high: Option<u64>,
    #[serde(deserialize_with = "count")]
    medium: Option<u64>,
    #[serde(deserialize_with = "count")]
    low: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("high") => Severity::High,
            Some("medium") => Severity::Medium,
            Some("low") => Severity::Low,
            _ => Severity::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub id: String,
    pub date: String,
    pub metric: String,
    pub value: Option<f64>,
    pub expected: Option<f64>,
    /// Deviation from expected, in percent.
    pub deviation_pct: Option<f64>,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyModel {
    pub detected: Capped<Anomaly>,
    pub count: usize,
    pub severity: SeverityCounts,
    pub confidence: u8,
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnomalyNormalizer;

impl Normalizer for AnomalyNormalizer {
    type Model = AnomalyModel;

    fn normalize(&self, raw: serde_json::Value) -> Result<AnomalyModel, NormalizeError> {
        let raw: RawAnomalies = decode("anomalies", raw)?;

        let items: Vec<Anomaly> = raw.anomalies.into_iter().map(to_anomaly).collect();

        let severity = match raw.summary {
            Some(summary) => SeverityCounts {
                high: summary.high.unwrap_or(0),
                medium: summary.medium.unwrap_or(0),
                low: summary.low.unwrap_or(0),
            },
            None => count_severities(&items),
        };

        let reported = raw.detected_anomalies.unwrap_or(0) as usize;
        let detected = Capped::with_total(items, DISPLAY_LIMIT, reported);

        let degraded = raw.using_fallback;
        let confidence = if degraded {
            FALLBACK_CONFIDENCE
        } else {
            confidence_from_probability(raw.confidence)
        };

        Ok(AnomalyModel {
            count: detected.total,
            detected,
            severity,
            confidence,
            degraded,
        })
    }
}

fn to_anomaly(raw: RawAnomaly) -> Anomaly {
    let value = raw.value.filter(|v| v.is_finite());
    let expected = raw.expected.filter(|v| v.is_finite());
    let deviation_pct = match (value, expected) {
        (Some(value), Some(expected)) if expected != 0.0 => {
            Some((value - expected) / expected.abs() * 100.0)
        }
        _ => None,
    };

    Anomaly {
        id: text_or_na(raw.id),
        date: text_or_na(raw.date),
        metric: text_or_na(raw.metric),
        value,
        expected,
        deviation_pct,
        severity: Severity::parse(raw.severity.as_deref()),
        description: text_or_na(raw.description),
    }
}

fn count_severities(items: &[Anomaly]) -> SeverityCounts {
    items
        .iter()
        .fold(SeverityCounts::default(), |mut counts, item| {
            match item.severity {
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Unknown => {}
            }
            counts
        })
}

impl Widget for AnomalyNormalizer {
    type Params = AnomalyParams;

    const KIND: WidgetKind = WidgetKind::Anomalies;

    fn settings(config: &WidgetsConfig) -> &WidgetSettings<AnomalyParams> {
        &config.anomalies
    }
}

impl Summary for AnomalyModel {
    fn headline(&self) -> String {
        if self.count == 0 {
            return "No anomalies detected".to_string();
        }
        format!(
            "{} anomalies detected ({} high, {} medium, {} low)",
            self.count, self.severity.high, self.severity.medium, self.severity.low
        )
    }

    fn confidence(&self) -> u8 {
        self.confidence
    }

    fn is_degraded(&self) -> bool {
        self.degraded
    }
}
