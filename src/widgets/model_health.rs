//! Model health widget.
//!
//! `status: "degraded"` is the fallback signal here; confidence is the mean
//! reported accuracy across models.

use serde::{Deserialize, Serialize};

use super::{
    confidence_from_probability, decode, list, text_or_na, Capped, Normalizer, Widget, WidgetKind,
    DISPLAY_LIMIT, FALLBACK_CONFIDENCE,
};
use crate::error::NormalizeError;
use crate::render::Summary;
use crate::types::{WidgetSettings, WidgetsConfig};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelHealthParams {
    /// Restrict the report to one model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawModelHealth {
    status: Option<String>,
    #[serde(deserialize_with = "list")]
    models: Vec<RawModel>,
    last_checked: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawModel {
    name: Option<String>,
    accuracy: Option<f64>,
    last_trained: Option<String>,
    drift_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Down,
    Unknown,
}

impl HealthStatus {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("healthy") => HealthStatus::Healthy,
            Some("degraded") => HealthStatus::Degraded,
            Some("down") => HealthStatus::Down,
            _ => HealthStatus::Unknown,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Down => "down",
            HealthStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub name: String,
    pub accuracy_pct: Option<u8>,
    pub last_trained: String,
    pub drift_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelHealthModel {
    pub status: HealthStatus,
    pub models: Capped<ModelStatus>,
    pub last_checked: String,
    pub confidence: u8,
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ModelHealthNormalizer;

impl Normalizer for ModelHealthNormalizer {
    type Model = ModelHealthModel;

    fn normalize(&self, raw: serde_json::Value) -> Result<ModelHealthModel, NormalizeError> {
        let raw: RawModelHealth = decode("model health", raw)?;

        let status = HealthStatus::parse(raw.status.as_deref());
        let degraded = status == HealthStatus::Degraded;

        let accuracies: Vec<f64> = raw
            .models
            .iter()
            .filter_map(|m| m.accuracy)
            .filter(|a| a.is_finite())
            .collect();
        let confidence = if degraded || accuracies.is_empty() {
            FALLBACK_CONFIDENCE
        } else {
            let mean = accuracies.iter().sum::<f64>() / accuracies.len() as f64;
            confidence_from_probability(Some(mean))
        };

        let models = raw
            .models
            .into_iter()
            .map(|m| ModelStatus {
                name: text_or_na(m.name),
                accuracy_pct: m
                    .accuracy
                    .filter(|a| a.is_finite())
                    .map(|a| confidence_from_probability(Some(a))),
                last_trained: text_or_na(m.last_trained),
                drift_score: m.drift_score,
            })
            .collect();

        Ok(ModelHealthModel {
            status,
            models: Capped::new(models, DISPLAY_LIMIT),
            last_checked: text_or_na(raw.last_checked),
            confidence,
            degraded,
        })
    }
}

impl Widget for ModelHealthNormalizer {
    type Params = ModelHealthParams;

    const KIND: WidgetKind = WidgetKind::ModelHealth;

    fn settings(config: &WidgetsConfig) -> &WidgetSettings<ModelHealthParams> {
        &config.model_health
    }
}

impl Summary for ModelHealthModel {
    fn headline(&self) -> String {
        format!(
            "Service {}, {} models reporting",
            self.status.as_str(),
            self.models.total
        )
    }

    fn confidence(&self) -> u8 {
        self.confidence
    }

    fn is_degraded(&self) -> bool {
        self.degraded
    }
}
