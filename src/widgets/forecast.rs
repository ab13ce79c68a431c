//! Demand forecast widget.
//!
//! The server reports `accuracyEstimate` as an error rate, so confidence is
//! its complement. A non-blank `warning` means the forecast came from the
//! rules-based fallback.

use serde::{Deserialize, Serialize};

use super::{
    confidence_from_error_estimate, decode, list, text_or_na, Capped, Flag, Normalizer,
    Widget, WidgetKind, DISPLAY_LIMIT, FALLBACK_CONFIDENCE,
};
use crate::error::NormalizeError;
use crate::render::Summary;
use crate::types::{WidgetSettings, WidgetsConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForecastParams {
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub days: u32,
}

impl Default for ForecastParams {
    fn default() -> Self {
        Self {
            scope: "sales".to_string(),
            product_id: None,
            days: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawForecast {
    #[serde(deserialize_with = "list")]
    predictions: Vec<RawPrediction>,
    accuracy_estimate: Option<f64>,
    model_version: Option<String>,
    warning: Option<Flag>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPrediction {
    date: Option<String>,
    #[serde(alias = "value")]
    predicted: Option<f64>,
    lower: Option<f64>,
    upper: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    pub date: String,
    pub predicted: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastModel {
    pub points: Capped<ForecastPoint>,
    /// Sum over every prediction, not just the displayed ones.
    pub total_predicted: f64,
    pub peak: Option<ForecastPoint>,
    pub model_version: String,
    pub confidence: u8,
    pub degraded: bool,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForecastNormalizer;

impl Normalizer for ForecastNormalizer {
    type Model = ForecastModel;

    fn normalize(&self, raw: serde_json::Value) -> Result<ForecastModel, NormalizeError> {
        let raw: RawForecast = decode("forecast", raw)?;

        let points: Vec<ForecastPoint> = raw
            .predictions
            .into_iter()
            .map(|p| ForecastPoint {
                date: text_or_na(p.date),
                predicted: p.predicted.filter(|v| v.is_finite()).unwrap_or(0.0),
                lower: p.lower.filter(|v| v.is_finite()),
                upper: p.upper.filter(|v| v.is_finite()),
            })
            .collect();

        let total_predicted = points.iter().map(|p| p.predicted).sum();
        let peak = points
            .iter()
            .max_by(|a, b| a.predicted.total_cmp(&b.predicted))
            .cloned();

        let degraded = raw.warning.as_ref().is_some_and(Flag::is_set);
        let warning = raw.warning.and_then(Flag::message);
        let confidence = if degraded {
            FALLBACK_CONFIDENCE
        } else {
            confidence_from_error_estimate(raw.accuracy_estimate)
        };

        Ok(ForecastModel {
            points: Capped::new(points, DISPLAY_LIMIT),
            total_predicted,
            peak,
            model_version: text_or_na(raw.model_version),
            confidence,
            degraded,
            warning,
        })
    }
}

impl Widget for ForecastNormalizer {
    type Params = ForecastParams;

    const KIND: WidgetKind = WidgetKind::Forecast;

    fn settings(config: &WidgetsConfig) -> &WidgetSettings<ForecastParams> {
        &config.forecast
    }
}

impl Summary for ForecastModel {
    fn headline(&self) -> String {
        if self.points.total == 0 {
            return "No forecast available".to_string();
        }
        let mut line = format!(
            "{:.0} units forecast over {} days",
            self.total_predicted, self.points.total
        );
        if let Some(peak) = &self.peak {
            line.push_str(&format!(", peak {:.0} on {}", peak.predicted, peak.date));
        }
        line
    }

    fn confidence(&self) -> u8 {
        self.confidence
    }

    fn is_degraded(&self) -> bool {
        self.degraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_confidence_from_accuracy_estimate() {
        let model = ForecastNormalizer
            .normalize(json!({
                "predictions": [
                    { "date": "2026-10-01", "predicted": 120.0, "lower": 100.0, "upper": 140.0 },
                    { "date": "2026-10-02", "predicted": 180.0 },
                    { "date": "2026-10-03", "value": 90.0 }
                ],
                "accuracyEstimate": 0.15,
                "modelVersion": "prophet-1.4"
            }))
            .unwrap();

        assert_eq!(model.confidence, 85);
        assert!(!model.degraded);
        assert_eq!(model.total_predicted, 390.0);
        assert_eq!(model.peak.as_ref().unwrap().date, "2026-10-02");
        assert_eq!(model.points.items[2].predicted, 90.0);
        assert_eq!(model.model_version, "prophet-1.4");
        assert_eq!(model.headline(), "390 units forecast over 3 days, peak 180 on 2026-10-02");
    }

    #[test]
    fn test_warning_marks_degraded_with_fallback_confidence() {
        let model = ForecastNormalizer
            .normalize(json!({
                "predictions": [{ "date": "2026-10-01", "predicted": 10.0 }],
                "accuracyEstimate": 0.02,
                "warning": "ML service unavailable, using moving average"
            }))
            .unwrap();

        assert!(model.degraded);
        assert_eq!(model.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(
            model.warning.as_deref(),
            Some("ML service unavailable, using moving average")
        );
    }

    #[test]
    fn test_blank_warning_is_not_degraded() {
        let model = ForecastNormalizer
            .normalize(json!({ "warning": "", "accuracyEstimate": 0.3 }))
            .unwrap();
        assert!(!model.degraded);
        assert_eq!(model.confidence, 70);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let model = ForecastNormalizer
            .normalize(json!({ "predictions": [{}] }))
            .unwrap();
        assert_eq!(model.points.items[0].date, "N/A");
        assert_eq!(model.points.items[0].predicted, 0.0);
        assert_eq!(model.model_version, "N/A");
        assert_eq!(model.confidence, FALLBACK_CONFIDENCE);

        let empty = ForecastNormalizer.normalize(serde_json::Value::Null).unwrap();
        assert_eq!(empty.points.total, 0);
        assert!(empty.peak.is_none());
        assert_eq!(empty.headline(), "No forecast available");
    }

    #[test]
    fn test_long_forecast_is_capped() {
        let predictions: Vec<_> = (0..14)
            .map(|day| json!({ "date": format!("day-{}", day), "predicted": 1.0 }))
            .collect();
        let model = ForecastNormalizer
            .normalize(json!({ "predictions": predictions }))
            .unwrap();
        assert_eq!(model.points.items.len(), DISPLAY_LIMIT);
        assert_eq!(model.points.total, 14);
        assert_eq!(model.total_predicted, 14.0);
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let result = ForecastNormalizer.normalize(json!({ "accuracyEstimate": "high" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_params_serialize_camel_case() {
        let params = ForecastParams {
            product_id: Some("SKU-9".to_string()),
            ..ForecastParams::default()
        };
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({ "scope": "sales", "productId": "SKU-9", "days": 30 })
        );
    }

    #[test]
    fn test_boolean_warning_marks_degraded() {
        let model = ForecastNormalizer
            .normalize(json!({ "warning": true, "accuracyEstimate": 0.1 }))
            .unwrap();
        assert!(model.degraded);
        assert_eq!(model.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(model.warning, None);

        let model = ForecastNormalizer
            .normalize(json!({ "warning": false, "accuracyEstimate": 0.1 }))
            .unwrap();
        assert!(!model.degraded);
        assert_eq!(model.confidence, 90);
    }

    #[test]
    fn test_null_fields_read_as_defaults() {
        let model = ForecastNormalizer
            .normalize(json!({
                "predictions": null,
                "accuracyEstimate": null,
                "modelVersion": null,
                "warning": null
            }))
            .unwrap();
        assert_eq!(model.points.total, 0);
        assert!(!model.degraded);
        assert_eq!(model.model_version, "N/A");
        assert_eq!(model.confidence, FALLBACK_CONFIDENCE);
    }
}
