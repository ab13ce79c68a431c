//! AI insight widgets.
//!
//! Each widget module pairs a request-params type with a `Normalizer` that
//! maps the endpoint's raw JSON onto a stable display model. Normalizers are
//! pure: no I/O, no shared state, same output for the same input.
//!
//! Contract shared by every normalizer:
//! - the server's degraded/fallback flag alone decides `degraded`, and a
//!   degraded model always reports `FALLBACK_CONFIDENCE`
//! - missing optional fields resolve to defaults (`0`, `[]`, `"N/A"`)
//! - list fields are capped at `DISPLAY_LIMIT` with the true total kept
//! - only a value of the wrong JSON type is rejected

pub mod anomalies;
pub mod forecast;
pub mod model_health;
pub mod price_optimization;
pub mod realtime;
pub mod segmentation;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::api::source::{Endpoint, Method};
use crate::error::NormalizeError;
use crate::types::{WidgetSettings, WidgetsConfig};

/// Items shown per list before "view all".
pub const DISPLAY_LIMIT: usize = 5;

/// Confidence reported when the server ran a rules-based fallback, or did
/// not report anything to derive confidence from.
pub const FALLBACK_CONFIDENCE: u8 = 50;

/// Placeholder for missing text fields.
pub const NOT_AVAILABLE: &str = "N/A";

/// Maps a raw payload to a display model.
pub trait Normalizer: Send + Sync + 'static {
    type Model: Clone + Send + Sync + 'static;

    fn normalize(&self, raw: serde_json::Value) -> Result<Self::Model, NormalizeError>;
}

/// A normalizer bound to its endpoint, params and config section.
pub trait Widget: Normalizer + Default {
    type Params: Clone + PartialEq + Serialize + Send + Sync + 'static;

    const KIND: WidgetKind;

    fn settings(config: &WidgetsConfig) -> &WidgetSettings<Self::Params>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Forecast,
    PriceOptimization,
    Segmentation,
    Anomalies,
    ModelHealth,
    Realtime,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 6] = [
        WidgetKind::Forecast,
        WidgetKind::PriceOptimization,
        WidgetKind::Segmentation,
        WidgetKind::Anomalies,
        WidgetKind::ModelHealth,
        WidgetKind::Realtime,
    ];

    /// Config key
    pub fn key(self) -> &'static str {
        match self {
            WidgetKind::Forecast => "forecast",
            WidgetKind::PriceOptimization => "priceOptimization",
            WidgetKind::Segmentation => "segmentation",
            WidgetKind::Anomalies => "anomalies",
            WidgetKind::ModelHealth => "modelHealth",
            WidgetKind::Realtime => "realtime",
        }
    }

    /// Resource name for logs and "Failed to load ..." messages
    pub fn label(self) -> &'static str {
        match self {
            WidgetKind::Forecast => "demand forecast",
            WidgetKind::PriceOptimization => "price optimization",
            WidgetKind::Segmentation => "customer segmentation",
            WidgetKind::Anomalies => "anomaly detection",
            WidgetKind::ModelHealth => "model health",
            WidgetKind::Realtime => "real-time metrics",
        }
    }

    pub fn endpoint(self) -> Endpoint {
        match self {
            WidgetKind::Forecast => Endpoint {
                method: Method::Post,
                path: "ml/forecast",
            },
            WidgetKind::PriceOptimization => Endpoint {
                method: Method::Post,
                path: "ml/price-optimization",
            },
            WidgetKind::Segmentation => Endpoint {
                method: Method::Post,
                path: "ml/customer-segmentation",
            },
            WidgetKind::Anomalies => Endpoint {
                method: Method::Post,
                path: "ml/anomalies/detect",
            },
            WidgetKind::ModelHealth => Endpoint {
                method: Method::Get,
                path: "ml/health",
            },
            WidgetKind::Realtime => Endpoint {
                method: Method::Get,
                path: "dashboard/realtime",
            },
        }
    }

    /// Auto-refresh period; `None` fetches only on params change.
    pub fn default_interval(self) -> Option<Duration> {
        match self {
            WidgetKind::Anomalies => Some(Duration::from_millis(300_000)),
            WidgetKind::ModelHealth => Some(Duration::from_millis(120_000)),
            WidgetKind::Realtime => Some(Duration::from_millis(30_000)),
            WidgetKind::Forecast | WidgetKind::PriceOptimization | WidgetKind::Segmentation => {
                None
            }
        }
    }
}

/// The first `DISPLAY_LIMIT` items plus the true total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capped<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> Capped<T> {
    pub fn new(mut items: Vec<T>, limit: usize) -> Self {
        let total = items.len();
        items.truncate(limit);
        Self { items, total }
    }

    /// Cap `items`, reporting `total` when the server counted more than it
    /// sent.
    pub fn with_total(items: Vec<T>, limit: usize, total: usize) -> Self {
        let mut capped = Self::new(items, limit);
        capped.total = capped.total.max(total);
        capped
    }

    pub fn hidden(&self) -> usize {
        self.total.saturating_sub(self.items.len())
    }
}

/// `round((1 - error_estimate) * 100)`, clamped. Non-finite or missing input
/// yields the fallback.
pub fn confidence_from_error_estimate(estimate: Option<f64>) -> u8 {
    match estimate.filter(|e| e.is_finite()) {
        Some(e) => to_percent(1.0 - e),
        None => FALLBACK_CONFIDENCE,
    }
}

/// `round(probability * 100)`, clamped. Non-finite or missing input yields
/// the fallback.
pub fn confidence_from_probability(probability: Option<f64>) -> u8 {
    match probability.filter(|p| p.is_finite()) {
        Some(p) => to_percent(p),
        None => FALLBACK_CONFIDENCE,
    }
}

fn to_percent(fraction: f64) -> u8 {
    (fraction * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Decode `raw` into a lenient schema. `null` is treated as `{}`.
pub(crate) fn decode<T: DeserializeOwned>(
    widget: &'static str,
    raw: serde_json::Value,
) -> Result<T, NormalizeError> {
    let raw = if raw.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        raw
    };
    serde_json::from_value(raw).map_err(|e| NormalizeError {
        widget,
        reason: e.to_string(),
    })
}

/// Degraded marker sent either as a boolean or as a message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum Flag {
    Set(bool),
    Message(String),
}

impl Flag {
    /// `true`, or any non-blank message.
    pub(crate) fn is_set(&self) -> bool {
        match self {
            Flag::Set(on) => *on,
            Flag::Message(message) => !message.trim().is_empty(),
        }
    }

    pub(crate) fn message(self) -> Option<String> {
        match self {
            Flag::Set(_) => None,
            Flag::Message(message) => non_blank(Some(message)),
        }
    }
}

/// Field helper: a flag that may be absent, `null`, a boolean or a message.
pub(crate) fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<Flag>::deserialize(deserializer)?.is_some_and(|f| f.is_set()))
}

/// Field helper: a list that may be `null` or hold `null` entries.
pub(crate) fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    let items = Option::<Vec<Option<T>>>::deserialize(deserializer)?;
    Ok(items
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}

/// Field helper: a non-negative count. Integral floats such as `3.0` are
/// accepted; negative or non-finite numbers read as missing.
pub(crate) fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u64))
}

/// Trimmed text, or `"N/A"`.
pub(crate) fn text_or_na(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Non-blank text, trimmed.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capped_keeps_true_total() {
        let capped = Capped::new((0..10).collect::<Vec<_>>(), DISPLAY_LIMIT);
        assert_eq!(capped.items, vec![0, 1, 2, 3, 4]);
        assert_eq!(capped.total, 10);
        assert_eq!(capped.hidden(), 5);

        let short = Capped::new(vec![1, 2], DISPLAY_LIMIT);
        assert_eq!(short.total, 2);
        assert_eq!(short.hidden(), 0);
    }

    #[test]
    fn test_capped_with_server_total() {
        let capped = Capped::with_total(vec![1, 2, 3], DISPLAY_LIMIT, 42);
        assert_eq!(capped.items.len(), 3);
        assert_eq!(capped.total, 42);

        // A stale server count never hides items that were actually sent
        let capped = Capped::with_total(vec![1, 2, 3], DISPLAY_LIMIT, 1);
        assert_eq!(capped.total, 3);
    }

    #[test]
    fn test_confidence_helpers() {
        assert_eq!(confidence_from_error_estimate(Some(0.12)), 88);
        assert_eq!(confidence_from_error_estimate(Some(1.7)), 0);
        assert_eq!(confidence_from_error_estimate(None), FALLBACK_CONFIDENCE);
        assert_eq!(confidence_from_error_estimate(Some(f64::NAN)), FALLBACK_CONFIDENCE);

        assert_eq!(confidence_from_probability(Some(0.876)), 88);
        assert_eq!(confidence_from_probability(Some(-0.2)), 0);
        assert_eq!(confidence_from_probability(Some(3.0)), 100);
        assert_eq!(confidence_from_probability(None), FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_text_helpers() {
        assert_eq!(text_or_na(None), "N/A");
        assert_eq!(text_or_na(Some("  ".to_string())), "N/A");
        assert_eq!(text_or_na(Some(" v2 ".to_string())), "v2");
        assert_eq!(non_blank(Some(String::new())), None);
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Lenient {
        #[serde(deserialize_with = "list")]
        items: Vec<u32>,
        #[serde(deserialize_with = "flag")]
        degraded: bool,
        #[serde(deserialize_with = "count")]
        total: Option<u64>,
    }

    #[test]
    fn test_null_fields_read_as_defaults() {
        let lenient: Lenient = decode(
            "test",
            serde_json::json!({ "items": null, "degraded": null, "total": null }),
        )
        .unwrap();
        assert!(lenient.items.is_empty());
        assert!(!lenient.degraded);
        assert_eq!(lenient.total, None);

        let lenient: Lenient = decode("test", serde_json::json!({ "items": [1, null, 3] })).unwrap();
        assert_eq!(lenient.items, vec![1, 0, 3]);
    }

    #[test]
    fn test_flag_accepts_bool_or_message() {
        for (raw, want) in [
            (serde_json::json!(true), true),
            (serde_json::json!(false), false),
            (serde_json::json!("ML service unavailable"), true),
            (serde_json::json!("  "), false),
        ] {
            let lenient: Lenient = decode("test", serde_json::json!({ "degraded": raw })).unwrap();
            assert_eq!(lenient.degraded, want);
        }
        assert!(decode::<Lenient>("test", serde_json::json!({ "degraded": 1 })).is_err());

        assert_eq!(Flag::Message(" down ".to_string()).message().as_deref(), Some("down"));
        assert_eq!(Flag::Set(true).message(), None);
    }

    #[test]
    fn test_count_accepts_integral_floats() {
        let lenient: Lenient = decode("test", serde_json::json!({ "total": 3.0 })).unwrap();
        assert_eq!(lenient.total, Some(3));
        let lenient: Lenient = decode("test", serde_json::json!({ "total": 12 })).unwrap();
        assert_eq!(lenient.total, Some(12));
        let lenient: Lenient = decode("test", serde_json::json!({ "total": -4 })).unwrap();
        assert_eq!(lenient.total, None);
        assert!(decode::<Lenient>("test", serde_json::json!({ "total": "3" })).is_err());
    }

    #[test]
    fn test_widget_registry() {
        assert_eq!(WidgetKind::ALL.len(), 6);
        assert_eq!(WidgetKind::ModelHealth.endpoint().method, Method::Get);
        assert_eq!(WidgetKind::Forecast.endpoint().method, Method::Post);
        assert_eq!(
            WidgetKind::Anomalies.default_interval(),
            Some(Duration::from_millis(300_000))
        );
        assert_eq!(WidgetKind::Segmentation.default_interval(), None);
    }
}
