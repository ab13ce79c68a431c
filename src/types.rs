use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::widgets::anomalies::AnomalyParams;
use crate::widgets::forecast::ForecastParams;
use crate::widgets::model_health::ModelHealthParams;
use crate::widgets::price_optimization::PriceOptimizationParams;
use crate::widgets::realtime::RealtimeParams;
use crate::widgets::segmentation::SegmentationParams;
use crate::widgets::WidgetKind;

/// Main configuration loaded from ~/.tpm-insights/config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub widgets: WidgetsConfig,
}

/// Where the insight endpoints live and how to authorize against them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token. Falls back to `TPM_API_TOKEN` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Client-side request timeout. Absent means requests may hang
    /// indefinitely, leaving the widget in loading/refreshing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

/// Per-widget settings. Every widget is enabled unless turned off.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetsConfig {
    #[serde(default)]
    pub forecast: WidgetSettings<ForecastParams>,
    #[serde(default)]
    pub price_optimization: WidgetSettings<PriceOptimizationParams>,
    #[serde(default)]
    pub segmentation: WidgetSettings<SegmentationParams>,
    #[serde(default)]
    pub anomalies: WidgetSettings<AnomalyParams>,
    #[serde(default)]
    pub model_health: WidgetSettings<ModelHealthParams>,
    #[serde(default)]
    pub realtime: WidgetSettings<RealtimeParams>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    rename_all = "camelCase",
    bound(
        serialize = "P: Serialize",
        deserialize = "P: Deserialize<'de> + Default"
    )
)]
pub struct WidgetSettings<P> {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Overrides the widget's default refresh period; 0 disables auto-refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    #[serde(default)]
    pub params: P,
}

fn default_enabled() -> bool {
    true
}

impl<P: Default> Default for WidgetSettings<P> {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: None,
            params: P::default(),
        }
    }
}

impl<P> WidgetSettings<P> {
    /// Effective auto-refresh period for `kind`.
    pub fn interval(&self, kind: WidgetKind) -> Option<Duration> {
        match self.interval_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => kind.default_interval(),
        }
    }
}
