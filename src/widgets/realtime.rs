//! Real-time promotion metrics for the live dashboard.
//!
//! No model is involved: live data reports full confidence, and the
//! `simulated` flag marks generated placeholder numbers.

use serde::{Deserialize, Serialize};

use super::{
    count, decode, flag, list, text_or_na, Capped, Normalizer, Widget, WidgetKind, DISPLAY_LIMIT,
    FALLBACK_CONFIDENCE,
};
use crate::error::NormalizeError;
use crate::render::Summary;
use crate::types::{WidgetSettings, WidgetsConfig};

/// Confidence for live, non-simulated metrics.
pub const LIVE_CONFIDENCE: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeParams {
    pub scope: String,
}

impl Default for RealtimeParams {
    fn default() -> Self {
        Self {
            scope: "all".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRealtime {
    #[serde(deserialize_with = "count")]
    active_promotions: Option<u64>,
    revenue_today: Option<f64>,
    #[serde(deserialize_with = "count")]
    orders_today: Option<u64>,
    #[serde(deserialize_with = "list")]
    alerts: Vec<RawAlert>,
    #[serde(deserialize_with = "flag")]
    simulated: bool,
    updated_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAlert {
    message: Option<String>,
    level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub message: String,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeModel {
    pub active_promotions: u64,
    pub revenue_today: f64,
    pub orders_today: u64,
    pub alerts: Capped<Alert>,
    pub updated_at: String,
    pub confidence: u8,
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RealtimeNormalizer;

impl Normalizer for RealtimeNormalizer {
    type Model = RealtimeModel;

    fn normalize(&self, raw: serde_json::Value) -> Result<RealtimeModel, NormalizeError> {
        let raw: RawRealtime = decode("real-time metrics", raw)?;

        let alerts = raw
            .alerts
            .into_iter()
            .map(|a| Alert {
                message: text_or_na(a.message),
                level: a
                    .level
                    .map(|l| l.trim().to_ascii_lowercase())
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| "info".to_string()),
            })
            .collect();

        let degraded = raw.simulated;

        Ok(RealtimeModel {
            active_promotions: raw.active_promotions.unwrap_or(0),
            revenue_today: raw.revenue_today.filter(|r| r.is_finite()).unwrap_or(0.0),
            orders_today: raw.orders_today.unwrap_or(0),
            alerts: Capped::new(alerts, DISPLAY_LIMIT),
            updated_at: text_or_na(raw.updated_at),
            confidence: if degraded {
                FALLBACK_CONFIDENCE
            } else {
                LIVE_CONFIDENCE
            },
            degraded,
        })
    }
}

impl Widget for RealtimeNormalizer {
    type Params = RealtimeParams;

    const KIND: WidgetKind = WidgetKind::Realtime;

    fn settings(config: &WidgetsConfig) -> &WidgetSettings<RealtimeParams> {
        &config.realtime
    }
}

impl Summary for RealtimeModel {
    fn headline(&self) -> String {
        let mut line = format!(
            "{} active promotions, {} orders, revenue {:.2} today",
            self.active_promotions, self.orders_today, self.revenue_today
        );
        if self.alerts.total > 0 {
            line.push_str(&format!(", {} alerts", self.alerts.total));
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
