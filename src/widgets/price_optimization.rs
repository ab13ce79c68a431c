use serde::{Deserialize, Serialize};

use super::{
    confidence_from_probability, decode, flag, list, Capped, Normalizer, Widget, WidgetKind,
    DISPLAY_LIMIT, FALLBACK_CONFIDENCE,
};
use crate::error::NormalizeError;
use crate::render::Summary;
use crate::types::{WidgetSettings, WidgetsConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceOptimizationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    pub objective: String,
}

impl Default for PriceOptimizationParams {
    fn default() -> Self {
        Self {
            product_id: None,
            current_price: None,
            objective: "revenue".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPriceOptimization {
    recommended_price: Option<f64>,
    current_price: Option<f64>,
    /// Fraction, e.g. 0.08 for +8%.
    expected_revenue_change: Option<f64>,
    confidence: Option<f64>,
    #[serde(deserialize_with = "list")]
    scenarios: Vec<RawScenario>,
    #[serde(deserialize_with = "flag")]
    using_fallback: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawScenario {
    price: Option<f64>,
    expected_volume: Option<f64>,
    expected_revenue: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceScenario {
    pub price: f64,
    pub expected_volume: f64,
    pub expected_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceOptimizationModel {
    pub recommended_price: Option<f64>,
    pub current_price: Option<f64>,
    /// Recommended vs current, in percent. Absent without a usable current
    /// price.
    pub price_change_pct: Option<f64>,
    pub expected_revenue_change_pct: Option<f64>,
    /// Ordered by expected revenue, best first.
    pub scenarios: Capped<PriceScenario>,
    pub confidence: u8,
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PriceOptimizationNormalizer;

impl Normalizer for PriceOptimizationNormalizer {
    type Model = PriceOptimizationModel;

    fn normalize(&self, raw: serde_json::Value) -> Result<PriceOptimizationModel, NormalizeError> {
        let raw: RawPriceOptimization = decode("price optimization", raw)?;

        let recommended_price = raw.recommended_price.filter(|p| p.is_finite());
        let current_price = raw.current_price.filter(|p| p.is_finite());
        let price_change_pct = match (recommended_price, current_price) {
            (Some(recommended), Some(current)) if current != 0.0 => {
                Some((recommended - current) / current * 100.0)
            }
            _ => None,
        };

        let mut scenarios: Vec<PriceScenario> = raw
            .scenarios
            .into_iter()
            .map(|s| PriceScenario {
                price: s.price.unwrap_or(0.0),
                expected_volume: s.expected_volume.unwrap_or(0.0),
                expected_revenue: s.expected_revenue.unwrap_or(0.0),
            })
            .collect();
        scenarios.sort_by(|a, b| b.expected_revenue.total_cmp(&a.expected_revenue));

        let degraded = raw.using_fallback;
        let confidence = if degraded {
            FALLBACK_CONFIDENCE
        } else {
            confidence_from_probability(raw.confidence)
        };

        Ok(PriceOptimizationModel {
            recommended_price,
            current_price,
            price_change_pct,
            expected_revenue_change_pct: raw
                .expected_revenue_change
                .filter(|c| c.is_finite())
                .map(|c| c * 100.0),
            scenarios: Capped::new(scenarios, DISPLAY_LIMIT),
            confidence,
            degraded,
        })
    }
}

impl Widget for PriceOptimizationNormalizer {
    type Params = PriceOptimizationParams;

    const KIND: WidgetKind = WidgetKind::PriceOptimization;

    fn settings(config: &WidgetsConfig) -> &WidgetSettings<PriceOptimizationParams> {
        &config.price_optimization
    }
}

impl Summary for PriceOptimizationModel {
    fn headline(&self) -> String {
        let Some(recommended) = self.recommended_price else {
            return "No price recommendation".to_string();
        };
        let mut line = format!("Recommended price {:.2}", recommended);
        if let Some(change) = self.price_change_pct {
            line.push_str(&format!(" ({:+.1}% vs current)", change));
        }
        if let Some(revenue) = self.expected_revenue_change_pct {
            line.push_str(&format!(", revenue {:+.1}%", revenue));
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
    fn test_confidence_from_server_probability() {
        let model = PriceOptimizationNormalizer
            .normalize(json!({
                "recommendedPrice": 11.0,
                "currentPrice": 10.0,
                "expectedRevenueChange": 0.065,
                "confidence": 0.82,
                "scenarios": [
                    { "price": 9.5, "expectedVolume": 1200.0, "expectedRevenue": 11400.0 },
                    { "price": 11.0, "expectedVolume": 1100.0, "expectedRevenue": 12100.0 }
                ]
            }))
            .unwrap();

        assert_eq!(model.confidence, 82);
        assert!(!model.degraded);
        assert!((model.price_change_pct.unwrap() - 10.0).abs() < 1e-9);
        assert!((model.expected_revenue_change_pct.unwrap() - 6.5).abs() < 1e-9);
        assert_eq!(model.scenarios.items[0].price, 11.0);
        assert_eq!(
            model.headline(),
            "Recommended price 11.00 (+10.0% vs current), revenue +6.5%"
        );
    }

    #[test]
    fn test_fallback_flag_forces_fallback_confidence() {
        let model = PriceOptimizationNormalizer
            .normalize(json!({
                "recommendedPrice": 9.99,
                "confidence": 0.97,
                "usingFallback": true
            }))
            .unwrap();
        assert!(model.degraded);
        assert_eq!(model.confidence, FALLBACK_CONFIDENCE);
    }

    #[test]
    fn test_missing_current_price_omits_change() {
        let model = PriceOptimizationNormalizer
            .normalize(json!({ "recommendedPrice": 4.5, "currentPrice": 0.0 }))
            .unwrap();
        assert_eq!(model.price_change_pct, None);
        assert_eq!(model.scenarios.total, 0);
        assert_eq!(model.headline(), "Recommended price 4.50");
    }

    #[test]
    fn test_empty_payload() {
        let model = PriceOptimizationNormalizer.normalize(json!({})).unwrap();
        assert_eq!(model.recommended_price, None);
        assert_eq!(model.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(model.headline(), "No price recommendation");
    }

    #[test]
    fn test_null_list_and_flag_read_as_defaults() {
        let model = PriceOptimizationNormalizer
            .normalize(json!({
                "recommendedPrice": 9.5,
                "scenarios": null,
                "usingFallback": null,
                "confidence": 0.7
            }))
            .unwrap();
        assert!(model.scenarios.items.is_empty());
        assert!(!model.degraded);
        assert_eq!(model.confidence, 70);
    }
}
