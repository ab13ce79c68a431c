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
pub struct SegmentationParams {
    pub scope: String,
    pub segment_count: u32,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            scope: "customers".to_string(),
            segment_count: 4,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSegmentation {
    #[serde(deserialize_with = "list")]
    segments: Vec<RawSegment>,
    #[serde(deserialize_with = "count")]
    total_customers: Option<u64>,
    confidence: Option<f64>,
    #[serde(deserialize_with = "flag")]
    using_fallback: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSegment {
    id: Option<String>,
    name: Option<String>,
    #[serde(deserialize_with = "count")]
    size: Option<u64>,
    avg_order_value: Option<f64>,
    churn_risk: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub name: String,
    pub size: u64,
    /// Share of `total_customers`, in percent.
    pub share_pct: f64,
    pub avg_order_value: Option<f64>,
    pub churn_risk: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationModel {
    /// Largest segments first.
    pub segments: Capped<Segment>,
    pub total_customers: u64,
    pub confidence: u8,
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentationNormalizer;

impl Normalizer for SegmentationNormalizer {
    type Model = SegmentationModel;

    fn normalize(&self, raw: serde_json::Value) -> Result<SegmentationModel, NormalizeError> {
        let raw: RawSegmentation = decode("segmentation", raw)?;

        // Derive the total when the server only sent the segments
        let total_customers = raw.total_customers.unwrap_or_else(|| {
            raw.segments
                .iter()
                .filter_map(|s| s.size)
                .fold(0u64, u64::saturating_add)
        });

        let mut segments: Vec<Segment> = raw
            .segments
            .into_iter()
            .map(|s| {
                let size = s.size.unwrap_or(0);
                let share_pct = if total_customers > 0 {
                    size as f64 / total_customers as f64 * 100.0
                } else {
                    0.0
                };
                Segment {
                    id: text_or_na(s.id),
                    name: text_or_na(s.name),
                    size,
                    share_pct,
                    avg_order_value: s.avg_order_value,
                    churn_risk: s.churn_risk,
                }
            })
            .collect();
        segments.sort_by(|a, b| b.size.cmp(&a.size));

        let degraded = raw.using_fallback;
        let confidence = if degraded {
            FALLBACK_CONFIDENCE
        } else {
            confidence_from_probability(raw.confidence)
        };

        Ok(SegmentationModel {
            segments: Capped::new(segments, DISPLAY_LIMIT),
            total_customers,
            confidence,
            degraded,
        })
    }
}

impl Widget for SegmentationNormalizer {
    type Params = SegmentationParams;

    const KIND: WidgetKind = WidgetKind::Segmentation;

    fn settings(config: &WidgetsConfig) -> &WidgetSettings<SegmentationParams> {
        &config.segmentation
    }
}

impl Summary for SegmentationModel {
    fn headline(&self) -> String {
        match self.segments.items.first() {
            None => "No segments".to_string(),
            Some(largest) => format!(
                "{} segments across {} customers, largest '{}' ({:.0}%)",
                self.segments.total, self.total_customers, largest.name, largest.share_pct
            ),
        }
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
    fn test_total_derived_from_segment_sizes() {
        let model = SegmentationNormalizer
            .normalize(json!({
                "segments": [
                    { "id": "s1", "name": "Bargain hunters", "size": 250 },
                    { "id": "s2", "name": "Loyalists", "size": 750, "avgOrderValue": 42.5 }
                ],
                "confidence": 0.71
            }))
            .unwrap();

        assert_eq!(model.total_customers, 1000);
        assert_eq!(model.segments.items[0].name, "Loyalists");
        assert_eq!(model.segments.items[0].share_pct, 75.0);
        assert_eq!(model.segments.items[0].avg_order_value, Some(42.5));
        assert_eq!(model.confidence, 71);
        assert_eq!(
            model.headline(),
            "2 segments across 1000 customers, largest 'Loyalists' (75%)"
        );
    }

    #[test]
    fn test_server_total_wins_over_derivation() {
        let model = SegmentationNormalizer
            .normalize(json!({
                "segments": [{ "name": "A", "size": 10 }],
                "totalCustomers": 40
            }))
            .unwrap();
        assert_eq!(model.total_customers, 40);
        assert_eq!(model.segments.items[0].share_pct, 25.0);
        assert_eq!(model.segments.items[0].id, "N/A");
    }

    #[test]
    fn test_fallback_and_capping() {
        let segments: Vec<_> = (1..=8)
            .map(|i| json!({ "name": format!("S{}", i), "size": i }))
            .collect();
        let model = SegmentationNormalizer
            .normalize(json!({ "segments": segments, "usingFallback": true, "confidence": 0.9 }))
            .unwrap();
        assert!(model.degraded);
        assert_eq!(model.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(model.segments.items.len(), DISPLAY_LIMIT);
        assert_eq!(model.segments.total, 8);
        assert_eq!(model.segments.items[0].name, "S8");
    }

    #[test]
    fn test_no_segments() {
        let model = SegmentationNormalizer.normalize(json!({})).unwrap();
        assert_eq!(model.total_customers, 0);
        assert_eq!(model.headline(), "No segments");
    }

    #[test]
    fn test_null_list_and_flag_read_as_defaults() {
        let model = SegmentationNormalizer
            .normalize(json!({ "segments": null, "usingFallback": null, "totalCustomers": null }))
            .unwrap();
        assert_eq!(model.segments.total, 0);
        assert_eq!(model.total_customers, 0);
        assert!(!model.degraded);
    }

    #[test]
    fn test_huge_sizes_saturate_total() {
        let model = SegmentationNormalizer
            .normalize(json!({
                "segments": [
                    { "name": "Everyone", "size": u64::MAX },
                    { "name": "One more", "size": 1 }
                ]
            }))
            .unwrap();
        assert_eq!(model.total_customers, u64::MAX);
        assert_eq!(model.segments.items[0].name, "Everyone");
    }
}
