//! Demo dataset served when the backend cannot be reached.
//!
//! Five segments (ids 0 to 4) running from budget-conscious to VIP, the
//! matching marketing insights, and a dashboard built from them. The values
//! are fixed so offline screens always render the same picture.

use std::collections::BTreeMap;

use crate::types::{CrossTab, Dashboard, Insight, Segment};

struct SegmentSeed {
    id: u32,
    name: &'static str,
    description: &'static str,
    customers: u64,
    income: f64,
    spending: f64,
    wines: f64,
    web_purchases: f64,
    response_rate: f64,
}

const SEGMENTS: [SegmentSeed; 5] = [
    SegmentSeed {
        id: 0,
        name: "Budget Savers",
        description: "Low income and low spending, rarely engages with marketing campaigns",
        customers: 245,
        income: 38500.0,
        spending: 285.0,
        wines: 45.0,
        web_purchases: 2.3,
        response_rate: 8.2,
    },
    SegmentSeed {
        id: 1,
        name: "Middle Class",
        description: "Average income and spending, responds well to marketing campaigns",
        customers: 512,
        income: 52000.0,
        spending: 650.0,
        wines: 180.0,
        web_purchases: 4.5,
        response_rate: 15.4,
    },
    SegmentSeed {
        id: 2,
        name: "Premium",
        description: "High income, spends heavily on premium products",
        customers: 189,
        income: 78000.0,
        spending: 1450.0,
        wines: 520.0,
        web_purchases: 6.8,
        response_rate: 22.5,
    },
    SegmentSeed {
        id: 3,
        name: "VIP",
        description: "Top-tier customers with very high income and spending",
        customers: 98,
        income: 95000.0,
        spending: 2100.0,
        wines: 780.0,
        web_purchases: 8.2,
        response_rate: 28.7,
    },
    SegmentSeed {
        id: 4,
        name: "Potential",
        description: "Young customers with good income but cautious spending, room to grow",
        customers: 356,
        income: 48000.0,
        spending: 420.0,
        wines: 95.0,
        web_purchases: 5.1,
        response_rate: 12.8,
    },
];

struct InsightSeed {
    strategy: &'static str,
    characteristics: &'static str,
    recommendations: &'static [&'static str],
}

// Indexed like SEGMENTS.
const INSIGHTS: [InsightSeed; 5] = [
    InsightSeed {
        strategy: "Value & Deals",
        characteristics: "Low income, low spending, price sensitive",
        recommendations: &[
            "Focus on promotions and discounts",
            "Offer low-priced bundles in small quantities",
            "Email marketing featuring attractive deals",
            "Build a points program to grow loyalty",
        ],
    },
    InsightSeed {
        strategy: "Balanced Value",
        characteristics: "Average income, steady spending, good response",
        recommendations: &[
            "Offer reasonably priced product combos",
            "Multi-channel marketing: email, social media, web",
            "Loyalty program with exclusive offers",
            "Cross-sell complementary products",
            "Create educational content about products",
        ],
    },
    InsightSeed {
        strategy: "Premium Quality",
        characteristics: "High income, heavy spending, prefers premium products",
        recommendations: &[
            "Introduce premium and exclusive product lines",
            "Provide personalized advisory services",
            "Host VIP events and wine tastings",
            "Send premium catalogs by email",
            "Incentives for large orders",
        ],
    },
    InsightSeed {
        strategy: "Exclusive & Special",
        characteristics: "Very high income, large spending, VIP customers",
        recommendations: &[
            "Offer limited edition and exclusive products",
            "Concierge service and priority delivery",
            "Invite to a VIP club with extra privileges",
            "Private consultations with a sommelier",
            "Premium gifts on special occasions",
            "Early access to new products",
        ],
    },
    InsightSeed {
        strategy: "Growth & Education",
        characteristics: "Young, good income, cautious spending but high potential",
        recommendations: &[
            "Provide educational content about wine and products",
            "Run workshops and tasting sessions for newcomers",
            "Trial bundles across different products",
            "Marketing through social media and influencers",
            "Build an online community for young customers",
        ],
    },
];

pub const KEY_METRIC_SPENDING: &str = "Avg spending";
pub const KEY_METRIC_RESPONSE: &str = "Response (%)";
pub const KEY_METRIC_CUSTOMERS: &str = "Customers";

pub fn segments() -> Vec<Segment> {
    SEGMENTS
        .iter()
        .map(|seed| Segment {
            segment_id: seed.id,
            segment_name: seed.name.to_string(),
            description: seed.description.to_string(),
            customer_count: seed.customers,
            avg_income: seed.income,
            avg_spending: seed.spending,
            avg_mnt_wines: Some(seed.wines),
            avg_num_web_purchases: Some(seed.web_purchases),
            response_rate: seed.response_rate,
            characteristics: None,
        })
        .collect()
}

pub fn insights() -> Vec<Insight> {
    SEGMENTS
        .iter()
        .zip(INSIGHTS.iter())
        .map(|(segment, seed)| Insight {
            segment_id: segment.id,
            segment_name: Some(segment.name.to_string()),
            strategy: seed.strategy.to_string(),
            characteristics: seed.characteristics.to_string(),
            recommendations: seed.recommendations.iter().map(|r| r.to_string()).collect(),
            key_metrics: Some(BTreeMap::from([
                (KEY_METRIC_SPENDING.to_string(), segment.spending),
                (KEY_METRIC_RESPONSE.to_string(), segment.response_rate),
                (KEY_METRIC_CUSTOMERS.to_string(), segment.customers as f64),
            ])),
        })
        .collect()
}

fn cross_tab(rows: &[(&str, [u64; 5])]) -> CrossTab {
    rows.iter()
        .map(|(category, counts)| {
            let by_segment: BTreeMap<u32, u64> = (0u32..).zip(counts.iter().copied()).collect();
            (category.to_string(), by_segment)
        })
        .collect()
}

pub fn dashboard() -> Dashboard {
    let segments = segments();
    Dashboard {
        total_customers: 1400,
        avg_spending: 781.0,
        marketing_response_rate: 17.5,
        segment_distribution: segments
            .iter()
            .map(|s| (s.segment_id, s.customer_count))
            .collect(),
        income_by_segment: cross_tab(&[
            ("Low", [180, 85, 20, 5, 110]),
            ("Medium", [50, 320, 45, 10, 200]),
            ("High", [15, 107, 124, 83, 46]),
        ]),
        education_by_segment: cross_tab(&[
            ("Basic", [120, 150, 30, 10, 90]),
            ("Graduate", [100, 280, 100, 45, 200]),
            ("Postgrad", [25, 82, 59, 43, 66]),
        ]),
        marital_status_by_segment: cross_tab(&[
            ("Single", [80, 180, 50, 25, 165]),
            ("Married", [130, 260, 110, 60, 150]),
            ("Other", [35, 72, 29, 13, 41]),
        ]),
        top_segments: segments[1..4].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_cover_ids_zero_to_four() {
        let ids: Vec<u32> = segments().iter().map(|s| s.segment_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(segments()[3].segment_name, "VIP");
    }

    #[test]
    fn insights_line_up_with_segments() {
        for (segment, insight) in segments().iter().zip(insights()) {
            assert_eq!(insight.segment_id, segment.segment_id);
            assert_eq!(insight.segment_name.as_deref(), Some(segment.segment_name.as_str()));
            let metrics = insight.key_metrics.unwrap();
            assert_eq!(metrics[KEY_METRIC_CUSTOMERS], segment.customer_count as f64);
            assert!(!insight.recommendations.is_empty());
        }
    }

    #[test]
    fn dashboard_distribution_matches_segments() {
        let dashboard = dashboard();
        let total: u64 = dashboard.segment_distribution.values().sum();
        assert_eq!(total, dashboard.total_customers);
        assert_eq!(dashboard.income_by_segment["High"][&3], 83);
        let top: Vec<u32> = dashboard.top_segments.iter().map(|s| s.segment_id).collect();
        assert_eq!(top, vec![1, 2, 3]);
    }
}
