//! Longitudinal trends across a patient's studies.
//!
//! Directions compare only the first and last value of a series; the
//! insight rules then look at combinations of directions:
//!
//! 1. mPAP and PCWP both rising → post-capillary pattern
//! 2. mPAP and PVR rising without PCWP rising → pre-capillary pattern
//! 3. RAP rising with CI or CPO falling → right-sided congestion, low flow
//! 4. PVR falling with CI or CPO rising → favorable response
//!
//! Rules are not exclusive. When none match the result is `[None]`.

use crate::keys::CanonicalKey;
use crate::types::ConsolidatedSnapshotRow;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Metrics followed across studies
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    Mpap,
    Pcwp,
    Pvr,
    Rap,
    Ci,
    Cpo,
    Co,
    Svr,
    Map,
    Papi,
}

impl TrendMetric {
    pub const ALL: [TrendMetric; 10] = [
        TrendMetric::Mpap,
        TrendMetric::Pcwp,
        TrendMetric::Pvr,
        TrendMetric::Rap,
        TrendMetric::Ci,
        TrendMetric::Cpo,
        TrendMetric::Co,
        TrendMetric::Svr,
        TrendMetric::Map,
        TrendMetric::Papi,
    ];

    /// Row field the metric is read from
    pub fn key(self) -> CanonicalKey {
        match self {
            TrendMetric::Mpap => CanonicalKey::MpapMmhg,
            TrendMetric::Pcwp => CanonicalKey::PawpMmhg,
            TrendMetric::Pvr => CanonicalKey::PvrWood,
            TrendMetric::Rap => CanonicalKey::RapMmhg,
            TrendMetric::Ci => CanonicalKey::CiLminM2,
            TrendMetric::Cpo => CanonicalKey::CpoW,
            TrendMetric::Co => CanonicalKey::CoLmin,
            TrendMetric::Svr => CanonicalKey::SvrWood,
            TrendMetric::Map => CanonicalKey::MapMmhg,
            TrendMetric::Papi => CanonicalKey::Papi,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrendMetric::Mpap => "mPAP",
            TrendMetric::Pcwp => "PCWP",
            TrendMetric::Pvr => "PVR",
            TrendMetric::Rap => "RAP",
            TrendMetric::Ci => "CI",
            TrendMetric::Cpo => "CPO",
            TrendMetric::Co => "CO",
            TrendMetric::Svr => "SVR",
            TrendMetric::Map => "MAP",
            TrendMetric::Papi => "PAPi",
        }
    }
}

impl fmt::Display for TrendMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    /// Fewer than two points
    Insufficient,
}

impl TrendDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
            TrendDirection::Insufficient => "insufficient",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalInsight {
    PostCapillaryPattern,
    PreCapillaryPattern,
    RightCongestionLowFlow,
    FavorableResponse,
    None,
}

impl ClinicalInsight {
    pub fn describe(self) -> &'static str {
        match self {
            ClinicalInsight::PostCapillaryPattern => {
                "Rising mPAP with rising PCWP suggests a post-capillary pattern"
            }
            ClinicalInsight::PreCapillaryPattern => {
                "Rising mPAP and PVR with stable PCWP suggests a pre-capillary pattern"
            }
            ClinicalInsight::RightCongestionLowFlow => {
                "Rising RAP with falling output suggests right-sided congestion with low flow"
            }
            ClinicalInsight::FavorableResponse => {
                "Falling PVR with improving output suggests a favorable response"
            }
            ClinicalInsight::None => "No notable pattern",
        }
    }
}

/// One measurement at a study's start time
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TrendPoint {
    pub x_millis: i64,
    pub y: f64,
}

/// Classify a series ordered by time
pub fn classify_trend(points: &[TrendPoint], eps: f64) -> TrendDirection {
    let [first, .., last] = points else {
        return TrendDirection::Insufficient;
    };

    let delta = last.y - first.y;
    if delta.abs() < eps {
        TrendDirection::Stable
    } else if delta > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    }
}

/// Apply the insight rules; metrics absent from `directions` match nothing
pub fn detect_insights(directions: &BTreeMap<TrendMetric, TrendDirection>) -> Vec<ClinicalInsight> {
    use TrendDirection::{Decreasing, Increasing};

    let is = |metric: TrendMetric, direction: TrendDirection| {
        directions.get(&metric) == Some(&direction)
    };

    let mut insights = Vec::new();

    if is(TrendMetric::Mpap, Increasing) && is(TrendMetric::Pcwp, Increasing) {
        insights.push(ClinicalInsight::PostCapillaryPattern);
    }
    if is(TrendMetric::Mpap, Increasing)
        && is(TrendMetric::Pvr, Increasing)
        && !is(TrendMetric::Pcwp, Increasing)
    {
        insights.push(ClinicalInsight::PreCapillaryPattern);
    }
    if is(TrendMetric::Rap, Increasing)
        && (is(TrendMetric::Ci, Decreasing) || is(TrendMetric::Cpo, Decreasing))
    {
        insights.push(ClinicalInsight::RightCongestionLowFlow);
    }
    if is(TrendMetric::Pvr, Decreasing)
        && (is(TrendMetric::Ci, Increasing) || is(TrendMetric::Cpo, Increasing))
    {
        insights.push(ClinicalInsight::FavorableResponse);
    }

    if insights.is_empty() {
        insights.push(ClinicalInsight::None);
    }
    insights
}

/// Points for `metric`, skipping rows without it, oldest first
pub fn series_for(rows: &[ConsolidatedSnapshotRow], metric: TrendMetric) -> Vec<TrendPoint> {
    let key = metric.key();
    let mut points: Vec<TrendPoint> = rows
        .iter()
        .filter_map(|row| {
            row.numeric(key).map(|y| TrendPoint {
                x_millis: row.started_at_millis,
                y,
            })
        })
        .collect();
    points.sort_by_key(|p| p.x_millis);
    points
}

/// Trend of a single metric
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricTrend {
    pub direction: TrendDirection,
    pub first: Option<f64>,
    pub last: Option<f64>,
    /// `last - first` when there are at least two points
    pub delta: Option<f64>,
    pub points: Vec<TrendPoint>,
}

/// Everything the trend view shows for a patient
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrendSummary {
    pub metrics: BTreeMap<TrendMetric, MetricTrend>,
    pub insights: Vec<ClinicalInsight>,
}

impl TrendSummary {
    pub fn direction(&self, metric: TrendMetric) -> TrendDirection {
        self.metrics
            .get(&metric)
            .map(|m| m.direction)
            .unwrap_or(TrendDirection::Insufficient)
    }
}

pub fn summarize(rows: &[ConsolidatedSnapshotRow], eps: f64) -> TrendSummary {
    let mut metrics = BTreeMap::new();

    for metric in TrendMetric::ALL {
        let points = series_for(rows, metric);
        let direction = classify_trend(&points, eps);
        let first = points.first().map(|p| p.y);
        let last = points.last().map(|p| p.y);
        let delta = match (first, last) {
            (Some(a), Some(b)) if points.len() >= 2 => Some(b - a),
            _ => None,
        };
        metrics.insert(
            metric,
            MetricTrend {
                direction,
                first,
                last,
                delta,
                points,
            },
        );
    }

    let directions = metrics.iter().map(|(m, t)| (*m, t.direction)).collect();
    let insights = detect_insights(&directions);

    tracing::debug!(studies = rows.len(), ?insights, "Summarized trends");
    TrendSummary { metrics, insights }
}
