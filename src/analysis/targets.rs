//! Cluster targets and achievement scoring.

use crate::models::{Aggregation, ClusterCounters};
use serde::Serialize;
use std::fmt;

/// Static target assignment for one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterTarget {
    pub code: &'static str,
    /// Display name of the cluster's responsible area lead.
    pub display_name: &'static str,
    pub target: u64,
}

/// Externally assigned cluster targets, in display order.
pub const CLUSTER_TARGETS: &[ClusterTarget] = &[
    ClusterTarget { code: "1.3", display_name: "DHORA ARSIANTY PERMATA", target: 430 },
    ClusterTarget { code: "1.4", display_name: "MUHAMMAD YAZID ULWAN", target: 370 },
    ClusterTarget { code: "2.1", display_name: "Y. B. PURWANTO NUGROHO", target: 320 },
    ClusterTarget { code: "2.2", display_name: "DONNI KURNIAWAN", target: 500 },
    ClusterTarget { code: "2.3", display_name: "EDY SUMARNO", target: 350 },
    ClusterTarget { code: "3.3", display_name: "BRAINY BRILLIANT", target: 270 },
    ClusterTarget { code: "7.1", display_name: "HERIYANTO", target: 113 },
    ClusterTarget { code: "7.2", display_name: "MUHAMMAD LUTHFI", target: 60 },
    ClusterTarget { code: "8.1", display_name: "JERRY SOKHA", target: 150 },
    ClusterTarget { code: "8.4", display_name: "MH VARGA FRYWENDA", target: 150 },
];

pub fn lookup(code: &str) -> Option<&'static ClusterTarget> {
    CLUSTER_TARGETS.iter().find(|t| t.code == code)
}

pub fn grand_target() -> u64 {
    CLUSTER_TARGETS.iter().map(|t| t.target).sum()
}

/// Fraction of target reached. Zero when the target is zero.
pub fn achievement(total: u64, target: u64) -> f64 {
    if target == 0 {
        0.0
    } else {
        total as f64 / target as f64
    }
}

/// Colour band of an achievement ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementBand {
    /// Below 80% of target.
    BelowTarget,
    /// 80% up to 100%.
    NearTarget,
    OnTarget,
}

impl AchievementBand {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.8 {
            AchievementBand::BelowTarget
        } else if ratio < 1.0 {
            AchievementBand::NearTarget
        } else {
            AchievementBand::OnTarget
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            AchievementBand::BelowTarget => "🔴",
            AchievementBand::NearTarget => "🟡",
            AchievementBand::OnTarget => "🟢",
        }
    }
}

impl fmt::Display for AchievementBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AchievementBand::BelowTarget => write!(f, "below 80%"),
            AchievementBand::NearTarget => write!(f, "80-100%"),
            AchievementBand::OnTarget => write!(f, "on target"),
        }
    }
}

/// One scorecard line.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreLine {
    pub cluster: String,
    pub display_name: Option<String>,
    pub target: Option<u64>,
    pub counters: ClusterCounters,
    pub total: u64,
    pub achievement: Option<f64>,
    pub band: Option<AchievementBand>,
}

/// Cluster performance against targets.
#[derive(Debug, Clone, Serialize)]
pub struct Scorecard {
    /// One line per target, in target table order.
    pub lines: Vec<ScoreLine>,
    /// Clusters seen in the data that have no target.
    pub untargeted: Vec<ScoreLine>,
    pub totals: ClusterCounters,
    pub grand_target: u64,
    pub grand_achievement: f64,
}

/// Build the scorecard for an aggregation.
pub fn scorecard(aggregation: &Aggregation) -> Scorecard {
    let mut totals = ClusterCounters::default();

    let lines: Vec<ScoreLine> = CLUSTER_TARGETS
        .iter()
        .map(|t| {
            let counters = aggregation.counters_for(t.code);
            totals.sgs += counters.sgs;
            totals.sds += counters.sds;
            totals.retail += counters.retail;
            let ach = achievement(counters.total(), t.target);
            ScoreLine {
                cluster: t.code.to_string(),
                display_name: Some(t.display_name.to_string()),
                target: Some(t.target),
                counters,
                total: counters.total(),
                achievement: Some(ach),
                band: Some(AchievementBand::from_ratio(ach)),
            }
        })
        .collect();

    let untargeted = aggregation
        .clusters
        .iter()
        .filter(|c| lookup(c).is_none())
        .map(|c| {
            let counters = aggregation.counters_for(c);
            ScoreLine {
                cluster: c.clone(),
                display_name: None,
                target: None,
                counters,
                total: counters.total(),
                achievement: None,
                band: None,
            }
        })
        .collect();

    let grand = grand_target();
    Scorecard {
        lines,
        untargeted,
        totals,
        grand_target: grand,
        grand_achievement: achievement(totals.total(), grand),
    }
}
