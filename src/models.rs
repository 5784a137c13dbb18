//! Data models for the activation dashboard.
//!
//! This module contains the core data structures shared by the
//! aggregation engine, the storage tiers and the report renderer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single scalar cell from a decoded spreadsheet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl CellValue {
    /// Returns true for null cells and empty strings.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Null => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// One raw activation record: column name to cell value, schema not fixed.
pub type Row = BTreeMap<String, CellValue>;

/// Role classification of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleGroup {
    Sgs,
    Sds,
    Retail,
}

impl RoleGroup {
    pub const ALL: [RoleGroup; 3] = [RoleGroup::Sgs, RoleGroup::Sds, RoleGroup::Retail];

    /// Classify a raw role string.
    ///
    /// The role is trimmed and upper-cased. `SGS` and `SDS` must match
    /// exactly; any role containing `RETAIL` is a retail row.
    pub fn classify(role: &str) -> Option<RoleGroup> {
        let role = role.trim().to_uppercase();
        if role == "SGS" {
            Some(RoleGroup::Sgs)
        } else if role == "SDS" {
            Some(RoleGroup::Sds)
        } else if role.contains("RETAIL") {
            Some(RoleGroup::Retail)
        } else {
            None
        }
    }
}

impl fmt::Display for RoleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleGroup::Sgs => write!(f, "SGS"),
            RoleGroup::Sds => write!(f, "SDS"),
            RoleGroup::Retail => write!(f, "RETAIL"),
        }
    }
}

/// Per-cluster role counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCounters {
    pub sgs: u64,
    pub sds: u64,
    pub retail: u64,
}

impl ClusterCounters {
    pub fn increment(&mut self, group: RoleGroup) {
        match group {
            RoleGroup::Sgs => self.sgs += 1,
            RoleGroup::Sds => self.sds += 1,
            RoleGroup::Retail => self.retail += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.sgs + self.sds + self.retail
    }
}

/// Composite identity key. Ordering is cluster, then id, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityKey {
    pub cluster: String,
    pub id: String,
    pub name: String,
}

/// Running total of matched rows for one identity within one role group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAggregate {
    pub cluster: String,
    pub id: String,
    pub name: String,
    pub total: u64,
}

impl IdentityAggregate {
    pub fn key(&self) -> IdentityKey {
        IdentityKey {
            cluster: self.cluster.clone(),
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Identity aggregates of one role group, keyed by [`IdentityKey`].
///
/// Serialized as a list sorted by key, since JSON object keys cannot hold
/// the composite key without ambiguity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<IdentityAggregate>", into = "Vec<IdentityAggregate>")]
pub struct IdentityTable {
    entries: BTreeMap<IdentityKey, IdentityAggregate>,
}

impl IdentityTable {
    /// Add one matched row for the given identity.
    pub fn record(&mut self, cluster: &str, id: &str, name: &str) {
        let key = IdentityKey {
            cluster: cluster.to_string(),
            id: id.to_string(),
            name: name.to_string(),
        };
        self.entries
            .entry(key)
            .or_insert_with(|| IdentityAggregate {
                cluster: cluster.to_string(),
                id: id.to_string(),
                name: name.to_string(),
                total: 0,
            })
            .total += 1;
    }

    #[cfg(test)]
    pub fn get(&self, key: &IdentityKey) -> Option<&IdentityAggregate> {
        self.entries.get(key)
    }

    /// Iterate in key order.
    pub fn iter(&self) -> impl Iterator<Item = &IdentityAggregate> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all identity totals.
    pub fn total(&self) -> u64 {
        self.entries.values().map(|a| a.total).sum()
    }
}

impl From<Vec<IdentityAggregate>> for IdentityTable {
    fn from(list: Vec<IdentityAggregate>) -> Self {
        let mut table = IdentityTable::default();
        for aggregate in list {
            let slot = table.entries.entry(aggregate.key()).or_insert(IdentityAggregate {
                total: 0,
                ..aggregate.clone()
            });
            slot.total += aggregate.total;
        }
        table
    }
}

impl From<IdentityTable> for Vec<IdentityAggregate> {
    fn from(table: IdentityTable) -> Self {
        table.entries.into_values().collect()
    }
}

/// Output of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Counters keyed by cluster code.
    pub counters: BTreeMap<String, ClusterCounters>,
    /// Every cluster seen with at least one non-dropped row, sorted.
    pub clusters: Vec<String>,
    #[serde(default)]
    pub sgs: IdentityTable,
    #[serde(default)]
    pub sds: IdentityTable,
    #[serde(default)]
    pub retail: IdentityTable,
}

impl Aggregation {
    pub fn identities(&self, group: RoleGroup) -> &IdentityTable {
        match group {
            RoleGroup::Sgs => &self.sgs,
            RoleGroup::Sds => &self.sds,
            RoleGroup::Retail => &self.retail,
        }
    }

    pub fn identities_mut(&mut self, group: RoleGroup) -> &mut IdentityTable {
        match group {
            RoleGroup::Sgs => &mut self.sgs,
            RoleGroup::Sds => &mut self.sds,
            RoleGroup::Retail => &mut self.retail,
        }
    }

    /// Counters for a cluster, zero when the cluster was never seen.
    pub fn counters_for(&self, cluster: &str) -> ClusterCounters {
        self.counters.get(cluster).copied().unwrap_or_default()
    }
}

/// Which storage backends hold a copy of a dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Local,
    Remote,
    Both,
}

impl Tier {
    pub fn includes_remote(&self) -> bool {
        matches!(self, Tier::Remote | Tier::Both)
    }

    /// Short label used in listings.
    pub fn badge(&self) -> &'static str {
        match self {
            Tier::Local => "Local",
            Tier::Remote => "Remote",
            Tier::Both => "Remote+Local",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Local => write!(f, "local"),
            Tier::Remote => write!(f, "remote"),
            Tier::Both => write!(f, "both"),
        }
    }
}

/// The unit of persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub raw_rows: Vec<Row>,
    pub aggregation: Aggregation,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl Dataset {
    /// Creates a local-only dataset from rows and their aggregation.
    pub fn new(name: String, raw_rows: Vec<Row>, aggregation: Aggregation) -> Self {
        Self {
            name,
            raw_rows,
            aggregation,
            created_at: Utc::now(),
            tier: Tier::Local,
            remote_url: None,
            synced_at: None,
        }
    }

    pub fn record_count(&self) -> usize {
        self.raw_rows.len()
    }

    /// Index metadata for this dataset.
    pub fn entry(&self) -> DatasetEntry {
        DatasetEntry {
            name: self.name.clone(),
            created_at: self.created_at,
            record_count: self.record_count(),
            tier: self.tier,
            remote_url: self.remote_url.clone(),
            synced_at: self.synced_at,
        }
    }
}

/// Listing metadata for one cached dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub record_count: usize,
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

/// Everything the local cache knows about, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetIndex {
    pub entries: Vec<DatasetEntry>,
}

impl DatasetIndex {
    pub fn get(&self, name: &str) -> Option<&DatasetEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace the entry with the same name, keeping recency order.
    pub fn upsert(&mut self, entry: DatasetEntry) {
        self.entries.retain(|e| e.name != entry.name);
        self.entries.push(entry);
        self.sort_by_recency();
    }

    /// Remove an entry. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        self.entries.len() != before
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn sort_by_recency(&mut self) {
        self.entries
            .sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
    }
}
