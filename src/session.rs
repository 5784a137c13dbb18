//! The dataset currently being viewed.

use crate::analysis::{self, aggregate, Scorecard};
use crate::models::{Aggregation, Dataset, IdentityAggregate, RoleGroup, Row, Tier};
use tracing::debug;

/// Loaded dataset handed to the report renderer.
#[derive(Debug, Clone)]
pub struct DashboardSession {
    pub name: String,
    pub raw_rows: Vec<Row>,
    pub aggregation: Aggregation,
    pub record_count: usize,
    pub tier: Tier,
    pub remote_url: Option<String>,
}

impl DashboardSession {
    /// Build a session, optionally recomputing the aggregation from the raw rows.
    pub fn from_dataset(dataset: Dataset, reaggregate: bool) -> Self {
        let aggregation = if reaggregate {
            let fresh = aggregate(&dataset.raw_rows);
            if fresh != dataset.aggregation {
                debug!("Stored aggregation of {} differed from a fresh pass", dataset.name);
            }
            fresh
        } else {
            dataset.aggregation
        };

        Self {
            name: dataset.name,
            record_count: dataset.raw_rows.len(),
            raw_rows: dataset.raw_rows,
            aggregation,
            tier: dataset.tier,
            remote_url: dataset.remote_url,
        }
    }

    pub fn scorecard(&self) -> Scorecard {
        analysis::scorecard(&self.aggregation)
    }

    /// Identity aggregates of one group, optionally limited to a cluster.
    pub fn identities(&self, group: RoleGroup, cluster: Option<&str>) -> Vec<&IdentityAggregate> {
        analysis::filter_by_cluster(self.aggregation.identities(group), cluster)
    }

    pub fn top_identities(&self, group: RoleGroup, n: usize) -> Vec<&IdentityAggregate> {
        analysis::top_identities(self.aggregation.identities(group), n)
    }

    pub fn retail_detail(&self, id: &str, name: &str) -> Vec<&Row> {
        analysis::retail_detail(&self.raw_rows, id.trim(), name.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), CellValue::from(*v)))
            .collect()
    }

    fn dataset() -> Dataset {
        let rows = vec![
            row(&[
                ("SUB CLUSTER", "2.2"),
                ("PERFORMED USER ROLE", "SDS"),
                ("PERFORMED USER LOGIN ID", "D1"),
                ("PERFORMED USER NAME", "Dewi"),
            ]),
            row(&[
                ("SUB CLUSTER", "2.2"),
                ("PERFORMED USER ROLE", "RETAIL"),
                ("NIK SFA", "S-77"),
                ("NAMA SFA", "Citra"),
                ("CUSTOMER MDN", "62811000"),
            ]),
            row(&[
                ("SUB CLUSTER", "7.1"),
                ("PERFORMED USER ROLE", "SDS"),
                ("PERFORMED USER LOGIN ID", "D2"),
                ("PERFORMED USER NAME", "Eko"),
            ]),
        ];
        let aggregation = aggregate(&rows);
        Dataset::new("march.json".to_string(), rows, aggregation)
    }

    #[test]
    fn test_from_dataset() {
        let session = DashboardSession::from_dataset(dataset(), false);
        assert_eq!(session.name, "march.json");
        assert_eq!(session.record_count, 3);
        assert_eq!(session.aggregation.counters_for("2.2").total(), 2);
    }

    #[test]
    fn test_reaggregate_replaces_stale_aggregation() {
        let mut ds = dataset();
        ds.aggregation = Aggregation::default();

        let stale = DashboardSession::from_dataset(ds.clone(), false);
        assert!(stale.aggregation.clusters.is_empty());

        let fresh = DashboardSession::from_dataset(ds, true);
        assert_eq!(fresh.aggregation.clusters, vec!["2.2", "7.1"]);
    }

    #[test]
    fn test_identity_filters_and_detail() {
        let session = DashboardSession::from_dataset(dataset(), false);

        assert_eq!(session.identities(RoleGroup::Sds, None).len(), 2);
        let only = session.identities(RoleGroup::Sds, Some("7.1"));
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].name, "Eko");

        let detail = session.retail_detail(" S-77 ", "Citra");
        assert_eq!(detail.len(), 1);
        assert_eq!(detail[0]["CUSTOMER MDN"].to_string(), "62811000");
    }

    #[test]
    fn test_detail_of_nameless_identity() {
        let mut ds = dataset();
        ds.raw_rows.push(row(&[
            ("SUB CLUSTER", "2.2"),
            ("PERFORMED USER ROLE", "RETAIL"),
            ("NIK SFA", "S-78"),
            ("CUSTOMER MDN", "62811999"),
        ]));
        let session = DashboardSession::from_dataset(ds, true);

        let retail = session.identities(RoleGroup::Retail, Some("2.2"));
        assert!(retail.iter().any(|i| i.id == "S-78" && i.name.is_empty()));

        let detail = session.retail_detail("S-78", "");
        assert_eq!(detail.len(), 1);
        assert_eq!(detail[0]["CUSTOMER MDN"].to_string(), "62811999");
    }
}
