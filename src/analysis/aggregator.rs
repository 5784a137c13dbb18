//! Row aggregation and validation.
//!
//! This module turns raw activation rows into per-cluster role counters
//! and per-identity totals in a single pass.

use crate::analysis::fields::Field;
use crate::error::InputError;
use crate::models::{Aggregation, IdentityAggregate, IdentityTable, RoleGroup, Row};
use std::collections::BTreeSet;

/// Aggregate rows into cluster counters and identity tables.
///
/// Rows with a blank cluster are dropped. Retail rows additionally need an
/// alternate-system id or name; without one they are skipped after their
/// cluster has been registered.
pub fn aggregate(rows: &[Row]) -> Aggregation {
    let mut result = Aggregation::default();
    let mut clusters = BTreeSet::new();

    for row in rows {
        let cluster = Field::Cluster.read(row);
        if cluster.is_empty() {
            continue;
        }

        clusters.insert(cluster.clone());
        result.counters.entry(cluster.clone()).or_default();

        let Some(group) = RoleGroup::classify(&Field::Role.read(row)) else {
            continue;
        };

        let (id, name) = match group {
            RoleGroup::Sgs | RoleGroup::Sds => (Field::LoginId.read(row), Field::UserName.read(row)),
            RoleGroup::Retail => {
                let id = Field::AltId.read(row);
                let name = Field::AltName.read(row);
                if id.is_empty() && name.is_empty() {
                    continue;
                }
                (id, name)
            }
        };

        if let Some(counters) = result.counters.get_mut(&cluster) {
            counters.increment(group);
        }
        result.identities_mut(group).record(&cluster, &id, &name);
    }

    result.clusters = clusters.into_iter().collect();
    result
}

/// Advisory check of an ingested row set.
///
/// Only the first row is inspected. Returns the record count on success.
pub fn validate(rows: &[Row]) -> Result<usize, InputError> {
    let first = rows.first().ok_or(InputError::EmptyInput)?;

    let missing: Vec<String> = [Field::Cluster, Field::Role]
        .iter()
        .filter(|field| field.read(first).is_empty())
        .map(|field| field.label().to_string())
        .collect();

    if !missing.is_empty() {
        return Err(InputError::MissingRequiredField(missing));
    }

    Ok(rows.len())
}

/// Identity aggregates of a table, optionally restricted to one cluster.
pub fn filter_by_cluster<'a>(
    table: &'a IdentityTable,
    cluster: Option<&str>,
) -> Vec<&'a IdentityAggregate> {
    table
        .iter()
        .filter(|a| cluster.map_or(true, |c| a.cluster == c))
        .collect()
}

/// Top N identities by total, ties broken by key order.
pub fn top_identities(table: &IdentityTable, n: usize) -> Vec<&IdentityAggregate> {
    let mut sorted: Vec<_> = table.iter().collect();
    sorted.sort_by_key(|a| std::cmp::Reverse(a.total));
    sorted.truncate(n);
    sorted
}

/// Raw rows whose alternate-system identity matches `id` and `name`.
pub fn retail_detail<'a>(rows: &'a [Row], id: &str, name: &str) -> Vec<&'a Row> {
    rows.iter()
        .filter(|row| Field::AltId.read(row) == id && Field::AltName.read(row) == name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, IdentityKey};

    fn activation(cluster: &str, role: &str, id: &str, name: &str) -> Row {
        let mut row = Row::new();
        row.insert("SUB CLUSTER".to_string(), CellValue::from(cluster));
        row.insert("PERFORMED USER ROLE".to_string(), CellValue::from(role));
        row.insert("PERFORMED USER LOGIN ID".to_string(), CellValue::from(id));
        row.insert("PERFORMED USER NAME".to_string(), CellValue::from(name));
        row
    }

    fn retail(cluster: &str, nik_sfa: &str, nama_sfa: &str) -> Row {
        let mut row = activation(cluster, "RETAIL", "R-LOGIN", "Outlet Clerk");
        row.insert("NIK SFA".to_string(), CellValue::from(nik_sfa));
        row.insert("NAMA SFA".to_string(), CellValue::from(nama_sfa));
        row
    }

    fn key(cluster: &str, id: &str, name: &str) -> IdentityKey {
        IdentityKey {
            cluster: cluster.to_string(),
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_duplicate_rows_accumulate() {
        let rows = vec![
            activation("1.3", "SGS", "N1", "Alice"),
            activation("1.3", "SGS", "N1", "Alice"),
        ];
        let result = aggregate(&rows);

        assert_eq!(result.counters_for("1.3").sgs, 2);
        assert_eq!(result.sgs.len(), 1);
        assert_eq!(result.sgs.get(&key("1.3", "N1", "Alice")).map(|a| a.total), Some(2));
    }

    #[test]
    fn test_name_change_creates_distinct_identity() {
        let rows = vec![
            activation("1.3", "SDS", "N1", "Alice"),
            activation("1.3", "SDS", "N1", "Alicia"),
        ];
        let result = aggregate(&rows);

        assert_eq!(result.sds.len(), 2);
        assert_eq!(result.counters_for("1.3").sds, 2);
    }

    #[test]
    fn test_concatenation_does_not_merge_identities() {
        let rows = vec![
            activation("1.3", "SGS", "N1", "Alice"),
            activation("1.3", "SGS", "N1A", "lice"),
        ];
        assert_eq!(aggregate(&rows).sgs.len(), 2);
    }

    #[test]
    fn test_blank_cluster_rows_are_dropped() {
        let rows = vec![
            activation("   ", "SGS", "N1", "Alice"),
            activation("", "SDS", "N2", "Bob"),
            activation("2.2", "SGS", "N3", "Carol"),
        ];
        let result = aggregate(&rows);

        assert_eq!(result.clusters, vec!["2.2".to_string()]);
        assert_eq!(result.counters.len(), 1);
        assert_eq!(result.sds.len(), 0);
        assert_eq!(result.sgs.total(), 1);
    }

    #[test]
    fn test_unknown_role_registers_cluster_only() {
        let rows = vec![activation("7.1", "SUPERVISOR", "N1", "Dan")];
        let result = aggregate(&rows);

        assert_eq!(result.clusters, vec!["7.1".to_string()]);
        assert_eq!(result.counters_for("7.1").total(), 0);
        assert!(result.sgs.is_empty() && result.sds.is_empty() && result.retail.is_empty());
    }

    #[test]
    fn test_retail_uses_alternate_identity() {
        let rows = vec![
            retail("8.1", "S-9", "Outlet Owner"),
            retail("8.1", "S-9", "Outlet Owner"),
        ];
        let result = aggregate(&rows);

        assert_eq!(result.counters_for("8.1").retail, 2);
        assert_eq!(
            result.retail.get(&key("8.1", "S-9", "Outlet Owner")).map(|a| a.total),
            Some(2)
        );
    }

    #[test]
    fn test_retail_without_alternate_identity_is_skipped() {
        let mut row = activation("8.4", "Retail Partner", "L1", "");
        row.remove("PERFORMED USER NAME");
        let result = aggregate(&[row]);

        assert_eq!(result.clusters, vec!["8.4".to_string()]);
        assert_eq!(result.counters_for("8.4").retail, 0);
        assert!(result.retail.is_empty());
    }

    #[test]
    fn test_each_row_increments_one_group() {
        let rows = vec![
            activation("1.4", "SGS", "A", "a"),
            activation("1.4", "SDS", "B", "b"),
            retail("1.4", "C", "c"),
        ];
        let result = aggregate(&rows);
        let counters = result.counters_for("1.4");

        assert_eq!((counters.sgs, counters.sds, counters.retail), (1, 1, 1));
        assert_eq!(counters.total(), rows.len() as u64);
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let rows = vec![
            activation("2.3", "SGS", "A", "a"),
            activation("1.3", "SDS", "B", "b"),
            retail("2.3", "C", "c"),
            activation("2.3", "SGS", "A", "a"),
            activation("", "SGS", "X", "x"),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();
        let mut rotated = rows.clone();
        rotated.rotate_left(2);

        let expected = aggregate(&rows);
        assert_eq!(aggregate(&reversed), expected);
        assert_eq!(aggregate(&rotated), expected);
        assert_eq!(expected.clusters, vec!["1.3".to_string(), "2.3".to_string()]);
    }

    #[test]
    fn test_validate_empty() {
        assert_eq!(validate(&[]), Err(InputError::EmptyInput));
    }

    #[test]
    fn test_validate_checks_first_row_only() {
        let mut header = Row::new();
        header.insert("SUB CLUSTER".to_string(), CellValue::from("1.3"));
        let rows = vec![header, activation("1.3", "SGS", "N1", "Alice")];

        assert_eq!(
            validate(&rows),
            Err(InputError::MissingRequiredField(vec![
                "PERFORMED USER ROLE".to_string()
            ]))
        );

        let rows = vec![activation("1.3", "SGS", "N1", "Alice"), Row::new()];
        assert_eq!(validate(&rows), Ok(2));
    }

    #[test]
    fn test_filter_and_top_identities() {
        let rows = vec![
            activation("1.3", "SGS", "A", "a"),
            activation("1.3", "SGS", "A", "a"),
            activation("2.1", "SGS", "B", "b"),
        ];
        let result = aggregate(&rows);

        assert_eq!(filter_by_cluster(&result.sgs, Some("2.1")).len(), 1);
        assert_eq!(filter_by_cluster(&result.sgs, None).len(), 2);

        let top = top_identities(&result.sgs, 1);
        assert_eq!(top[0].id, "A");
        assert_eq!(top[0].total, 2);
    }

    #[test]
    fn test_retail_detail_matches_alternate_identity() {
        let rows = vec![
            retail("8.1", "S-9", "Outlet Owner"),
            retail("8.1", "S-8", "Other"),
        ];
        let detail = retail_detail(&rows, "S-9", "Outlet Owner");
        assert_eq!(detail.len(), 1);
    }
}
