//! Column resolution for rows with inconsistent headers.
//!
//! Spreadsheets exported by different systems spell the same column as
//! `SUB CLUSTER`, `SUB_CLUSTER` or `sub  cluster`. Each semantic field
//! carries an ordered alias list; a lookup tries every alias in order,
//! first as an exact key and then ignoring case, whitespace and
//! underscores. A missing field resolves to the empty string.

use crate::models::Row;

/// Semantic columns read from an activation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Cluster,
    Role,
    LoginId,
    UserName,
    /// Identity id in the alternate (SFA) system, used for retail rows.
    AltId,
    /// Identity name in the alternate (SFA) system.
    AltName,
    CustomerMdn,
    CustomerIccid,
}

impl Field {
    /// Accepted column names, most specific first.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Field::Cluster => &["SUB CLUSTER", "SUB_CLUSTER", "CLUSTER"],
            Field::Role => &["PERFORMED USER ROLE", "PERFORMED_USER_ROLE"],
            Field::LoginId => &[
                "PERFORMED USER LOGIN ID",
                "PERFORMED_USER_LOGIN_ID",
                "PERFORMED_LOGIN",
            ],
            Field::UserName => &["PERFORMED USER NAME", "PERFORMED_USER_NAME", "NAMA"],
            Field::AltId => &["NIK SFA", "NIK_SFA", "NIK"],
            Field::AltName => &["NAMA SFA", "NAMA_SFA", "NAMA"],
            Field::CustomerMdn => &["CUSTOMER MDN", "CUSTOMER_MDN"],
            Field::CustomerIccid => &["CUSTOMER ICCID", "CUSTOMER_ICCID"],
        }
    }

    /// Primary column name, used in messages.
    pub fn label(&self) -> &'static str {
        self.aliases()[0]
    }

    /// Resolve this field in a row and trim the result.
    pub fn read(&self, row: &Row) -> String {
        resolve(row, self.aliases()).trim().to_string()
    }
}

/// Return the first non-empty value matching one of `aliases`.
pub fn resolve(row: &Row, aliases: &[&str]) -> String {
    for alias in aliases {
        if let Some(value) = row.get(*alias) {
            if !value.is_empty() {
                return value.to_string();
            }
        }

        let wanted = normalize_key(alias);
        let fallback = row
            .iter()
            .find(|(key, value)| !value.is_empty() && normalize_key(key) == wanted);
        if let Some((_, value)) = fallback {
            return value.to_string();
        }
    }
    String::new()
}

/// Upper-case and fold runs of whitespace or underscores into one `_`.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut pending_sep = false;
    for ch in key.trim().chars() {
        if ch.is_whitespace() || ch == '_' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(ch.to_uppercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    fn row(pairs: &[(&str, CellValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Sub Cluster"), "SUB_CLUSTER");
        assert_eq!(normalize_key("sub__cluster"), "SUB_CLUSTER");
        assert_eq!(normalize_key("  SUB \t CLUSTER "), "SUB_CLUSTER");
        assert_eq!(normalize_key("_nik_"), "NIK");
    }

    #[test]
    fn test_exact_match_wins() {
        let r = row(&[("SUB CLUSTER", "1.3".into()), ("CLUSTER", "9.9".into())]);
        assert_eq!(Field::Cluster.read(&r), "1.3");
    }

    #[test]
    fn test_fallback_ignores_case_spacing_and_underscores() {
        let r = row(&[("sub_cluster", "2.1".into())]);
        assert_eq!(Field::Cluster.read(&r), "2.1");

        let r = row(&[("Performed  User Role", "sgs".into())]);
        assert_eq!(Field::Role.read(&r), "sgs");
    }

    #[test]
    fn test_empty_values_are_skipped() {
        let r = row(&[("SUB CLUSTER", "".into()), ("CLUSTER", "7.2".into())]);
        assert_eq!(Field::Cluster.read(&r), "7.2");

        let r = row(&[("NIK SFA", CellValue::Null), ("NIK", "S-1".into())]);
        assert_eq!(Field::AltId.read(&r), "S-1");
    }

    #[test]
    fn test_missing_field_is_empty_string() {
        let r = row(&[("OTHER", "x".into())]);
        assert_eq!(Field::Cluster.read(&r), "");
        assert_eq!(resolve(&Row::new(), &["ANY"]), "");
    }

    #[test]
    fn test_numeric_cells_resolve_as_text() {
        let r = row(&[("CLUSTER", CellValue::Number(8.4)), ("NIK", CellValue::Number(1234.0))]);
        assert_eq!(Field::Cluster.read(&r), "8.4");
        assert_eq!(Field::AltId.read(&r), "1234");
    }
}
