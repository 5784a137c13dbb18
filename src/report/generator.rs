//! Markdown report generation.
//!
//! This module generates the activation dashboard from a loaded
//! [`DashboardSession`].

use crate::analysis::targets::ScoreLine;
use crate::analysis::{AchievementBand, Field, Scorecard};
use crate::models::{DatasetIndex, IdentityAggregate, RoleGroup, Row, Tier};
use crate::session::DashboardSession;
use anyhow::Result;
use serde::Serialize;

/// What the identity sections show.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Restrict identity tables to one cluster.
    pub cluster: Option<String>,
    /// Show a single role group's table.
    pub group: Option<RoleGroup>,
    /// Entries per group in the leaderboard; 0 disables it.
    pub top: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            cluster: None,
            group: None,
            top: 5,
        }
    }
}

impl ReportOptions {
    fn groups(&self) -> Vec<RoleGroup> {
        match self.group {
            Some(group) => vec![group],
            None => RoleGroup::ALL.to_vec(),
        }
    }
}

/// Generate the complete Markdown dashboard.
pub fn generate_markdown_report(session: &DashboardSession, options: &ReportOptions) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Activation Dashboard: {}\n\n", session.name));

    output.push_str(&generate_metadata_section(session));

    let scorecard = session.scorecard();
    output.push_str(&generate_scorecard_section(&scorecard));

    if options.top > 0 && options.cluster.is_none() {
        output.push_str(&generate_leaderboard_section(session, options));
    }

    output.push_str(&generate_identity_sections(session, options));

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(session: &DashboardSession) -> String {
    let mut section = String::new();

    section.push_str(&format!("- **Records:** {}\n", fmt_number(session.record_count as u64)));
    section.push_str(&format!(
        "- **Clusters:** {}\n",
        fmt_number(session.aggregation.clusters.len() as u64)
    ));
    section.push_str(&format!("- **Storage:** {}\n", session.tier.badge()));
    if let Some(ref url) = session.remote_url {
        section.push_str(&format!("- **Remote:** {}\n", url));
    }
    section.push('\n');

    section
}

/// Generate the cluster scorecard.
fn generate_scorecard_section(scorecard: &Scorecard) -> String {
    let mut section = String::new();

    section.push_str("## Cluster Scorecard\n\n");
    section.push_str("| Cluster | ASC | Target | SGS | SDS | Retail | Total | Achievement |\n");
    section.push_str("|:---|:---|---:|---:|---:|---:|---:|:---:|\n");

    for line in &scorecard.lines {
        section.push_str(&score_row(line));
    }

    let totals = &scorecard.totals;
    section.push_str(&format!(
        "| **TOTAL** | | **{}** | **{}** | **{}** | **{}** | **{}** | {} **{}** |\n\n",
        fmt_number(scorecard.grand_target),
        fmt_number(totals.sgs),
        fmt_number(totals.sds),
        fmt_number(totals.retail),
        fmt_number(totals.total()),
        AchievementBand::from_ratio(scorecard.grand_achievement).emoji(),
        fmt_percent(scorecard.grand_achievement),
    ));

    section.push_str(&format!(
        "{} {} | {} {} | {} {}\n\n",
        AchievementBand::BelowTarget.emoji(),
        AchievementBand::BelowTarget,
        AchievementBand::NearTarget.emoji(),
        AchievementBand::NearTarget,
        AchievementBand::OnTarget.emoji(),
        AchievementBand::OnTarget,
    ));

    if !scorecard.untargeted.is_empty() {
        section.push_str("### Clusters Without Target\n\n");
        section.push_str("| Cluster | SGS | SDS | Retail | Total |\n");
        section.push_str("|:---|---:|---:|---:|---:|\n");
        for line in &scorecard.untargeted {
            section.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                line.cluster,
                fmt_number(line.counters.sgs),
                fmt_number(line.counters.sds),
                fmt_number(line.counters.retail),
                fmt_number(line.total),
            ));
        }
        section.push('\n');
    }

    section
}

fn score_row(line: &ScoreLine) -> String {
    let achievement = match (line.achievement, line.band) {
        (Some(ratio), Some(band)) => format!("{} {}", band.emoji(), fmt_percent(ratio)),
        _ => "-".to_string(),
    };
    format!(
        "| {} | {} | {} | {} | {} | {} | **{}** | {} |\n",
        line.cluster,
        line.display_name.as_deref().unwrap_or("-"),
        line.target.map(fmt_number).unwrap_or_else(|| "-".to_string()),
        fmt_number(line.counters.sgs),
        fmt_number(line.counters.sds),
        fmt_number(line.counters.retail),
        fmt_number(line.total),
        achievement,
    )
}

/// Generate the top identities per group.
fn generate_leaderboard_section(session: &DashboardSession, options: &ReportOptions) -> String {
    let mut section = String::new();
    section.push_str("## Top Performers\n\n");

    for group in options.groups() {
        let top = session.top_identities(group, options.top);
        if top.is_empty() {
            continue;
        }
        section.push_str(&format!("**{}**\n\n", group));
        for (i, identity) in top.iter().enumerate() {
            section.push_str(&format!(
                "{}. {} ({}, {}): {}\n",
                i + 1,
                display_or_dash(&identity.name),
                display_or_dash(&identity.id),
                identity.cluster,
                fmt_number(identity.total)
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate one identity table per selected group.
fn generate_identity_sections(session: &DashboardSession, options: &ReportOptions) -> String {
    let mut section = String::new();

    for group in options.groups() {
        let identities = session.identities(group, options.cluster.as_deref());

        match options.cluster {
            Some(ref cluster) => {
                section.push_str(&format!("## {} Identities (cluster {})\n\n", group, cluster))
            }
            None => section.push_str(&format!("## {} Identities\n\n", group)),
        }

        if identities.is_empty() {
            section.push_str("No records.\n\n");
            continue;
        }

        section.push_str(&identity_table(group, &identities));
    }

    section
}

fn identity_table(group: RoleGroup, identities: &[&IdentityAggregate]) -> String {
    let (id_label, name_label) = match group {
        RoleGroup::Retail => (Field::AltId.label(), Field::AltName.label()),
        _ => ("LOGIN ID", "NAME"),
    };

    let mut table = String::new();
    table.push_str(&format!("| Cluster | {} | {} | Total |\n", id_label, name_label));
    table.push_str("|:---|:---|:---|---:|\n");

    for identity in identities {
        table.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            identity.cluster,
            display_or_dash(&identity.id),
            display_or_dash(&identity.name),
            fmt_number(identity.total)
        ));
    }

    let total: u64 = identities.iter().map(|a| a.total).sum();
    table.push_str(&format!("| **Total** | | | **{}** |\n\n", fmt_number(total)));

    table
}

/// Render the raw rows behind one retail identity.
pub fn render_retail_detail(id: &str, name: &str, rows: &[&Row]) -> String {
    let mut output = String::new();

    output.push_str(&format!("## Retail Detail: {} ({})\n\n", display_or_dash(name), display_or_dash(id)));

    if rows.is_empty() {
        output.push_str("No matching records.\n");
        return output;
    }

    let columns = [
        Field::LoginId,
        Field::UserName,
        Field::CustomerMdn,
        Field::CustomerIccid,
    ];

    output.push_str(&format!(
        "| # | {} |\n",
        columns.iter().map(|f| f.label()).collect::<Vec<_>>().join(" | ")
    ));
    output.push_str("|---:|:---|:---|:---|:---|\n");

    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<String> = columns
            .iter()
            .map(|f| display_or_dash(&f.read(row)).to_string())
            .collect();
        output.push_str(&format!("| {} | {} |\n", i + 1, cells.join(" | ")));
    }

    output.push_str(&format!("\n{} records\n", fmt_number(rows.len() as u64)));
    output
}

/// Render the dataset index, newest first.
pub fn render_listing(index: &DatasetIndex) -> String {
    if index.is_empty() {
        return "No datasets cached.\n".to_string();
    }

    let mut output = String::new();
    output.push_str("| Dataset | Records | Created | Storage | Remote |\n");
    output.push_str("|:---|---:|:---|:---|:---|\n");

    for entry in &index.entries {
        let badge = match entry.tier {
            Tier::Local => format!("💾 {}", entry.tier.badge()),
            Tier::Remote | Tier::Both => format!("☁️ {}", entry.tier.badge()),
        };
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            entry.name,
            fmt_number(entry.record_count as u64),
            entry.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            badge,
            entry.remote_url.as_deref().unwrap_or("-"),
        ));
    }

    output
}

/// Generate the report footer.
fn generate_footer() -> String {
    format!("---\n\n*Generated by clusterboard v{}*\n", env!("CARGO_PKG_VERSION"))
}

#[derive(Serialize)]
struct JsonReport<'a> {
    name: &'a str,
    record_count: usize,
    tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster_filter: Option<&'a str>,
    scorecard: Scorecard,
    groups: Vec<JsonGroup<'a>>,
}

#[derive(Serialize)]
struct JsonGroup<'a> {
    group: RoleGroup,
    total: u64,
    identities: Vec<&'a IdentityAggregate>,
}

/// Generate a JSON report.
pub fn generate_json_report(session: &DashboardSession, options: &ReportOptions) -> Result<String> {
    let groups = options
        .groups()
        .into_iter()
        .map(|group| {
            let identities = session.identities(group, options.cluster.as_deref());
            JsonGroup {
                group,
                total: identities.iter().map(|a| a.total).sum(),
                identities,
            }
        })
        .collect();

    let report = JsonReport {
        name: &session.name,
        record_count: session.record_count,
        tier: session.tier,
        remote_url: session.remote_url.as_deref(),
        cluster_filter: options.cluster.as_deref(),
        scorecard: session.scorecard(),
        groups,
    };

    serde_json::to_string_pretty(&report).map_err(Into::into)
}

/// Format an integer with `.` as the thousands separator.
pub fn fmt_number(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

/// Format a ratio as a percentage with two decimals.
pub fn fmt_percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
