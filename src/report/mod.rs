//! Dashboard rendering.
//!
//! Markdown for terminals and files, JSON for downstream tooling.

pub mod generator;

pub use generator::{
    generate_json_report, generate_markdown_report, render_listing, render_retail_detail,
    ReportOptions,
};
