//! Structured SLA record and post-processing of the model's six-line answer.
//!
//! The extraction prompt asks for one answer per line. Two parse policies
//! turn that raw text into an [`SlaRecord`]:
//!
//! - [`ParsePolicy::AllOrNothing`] (default): blank lines are dropped; with
//!   fewer than six remaining lines every field takes its sentinel, even the
//!   ones the model did answer.
//! - [`ParsePolicy::PerLine`]: each field reads its own line position and
//!   falls back to its sentinel alone when that line is missing or blank.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sentinel for unanswered string fields.
pub const UNKNOWN_ANSWER: &str = "I don't know.";
pub const UNKNOWN_SYSTEM: &str = "Unknown System";
pub const NO_METRICS: &str = "No metrics found";
pub const NO_PAGE_NUMBER: &str = "No page number found";

/// Number of answer lines the extraction prompt asks for.
pub const SLA_FIELD_COUNT: usize = 6;

/// How raw model output is mapped onto SLA fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePolicy {
    #[default]
    AllOrNothing,
    PerLine,
}

/// Structured answer to the six SLA questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaRecord {
    #[serde(rename = "SLA Name")]
    pub sla_name: String,
    #[serde(rename = "Parties Involved")]
    pub parties_involved: String,
    #[serde(rename = "System Concerned")]
    pub system_concerned: Vec<String>,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Associated Metrics")]
    pub associated_metrics: Vec<String>,
    #[serde(rename = "Page Number")]
    pub page_number: Vec<String>,
}

impl Default for SlaRecord {
    /// Every field at its sentinel.
    fn default() -> Self {
        Self {
            sla_name: UNKNOWN_ANSWER.to_string(),
            parties_involved: UNKNOWN_ANSWER.to_string(),
            system_concerned: vec![UNKNOWN_SYSTEM.to_string()],
            description: UNKNOWN_ANSWER.to_string(),
            associated_metrics: vec![NO_METRICS.to_string()],
            page_number: vec![NO_PAGE_NUMBER.to_string()],
        }
    }
}

impl SlaRecord {
    /// Pretty JSON with four-space indentation.
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        // serde_json only ever writes valid UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// File name for the downloadable SLA artifact of a source document.
pub fn artifact_file_name(source_name: &str) -> String {
    format!("{}_sla_info.json", source_name)
}

/// Parse raw model output with the given policy.
pub fn parse_sla_answer(raw: &str, policy: ParsePolicy) -> SlaRecord {
    match policy {
        ParsePolicy::AllOrNothing => parse_all_or_nothing(raw),
        ParsePolicy::PerLine => parse_per_line(raw),
    }
}

fn parse_all_or_nothing(raw: &str) -> SlaRecord {
    let lines: Vec<&str> = raw
        .trim()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if lines.len() < SLA_FIELD_COUNT {
        return SlaRecord::default();
    }

    SlaRecord {
        sla_name: lines[0].to_string(),
        parties_involved: lines[1].to_string(),
        system_concerned: split_field(lines[2]),
        description: lines[3].to_string(),
        associated_metrics: split_field(lines[4]),
        page_number: split_field(lines[5]),
    }
}

fn parse_per_line(raw: &str) -> SlaRecord {
    let lines: Vec<&str> = raw.trim().lines().map(str::trim).collect();
    let line = |i: usize| lines.get(i).copied().filter(|l| !l.is_empty());
    let defaults = SlaRecord::default();

    SlaRecord {
        sla_name: line(0).map(str::to_string).unwrap_or(defaults.sla_name),
        parties_involved: line(1)
            .map(str::to_string)
            .unwrap_or(defaults.parties_involved),
        system_concerned: line(2).map(split_field).unwrap_or(defaults.system_concerned),
        description: line(3).map(str::to_string).unwrap_or(defaults.description),
        associated_metrics: line(4)
            .map(split_field)
            .unwrap_or(defaults.associated_metrics),
        page_number: line(5).map(split_field).unwrap_or(defaults.page_number),
    }
}

/// List fields keep any newline structure inside the answer.
fn split_field(line: &str) -> Vec<String> {
    line.split('\n').map(str::to_string).collect()
}
