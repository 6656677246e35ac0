use std::fmt::Write as _;

use client_core::WorkingSet;
use shared::protocol::size_kb;

#[derive(Debug, Clone, PartialEq)]
pub enum RowStatus {
    Pending,
    Valid,
    Invalid(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub name: String,
    pub size_kb: f64,
    pub status: RowStatus,
}

/// One row per selected file, in selection order. Files without an outcome
/// show their local size and a pending status.
pub fn rows(set: &WorkingSet) -> Vec<ReportRow> {
    set.files()
        .iter()
        .map(|file| match set.outcome(file.id) {
            Some(outcome) => ReportRow {
                name: file.name.clone(),
                size_kb: outcome.size_kb,
                status: if outcome.is_valid {
                    RowStatus::Valid
                } else {
                    RowStatus::Invalid(outcome.error.clone())
                },
            },
            None => ReportRow {
                name: file.name.clone(),
                size_kb: size_kb(file.size_bytes),
                status: RowStatus::Pending,
            },
        })
        .collect()
}

fn status_label(status: &RowStatus) -> String {
    match status {
        RowStatus::Pending => "pending".to_string(),
        RowStatus::Valid => "valid".to_string(),
        RowStatus::Invalid(Some(reason)) => format!("invalid ({reason})"),
        RowStatus::Invalid(None) => "invalid".to_string(),
    }
}

pub fn render(rows: &[ReportRow], total_size_bytes: u64) -> String {
    let name_width = rows
        .iter()
        .map(|row| row.name.chars().count())
        .chain(std::iter::once("file".len()))
        .max()
        .unwrap_or_default();

    let mut out = String::new();
    let _ = writeln!(out, "{:<name_width$}  {:>10}  status", "file", "size (KB)");
    for row in rows {
        let _ = writeln!(
            out,
            "{:<name_width$}  {:>10.1}  {}",
            row.name,
            row.size_kb,
            status_label(&row.status)
        );
    }

    let valid = rows
        .iter()
        .filter(|row| row.status == RowStatus::Valid)
        .count();
    let _ = writeln!(
        out,
        "{} file(s), {valid} valid, total {:.1} KB",
        rows.len(),
        size_kb(total_size_bytes)
    );
    out
}
