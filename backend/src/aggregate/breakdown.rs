//! Death counts by category for the dashboard bar and pie charts.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::{DeathRecord, YearSelection};

/// Label and number of deaths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub label: String,
    pub count: u64,
}

/// Headline counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    /// Every death record loaded
    pub total_records: usize,
    /// Records left after the active filter
    pub filtered_records: usize,
}

/// Count rows per label, largest first; ties ordered by label.
fn count_by<F>(rows: &[&DeathRecord], label: F) -> Vec<CategoryCount>
where
    F: Fn(&DeathRecord) -> &str,
{
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for row in rows {
        *counts.entry(label(*row)).or_insert(0) += 1;
    }

    let mut out: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(label, count)| CategoryCount {
            label: label.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    out
}

pub fn by_municipality(rows: &[&DeathRecord]) -> Vec<CategoryCount> {
    count_by(rows, |r| r.municipality.as_str())
}

pub fn by_age_group(rows: &[&DeathRecord]) -> Vec<CategoryCount> {
    count_by(rows, |r| r.age_group.as_str())
}

pub fn by_marital_status(rows: &[&DeathRecord]) -> Vec<CategoryCount> {
    count_by(rows, |r| r.marital_status.as_str())
}

/// `"<base>[ en <department>] (<years>)"`.
pub fn chart_title(base: &str, department: Option<&str>, years: &YearSelection) -> String {
    let mut title = base.to_string();
    if let Some(name) = department {
        title.push_str(" en ");
        title.push_str(name);
    }
    title.push_str(&format!(" ({})", years.label()));
    title
}
