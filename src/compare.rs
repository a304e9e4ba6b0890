//! Year-over-year views: KPI comparison at a shared cutoff date and the new/renewing split.

use crate::kpi::{compute_kpi, group_by_branch, Kpi};
use crate::normalize::{fold_turkish, Branch};
use crate::period::{filter_records, PeriodSpec, RecordFilter};
use crate::schema::EnrollmentRecord;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    /// Percentage change from the previous value; `None` when the previous value is zero.
    pub pct: Option<f64>,
    pub direction: TrendDirection,
}

impl Trend {
    pub fn between(previous: f64, current: f64) -> Self {
        if previous == 0.0 {
            return Self {
                pct: None,
                direction: TrendDirection::Flat,
            };
        }
        let pct = (current - previous) / previous * 100.0;
        let direction = if pct > 0.0 {
            TrendDirection::Up
        } else if pct < 0.0 {
            TrendDirection::Down
        } else {
            TrendDirection::Flat
        };
        Self {
            pct: Some(pct),
            direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchComparison {
    pub branch: Branch,
    pub previous: Kpi,
    pub current: Kpi,
    pub student_trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearComparison {
    pub previous_year: i32,
    pub current_year: i32,
    /// Both years are cut at this month/day.
    pub cutoff: NaiveDate,
    pub previous: Kpi,
    pub current: Kpi,
    pub student_trend: Trend,
    pub revenue_trend: Trend,
    pub avg_trend: Trend,
    /// Union of the branches seen in either year, ordered by branch.
    pub branches: Vec<BranchComparison>,
}

/// Compares the year of `cutoff` with the year before, each from January 1st up to the
/// cutoff's month/day.
pub fn compare_years(records: &[EnrollmentRecord], cutoff: NaiveDate) -> YearComparison {
    let current_year = cutoff.year();
    let previous_year = current_year - 1;

    let previous_rows = filter_records(
        records,
        &RecordFilter::new(PeriodSpec::ytd(previous_year)),
        cutoff,
    );
    let current_rows = filter_records(
        records,
        &RecordFilter::new(PeriodSpec::ytd(current_year)),
        cutoff,
    );

    let previous = compute_kpi(&previous_rows);
    let current = compute_kpi(&current_rows);

    let mut merged: BTreeMap<Branch, (Kpi, Kpi)> = BTreeMap::new();
    for group in group_by_branch(&previous_rows) {
        merged.entry(group.key).or_default().0 = group.kpi;
    }
    for group in group_by_branch(&current_rows) {
        merged.entry(group.key).or_default().1 = group.kpi;
    }

    let branches = merged
        .into_iter()
        .map(|(branch, (prev, curr))| BranchComparison {
            branch,
            previous: prev,
            current: curr,
            student_trend: Trend::between(prev.student_count as f64, curr.student_count as f64),
        })
        .collect();

    YearComparison {
        previous_year,
        current_year,
        cutoff,
        previous,
        current,
        student_trend: Trend::between(previous.student_count as f64, current.student_count as f64),
        revenue_trend: Trend::between(previous.total_revenue as f64, current.total_revenue as f64),
        avg_trend: Trend::between(previous.avg_revenue, current.avg_revenue),
        branches,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnrollmentMix {
    /// Names not seen in the previous year.
    pub new_students: usize,
    /// Names that also enrolled in the previous year.
    pub renewing_students: usize,
}

/// Splits `current` into new and renewing students by name presence in `previous`.
/// Names are compared trimmed and case-folded, since import paths disagree on casing.
pub fn enrollment_mix<P, C>(previous: &[P], current: &[C]) -> EnrollmentMix
where
    P: Borrow<EnrollmentRecord>,
    C: Borrow<EnrollmentRecord>,
{
    let known: HashSet<String> = previous
        .iter()
        .map(|r| {
            let r: &EnrollmentRecord = r.borrow();
            name_key(&r.student_name)
        })
        .filter(|k| !k.is_empty())
        .collect();

    let mut mix = EnrollmentMix::default();
    for record in current {
        let record: &EnrollmentRecord = record.borrow();
        let key = name_key(&record.student_name);
        if key.is_empty() {
            continue;
        }
        if known.contains(&key) {
            mix.renewing_students += 1;
        } else {
            mix.new_students += 1;
        }
    }
    mix
}

fn name_key(name: &str) -> String {
    fold_turkish(name.trim())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
