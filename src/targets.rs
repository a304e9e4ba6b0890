//! Yearly and monthly enrollment targets per branch, and how the realised records measure
//! up against them.

use crate::error::{AnalyticsError, Result};
use crate::kpi::{compute_kpi, percent_of, Kpi};
use crate::normalize::Branch;
use crate::schema::EnrollmentRecord;
use crate::store::{get_typed, put_typed, DocumentStore, TARGETS_COLLECTION};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keeps only the digits of a typed amount, so "10.000" and "₺10,000" both read as 10000.
/// Anything without digits, or too large to represent, is 0.
pub fn clamp_number(raw: &str) -> u64 {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetNums {
    pub student: u64,
    pub revenue: u64,
    pub avg: u64,
}

impl TargetNums {
    pub fn from_input(student: &str, revenue: &str, avg: &str) -> Self {
        Self {
            student: clamp_number(student),
            revenue: clamp_number(revenue),
            avg: clamp_number(avg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetTotals {
    pub student: u64,
    pub revenue: u64,
    /// Revenue per targeted student, rounded; not the sum of the per-branch `avg` fields.
    pub avg: u64,
}

impl TargetTotals {
    fn sum<'a>(nums: impl Iterator<Item = &'a TargetNums>) -> Self {
        let (student, revenue) = nums.fold((0u64, 0u64), |(s, r), n| (s + n.student, r + n.revenue));
        let avg = if student > 0 {
            (revenue as f64 / student as f64).round() as u64
        } else {
            0
        };
        Self {
            student,
            revenue,
            avg,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetWindow {
    Year,
    /// Calendar month, 1 = January.
    Month(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttainmentStatus {
    NoTarget,
    OnTrack,
    AtRisk,
    Behind,
}

impl AttainmentStatus {
    pub fn from_pct(pct: Option<f64>) -> Self {
        match pct {
            None => AttainmentStatus::NoTarget,
            Some(p) if p >= 90.0 => AttainmentStatus::OnTrack,
            Some(p) if p >= 60.0 => AttainmentStatus::AtRisk,
            Some(_) => AttainmentStatus::Behind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricAttainment {
    pub realized: f64,
    pub target: u64,
    pub pct: Option<f64>,
    pub status: AttainmentStatus,
}

impl MetricAttainment {
    fn new(realized: f64, target: u64) -> Self {
        let pct = percent_of(realized, target as f64);
        Self {
            realized,
            target,
            pct,
            status: AttainmentStatus::from_pct(pct),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attainment {
    pub window: TargetWindow,
    pub realized: Kpi,
    pub target: TargetTotals,
    pub student: MetricAttainment,
    pub revenue: MetricAttainment,
    pub avg: MetricAttainment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetsDoc {
    pub year: i32,
    #[serde(default)]
    pub monthly: BTreeMap<u32, BTreeMap<Branch, TargetNums>>,
    #[serde(default)]
    pub yearly: BTreeMap<Branch, TargetNums>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}

/// Months of the current year that have not started yet, and every month of a future
/// year, cannot receive monthly targets.
pub fn is_month_locked(year: i32, month: u32, today: NaiveDate) -> bool {
    if year > today.year() {
        return true;
    }
    if year < today.year() {
        return false;
    }
    month > today.month()
}

impl TargetsDoc {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            monthly: BTreeMap::new(),
            yearly: BTreeMap::new(),
            updated_at: None,
        }
    }

    pub fn set_yearly(&mut self, branch: Branch, nums: TargetNums) {
        self.yearly.insert(branch, nums);
    }

    pub fn set_monthly(
        &mut self,
        month: u32,
        branch: Branch,
        nums: TargetNums,
        today: NaiveDate,
    ) -> Result<()> {
        if !(1..=12).contains(&month) {
            return Err(AnalyticsError::InvalidCalendarMonth(month));
        }
        if is_month_locked(self.year, month, today) {
            return Err(AnalyticsError::MonthLocked {
                year: self.year,
                month,
            });
        }
        self.monthly.entry(month).or_default().insert(branch, nums);
        Ok(())
    }

    pub fn yearly_totals(&self, branches: &[Branch]) -> TargetTotals {
        TargetTotals::sum(branches.iter().filter_map(|b| self.yearly.get(b)))
    }

    pub fn monthly_totals(&self, month: u32, branches: &[Branch]) -> TargetTotals {
        match self.monthly.get(&month) {
            Some(targets) => TargetTotals::sum(branches.iter().filter_map(|b| targets.get(b))),
            None => TargetTotals::default(),
        }
    }

    pub fn totals(&self, window: TargetWindow, branches: &[Branch]) -> TargetTotals {
        match window {
            TargetWindow::Year => self.yearly_totals(branches),
            TargetWindow::Month(month) => self.monthly_totals(month, branches),
        }
    }

    /// Realised KPI of `branches` within the window of this document's year against the
    /// summed targets of the same branches.
    pub fn evaluate(
        &self,
        records: &[EnrollmentRecord],
        branches: &[Branch],
        window: TargetWindow,
    ) -> Attainment {
        let rows: Vec<&EnrollmentRecord> = records
            .iter()
            .filter(|r| branches.contains(&r.branch))
            .filter(|r| match r.contract_date {
                Some(date) if date.year() == self.year => match window {
                    TargetWindow::Year => true,
                    TargetWindow::Month(month) => date.month() == month,
                },
                _ => false,
            })
            .collect();

        let realized = compute_kpi(&rows);
        let target = self.totals(window, branches);

        Attainment {
            window,
            realized,
            target,
            student: MetricAttainment::new(realized.student_count as f64, target.student),
            revenue: MetricAttainment::new(realized.total_revenue as f64, target.revenue),
            avg: MetricAttainment::new(realized.avg_revenue.round(), target.avg),
        }
    }
}

pub fn save_targets<S>(store: &mut S, doc: &mut TargetsDoc, now: NaiveDateTime) -> Result<()>
where
    S: DocumentStore + ?Sized,
{
    doc.updated_at = Some(now);
    put_typed(store, TARGETS_COLLECTION, &doc.year.to_string(), doc)?;
    info!("Saved targets for {}", doc.year);
    Ok(())
}

/// Absent documents yield empty targets for the year.
pub fn load_targets<S>(store: &S, year: i32) -> Result<TargetsDoc>
where
    S: DocumentStore + ?Sized,
{
    Ok(get_typed(store, TARGETS_COLLECTION, &year.to_string())?.unwrap_or_else(|| TargetsDoc::new(year)))
}
