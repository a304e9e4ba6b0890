use crate::normalize::{Branch, ClassType};
use crate::schema::EnrollmentRecord;
use crate::utils::last_day_of_month;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PeriodMode {
    /// January 1st up to today's month/day, in the requested year.
    Ytd,
    /// One calendar month.
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSpec {
    pub mode: PeriodMode,
    pub year: i32,
    /// 1 = January. Only read in `Month` mode.
    #[serde(default)]
    pub month: Option<u32>,
}

impl PeriodSpec {
    pub fn ytd(year: i32) -> Self {
        Self {
            mode: PeriodMode::Ytd,
            year,
            month: None,
        }
    }

    pub fn month(year: i32, month: u32) -> Self {
        Self {
            mode: PeriodMode::Month,
            year,
            month: Some(month),
        }
    }

    /// Inclusive `[start, end]` window, or `None` when the period selects nothing
    /// (month mode without a valid month).
    pub fn bounds(&self, today: NaiveDate) -> Option<(NaiveDateTime, NaiveDateTime)> {
        match self.mode {
            PeriodMode::Ytd => {
                let start = NaiveDate::from_ymd_opt(self.year, 1, 1)?.and_hms_opt(0, 0, 0)?;
                Some((start, end_of_day(ytd_cutoff(self.year, today)?)?))
            }
            PeriodMode::Month => {
                let month = self.month.filter(|m| (1..=12).contains(m))?;
                let start = NaiveDate::from_ymd_opt(self.year, month, 1)?.and_hms_opt(0, 0, 0)?;
                Some((start, end_of_day(last_day_of_month(self.year, month))?))
            }
        }
    }
}

/// Today's month/day transplanted into `year`. Every year is truncated to the same elapsed
/// point so year-over-year numbers compare like for like. Feb 29 becomes Feb 28 in
/// non-leap years.
pub fn ytd_cutoff(year: i32, today: NaiveDate) -> Option<NaiveDate> {
    let month = today.month();
    let last = last_day_of_month(year, month).day();
    NaiveDate::from_ymd_opt(year, month, today.day().min(last))
}

fn end_of_day(date: NaiveDate) -> Option<NaiveDateTime> {
    date.and_hms_milli_opt(23, 59, 59, 999)
}

/// Period plus the optional branch and class selections of a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub period: PeriodSpec,
    #[serde(default)]
    pub branch: Option<Branch>,
    #[serde(default)]
    pub class_types: Vec<ClassType>,
}

impl RecordFilter {
    pub fn new(period: PeriodSpec) -> Self {
        Self {
            period,
            branch: None,
            class_types: Vec::new(),
        }
    }

    /// The label goes through the same canonicalisation as stored records. A blank label
    /// means every branch.
    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = if branch.trim().is_empty() {
            None
        } else {
            Some(Branch::canonicalize(branch))
        };
        self
    }

    pub fn with_class_types<I, S>(mut self, class_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.class_types = class_types
            .into_iter()
            .map(|c| ClassType::normalize(c.as_ref()))
            .collect();
        self
    }
}

/// Restricts `records` to the filter window: year equality, then the period bounds, then
/// branch and class membership. Records without a date never pass.
pub fn filter_records<'a>(
    records: &'a [EnrollmentRecord],
    filter: &RecordFilter,
    today: NaiveDate,
) -> Vec<&'a EnrollmentRecord> {
    let Some((start, end)) = filter.period.bounds(today) else {
        debug!("Period {:?} selects nothing", filter.period);
        return Vec::new();
    };

    let rows: Vec<&EnrollmentRecord> = records
        .iter()
        .filter(|r| {
            r.contract_date
                .is_some_and(|d| d.year() == filter.period.year && d >= start && d <= end)
        })
        .filter(|r| filter.branch.as_ref().map_or(true, |b| &r.branch == b))
        .filter(|r| filter.class_types.is_empty() || filter.class_types.contains(&r.class_type))
        .collect();

    debug!(
        "Filter kept {} of {} records ({} .. {})",
        rows.len(),
        records.len(),
        start,
        end
    );
    rows
}
