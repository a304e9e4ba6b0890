use crate::normalize::{Branch, ClassType};
use crate::schema::{EnrollmentRecord, UserProfile};
use crate::scoping::{AccessPolicy, Scope};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const UNSPECIFIED_CLASS: &str = "Belirsiz";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub branch: Branch,
    pub class_type: ClassType,
    pub daily: usize,
    /// Enrollments of the report year up to and including the report date.
    pub overall: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportGroup {
    pub label: String,
    pub daily_total: usize,
    pub overall_total: usize,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub grand_daily: usize,
    pub grand_overall: usize,
    pub groups: Vec<ReportGroup>,
}

/// Per-branch, per-class enrollment counts for `date` and for its year so far. Admins get
/// one group per branch; everybody else gets a single group named after their scope.
pub fn daily_enrollment_report(
    records: &[EnrollmentRecord],
    policy: &AccessPolicy,
    user: &UserProfile,
    date: NaiveDate,
) -> DailyReport {
    let scope = policy.scope_for(user);
    let scope_label = match &scope {
        Scope::Limited { label, .. } => label.clone(),
        _ => user.branch_id.trim().to_string(),
    };

    let mut groups: BTreeMap<String, BTreeMap<(Branch, ClassType), (usize, usize)>> =
        BTreeMap::new();

    for record in records {
        let Some(contract_date) = record.contract_date.map(|d| d.date()) else {
            continue;
        };
        if contract_date.year() != date.year() || contract_date > date {
            continue;
        }
        if !scope.allows_branch(&record.branch) {
            continue;
        }

        let label = match &scope {
            Scope::All => record.branch.to_string(),
            _ => scope_label.clone(),
        };
        let class_type = if record.class_type.is_empty() {
            ClassType::normalize(UNSPECIFIED_CLASS)
        } else {
            record.class_type.clone()
        };

        let counts = groups
            .entry(label)
            .or_default()
            .entry((record.branch.clone(), class_type))
            .or_default();
        counts.1 += 1;
        if contract_date == date {
            counts.0 += 1;
        }
    }

    let mut groups: Vec<ReportGroup> = groups
        .into_iter()
        .map(|(label, cells)| {
            let mut rows: Vec<ReportRow> = cells
                .into_iter()
                .map(|((branch, class_type), (daily, overall))| ReportRow {
                    branch,
                    class_type,
                    daily,
                    overall,
                })
                .collect();
            rows.sort_by(|a, b| {
                a.branch
                    .name()
                    .cmp(b.branch.name())
                    .then_with(|| class_rank(&a.class_type).cmp(&class_rank(&b.class_type)))
            });
            ReportGroup {
                label,
                daily_total: rows.iter().map(|r| r.daily).sum(),
                overall_total: rows.iter().map(|r| r.overall).sum(),
                rows,
            }
        })
        .collect();

    // Stable sort keeps label order among groups with equal daily totals.
    groups.sort_by(|a, b| b.daily_total.cmp(&a.daily_total));

    DailyReport {
        date,
        grand_daily: groups.iter().map(|g| g.daily_total).sum(),
        grand_overall: groups.iter().map(|g| g.overall_total).sum(),
        groups,
    }
}

/// Numeric grades in order, everything else after them.
fn class_rank(class_type: &ClassType) -> u32 {
    class_type.grade().unwrap_or(99)
}
