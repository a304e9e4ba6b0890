use crate::normalize::{Branch, ClassType};
use crate::schema::EnrollmentRecord;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpi {
    pub student_count: usize,
    pub total_revenue: u64,
    /// Exactly 0 when there are no students.
    pub avg_revenue: f64,
}

impl Kpi {
    pub fn from_totals(student_count: usize, total_revenue: u64) -> Self {
        let avg_revenue = if student_count == 0 {
            0.0
        } else {
            total_revenue as f64 / student_count as f64
        };
        Self {
            student_count,
            total_revenue,
            avg_revenue,
        }
    }
}

/// Accepts owned records or references, so it composes with [`crate::filter_records`].
pub fn compute_kpi<R: Borrow<EnrollmentRecord>>(records: &[R]) -> Kpi {
    let total = records
        .iter()
        .map(|r| {
            let r: &EnrollmentRecord = r.borrow();
            r.amount
        })
        .sum();
    Kpi::from_totals(records.len(), total)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupKpi<K> {
    pub key: K,
    #[serde(flatten)]
    pub kpi: Kpi,
}

/// Buckets records by `key_fn` and reduces every bucket to a [`Kpi`]. Output is ordered by
/// key, whatever order the records arrived in.
pub fn group_kpis<R, K, F>(records: &[R], key_fn: F) -> Vec<GroupKpi<K>>
where
    R: Borrow<EnrollmentRecord>,
    K: Ord,
    F: Fn(&EnrollmentRecord) -> K,
{
    let mut buckets: BTreeMap<K, Vec<&EnrollmentRecord>> = BTreeMap::new();
    for record in records {
        let record: &EnrollmentRecord = record.borrow();
        buckets.entry(key_fn(record)).or_default().push(record);
    }

    buckets
        .into_iter()
        .map(|(key, items)| GroupKpi {
            key,
            kpi: compute_kpi(&items),
        })
        .collect()
}

pub fn group_by_branch<R: Borrow<EnrollmentRecord>>(records: &[R]) -> Vec<GroupKpi<Branch>> {
    group_kpis(records, |r| r.branch.clone())
}

pub fn group_by_class_type<R: Borrow<EnrollmentRecord>>(
    records: &[R],
) -> Vec<GroupKpi<ClassType>> {
    group_kpis(records, |r| r.class_type.clone())
}

/// `current` as a percentage of `target`; `None` when no target is set.
pub fn percent_of(current: f64, target: f64) -> Option<f64> {
    if target > 0.0 {
        Some(current / target * 100.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecordSource;

    fn record(branch: Branch, class_type: &str, amount: u64) -> EnrollmentRecord {
        EnrollmentRecord {
            id: None,
            student_name: "X".to_string(),
            branch,
            class_type: ClassType::normalize(class_type),
            contract_date: None,
            amount,
            source: RecordSource::Manual,
        }
    }

    #[test]
    fn test_empty_set_average_is_zero() {
        let kpi = compute_kpi::<EnrollmentRecord>(&[]);
        assert_eq!(kpi.student_count, 0);
        assert_eq!(kpi.total_revenue, 0);
        assert_eq!(kpi.avg_revenue, 0.0);
        assert!(kpi.avg_revenue.is_finite());
    }

    #[test]
    fn test_compute_kpi() {
        let records = vec![
            record(Branch::MefkureLgs, "7", 1000),
            record(Branch::MefkureLgs, "8", 2000),
            record(Branch::MefkureVip, "12", 4000),
        ];
        let kpi = compute_kpi(&records);
        assert_eq!(kpi.student_count, 3);
        assert_eq!(kpi.total_revenue, 7000);
        assert!((kpi.avg_revenue - 7000.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_grouping_is_order_independent() {
        let a = vec![
            record(Branch::MefkureVip, "12", 4000),
            record(Branch::MefkureLgs, "7", 1000),
            record(Branch::MefkureLgs, "07", 3000),
        ];
        let mut b = a.clone();
        b.reverse();

        let by_branch_a = group_by_branch(&a);
        assert_eq!(by_branch_a, group_by_branch(&b));
        assert_eq!(by_branch_a.len(), 2);
        assert_eq!(by_branch_a[0].key, Branch::MefkureLgs);
        assert_eq!(by_branch_a[0].kpi.student_count, 2);
        assert_eq!(by_branch_a[0].kpi.avg_revenue, 2000.0);

        let by_class = group_by_class_type(&a);
        assert_eq!(by_class.len(), 2);
        assert_eq!(by_class.iter().find(|g| g.key.as_str() == "7").unwrap().kpi.total_revenue, 4000);
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(45.0, 90.0), Some(50.0));
        assert_eq!(percent_of(45.0, 0.0), None);
    }
}
