use crate::compare::Trend;
use crate::error::Result;
use crate::estimator::FinanceProjection;
use crate::schema::{FinanceCategory, FinanceInput, FinanceUnit, Income};
use crate::seasonality::SeasonalWeights;
use crate::store::{
    from_document, get_typed, to_document, DocumentStore, WriteOp, FINANCE_INPUTS_COLLECTION,
    FINANCE_SNAPSHOTS_COLLECTION,
};
use chrono::NaiveDateTime;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SNAPSHOT_METHOD: &str = "seasonal_v2";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub year: i32,
    pub unit: FinanceUnit,
    pub category: FinanceCategory,
}

impl SnapshotKey {
    pub fn new(year: i32, unit: impl Into<FinanceUnit>, category: FinanceCategory) -> Self {
        Self {
            year,
            unit: unit.into(),
            category,
        }
    }

    /// Same key, same document: repeated saves overwrite.
    pub fn document_id(&self) -> String {
        format!("{}_{}_{}", self.year, self.unit, self.category.label())
    }
}

/// Derived projection persisted after every save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceSnapshot {
    pub year: i32,
    pub unit: FinanceUnit,
    pub category: FinanceCategory,
    pub revenue_total: u64,
    pub expense_run_rate: u64,
    pub expense_estimated: u64,
    pub expense_real_so_far: u64,
    pub method: String,
    pub filled_months: Vec<usize>,
    pub run_rate_profit: i64,
    pub run_rate_margin_pct: f64,
    pub profit_estimate: i64,
    pub profit_margin_pct: f64,
    pub updated_at: NaiveDateTime,
}

impl FinanceSnapshot {
    pub fn build(
        key: &SnapshotKey,
        input: &FinanceInput,
        weights: &SeasonalWeights,
        now: NaiveDateTime,
    ) -> Self {
        let projection = FinanceProjection::compute(input, weights);
        Self {
            year: key.year,
            unit: key.unit.clone(),
            category: key.category,
            revenue_total: projection.revenue_total,
            expense_run_rate: projection.run_rate.yearly_total,
            expense_estimated: projection.seasonal.yearly_total,
            expense_real_so_far: projection.expense_real_so_far,
            method: SNAPSHOT_METHOD.to_string(),
            filled_months: projection.filled_months,
            run_rate_profit: projection.run_rate_profit.profit,
            run_rate_margin_pct: projection.run_rate_profit.margin_pct,
            profit_estimate: projection.seasonal_profit.profit,
            profit_margin_pct: projection.seasonal_profit.margin_pct,
            updated_at: now,
        }
    }

    /// Realised spend per entered month; 0 before anything is entered.
    pub fn avg_monthly_expense(&self) -> f64 {
        if self.filled_months.is_empty() {
            0.0
        } else {
            self.expense_real_so_far as f64 / self.filled_months.len() as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredInput {
    year: i32,
    unit: FinanceUnit,
    category: FinanceCategory,
    income: Income,
    expenses: [u64; 12],
    updated_at: NaiveDateTime,
}

/// Writes the raw input and its snapshot in one batch, both merge-upserted under
/// [`SnapshotKey::document_id`].
pub fn save_snapshot<S>(
    store: &mut S,
    key: &SnapshotKey,
    input: &FinanceInput,
    weights: &SeasonalWeights,
    now: NaiveDateTime,
) -> Result<FinanceSnapshot>
where
    S: DocumentStore + ?Sized,
{
    let snapshot = FinanceSnapshot::build(key, input, weights, now);
    let raw = StoredInput {
        year: key.year,
        unit: key.unit.clone(),
        category: key.category,
        income: input.income,
        expenses: input.expenses,
        updated_at: now,
    };

    let id = key.document_id();
    store.commit_batch(vec![
        WriteOp::upsert(FINANCE_INPUTS_COLLECTION, id.clone(), to_document(&raw)?),
        WriteOp::upsert(FINANCE_SNAPSHOTS_COLLECTION, id.clone(), to_document(&snapshot)?),
    ])?;

    info!(
        "Saved finance snapshot {} (seasonal {} / run-rate {})",
        id, snapshot.expense_estimated, snapshot.expense_run_rate
    );
    Ok(snapshot)
}

pub fn load_snapshot<S>(store: &S, key: &SnapshotKey) -> Result<Option<FinanceSnapshot>>
where
    S: DocumentStore + ?Sized,
{
    get_typed(store, FINANCE_SNAPSHOTS_COLLECTION, &key.document_id())
}

pub fn load_input<S>(store: &S, key: &SnapshotKey) -> Result<Option<FinanceInput>>
where
    S: DocumentStore + ?Sized,
{
    let stored: Option<StoredInput> =
        get_typed(store, FINANCE_INPUTS_COLLECTION, &key.document_id())?;
    Ok(stored.map(|s| FinanceInput {
        income: s.income,
        expenses: s.expenses,
    }))
}

/// Snapshots of one year, ordered by unit then category.
pub fn list_snapshots<S>(store: &S, year: i32) -> Result<Vec<FinanceSnapshot>>
where
    S: DocumentStore + ?Sized,
{
    let mut snapshots = Vec::new();
    for (id, doc) in store.find_by_field(FINANCE_SNAPSHOTS_COLLECTION, "year", &Value::from(year))? {
        match from_document::<FinanceSnapshot>(FINANCE_SNAPSHOTS_COLLECTION, &id, doc) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => warn!("Skipping snapshot: {}", e),
        }
    }
    snapshots.sort_by(|a, b| (&a.unit, a.category).cmp(&(&b.unit, b.category)));
    Ok(snapshots)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotComparison {
    pub revenue_delta: i64,
    pub revenue_trend: Trend,
    pub previous_avg_monthly_expense: f64,
    pub current_avg_monthly_expense: f64,
    pub expense_trend: Trend,
}

pub fn compare_snapshots(previous: &FinanceSnapshot, current: &FinanceSnapshot) -> SnapshotComparison {
    let prev_avg = previous.avg_monthly_expense();
    let curr_avg = current.avg_monthly_expense();
    SnapshotComparison {
        revenue_delta: current.revenue_total as i64 - previous.revenue_total as i64,
        revenue_trend: Trend::between(previous.revenue_total as f64, current.revenue_total as f64),
        previous_avg_monthly_expense: prev_avg,
        current_avg_monthly_expense: curr_avg,
        expense_trend: Trend::between(prev_avg, curr_avg),
    }
}
