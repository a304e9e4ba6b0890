//! Full-year expense projections from a partially filled fiscal year.
//!
//! Two models share the same 12-slot input (index 0 = August, 0 = not entered):
//! * run-rate: the average of the entered months times twelve,
//! * seasonal: entered months are kept as-is, the rest are predicted from a base rate
//!   scaled by each month's [`SeasonalWeights`] entry.

use crate::schema::FinanceInput;
use crate::seasonality::SeasonalWeights;
use crate::utils::{calendar_month_for_fiscal_index, FISCAL_MONTH_NAMES};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRateEstimate {
    pub filled_months: usize,
    pub total_entered: u64,
    pub avg_monthly: f64,
    pub yearly_total: u64,
}

pub fn estimate_run_rate(expenses: &[u64; 12]) -> RunRateEstimate {
    let filled: Vec<u64> = expenses.iter().copied().filter(|&v| v > 0).collect();
    let total_entered: u64 = filled.iter().sum();
    let avg_monthly = if filled.is_empty() {
        0.0
    } else {
        total_entered as f64 / filled.len() as f64
    };

    RunRateEstimate {
        filled_months: filled.len(),
        total_entered,
        avg_monthly,
        yearly_total: (avg_monthly * 12.0).round() as u64,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonalEstimate {
    pub yearly_total: u64,
    pub actual_months: usize,
    /// Expense per unit of weight, derived from the entered months.
    pub base: f64,
    pub predicted_by_month: [u64; 12],
}

struct MonthSlot {
    weight: f64,
    actual: Option<u64>,
}

pub fn estimate_seasonal(expenses: &[u64; 12], weights: &SeasonalWeights) -> SeasonalEstimate {
    let slots: Vec<MonthSlot> = expenses
        .iter()
        .enumerate()
        .map(|(i, &value)| MonthSlot {
            weight: weights.weight(i),
            actual: (value > 0).then_some(value),
        })
        .collect();

    let (sum_actual, sum_weight, actual_months) = slots
        .iter()
        .filter_map(|slot| slot.actual.map(|v| (v, slot.weight)))
        .fold((0u64, 0.0f64, 0usize), |(s, w, n), (v, weight)| {
            (s + v, w + weight, n + 1)
        });

    if actual_months == 0 || sum_weight <= 0.0 {
        return SeasonalEstimate::default();
    }

    let base = sum_actual as f64 / sum_weight;

    let mut predicted_by_month = [0u64; 12];
    for (predicted, slot) in predicted_by_month.iter_mut().zip(&slots) {
        *predicted = match slot.actual {
            Some(value) => value,
            None => (base * slot.weight).round() as u64,
        };
    }

    SeasonalEstimate {
        yearly_total: predicted_by_month.iter().sum(),
        actual_months,
        base,
        predicted_by_month,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitModel {
    pub expense_total: u64,
    pub profit: i64,
    /// 0 when there is no revenue.
    pub margin_pct: f64,
}

impl ProfitModel {
    pub fn new(revenue: u64, expense_total: u64) -> Self {
        let profit = revenue as i64 - expense_total as i64;
        Self {
            expense_total,
            profit,
            margin_pct: margin_pct(profit as f64, revenue),
        }
    }
}

fn margin_pct(profit: f64, revenue: u64) -> f64 {
    if revenue == 0 {
        0.0
    } else {
        profit / revenue as f64 * 100.0
    }
}

/// Margin outlook from revenue against the average entered month, as shown next to the
/// entry form. All three are `None` when no revenue is entered.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarginScenarios {
    pub pessimistic: Option<f64>,
    pub realistic: Option<f64>,
    pub optimistic: Option<f64>,
}

impl MarginScenarios {
    fn from_monthly_average(revenue: u64, avg_monthly_expense: f64) -> Self {
        if revenue == 0 {
            return Self::default();
        }
        let base = margin_pct(revenue as f64 - avg_monthly_expense, revenue);
        Self {
            pessimistic: Some(base * 0.7),
            realistic: Some(base),
            optimistic: Some(base * 1.15),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceProjection {
    pub revenue_total: u64,
    pub expense_real_so_far: u64,
    /// Fiscal indices (0 = August) of the months with an entered expense.
    pub filled_months: Vec<usize>,
    pub run_rate: RunRateEstimate,
    pub run_rate_profit: ProfitModel,
    pub seasonal: SeasonalEstimate,
    pub seasonal_profit: ProfitModel,
    pub scenarios: MarginScenarios,
}

impl FinanceProjection {
    pub fn compute(input: &FinanceInput, weights: &SeasonalWeights) -> Self {
        let revenue_total = input.income.total();
        let run_rate = estimate_run_rate(&input.expenses);
        let seasonal = estimate_seasonal(&input.expenses, weights);

        let filled_months = input
            .expenses
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v > 0)
            .map(|(i, _)| i)
            .collect();

        Self {
            revenue_total,
            expense_real_so_far: run_rate.total_entered,
            filled_months,
            run_rate_profit: ProfitModel::new(revenue_total, run_rate.yearly_total),
            seasonal_profit: ProfitModel::new(revenue_total, seasonal.yearly_total),
            scenarios: MarginScenarios::from_monthly_average(revenue_total, run_rate.avg_monthly),
            run_rate,
            seasonal,
        }
    }
}

/// One row of the month-by-month finance table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthLine {
    pub name: String,
    /// 1 = January.
    pub calendar_month: u32,
    /// The entered amount, `None` for months still open.
    pub actual: Option<u64>,
    /// Entered amount, or the seasonal prediction for open months.
    pub predicted: u64,
}

impl FinanceProjection {
    /// Twelve lines in fiscal order, August first.
    pub fn monthly_breakdown(&self) -> Vec<MonthLine> {
        self.seasonal
            .predicted_by_month
            .iter()
            .enumerate()
            .map(|(i, &predicted)| MonthLine {
                name: FISCAL_MONTH_NAMES[i].to_string(),
                calendar_month: calendar_month_for_fiscal_index(i),
                actual: self.filled_months.contains(&i).then_some(predicted),
                predicted,
            })
            .collect()
    }
}

/// Slot-wise sum of several inputs, e.g. all units into the GENERAL aggregate.
pub fn combine_inputs<'a, I>(inputs: I) -> FinanceInput
where
    I: IntoIterator<Item = &'a FinanceInput>,
{
    let mut combined = FinanceInput::default();
    for input in inputs {
        combined.income.student += input.income.student;
        combined.income.food += input.income.food;
        combined.income.other += input.income.other;
        for (sum, value) in combined.expenses.iter_mut().zip(input.expenses.iter()) {
            *sum += value;
        }
    }
    combined
}
