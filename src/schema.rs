use crate::normalize::{Branch, ClassType};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// Typed in through the daily entry form.
    Manual,
    /// Written by a bulk spreadsheet import.
    ExcelImport,
    /// Part of the bundled prior-year dataset.
    Historical,
}

/// One student's contract. Built only through the ingestion boundary, so every field is
/// already in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub student_name: String,
    pub branch: Branch,
    pub class_type: ClassType,
    /// `None` when the source date could not be parsed.
    pub contract_date: Option<NaiveDateTime>,
    /// Whole Turkish lira.
    pub amount: u64,
    pub source: RecordSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Unauthorized,
}

impl Default for Role {
    fn default() -> Self {
        Self::Unauthorized
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    /// Coarse permission label, e.g. "Altınküre Lise" or "Mefkure YKS". Empty until an admin
    /// assigns one.
    #[serde(default)]
    pub branch_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FinanceCategory {
    #[serde(rename = "Toplam Giderler")]
    TotalExpenses,
    #[serde(rename = "Maaşlar")]
    Salaries,
    #[serde(rename = "SGK")]
    PayrollTax,
    #[serde(rename = "Ciro")]
    Revenue,
}

impl FinanceCategory {
    pub const ALL: [FinanceCategory; 4] = [
        FinanceCategory::TotalExpenses,
        FinanceCategory::Salaries,
        FinanceCategory::PayrollTax,
        FinanceCategory::Revenue,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FinanceCategory::TotalExpenses => "Toplam Giderler",
            FinanceCategory::Salaries => "Maaşlar",
            FinanceCategory::PayrollTax => "SGK",
            FinanceCategory::Revenue => "Ciro",
        }
    }
}

impl fmt::Display for FinanceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A finance plan owner: one branch, or the GENERAL roll-up of every branch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinanceUnit {
    Branch(Branch),
    General,
}

impl FinanceUnit {
    pub const GENERAL_LABEL: &'static str = "GENERAL";
}

impl fmt::Display for FinanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinanceUnit::Branch(branch) => f.write_str(branch.name()),
            FinanceUnit::General => f.write_str(Self::GENERAL_LABEL),
        }
    }
}

impl From<String> for FinanceUnit {
    fn from(raw: String) -> Self {
        if raw.trim().eq_ignore_ascii_case(Self::GENERAL_LABEL) {
            FinanceUnit::General
        } else {
            FinanceUnit::Branch(Branch::canonicalize(&raw))
        }
    }
}

impl From<FinanceUnit> for String {
    fn from(unit: FinanceUnit) -> Self {
        unit.to_string()
    }
}

impl From<Branch> for FinanceUnit {
    fn from(branch: Branch) -> Self {
        FinanceUnit::Branch(branch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Income {
    pub student: u64,
    pub food: u64,
    pub other: u64,
}

impl Income {
    pub fn total(&self) -> u64 {
        self.student + self.food + self.other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomeField {
    Student,
    Food,
    Other,
}

/// Annual revenue estimates plus twelve monthly expense slots, August first.
/// A zero slot means "not entered yet", never "no spend".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FinanceInput {
    pub income: Income,
    pub expenses: [u64; 12],
}

impl FinanceInput {
    pub fn income_mut(&mut self, field: IncomeField) -> &mut u64 {
        match field {
            IncomeField::Student => &mut self.income.student,
            IncomeField::Food => &mut self.income.food,
            IncomeField::Other => &mut self.income.other,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.income.total() == 0 && self.expenses.iter().all(|&e| e == 0)
    }
}
