//! The single typed boundary where raw rows from every origin become
//! [`EnrollmentRecord`]s.

use crate::error::{AnalyticsError, Result};
use crate::normalize::{normalize_date, Branch, ClassType, RawDate};
use crate::schema::{EnrollmentRecord, RecordSource};
use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const NAME_HEADERS: [&str; 3] = ["Öğrenci Ad Soyad", "AD SOYAD", "Öğrenci"];
const CLASS_HEADERS: [&str; 2] = ["Sınıf", "Grup"];
const BRANCH_HEADERS: [&str; 3] = ["Şube", "Kurum", "Okul"];
const AMOUNT_HEADERS: [&str; 2] = ["Son Tutar", "Tutar"];
const DATE_HEADERS: [&str; 2] = ["Sözleşme Tarihi", "Tarih"];

/// One spreadsheet cell as handed over by the sheet parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
    Empty,
}

impl CellValue {
    fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            CellValue::Number(n) => *n == 0.0,
            CellValue::Date(_) => false,
        }
    }

    fn as_text(&self) -> String {
        match self {
            CellValue::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(text) => text.clone(),
            CellValue::Date(dt) => dt.format("%d.%m.%Y").to_string(),
            CellValue::Empty => String::new(),
        }
    }

    /// Whole lira. Text keeps only its digits so "₺12.500" reads as 12500.
    fn as_amount(&self) -> u64 {
        match self {
            CellValue::Number(n) if n.is_finite() && *n > 0.0 => n.round() as u64,
            CellValue::Text(text) => digits_only(text),
            _ => 0,
        }
    }

    fn as_raw_date(&self) -> Option<RawDate> {
        match self {
            CellValue::Number(serial) => Some(RawDate::ExcelSerial(*serial)),
            CellValue::Text(text) => Some(match serial_text(text) {
                Some(serial) => RawDate::ExcelSerial(serial),
                None => RawDate::Text(text.clone()),
            }),
            CellValue::Date(dt) => Some(RawDate::DateTime(*dt)),
            CellValue::Empty => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(text: &str) -> Self {
        if text.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(text.to_string())
        }
    }
}

/// Day numbers exported as text, e.g. "46096" or "46096.5" from a CSV export.
fn serial_text(text: &str) -> Option<f64> {
    let text = text.trim();
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if whole.is_empty() || !digits(whole) || !digits(fraction) {
        return None;
    }
    text.parse().ok()
}

fn digits_only(text: &str) -> u64 {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// A header → cell map for one spreadsheet row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportRow {
    pub cells: BTreeMap<String, CellValue>,
}

impl ImportRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, header: &str, value: impl Into<CellValue>) -> Self {
        self.cells.insert(header.to_string(), value.into());
        self
    }

    /// First non-blank cell among the accepted header spellings.
    fn first(&self, headers: &[&str]) -> Option<&CellValue> {
        headers
            .iter()
            .filter_map(|h| self.cells.get(*h))
            .find(|cell| !cell.is_blank())
    }
}

impl From<BTreeMap<String, String>> for ImportRow {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self {
            cells: map
                .into_iter()
                .map(|(k, v)| (k.trim().to_string(), CellValue::from(v.as_str())))
                .collect(),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// A record typed in through the daily entry form.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualEntry {
    pub student_name: String,
    pub branch: String,
    pub class_type: String,
    pub amount: u64,
    pub contract_date: RawDate,
}

/// A row of the bundled prior-year dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyRow {
    #[serde(rename = "Öğrenci Ad Soyad", alias = "AdSoyad", alias = "studentName", default)]
    pub student_name: Option<String>,
    #[serde(rename = "Okul", alias = "subeAd", alias = "branch", default)]
    pub school: Option<String>,
    #[serde(rename = "Sınıf", alias = "classType", default)]
    pub class_type: Option<CellValue>,
    #[serde(rename = "SonTutar", alias = "Son Tutar", alias = "amount", default)]
    pub amount: Option<CellValue>,
    #[serde(rename = "SözleşmeTarihi", alias = "Sözleşme Tarihi", default)]
    pub contract_date: Option<CellValue>,
}

/// Raw input tagged with where it came from; each origin has its own field mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Import(ImportRow),
    Manual(ManualEntry),
    Legacy(LegacyRow),
}

impl RawRecord {
    pub fn into_record(self) -> Result<EnrollmentRecord> {
        match self {
            RawRecord::Import(row) => map_import_row(&row),
            RawRecord::Manual(entry) => Ok(map_manual_entry(entry)),
            RawRecord::Legacy(row) => Ok(map_legacy_row(row)),
        }
    }
}

/// Import rows need a name and a parseable date; anything else is rejected so the importer
/// can skip it.
pub fn map_import_row(row: &ImportRow) -> Result<EnrollmentRecord> {
    let student_name = row
        .first(&NAME_HEADERS)
        .map(|cell| cell.as_text().trim().to_uppercase())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AnalyticsError::MissingField(NAME_HEADERS[0].to_string()))?;

    let date_cell = row
        .first(&DATE_HEADERS)
        .ok_or_else(|| AnalyticsError::MissingField(DATE_HEADERS[0].to_string()))?;
    let contract_date = date_cell
        .as_raw_date()
        .and_then(|raw| normalize_date(&raw))
        .ok_or_else(|| AnalyticsError::UnparseableDate(date_cell.as_text()))?;

    let branch = row
        .first(&BRANCH_HEADERS)
        .map(|cell| Branch::canonicalize(&cell.as_text()))
        .unwrap_or(Branch::Unknown);
    let class_type = row
        .first(&CLASS_HEADERS)
        .map(|cell| ClassType::normalize(&cell.as_text()))
        .unwrap_or_else(|| ClassType::normalize(""));
    let amount = row.first(&AMOUNT_HEADERS).map(CellValue::as_amount).unwrap_or(0);

    let id = import_record_id(&student_name, &branch, &class_type);

    Ok(EnrollmentRecord {
        id: Some(id),
        student_name,
        branch,
        class_type,
        contract_date: Some(contract_date),
        amount,
        source: RecordSource::ExcelImport,
    })
}

pub fn map_manual_entry(entry: ManualEntry) -> EnrollmentRecord {
    EnrollmentRecord {
        id: None,
        student_name: entry.student_name.trim().to_string(),
        branch: Branch::canonicalize(&entry.branch),
        class_type: ClassType::normalize(&entry.class_type),
        contract_date: normalize_date(&entry.contract_date),
        amount: entry.amount,
        source: RecordSource::Manual,
    }
}

pub fn map_legacy_row(row: LegacyRow) -> EnrollmentRecord {
    let contract_date = row
        .contract_date
        .as_ref()
        .and_then(CellValue::as_raw_date)
        .and_then(|raw| normalize_date(&raw));
    if contract_date.is_none() {
        debug!(
            "Historical row for {:?} has no usable contract date",
            row.student_name
        );
    }

    EnrollmentRecord {
        id: None,
        student_name: row.student_name.unwrap_or_default().trim().to_string(),
        branch: Branch::canonicalize(row.school.as_deref().unwrap_or_default()),
        class_type: ClassType::normalize(
            &row.class_type.map(|c| c.as_text()).unwrap_or_default(),
        ),
        contract_date,
        amount: row.amount.map(|a| a.as_amount()).unwrap_or(0),
        source: RecordSource::Historical,
    }
}

/// Deterministic document id for imported records: the same student, branch and class
/// always land on the same document.
pub fn import_record_id(student_name: &str, branch: &Branch, class_type: &ClassType) -> String {
    format!("{}_{}_{}", student_name, branch, class_type)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Reads the bundled prior-year dataset (a JSON array of legacy rows). Rows that do not
/// have the legacy shape are skipped with a warning; only a file that is not a JSON array
/// fails.
pub fn load_historical(path: impl AsRef<Path>) -> Result<Vec<EnrollmentRecord>> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    parse_historical(&contents)
}

pub fn parse_historical(json: &str) -> Result<Vec<EnrollmentRecord>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let total = values.len();
    let records: Vec<EnrollmentRecord> = values
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| match serde_json::from_value::<LegacyRow>(value) {
            Ok(row) => Some(map_legacy_row(row)),
            Err(e) => {
                warn!("Skipping historical row {}: {}", i, e);
                None
            }
        })
        .collect();
    if records.len() < total {
        warn!("Loaded {} of {} historical rows", records.len(), total);
    }

    let undated = records.iter().filter(|r| r.contract_date.is_none()).count();
    if undated > 0 {
        warn!(
            "{} of {} historical records have no parseable contract date",
            undated,
            records.len()
        );
    }

    Ok(records)
}
