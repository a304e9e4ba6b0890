//! Finance entry session: edits live in memory, are mirrored to a local draft on every
//! change, and reach the document store only on [`FinanceSession::save`].

use crate::error::{AnalyticsError, Result};
use crate::estimator::{combine_inputs, FinanceProjection};
use crate::normalize::Branch;
use crate::schema::{FinanceCategory, FinanceInput, FinanceUnit, IncomeField};
use crate::seasonality::SeasonalWeights;
use crate::snapshot::{load_input, save_snapshot, FinanceSnapshot, SnapshotKey};
use crate::store::DocumentStore;
use crate::utils::fiscal_month_index;
use chrono::NaiveDateTime;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub type FinanceState = BTreeMap<Branch, BTreeMap<FinanceCategory, FinanceInput>>;

/// Local persistence for unsaved edits.
pub trait DraftStore {
    fn load(&self) -> Result<Option<FinanceState>>;
    fn save(&mut self, state: &FinanceState) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDraftStore {
    state: Option<FinanceState>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryDraftStore {
    fn load(&self) -> Result<Option<FinanceState>> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &FinanceState) -> Result<()> {
        self.state = Some(state.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct JsonFileDraftStore {
    path: PathBuf,
}

impl JsonFileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DraftStore for JsonFileDraftStore {
    /// A missing file is an empty draft; an unreadable one is discarded with a warning.
    fn load(&self) -> Result<Option<FinanceState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&contents) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!("Ignoring unreadable draft {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    fn save(&mut self, state: &FinanceState) -> Result<()> {
        std::fs::write(&self.path, serde_json::to_string_pretty(state)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Draft,
    Saved,
}

/// Both snapshots written by one save.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedSnapshots {
    pub unit: FinanceSnapshot,
    pub general: FinanceSnapshot,
}

pub struct FinanceSession<D: DraftStore> {
    year: i32,
    units: Vec<Branch>,
    weights: SeasonalWeights,
    state: FinanceState,
    status: SessionStatus,
    drafts: D,
}

impl<D: DraftStore> FinanceSession<D> {
    /// Pre-populates every (unit, category) slot from the last saved raw input, falling back
    /// to the local draft when the store has nothing or cannot be read.
    pub fn open<S>(
        year: i32,
        units: Vec<Branch>,
        weights: SeasonalWeights,
        drafts: D,
        store: &S,
    ) -> Self
    where
        S: DocumentStore + ?Sized,
    {
        let draft = drafts.load().unwrap_or_else(|e| {
            warn!("Could not read finance draft: {}", e);
            None
        });

        let mut state = FinanceState::new();
        for unit in &units {
            for category in FinanceCategory::ALL {
                let key = SnapshotKey::new(year, unit.clone(), category);
                let remote = load_input(store, &key).unwrap_or_else(|e| {
                    warn!("Could not load {}: {}", key.document_id(), e);
                    None
                });
                let local = draft
                    .as_ref()
                    .and_then(|d| d.get(unit))
                    .and_then(|c| c.get(&category))
                    .copied();
                if let Some(input) = remote.or(local) {
                    state.entry(unit.clone()).or_default().insert(category, input);
                }
            }
        }

        Self {
            year,
            units,
            weights,
            state,
            status: SessionStatus::Draft,
            drafts,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn state(&self) -> &FinanceState {
        &self.state
    }

    pub fn drafts(&self) -> &D {
        &self.drafts
    }

    pub fn input(&self, unit: &Branch, category: FinanceCategory) -> FinanceInput {
        self.state
            .get(unit)
            .and_then(|c| c.get(&category))
            .copied()
            .unwrap_or_default()
    }

    /// Negative values are clamped to zero.
    pub fn set_income(
        &mut self,
        unit: &Branch,
        category: FinanceCategory,
        field: IncomeField,
        value: i64,
    ) {
        *self.slot(unit, category).income_mut(field) = value.max(0) as u64;
        self.touch();
    }

    pub fn set_expense(
        &mut self,
        unit: &Branch,
        category: FinanceCategory,
        month_index: usize,
        value: i64,
    ) -> Result<()> {
        if month_index >= 12 {
            return Err(AnalyticsError::InvalidMonthIndex(month_index));
        }
        self.slot(unit, category).expenses[month_index] = value.max(0) as u64;
        self.touch();
        Ok(())
    }

    /// [`Self::set_expense`] addressed by calendar month, 1 = January.
    pub fn set_expense_for_month(
        &mut self,
        unit: &Branch,
        category: FinanceCategory,
        calendar_month: u32,
        value: i64,
    ) -> Result<()> {
        if !(1..=12).contains(&calendar_month) {
            return Err(AnalyticsError::InvalidCalendarMonth(calendar_month));
        }
        self.set_expense(unit, category, fiscal_month_index(calendar_month), value)
    }

    /// Sum over every unit of the session for one category.
    pub fn general_input(&self, category: FinanceCategory) -> FinanceInput {
        combine_inputs(
            self.units
                .iter()
                .filter_map(|unit| self.state.get(unit).and_then(|c| c.get(&category))),
        )
    }

    pub fn preview(&self, unit: &FinanceUnit, category: FinanceCategory) -> FinanceProjection {
        let input = match unit {
            FinanceUnit::Branch(branch) => self.input(branch, category),
            FinanceUnit::General => self.general_input(category),
        };
        FinanceProjection::compute(&input, &self.weights)
    }

    /// Writes the unit's raw input and snapshot, then recomputes and writes GENERAL.
    pub fn save<S>(
        &mut self,
        unit: &Branch,
        category: FinanceCategory,
        store: &mut S,
        now: NaiveDateTime,
    ) -> Result<SavedSnapshots>
    where
        S: DocumentStore + ?Sized,
    {
        let unit_key = SnapshotKey::new(self.year, unit.clone(), category);
        let unit_snapshot = save_snapshot(
            store,
            &unit_key,
            &self.input(unit, category),
            &self.weights,
            now,
        )?;

        let general_key = SnapshotKey::new(self.year, FinanceUnit::General, category);
        let general_snapshot = save_snapshot(
            store,
            &general_key,
            &self.general_input(category),
            &self.weights,
            now,
        )?;

        self.status = SessionStatus::Saved;
        info!("Finance session {} saved for {} / {}", self.year, unit, category);
        Ok(SavedSnapshots {
            unit: unit_snapshot,
            general: general_snapshot,
        })
    }

    fn slot(&mut self, unit: &Branch, category: FinanceCategory) -> &mut FinanceInput {
        if !self.units.contains(unit) {
            self.units.push(unit.clone());
        }
        self.state
            .entry(unit.clone())
            .or_default()
            .entry(category)
            .or_default()
    }

    fn touch(&mut self) {
        self.status = SessionStatus::Draft;
        if let Err(e) = self.drafts.save(&self.state) {
            warn!("Could not mirror finance draft: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::load_snapshot;
    use crate::store::InMemoryStore;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn session(store: &InMemoryStore, drafts: MemoryDraftStore) -> FinanceSession<MemoryDraftStore> {
        FinanceSession::open(
            2026,
            Branch::FINANCE_UNITS.to_vec(),
            SeasonalWeights::default(),
            drafts,
            store,
        )
    }

    #[test]
    fn test_edits_are_mirrored_to_draft() {
        let store = InMemoryStore::new();
        let mut s = session(&store, MemoryDraftStore::new());
        let cat = FinanceCategory::TotalExpenses;

        s.set_income(&Branch::MefkureLgs, cat, IncomeField::Student, 50_000);
        s.set_expense(&Branch::MefkureLgs, cat, 0, 1200).unwrap();
        s.set_expense(&Branch::MefkureLgs, cat, 1, -5).unwrap();
        assert!(matches!(
            s.set_expense(&Branch::MefkureLgs, cat, 12, 1),
            Err(AnalyticsError::InvalidMonthIndex(12))
        ));

        let draft = s.drafts().load().unwrap().unwrap();
        let mirrored = draft[&Branch::MefkureLgs][&cat];
        assert_eq!(mirrored.income.student, 50_000);
        assert_eq!(mirrored.expenses[0], 1200);
        assert_eq!(mirrored.expenses[1], 0);
        assert_eq!(s.status(), SessionStatus::Draft);
    }

    #[test]
    fn test_expense_by_calendar_month() {
        let store = InMemoryStore::new();
        let mut s = session(&store, MemoryDraftStore::new());
        let cat = FinanceCategory::PayrollTax;

        s.set_expense_for_month(&Branch::MefkurePlus, cat, 8, 400).unwrap();
        s.set_expense_for_month(&Branch::MefkurePlus, cat, 1, 900).unwrap();
        assert!(matches!(
            s.set_expense_for_month(&Branch::MefkurePlus, cat, 13, 1),
            Err(AnalyticsError::InvalidCalendarMonth(13))
        ));

        let input = s.input(&Branch::MefkurePlus, cat);
        assert_eq!(input.expenses[0], 400);
        assert_eq!(input.expenses[5], 900);
    }

    #[test]
    fn test_reopen_prefers_remote_over_draft() {
        let mut store = InMemoryStore::new();
        let cat = FinanceCategory::Salaries;

        let mut first = session(&store, MemoryDraftStore::new());
        first.set_expense(&Branch::MefkureVip, cat, 2, 3000).unwrap();
        first.save(&Branch::MefkureVip, cat, &mut store, now()).unwrap();
        assert_eq!(first.status(), SessionStatus::Saved);

        // A stale draft for VIP plus an unsaved draft for LGS.
        let mut drafts = MemoryDraftStore::new();
        let mut stale = FinanceState::new();
        stale.entry(Branch::MefkureVip).or_default().insert(cat, FinanceInput::default());
        let mut unsaved = FinanceInput::default();
        unsaved.expenses[0] = 777;
        stale.entry(Branch::MefkureLgs).or_default().insert(cat, unsaved);
        drafts.save(&stale).unwrap();

        let reopened = session(&store, drafts);
        assert_eq!(reopened.input(&Branch::MefkureVip, cat).expenses[2], 3000);
        assert_eq!(reopened.input(&Branch::MefkureLgs, cat).expenses[0], 777);
    }

    #[test]
    fn test_save_writes_unit_and_general() {
        let mut store = InMemoryStore::new();
        let cat = FinanceCategory::TotalExpenses;
        let mut s = session(&store, MemoryDraftStore::new());

        s.set_income(&Branch::MefkureLgs, cat, IncomeField::Student, 100_000);
        s.set_expense(&Branch::MefkureLgs, cat, 0, 1000).unwrap();
        s.set_income(&Branch::MefkureVip, cat, IncomeField::Food, 20_000);
        s.set_expense(&Branch::MefkureVip, cat, 0, 500).unwrap();

        let saved = s.save(&Branch::MefkureLgs, cat, &mut store, now()).unwrap();
        assert_eq!(saved.unit.revenue_total, 100_000);
        assert_eq!(saved.general.revenue_total, 120_000);
        assert_eq!(saved.general.expense_real_so_far, 1500);

        let general_key = SnapshotKey::new(2026, FinanceUnit::General, cat);
        let stored = load_snapshot(&store, &general_key).unwrap().unwrap();
        assert_eq!(stored, saved.general);

        let preview = s.preview(&FinanceUnit::General, cat);
        assert_eq!(preview.revenue_total, 120_000);
    }

    #[test]
    fn test_json_file_draft_store() {
        let path = std::env::temp_dir().join(format!("asaf-draft-{}.json", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let mut drafts = JsonFileDraftStore::new(&path);
        assert!(drafts.load().unwrap().is_none());

        let mut state = FinanceState::new();
        let mut input = FinanceInput::default();
        input.income.other = 42;
        state.entry(Branch::AltinkureLise).or_default().insert(FinanceCategory::Revenue, input);
        drafts.save(&state).unwrap();
        assert_eq!(drafts.load().unwrap(), Some(state));

        std::fs::write(&path, "not json").unwrap();
        assert!(drafts.load().unwrap().is_none());
        let _ = std::fs::remove_file(&path);
    }
}
