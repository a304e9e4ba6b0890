//! # ASAF Analytics
//!
//! Enrollment and finance analytics for a group of private schools and exam-prep programs.
//! The crate turns heterogeneous enrollment rows (spreadsheet imports, manual entries, a
//! bundled prior-year dataset) into one canonical record type and computes dashboards,
//! year-over-year comparisons, target attainment and full-year expense projections from it.
//!
//! ## Core Concepts
//!
//! - **Ingestion boundary**: every raw row goes through [`RawRecord::into_record`]; branch
//!   names, class labels and dates are canonical from there on
//! - **Period filter**: YTD windows cut every year at the same month/day, so comparisons are
//!   like for like
//! - **Scoping**: an [`AccessPolicy`] built from configuration narrows what each user sees
//! - **Finance projection**: run-rate and seasonal models over a partially filled fiscal
//!   year (August to July), persisted as snapshots
//!
//! ## Example
//!
//! ```rust,ignore
//! use asaf_analytics::*;
//!
//! let service = AnalyticsService::from_config(AnalyticsConfig::default())?;
//! let mut store = InMemoryStore::new();
//! service.importer().import_rows(&mut store, &rows, |p| println!("{}%", p.percent))?;
//!
//! let mut feed = service.record_feed()?;
//! feed.sync_from_store(&store)?;
//!
//! let filter = RecordFilter::new(PeriodSpec::ytd(2026)).with_branch("mefkure lgs");
//! let dashboard = service.dashboard(&user, &feed.current(), &filter);
//! println!("{} students", dashboard.kpi.student_count);
//! ```

pub mod compare;
pub mod config;
pub mod error;
pub mod estimator;
pub mod feed;
pub mod import;
pub mod ingestion;
pub mod kpi;
pub mod normalize;
pub mod period;
pub mod records;
pub mod report;
pub mod schema;
pub mod scoping;
pub mod seasonality;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod targets;
pub mod users;
pub mod utils;

pub use compare::{compare_years, enrollment_mix, EnrollmentMix, Trend, TrendDirection, YearComparison};
pub use config::{AnalyticsConfig, ScopeRuleConfig};
pub use error::{AnalyticsError, Result};
pub use estimator::{
    combine_inputs, estimate_run_rate, estimate_seasonal, FinanceProjection, MarginScenarios,
    MonthLine, ProfitModel, RunRateEstimate, SeasonalEstimate,
};
pub use feed::{RecordFeed, RecordSet};
pub use import::{BulkImporter, ImportProgress, ImportReport, SkippedRow};
pub use ingestion::*;
pub use kpi::{compute_kpi, group_by_branch, group_by_class_type, group_kpis, percent_of, GroupKpi, Kpi};
pub use normalize::*;
pub use period::{filter_records, ytd_cutoff, PeriodMode, PeriodSpec, RecordFilter};
pub use records::{delete_record, list_manual_records, save_manual_record, update_record};
pub use report::{daily_enrollment_report, DailyReport, ReportGroup, ReportRow};
pub use schema::*;
pub use scoping::{AccessPolicy, Scope, ScopeRule, ScopedSelection};
pub use seasonality::{SeasonalWeights, DEFAULT_SEASONAL_WEIGHTS};
pub use session::{
    DraftStore, FinanceSession, FinanceState, JsonFileDraftStore, MemoryDraftStore, SessionStatus,
};
pub use snapshot::{
    compare_snapshots, list_snapshots, load_input, load_snapshot, save_snapshot, FinanceSnapshot,
    SnapshotKey,
};
pub use store::{DocumentStore, InMemoryStore, WriteOp};
pub use targets::{
    load_targets, save_targets, Attainment, AttainmentStatus, TargetNums, TargetWindow, TargetsDoc,
};
pub use users::UserDirectory;
pub use utils::*;

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Source of "now". All period math takes dates from here rather than reading the system
/// time directly.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub kpi: Kpi,
    pub by_branch: Vec<GroupKpi<Branch>>,
    pub by_class: Vec<GroupKpi<ClassType>>,
}

/// Explicitly constructed entry point holding the validated configuration. Nothing in the
/// crate reads global state; everything a computation needs comes through here or through
/// its parameters.
pub struct AnalyticsService<C: Clock = SystemClock> {
    config: AnalyticsConfig,
    policy: AccessPolicy,
    weights: SeasonalWeights,
    importer: BulkImporter,
    clock: C,
}

impl AnalyticsService<SystemClock> {
    pub fn from_config(config: AnalyticsConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> AnalyticsService<C> {
    pub fn with_clock(config: AnalyticsConfig, clock: C) -> Result<Self> {
        let weights = SeasonalWeights::custom(config.seasonal_weights.clone())?;
        let policy = AccessPolicy::from_config(&config);
        let importer = BulkImporter::new(config.import_batch_size);

        info!(
            "Analytics service ready: {} scope rules, import batch size {}",
            policy.rules().len(),
            importer.batch_size()
        );

        Ok(Self {
            config,
            policy,
            weights,
            importer,
            clock,
        })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn weights(&self) -> &SeasonalWeights {
        &self.weights
    }

    pub fn importer(&self) -> &BulkImporter {
        &self.importer
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// The configured prior-year dataset, or nothing when none is configured.
    pub fn load_historical(&self) -> Result<Vec<EnrollmentRecord>> {
        match &self.config.historical_dataset {
            Some(path) => load_historical(path),
            None => Ok(Vec::new()),
        }
    }

    pub fn record_feed(&self) -> Result<RecordFeed> {
        Ok(RecordFeed::new(self.load_historical()?))
    }

    /// KPI totals and groupings of the records `user` may see within `filter`.
    pub fn dashboard(
        &self,
        user: &UserProfile,
        records: &[EnrollmentRecord],
        filter: &RecordFilter,
    ) -> Dashboard {
        let scope = self.policy.scope_for(user);
        let rows: Vec<&EnrollmentRecord> = filter_records(records, filter, self.today())
            .into_iter()
            .filter(|r| scope.allows_branch(&r.branch))
            .collect();
        debug!("Dashboard for {} over {} records", user.email, rows.len());

        Dashboard {
            kpi: compute_kpi(&rows),
            by_branch: group_by_branch(&rows),
            by_class: group_by_class_type(&rows),
        }
    }

    /// Stores a daily entry on behalf of `user`, stamped with the service clock.
    pub fn add_manual_record<S>(
        &self,
        store: &mut S,
        user: &UserProfile,
        entry: ManualEntry,
    ) -> Result<EnrollmentRecord>
    where
        S: DocumentStore + ?Sized,
    {
        save_manual_record(store, &self.policy, user, entry, self.now())
    }

    pub fn manual_records<S>(&self, store: &S, user: &UserProfile) -> Result<Vec<EnrollmentRecord>>
    where
        S: DocumentStore + ?Sized,
    {
        list_manual_records(store, &self.policy, user)
    }

    pub fn edit_record<S>(
        &self,
        store: &mut S,
        user: &UserProfile,
        id: &str,
        entry: ManualEntry,
    ) -> Result<EnrollmentRecord>
    where
        S: DocumentStore + ?Sized,
    {
        update_record(store, &self.policy, user, id, entry)
    }

    pub fn remove_record<S>(&self, store: &mut S, user: &UserProfile, id: &str) -> Result<()>
    where
        S: DocumentStore + ?Sized,
    {
        delete_record(store, &self.policy, user, id)
    }

    /// This year against last year, both cut at today's month/day.
    pub fn compare(&self, user: &UserProfile, records: &[EnrollmentRecord]) -> YearComparison {
        let scoped: Vec<EnrollmentRecord> = self
            .policy
            .scope_records(user, records)
            .into_iter()
            .cloned()
            .collect();
        compare_years(&scoped, self.today())
    }

    pub fn daily_report(
        &self,
        user: &UserProfile,
        records: &[EnrollmentRecord],
        date: NaiveDate,
    ) -> DailyReport {
        daily_enrollment_report(records, &self.policy, user, date)
    }

    /// Opens a finance session over the branches that keep finance plans.
    pub fn finance_session<D, S>(&self, year: i32, drafts: D, store: &S) -> FinanceSession<D>
    where
        D: DraftStore,
        S: DocumentStore + ?Sized,
    {
        FinanceSession::open(
            year,
            Branch::FINANCE_UNITS.to_vec(),
            self.weights,
            drafts,
            store,
        )
    }
}
