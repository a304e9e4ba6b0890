use anyhow::Result;
use asaf_analytics::*;
use chrono::NaiveDate;
use futures::executor::block_on;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

const ENROLLMENT_CSV: &str = "\
Öğrenci Ad Soyad,Okul,Sınıf,Son Tutar,Sözleşme Tarihi
Ali Veli,Mefkure LGS,8,\"12.000\",10.03.2026
Ayşe Kaya,mefkure vip,12,30000,12.03.2026
Can Demir,Altınküre Fen Lisesi,09,50000,05.02.2026
Deniz Ak,Mefkure LGS,7,10000,25.03.2026
,Mefkure LGS,8,9000,11.03.2026
Ece Tan,Mefkure PLUS,11,20000,bilinmiyor
";

const HISTORICAL_JSON: &str = r#"[
    {"Öğrenci Ad Soyad": "Ali Veli", "Okul": "Mefkure LGS", "Sınıf": "7",
     "SonTutar": "10000", "SözleşmeTarihi": "01.03.2025"},
    {"Öğrenci Ad Soyad": "Zeynep Er", "Okul": "Altınküre Fen Lisesi", "Sınıf": 9,
     "SonTutar": 40000, "SözleşmeTarihi": "2025-02-01"},
    {"Öğrenci Ad Soyad": "Mert Su", "Okul": "Mefkure LGS", "Sınıf": "8",
     "SonTutar": "8000", "SözleşmeTarihi": "2025-06-01"}
]"#;

fn now() -> FixedClock {
    FixedClock(
        NaiveDate::from_ymd_opt(2026, 3, 20)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap(),
    )
}

fn parse_rows(csv_text: &str) -> Result<Vec<ImportRow>> {
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: BTreeMap<String, String> = result?;
        rows.push(ImportRow::from(row));
    }
    Ok(rows)
}

fn historical_file(name: &str) -> Result<PathBuf> {
    let path = std::env::temp_dir().join(format!("asaf_{}_{}.json", name, std::process::id()));
    fs::write(&path, HISTORICAL_JSON)?;
    Ok(path)
}

fn service_with_history(name: &str) -> Result<(AnalyticsService<FixedClock>, PathBuf)> {
    let path = historical_file(name)?;
    let config = AnalyticsConfig {
        historical_dataset: Some(path.clone()),
        ..AnalyticsConfig::default()
    };
    Ok((AnalyticsService::with_clock(config, now())?, path))
}

fn profile(role: Role, email: &str, branch_id: &str) -> UserProfile {
    UserProfile {
        uid: email.to_string(),
        email: email.to_string(),
        display_name: String::new(),
        role,
        branch_id: branch_id.to_string(),
    }
}

#[test]
fn test_import_feed_and_dashboard() -> Result<()> {
    let (service, path) = service_with_history("dashboard")?;
    let mut store = InMemoryStore::new();

    let rows = parse_rows(ENROLLMENT_CSV)?;
    let mut last_percent = 0;
    let report = service
        .importer()
        .import_rows(&mut store, &rows, |p| last_percent = p.percent)?;
    assert_eq!(report.imported, 4);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(last_percent, 100);

    let mut feed = service.record_feed()?;
    let mut updates = feed.subscribe();
    assert_eq!(block_on(updates.next()).unwrap().len(), 3);

    assert_eq!(feed.sync_from_store(&store)?, 4);
    let records = block_on(updates.next()).unwrap();
    assert_eq!(records.len(), 7);

    let admin = profile(Role::Admin, "admin@asaf.com", "");
    let dashboard = service.dashboard(&admin, &records, &RecordFilter::new(PeriodSpec::ytd(2026)));
    // Deniz Ak enrolled after today's month/day and falls outside the window.
    assert_eq!(dashboard.kpi.student_count, 3);
    assert_eq!(dashboard.kpi.total_revenue, 92_000);
    assert_eq!(dashboard.by_branch.len(), 3);

    let lise = profile(Role::Manager, "lise@asaf.com", "Altınküre Lise");
    let scoped = service.dashboard(&lise, &records, &RecordFilter::new(PeriodSpec::ytd(2026)));
    assert_eq!(scoped.kpi.student_count, 1);
    assert_eq!(scoped.by_class[0].key.as_str(), "9");

    let comparison = service.compare(&admin, &records);
    assert_eq!(comparison.previous_year, 2025);
    // Mert Su enrolled in June 2025, after the March cutoff.
    assert_eq!(comparison.previous.student_count, 2);
    assert_eq!(comparison.current.student_count, 3);

    let mix = enrollment_mix(
        &filter_records(&records, &RecordFilter::new(PeriodSpec::ytd(2025)), service.today()),
        &filter_records(&records, &RecordFilter::new(PeriodSpec::ytd(2026)), service.today()),
    );
    assert_eq!(mix.renewing_students, 1);
    assert_eq!(mix.new_students, 2);

    fs::remove_file(path)?;
    Ok(())
}

#[test]
fn test_reimport_overwrites_and_clear_removes() -> Result<()> {
    let service = AnalyticsService::with_clock(AnalyticsConfig::default(), now())?;
    let mut store = InMemoryStore::with_max_batch_size(2);
    let rows = parse_rows(ENROLLMENT_CSV)?;

    service.importer().import_rows(&mut store, &rows, |_| {})?;
    service.importer().import_rows(&mut store, &rows, |_| {})?;

    let mut feed = service.record_feed()?;
    assert_eq!(feed.sync_from_store(&store)?, 4);
    assert!(feed
        .current()
        .iter()
        .any(|r| r.id.as_deref() == Some("ali_veli_mefkure_lgs_8")));

    assert_eq!(service.importer().clear_imported(&mut store)?, 4);
    assert_eq!(feed.sync_from_store(&store)?, 0);
    Ok(())
}

#[test]
fn test_daily_report_for_manager() -> Result<()> {
    let service = AnalyticsService::with_clock(AnalyticsConfig::default(), now())?;
    let mut store = InMemoryStore::new();
    service
        .importer()
        .import_rows(&mut store, &parse_rows(ENROLLMENT_CSV)?, |_| {})?;
    let mut feed = service.record_feed()?;
    feed.sync_from_store(&store)?;

    let yks = profile(Role::Manager, "yks@asaf.com", "Mefkure YKS");
    let date = NaiveDate::from_ymd_opt(2026, 3, 12).unwrap();
    let report = service.daily_report(&yks, &feed.current(), date);

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].label, "Mefkure YKS");
    assert_eq!(report.grand_daily, 1);
    assert_eq!(report.grand_overall, 1);
    Ok(())
}

#[test]
fn test_finance_session_save_and_reopen() -> Result<()> {
    let service = AnalyticsService::with_clock(AnalyticsConfig::default(), now())?;
    let mut store = InMemoryStore::new();
    let lgs = Branch::MefkureLgs;
    let category = FinanceCategory::TotalExpenses;

    let mut session = service.finance_session(2026, MemoryDraftStore::new(), &store);
    session.set_income(&lgs, category, IncomeField::Student, 1_200_000);
    session.set_expense(&lgs, category, 0, 39_000)?;
    session.set_expense(&lgs, category, 1, 111_000)?;
    assert!(session.set_expense(&lgs, category, 12, 1).is_err());

    let saved = session.save(&lgs, category, &mut store, service.now())?;
    assert_eq!(session.status(), SessionStatus::Saved);
    assert_eq!(saved.unit.expense_real_so_far, 150_000);
    assert_eq!(saved.unit.expense_run_rate, 900_000);
    assert_eq!(saved.unit.expense_estimated, 1_200_000);
    assert_eq!(saved.unit.profit_estimate, 0);
    assert_eq!(saved.general.revenue_total, 1_200_000);

    let listed = list_snapshots(&store, 2026)?;
    assert_eq!(listed.len(), 2);

    let reopened = service.finance_session(2026, MemoryDraftStore::new(), &store);
    assert_eq!(reopened.input(&lgs, category).expenses[1], 111_000);
    assert_eq!(reopened.input(&lgs, category).income.student, 1_200_000);
    Ok(())
}

#[test]
fn test_targets_attainment() -> Result<()> {
    let service = AnalyticsService::with_clock(AnalyticsConfig::default(), now())?;
    let mut store = InMemoryStore::new();
    service
        .importer()
        .import_rows(&mut store, &parse_rows(ENROLLMENT_CSV)?, |_| {})?;
    let mut feed = service.record_feed()?;
    feed.sync_from_store(&store)?;

    let mut targets = load_targets(&store, 2026)?;
    targets.set_yearly(Branch::MefkureLgs, TargetNums::from_input("4", "40.000", ""));
    targets.set_monthly(3, Branch::MefkureLgs, TargetNums::from_input("2", "20000", ""), service.today())?;
    assert!(targets
        .set_monthly(4, Branch::MefkureLgs, TargetNums::default(), service.today())
        .is_err());
    save_targets(&mut store, &mut targets, service.now())?;

    let targets = load_targets(&store, 2026)?;
    assert!(targets.updated_at.is_some());

    let yearly = targets.evaluate(&feed.current(), &[Branch::MefkureLgs], TargetWindow::Year);
    assert_eq!(yearly.realized.student_count, 2);
    assert_eq!(yearly.student.pct, Some(50.0));
    assert_eq!(yearly.student.status, AttainmentStatus::Behind);

    let march = targets.evaluate(&feed.current(), &[Branch::MefkureLgs], TargetWindow::Month(3));
    assert_eq!(march.student.pct, Some(100.0));
    assert_eq!(march.student.status, AttainmentStatus::OnTrack);
    Ok(())
}

#[test]
fn test_config_file_round_trip() -> Result<()> {
    let json = r#"{ "import_batch_size": 50, "seasonal_weights": [1,1,1,1,1,1,1,1,1,1,1,1] }"#;
    let config = AnalyticsConfig::from_json_str(json)?;
    let service = AnalyticsService::with_clock(config, now())?;
    assert_eq!(service.importer().batch_size(), 50);
    assert_eq!(service.weights().total(), 12.0);
    assert_eq!(service.policy().rules().len(), 5);
    Ok(())
}

#[test]
fn test_manual_records_reach_the_dashboard() -> Result<()> {
    let path = std::env::temp_dir().join(format!("asaf_serial_{}.json", std::process::id()));
    fs::write(
        &path,
        r#"[
            {"Öğrenci Ad Soyad": "Ali Veli", "Okul": "Mefkure LGS", "SözleşmeTarihi": 45717},
            {"Öğrenci Ad Soyad": "Ece Ak", "Okul": "Mefkure LGS", "SözleşmeTarihi": "01.03.2025"},
            42
        ]"#,
    )?;
    let config = AnalyticsConfig {
        historical_dataset: Some(path.clone()),
        ..AnalyticsConfig::default()
    };
    let service = AnalyticsService::with_clock(config, now())?;
    let mut store = InMemoryStore::new();
    let manager = profile(Role::Manager, "lgs@asaf.com", "Mefkure LGS");

    let entry = |name: &str, branch: &str, date: &str| ManualEntry {
        student_name: name.to_string(),
        branch: branch.to_string(),
        class_type: "8".to_string(),
        amount: 40_000,
        contract_date: RawDate::Text(date.to_string()),
    };
    let saved = service.add_manual_record(&mut store, &manager, entry("Ali Veli", "Mefkure LGS", "12.03.2026"))?;
    service.add_manual_record(&mut store, &manager, entry("Can Öz", "Mefkure LGS", "14.03.2026"))?;
    assert!(service
        .add_manual_record(&mut store, &manager, entry("Ece", "Mefkure VIP", "14.03.2026"))
        .is_err());

    let listed = service.manual_records(&store, &manager)?;
    assert_eq!(listed[0].student_name, "Can Öz");

    let mut feed = service.record_feed()?;
    assert_eq!(feed.current().len(), 2);
    feed.sync_from_store(&store)?;
    let comparison = service.compare(&manager, &feed.current());
    assert_eq!(comparison.previous.student_count, 2);
    assert_eq!(comparison.current.student_count, 2);

    let id = saved.id.unwrap();
    service.remove_record(&mut store, &manager, &id)?;
    feed.sync_from_store(&store)?;
    let dashboard = service.dashboard(&manager, &feed.current(), &RecordFilter::new(PeriodSpec::ytd(2026)).with_branch(""));
    assert_eq!(dashboard.kpi.student_count, 1);

    fs::remove_file(path)?;
    Ok(())
}
