//! Manual enrollment records: the daily entry form writes them, the student list reads,
//! edits and deletes them. Every operation is checked against the caller's scope.

use crate::error::{AnalyticsError, Result};
use crate::ingestion::{map_manual_entry, ManualEntry};
use crate::normalize::{compact_key, Branch};
use crate::schema::{EnrollmentRecord, RecordSource, UserProfile};
use crate::scoping::{AccessPolicy, Scope};
use crate::store::{from_document, put_typed, DocumentStore, RECORDS_COLLECTION};
use chrono::NaiveDateTime;
use log::{info, warn};

fn ensure_visible(scope: &Scope, branch: &Branch) -> Result<()> {
    if scope.allows_branch(branch) {
        Ok(())
    } else {
        Err(AnalyticsError::BranchNotVisible(branch.to_string()))
    }
}

fn map_checked(entry: ManualEntry, scope: &Scope) -> Result<EnrollmentRecord> {
    let record = map_manual_entry(entry);
    if record.student_name.is_empty() {
        return Err(AnalyticsError::MissingField("studentName".to_string()));
    }
    ensure_visible(scope, &record.branch)?;
    Ok(record)
}

/// `manual_<millis>_<name>`, with a numeric suffix if that id is already taken.
fn new_manual_id<S>(store: &S, name: &str, now: NaiveDateTime) -> Result<String>
where
    S: DocumentStore + ?Sized,
{
    let base = format!("manual_{}_{}", now.and_utc().timestamp_millis(), compact_key(name));
    let mut id = base.clone();
    let mut n = 1;
    while store.get(RECORDS_COLLECTION, &id)?.is_some() {
        n += 1;
        id = format!("{}_{}", base, n);
    }
    Ok(id)
}

/// Stores a daily entry and returns it with its new id.
pub fn save_manual_record<S>(
    store: &mut S,
    policy: &AccessPolicy,
    user: &UserProfile,
    entry: ManualEntry,
    now: NaiveDateTime,
) -> Result<EnrollmentRecord>
where
    S: DocumentStore + ?Sized,
{
    let mut record = map_checked(entry, &policy.scope_for(user))?;
    if record.contract_date.is_none() {
        warn!("Manual entry for {} has no usable contract date", record.student_name);
    }

    let id = new_manual_id(&*store, &record.student_name, now)?;
    record.id = Some(id.clone());
    put_typed(store, RECORDS_COLLECTION, &id, &record)?;
    info!("{} added manual record {} ({})", user.email, id, record.branch);
    Ok(record)
}

/// Manual records the user may see, newest contract first. Undated records come last.
pub fn list_manual_records<S>(
    store: &S,
    policy: &AccessPolicy,
    user: &UserProfile,
) -> Result<Vec<EnrollmentRecord>>
where
    S: DocumentStore + ?Sized,
{
    let scope = policy.scope_for(user);
    let source = serde_json::to_value(RecordSource::Manual)?;

    let mut records = Vec::new();
    for (id, doc) in store.find_by_field(RECORDS_COLLECTION, "source", &source)? {
        match from_document::<EnrollmentRecord>(RECORDS_COLLECTION, &id, doc) {
            Ok(mut record) if scope.allows_branch(&record.branch) => {
                record.id = Some(id);
                records.push(record);
            }
            Ok(_) => {}
            Err(e) => warn!("{}", e),
        }
    }

    records.sort_by(|a, b| {
        b.contract_date
            .cmp(&a.contract_date)
            .then_with(|| b.id.cmp(&a.id))
    });
    Ok(records)
}

fn load_visible<S>(store: &S, scope: &Scope, id: &str) -> Result<EnrollmentRecord>
where
    S: DocumentStore + ?Sized,
{
    let doc = store
        .get(RECORDS_COLLECTION, id)?
        .ok_or_else(|| AnalyticsError::RecordNotFound(id.to_string()))?;
    let record: EnrollmentRecord = from_document(RECORDS_COLLECTION, id, doc)?;
    ensure_visible(scope, &record.branch)?;
    Ok(record)
}

/// Replaces the fields of record `id`. Both the stored branch and the new one must be in
/// the user's scope. The record keeps its id and source.
pub fn update_record<S>(
    store: &mut S,
    policy: &AccessPolicy,
    user: &UserProfile,
    id: &str,
    entry: ManualEntry,
) -> Result<EnrollmentRecord>
where
    S: DocumentStore + ?Sized,
{
    let scope = policy.scope_for(user);
    let existing = load_visible(&*store, &scope, id)?;

    let mut record = map_checked(entry, &scope)?;
    record.id = Some(id.to_string());
    record.source = existing.source;
    put_typed(store, RECORDS_COLLECTION, id, &record)?;
    info!("{} updated record {}", user.email, id);
    Ok(record)
}

pub fn delete_record<S>(
    store: &mut S,
    policy: &AccessPolicy,
    user: &UserProfile,
    id: &str,
) -> Result<()>
where
    S: DocumentStore + ?Sized,
{
    let scope = policy.scope_for(user);
    load_visible(&*store, &scope, id)?;
    store.delete(RECORDS_COLLECTION, id)?;
    info!("{} deleted record {}", user.email, id);
    Ok(())
}
