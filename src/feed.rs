//! Publish-subscribe access to the full analyzable record set (bundled history + live
//! store). Views subscribe and recompute from each pushed set; no computation lives here.

use crate::error::Result;
use crate::schema::EnrollmentRecord;
use crate::store::{list_typed, DocumentStore, RECORDS_COLLECTION};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use log::{debug, info};
use std::sync::Arc;

pub type RecordSet = Arc<Vec<EnrollmentRecord>>;

pub struct RecordFeed {
    historical: Vec<EnrollmentRecord>,
    current: RecordSet,
    subscribers: Vec<UnboundedSender<RecordSet>>,
}

impl RecordFeed {
    pub fn new(historical: Vec<EnrollmentRecord>) -> Self {
        let current = Arc::new(historical.clone());
        Self {
            historical,
            current,
            subscribers: Vec::new(),
        }
    }

    /// The receiver yields the current set immediately, then one set per publish.
    pub fn subscribe(&mut self) -> UnboundedReceiver<RecordSet> {
        let (tx, rx) = unbounded();
        if tx.unbounded_send(self.current.clone()).is_ok() {
            self.subscribers.push(tx);
        }
        rx
    }

    /// Replaces the live part of the set and pushes the merged set to every subscriber.
    /// Dropped receivers are forgotten.
    pub fn publish(&mut self, live: Vec<EnrollmentRecord>) {
        let mut merged = Vec::with_capacity(self.historical.len() + live.len());
        merged.extend(self.historical.iter().cloned());
        merged.extend(live);
        self.current = Arc::new(merged);

        let set = self.current.clone();
        self.subscribers
            .retain(|tx| tx.unbounded_send(set.clone()).is_ok());
        debug!(
            "Published {} records to {} subscribers",
            set.len(),
            self.subscribers.len()
        );
    }

    pub fn current(&self) -> RecordSet {
        self.current.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Reloads the live records from the store and publishes them. Returns the live count.
    pub fn sync_from_store<S>(&mut self, store: &S) -> Result<usize>
    where
        S: DocumentStore + ?Sized,
    {
        let live: Vec<EnrollmentRecord> = list_typed::<S, EnrollmentRecord>(store, RECORDS_COLLECTION)?
            .into_iter()
            .map(|(id, mut record)| {
                record.id = Some(id);
                record
            })
            .collect();
        let count = live.len();
        self.publish(live);
        info!("Synced {} live records", count);
        Ok(count)
    }
}
