pub mod ledger;
pub mod tasks;

use std::sync::Arc;

use anyhow::Result;

use crate::error::{is_validation, ValidationError};
use crate::feed::{Snapshot, SnapshotFeed, Subscription};
use crate::household::Session;
use crate::store::RecordStore;

pub use ledger::LedgerService;
pub use tasks::TasksService;

/// Store plus the feed that re-emits it after each write.
#[derive(Clone)]
pub(crate) struct Backend {
    store: Arc<dyn RecordStore>,
    feed: SnapshotFeed,
}

impl Backend {
    pub(crate) fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            feed: SnapshotFeed::new(),
        }
    }

    pub(crate) fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub(crate) fn subscribe(&self) -> Subscription {
        self.feed.subscribe()
    }

    pub(crate) fn current(&self) -> Arc<Snapshot> {
        self.feed.current()
    }

    /// Re-read every record and publish it.
    pub(crate) fn refresh(&self) -> Result<Arc<Snapshot>> {
        let tasks = self.store.tasks(None)?;
        let transactions = self.store.transactions()?;
        Ok(self.feed.publish(tasks, transactions))
    }

    /// Run one write, log how it went and re-emit the record set when it succeeded.
    pub(crate) fn mutation<T>(
        &self,
        action: &'static str,
        op: impl FnOnce(&dyn RecordStore) -> Result<T>,
    ) -> Result<T> {
        match op(self.store.as_ref()) {
            Ok(value) => {
                tracing::debug!(action, "mutation applied");
                if let Err(err) = self.refresh() {
                    tracing::warn!(action, error = %err, "snapshot refresh failed after write");
                }
                Ok(value)
            }
            Err(err) => {
                if is_validation(&err) {
                    tracing::debug!(action, error = %err, "mutation rejected");
                } else {
                    tracing::warn!(action, error = %err, "mutation failed");
                }
                Err(err)
            }
        }
    }
}

pub(crate) fn authorize(session: &Session, owner: &str) -> Result<()> {
    if session.can_manage(owner) {
        Ok(())
    } else {
        Err(ValidationError::NotPermitted {
            actor: session.name.clone(),
            owner: owner.to_string(),
        }
        .into())
    }
}
