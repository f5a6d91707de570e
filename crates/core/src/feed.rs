//! Live snapshot subscription.
//!
//! After every write the gateway publishes the full current record set.
//! Subscribers always see the most recent snapshot; intermediate ones may be
//! skipped when several writes land before a subscriber looks.

use std::sync::Arc;

use tokio::sync::watch;

use crate::model::{Task, Transaction};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    pub tasks: Vec<Task>,
    pub transactions: Vec<Transaction>,
}

impl Snapshot {
    pub fn tasks_owned_by<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |task| task.owner == owner)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotFeed {
    sender: Arc<watch::Sender<Arc<Snapshot>>>,
}

pub type Subscription = watch::Receiver<Arc<Snapshot>>;

impl Default for SnapshotFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotFeed {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        self.sender.subscribe()
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.sender.borrow().clone()
    }

    /// Replace the published record set, bumping the version.
    pub fn publish(&self, tasks: Vec<Task>, transactions: Vec<Transaction>) -> Arc<Snapshot> {
        let mut published = None;
        self.sender.send_modify(|current| {
            let next = Arc::new(Snapshot {
                version: current.version + 1,
                tasks,
                transactions,
            });
            published = Some(next.clone());
            *current = next;
        });
        let snapshot = published.unwrap_or_else(|| self.current());
        tracing::debug!(
            version = snapshot.version,
            tasks = snapshot.tasks.len(),
            transactions = snapshot.transactions.len(),
            "snapshot published"
        );
        snapshot
    }
}
