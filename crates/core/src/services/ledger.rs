use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use super::{authorize, Backend};
use crate::blob::BlobStore;
use crate::error::ValidationError;
use crate::household::Session;
use crate::model::{DeleteResult, NewTransaction, Transaction, TransactionKind};
use crate::stats::LedgerSummary;

/// Optional receipt photo attached to a ledger entry.
#[derive(Debug, Clone, Copy)]
pub struct Receipt<'a> {
    pub file_name: &'a str,
    pub bytes: &'a [u8],
}

/// Shared finance ledger. Any member may record entries; an entry can be
/// removed by whoever recorded it or by an admin.
#[derive(Clone)]
pub struct LedgerService {
    backend: Backend,
    blobs: Arc<dyn BlobStore>,
}

impl LedgerService {
    pub(crate) fn new(backend: Backend, blobs: Arc<dyn BlobStore>) -> Self {
        Self { backend, blobs }
    }

    pub fn record_transaction(
        &self,
        session: &Session,
        kind: TransactionKind,
        amount: f64,
        description: &str,
        receipt: Option<Receipt<'_>>,
    ) -> Result<Transaction> {
        self.backend.mutation("record_transaction", |store| {
            if !amount.is_finite() || amount < 0.0 {
                return Err(ValidationError::InvalidAmount(amount).into());
            }
            let description = description.trim();
            if description.is_empty() {
                return Err(ValidationError::EmptyDescription.into());
            }

            let photo = match receipt {
                Some(receipt) => Some(self.blobs.upload(receipt.file_name, receipt.bytes)?),
                None => None,
            };
            let transaction = NewTransaction {
                kind,
                amount,
                description: description.to_string(),
                photo,
                recorded_by: session.name.clone(),
            }
            .into_transaction(Utc::now());
            store.insert_transaction(&transaction)?;
            Ok(transaction)
        })
    }

    pub fn delete_transaction(&self, session: &Session, id: &str) -> Result<DeleteResult> {
        self.backend.mutation("delete_transaction", |store| {
            let existing = store
                .transactions()?
                .into_iter()
                .find(|entry| entry.id == id);
            let deleted = match existing {
                Some(entry) => {
                    authorize(session, &entry.recorded_by)?;
                    store.delete_transaction(id)?
                }
                None => {
                    tracing::debug!(transaction_id = id, "transaction not found, nothing to do");
                    false
                }
            };
            Ok(DeleteResult {
                id: id.to_string(),
                deleted,
            })
        })
    }

    /// Entries newest first.
    pub fn transactions(&self) -> Result<Vec<Transaction>> {
        let mut entries = self.backend.store().transactions()?;
        entries.reverse();
        Ok(entries)
    }

    pub fn summary(&self) -> Result<LedgerSummary> {
        let entries = self.backend.store().transactions()?;
        Ok(LedgerSummary::from_transactions(&entries))
    }
}
