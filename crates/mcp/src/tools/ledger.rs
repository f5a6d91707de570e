use std::sync::Arc;

use async_trait::async_trait;
use housekeep_core::model::TransactionKind;
use housekeep_core::services::TasksService;
use pmcp::{RequestHandlerExtra, Result as McpResult, ToolHandler};
use serde::Deserialize;
use serde_json::{json, Value};

use super::util::{service_error, session_for, validation_error, with_service};

const DEFAULT_ENTRY_LIMIT: usize = 20;

pub struct RecordTransactionTool {
    service: Arc<TasksService>,
}

impl RecordTransactionTool {
    pub fn new(service: Arc<TasksService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordTransactionArgs {
    user: Option<String>,
    kind: TransactionKind,
    amount: f64,
    description: String,
}

#[async_trait]
impl ToolHandler for RecordTransactionTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> McpResult<Value> {
        let parsed: RecordTransactionArgs =
            serde_json::from_value(args).map_err(|err| validation_error(err))?;

        let (entry, summary) = with_service(self.service.clone(), move |service| {
            let session = session_for(service, parsed.user.as_deref())?;
            let ledger = service.ledger();
            let entry = ledger.record_transaction(
                &session,
                parsed.kind,
                parsed.amount,
                &parsed.description,
                None,
            )?;
            Ok((entry, ledger.summary()?))
        })
        .await
        .map_err(service_error)?;

        Ok(json!({ "transaction": entry, "summary": summary }))
    }

    fn metadata(&self) -> Option<pmcp::types::ToolInfo> {
        Some(pmcp::types::ToolInfo::new(
            "record_transaction".to_string(),
            Some(
                "Record a deposit or expense in the shared ledger and return the new balance"
                    .to_string(),
            ),
            json!({
                "type": "object",
                "required": ["kind", "amount", "description"],
                "properties": {
                    "user": { "type": "string" },
                    "kind": { "type": "string", "enum": ["deposit", "expense"] },
                    "amount": { "type": "number", "minimum": 0 },
                    "description": { "type": "string" }
                }
            }),
        ))
    }
}

pub struct LedgerSummaryTool {
    service: Arc<TasksService>,
}

impl LedgerSummaryTool {
    pub fn new(service: Arc<TasksService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerSummaryArgs {
    limit: Option<usize>,
}

#[async_trait]
impl ToolHandler for LedgerSummaryTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> McpResult<Value> {
        let parsed: LedgerSummaryArgs = if args.is_null() {
            LedgerSummaryArgs::default()
        } else {
            serde_json::from_value(args).map_err(|err| validation_error(err))?
        };
        let limit = parsed.limit.unwrap_or(DEFAULT_ENTRY_LIMIT);

        let (summary, entries) = with_service(self.service.clone(), move |service| {
            let ledger = service.ledger();
            let mut entries = ledger.transactions()?;
            entries.truncate(limit);
            Ok((ledger.summary()?, entries))
        })
        .await
        .map_err(service_error)?;

        Ok(json!({ "summary": summary, "entries": entries }))
    }

    fn metadata(&self) -> Option<pmcp::types::ToolInfo> {
        Some(pmcp::types::ToolInfo::new(
            "ledger_summary".to_string(),
            Some(
                "Balance, totals and the most recent ledger entries (newest first)".to_string(),
            ),
            json!({
                "type": "object",
                "properties": {
                    "limit": { "type": "integer", "minimum": 0 }
                }
            }),
        ))
    }
}
