use std::sync::Arc;

use async_trait::async_trait;
use housekeep_core::model::ChecklistKind;
use housekeep_core::services::TasksService;
use pmcp::{RequestHandlerExtra, Result as McpResult, ToolHandler};
use serde::Deserialize;
use serde_json::{json, Value};

use super::util::{service_error, session_for, validation_error, with_service};

pub struct CreateChecklistTool {
    service: Arc<TasksService>,
}

impl CreateChecklistTool {
    pub fn new(service: Arc<TasksService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateChecklistArgs {
    user: Option<String>,
    kind: ChecklistKind,
    owner: Option<String>,
    apartment: Option<String>,
}

#[async_trait]
impl ToolHandler for CreateChecklistTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> McpResult<Value> {
        let parsed: CreateChecklistArgs =
            serde_json::from_value(args).map_err(|err| validation_error(err))?;

        let task = with_service(self.service.clone(), move |service| {
            let session = session_for(service, parsed.user.as_deref())?;
            let outcome = service.create_checklist_task(
                &session,
                parsed.kind,
                parsed.owner.as_deref(),
                parsed.apartment.as_deref(),
            )?;
            service.fetch_task(&outcome.id)
        })
        .await
        .map_err(service_error)?;

        Ok(json!({ "task": task }))
    }

    fn metadata(&self) -> Option<pmcp::types::ToolInfo> {
        Some(pmcp::types::ToolInfo::new(
            "create_checklist".to_string(),
            Some(
                "Create a maintenance task pre-filled with the monthly or quarterly checklist"
                    .to_string(),
            ),
            json!({
                "type": "object",
                "required": ["kind"],
                "properties": {
                    "user": { "type": "string" },
                    "kind": { "type": "string", "enum": ["monthly", "quarterly"] },
                    "owner": { "type": "string", "description": "Roster name; admins only" },
                    "apartment": { "type": "string" }
                }
            }),
        ))
    }
}
