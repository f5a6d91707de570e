use std::sync::Arc;

use async_trait::async_trait;
use housekeep_core::services::TasksService;
use pmcp::{RequestHandlerExtra, Result as McpResult, ToolHandler};
use serde::Deserialize;
use serde_json::{json, Value};

use super::util::{service_error, session_for, validation_error, with_service};

pub struct UpdateNoteTool {
    service: Arc<TasksService>,
}

impl UpdateNoteTool {
    pub fn new(service: Arc<TasksService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateNoteArgs {
    user: Option<String>,
    id: String,
    #[serde(default)]
    note: Option<String>,
}

#[async_trait]
impl ToolHandler for UpdateNoteTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> McpResult<Value> {
        let parsed: UpdateNoteArgs =
            serde_json::from_value(args).map_err(|err| validation_error(err))?;

        let UpdateNoteArgs { user, id, note } = parsed;
        let task = with_service(self.service.clone(), move |service| {
            let session = session_for(service, user.as_deref())?;
            service.update_note(&session, &id, note.as_deref().unwrap_or_default())
        })
        .await
        .map_err(service_error)?;

        Ok(json!({ "changed": task.is_some(), "task": task }))
    }

    fn metadata(&self) -> Option<pmcp::types::ToolInfo> {
        Some(pmcp::types::ToolInfo::new(
            "update_note".to_string(),
            Some("Replace a task's note; omit or blank to clear it".to_string()),
            json!({
                "type": "object",
                "required": ["id"],
                "properties": {
                    "user": { "type": "string" },
                    "id": { "type": "string" },
                    "note": { "type": ["string", "null"] }
                }
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::tools::util::{seed_task, test_extra, test_service};

    #[tokio::test]
    async fn sets_and_clears_note() {
        let (service, _dir) = test_service();
        let id = seed_task(&service, "ana@household.local", "Order skip");
        let tool = UpdateNoteTool::new(service.clone());

        let response = tool
            .handle(
                json!({ "user": "ana@household.local", "id": id, "note": "Thursday" }),
                test_extra(),
            )
            .await
            .expect("note");
        assert_eq!(response["task"]["note"], json!("Thursday"));

        tool.handle(json!({ "user": "ana@household.local", "id": id }), test_extra())
            .await
            .expect("clear");
        let task = service.fetch_task(&id).unwrap().unwrap();
        assert!(task.note.is_none());
    }
}
