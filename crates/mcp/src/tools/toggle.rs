use std::sync::Arc;

use async_trait::async_trait;
use housekeep_core::services::TasksService;
use pmcp::{RequestHandlerExtra, Result as McpResult, ToolHandler};
use serde::Deserialize;
use serde_json::{json, Value};

use super::util::{service_error, session_for, validation_error, with_service};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ToggleField {
    #[default]
    Completed,
    Important,
}

pub struct ToggleTaskTool {
    service: Arc<TasksService>,
}

impl ToggleTaskTool {
    pub fn new(service: Arc<TasksService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleTaskArgs {
    user: Option<String>,
    id: String,
    #[serde(default)]
    field: ToggleField,
}

#[async_trait]
impl ToolHandler for ToggleTaskTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> McpResult<Value> {
        let parsed: ToggleTaskArgs =
            serde_json::from_value(args).map_err(|err| validation_error(err))?;

        let ToggleTaskArgs { user, id, field } = parsed;
        let task = with_service(self.service.clone(), move |service| {
            let session = session_for(service, user.as_deref())?;
            match field {
                ToggleField::Completed => service.toggle_completion(&session, &id),
                ToggleField::Important => service.toggle_importance(&session, &id),
            }
        })
        .await
        .map_err(service_error)?;

        Ok(json!({ "changed": task.is_some(), "task": task }))
    }

    fn metadata(&self) -> Option<pmcp::types::ToolInfo> {
        Some(pmcp::types::ToolInfo::new(
            "toggle_task".to_string(),
            Some(
                "Flip a task's completed or important flag; unknown ids report changed=false"
                    .to_string(),
            ),
            json!({
                "type": "object",
                "required": ["id"],
                "properties": {
                    "user": { "type": "string" },
                    "id": { "type": "string" },
                    "field": { "type": "string", "enum": ["completed", "important"] }
                }
            }),
        ))
    }
}

pub struct ToggleSubtaskTool {
    service: Arc<TasksService>,
}

impl ToggleSubtaskTool {
    pub fn new(service: Arc<TasksService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleSubtaskArgs {
    user: Option<String>,
    task_id: String,
    subtask_id: String,
}

#[async_trait]
impl ToolHandler for ToggleSubtaskTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> McpResult<Value> {
        let parsed: ToggleSubtaskArgs =
            serde_json::from_value(args).map_err(|err| validation_error(err))?;

        let ToggleSubtaskArgs {
            user,
            task_id,
            subtask_id,
        } = parsed;
        let task = with_service(self.service.clone(), move |service| {
            let session = session_for(service, user.as_deref())?;
            service.toggle_subtask(&session, &task_id, &subtask_id)
        })
        .await
        .map_err(service_error)?;

        Ok(json!({ "changed": task.is_some(), "task": task }))
    }

    fn metadata(&self) -> Option<pmcp::types::ToolInfo> {
        Some(pmcp::types::ToolInfo::new(
            "toggle_subtask".to_string(),
            Some(
                "Flip a subtask; completing the last open subtask also completes the task"
                    .to_string(),
            ),
            json!({
                "type": "object",
                "required": ["taskId", "subtaskId"],
                "properties": {
                    "user": { "type": "string" },
                    "taskId": { "type": "string" },
                    "subtaskId": { "type": "string" }
                }
            }),
        ))
    }
}
