use std::sync::Arc;

use async_trait::async_trait;
use housekeep_core::capture::TaskInput;
use housekeep_core::services::TasksService;
use pmcp::{RequestHandlerExtra, Result as McpResult, ToolHandler};
use serde::Deserialize;
use serde_json::{json, Value};

use super::util::{internal_error, service_error, session_for, validation_error, with_service};

pub struct CaptureTaskTool {
    service: Arc<TasksService>,
}

impl CaptureTaskTool {
    pub fn new(service: Arc<TasksService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptureTaskArgs {
    user: Option<String>,
    text: String,
    note: Option<String>,
    due: Option<String>,
    apartment: Option<String>,
    owner: Option<String>,
    #[serde(default)]
    important: bool,
}

impl CaptureTaskArgs {
    fn into_input(self) -> (Option<String>, TaskInput) {
        let input = TaskInput {
            text: self.text.split_whitespace().map(str::to_string).collect(),
            note: non_blank(self.note),
            due: non_blank(self.due),
            apartment: non_blank(self.apartment),
            owner: non_blank(self.owner),
            important: self.important,
        };
        (self.user, input)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[async_trait]
impl ToolHandler for CaptureTaskTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> McpResult<Value> {
        let parsed: CaptureTaskArgs =
            serde_json::from_value(args).map_err(|err| validation_error(err))?;
        let (user, input) = parsed.into_input();
        input.require_text().map_err(validation_error)?;

        let outcome = with_service(self.service.clone(), move |service| {
            let session = session_for(service, user.as_deref())?;
            service.capture(&session, input)
        })
        .await
        .map_err(service_error)?;

        serde_json::to_value(outcome).map_err(internal_error)
    }

    fn metadata(&self) -> Option<pmcp::types::ToolInfo> {
        Some(pmcp::types::ToolInfo::new(
            "capture_task".to_string(),
            Some(
                "Add a household task using the same inline tokens as the CLI".to_string(),
            ),
            json!({
                "type": "object",
                "required": ["text"],
                "properties": {
                    "user": { "type": "string", "description": "Email of the acting member; defaults to the first admin" },
                    "text": {
                        "type": "string",
                        "description": "Task text; may contain due:<date>, apt:<apartment>, @member and !"
                    },
                    "note": { "type": "string" },
                    "due": { "type": "string", "description": "ISO date or relative (today, +3d, fri)" },
                    "apartment": { "type": "string" },
                    "owner": { "type": "string", "description": "Roster name; admins only" },
                    "important": { "type": "boolean" }
                }
            }),
        ))
    }
}
