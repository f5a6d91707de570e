use std::sync::Arc;

use async_trait::async_trait;
use housekeep_core::services::TasksService;
use pmcp::{RequestHandlerExtra, Result as McpResult, ToolHandler};
use serde::Deserialize;
use serde_json::{json, Value};

use super::util::{service_error, session_for, validation_error, with_service};

pub struct DeleteTaskTool {
    service: Arc<TasksService>,
}

impl DeleteTaskTool {
    pub fn new(service: Arc<TasksService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteTaskArgs {
    user: Option<String>,
    ids: Vec<String>,
}

#[async_trait]
impl ToolHandler for DeleteTaskTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> McpResult<Value> {
        let parsed: DeleteTaskArgs =
            serde_json::from_value(args).map_err(|err| validation_error(err))?;
        if parsed.ids.is_empty() {
            return Err(validation_error("ids must contain at least one task id"));
        }

        let DeleteTaskArgs { user, ids } = parsed;
        let results = with_service(self.service.clone(), move |service| {
            let session = session_for(service, user.as_deref())?;
            ids.iter()
                .map(|id| service.delete_task(&session, id))
                .collect::<anyhow::Result<Vec<_>>>()
        })
        .await
        .map_err(service_error)?;

        Ok(json!({ "results": results }))
    }

    fn metadata(&self) -> Option<pmcp::types::ToolInfo> {
        Some(pmcp::types::ToolInfo::new(
            "delete_task".to_string(),
            Some("Permanently delete one or more tasks by id".to_string()),
            json!({
                "type": "object",
                "required": ["ids"],
                "properties": {
                    "user": { "type": "string" },
                    "ids": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1
                    }
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
    async fn reports_per_id_results() {
        let (service, _dir) = test_service();
        let id = seed_task(&service, "ana@household.local", "Return drill");
        let tool = DeleteTaskTool::new(service.clone());

        let response = tool
            .handle(json!({ "ids": [id.clone(), "missing"] }), test_extra())
            .await
            .expect("delete");

        let results = response["results"].as_array().expect("results");
        assert_eq!(results[0]["deleted"], json!(true));
        assert_eq!(results[1]["deleted"], json!(false));
        assert!(service.fetch_task(&id).unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_ids_are_rejected() {
        let (service, _dir) = test_service();
        let tool = DeleteTaskTool::new(service);
        assert!(tool.handle(json!({ "ids": [] }), test_extra()).await.is_err());
    }
}
