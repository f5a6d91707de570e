use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use housekeep_core::dates::{self, date_key, parse_date_spec};
use housekeep_core::grouping::BucketKey;
use housekeep_core::model::TaskFilter;
use housekeep_core::services::TasksService;
use housekeep_core::view::{Action, DayView, ViewState};
use pmcp::{RequestHandlerExtra, Result as McpResult, ToolHandler};
use serde::Deserialize;
use serde_json::{json, Value};

use super::util::{internal_error, service_error, session_for, validation_error, with_service};

pub struct DayViewTool {
    service: Arc<TasksService>,
}

impl DayViewTool {
    pub fn new(service: Arc<TasksService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DayViewArgs {
    user: Option<String>,
    date: Option<String>,
    filter: Option<String>,
    apartment: Option<String>,
    member: Option<String>,
}

#[async_trait]
impl ToolHandler for DayViewTool {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> McpResult<Value> {
        let parsed: DayViewArgs = if args.is_null() {
            DayViewArgs::default()
        } else {
            serde_json::from_value(args).map_err(|err| validation_error(err))?
        };
        let reference = match parsed.date.as_deref() {
            Some(spec) => parse_date_spec(spec, dates::today()).map_err(validation_error)?,
            None => dates::today(),
        };
        let filter = match parsed.filter.as_deref() {
            Some(raw) => TaskFilter::from_str(raw).map_err(validation_error)?,
            None => TaskFilter::default(),
        };

        let view = with_service(self.service.clone(), move |service| {
            let session = session_for(service, parsed.user.as_deref())?;
            let mut state = ViewState::new(session, service.household().clone(), reference);
            state.reduce(Action::Snapshot(service.snapshot()));
            state.reduce(Action::SetFilter(filter));
            if let Some(member) = parsed.member {
                if !state.session().is_admin() {
                    return Err(anyhow!("Only an admin can view another member's board"));
                }
                state.reduce(Action::SelectMember(Some(member)));
            }
            if let Some(apartment) = parsed.apartment.as_deref() {
                state.reduce(Action::SetScope(Some(scope_for(service, apartment)?)));
            }
            Ok(state.day_view())
        })
        .await
        .map_err(service_error)?;

        render(&view).map_err(internal_error)
    }

    fn metadata(&self) -> Option<pmcp::types::ToolInfo> {
        Some(pmcp::types::ToolInfo::new(
            "day_view".to_string(),
            Some(
                "Tasks visible on a day, grouped by apartment, with urgency per task".to_string(),
            ),
            json!({
                "type": "object",
                "properties": {
                    "user": { "type": "string", "description": "Email of the acting member; defaults to the first admin" },
                    "date": { "type": "string", "description": "Reference day (ISO, today, tomorrow, +3d)" },
                    "filter": { "type": "string", "enum": ["all", "pending", "completed", "important"] },
                    "apartment": { "type": "string", "description": "Only this apartment, or \"general\"" },
                    "member": { "type": "string", "description": "Admins only: show this member's board" }
                }
            }),
        ))
    }
}

fn scope_for(service: &TasksService, apartment: &str) -> Result<BucketKey> {
    if apartment.eq_ignore_ascii_case(BucketKey::General.label()) {
        return Ok(BucketKey::General);
    }
    service
        .household()
        .resolve_apartment(apartment)
        .map(|name| BucketKey::Apartment(name.to_string()))
        .ok_or_else(|| anyhow!("Unknown apartment '{}'", apartment))
}

fn render(view: &DayView) -> Result<Value> {
    let mut buckets = Vec::new();
    for bucket in &view.groups.buckets {
        let mut tasks = Vec::with_capacity(bucket.tasks.len());
        for task in &bucket.tasks {
            let mut value = serde_json::to_value(task)?;
            if let Value::Object(fields) = &mut value {
                fields.insert("urgency".into(), json!(view.urgency(task)));
            }
            tasks.push(value);
        }
        buckets.push(json!({ "bucket": bucket.key.label(), "tasks": tasks }));
    }
    Ok(json!({
        "date": date_key(view.reference),
        "owner": view.owner,
        "filter": view.filter,
        "total": view.groups.total(),
        "buckets": buckets,
    }))
}
