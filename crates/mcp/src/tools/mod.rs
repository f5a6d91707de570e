mod capture;
mod checklist;
mod day;
mod delete;
mod ledger;
mod note;
mod toggle;
mod util;

use std::sync::Arc;

use housekeep_core::services::TasksService;
use pmcp::ServerBuilder;

pub const TOOL_NAMES: [&str; 9] = [
    "day_view",
    "capture_task",
    "toggle_task",
    "toggle_subtask",
    "update_note",
    "create_checklist",
    "delete_task",
    "record_transaction",
    "ledger_summary",
];

pub fn register(builder: ServerBuilder, service: Arc<TasksService>) -> ServerBuilder {
    builder
        .tool("day_view", day::DayViewTool::new(service.clone()))
        .tool(
            "capture_task",
            capture::CaptureTaskTool::new(service.clone()),
        )
        .tool("toggle_task", toggle::ToggleTaskTool::new(service.clone()))
        .tool(
            "toggle_subtask",
            toggle::ToggleSubtaskTool::new(service.clone()),
        )
        .tool("update_note", note::UpdateNoteTool::new(service.clone()))
        .tool(
            "create_checklist",
            checklist::CreateChecklistTool::new(service.clone()),
        )
        .tool("delete_task", delete::DeleteTaskTool::new(service.clone()))
        .tool(
            "record_transaction",
            ledger::RecordTransactionTool::new(service.clone()),
        )
        .tool("ledger_summary", ledger::LedgerSummaryTool::new(service))
}
