use crate::error::ValidationError;

/// Normalized input for adding a task from any client (CLI, MCP, suggestions).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInput {
    /// Words of the task text, possibly carrying inline tokens (`due:`, `apt:`, `@owner`, `!`).
    pub text: Vec<String>,
    pub note: Option<String>,
    pub due: Option<String>,
    pub apartment: Option<String>,
    pub owner: Option<String>,
    pub important: bool,
}

impl TaskInput {
    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.split_whitespace().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn require_text(&self) -> Result<(), ValidationError> {
        if self.text.iter().all(|word| word.trim().is_empty()) {
            return Err(ValidationError::EmptyText);
        }
        Ok(())
    }
}
