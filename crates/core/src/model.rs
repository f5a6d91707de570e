use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub fn new_id() -> String {
    Ulid::new().to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Proximity of a due date to the day being viewed.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    None,
    High,
    Medium,
    Neutral,
    Low,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::None => "none",
            Urgency::High => "high",
            Urgency::Medium => "medium",
            Urgency::Neutral => "neutral",
            Urgency::Low => "low",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deposit" | "in" => Ok(TransactionKind::Deposit),
            "expense" | "out" => Ok(TransactionKind::Expense),
            other => Err(anyhow!(
                "Unknown transaction type '{}': expected deposit|expense",
                other
            )),
        }
    }
}

impl ValueEnum for TransactionKind {
    fn value_variants<'a>() -> &'a [Self] {
        &[TransactionKind::Deposit, TransactionKind::Expense]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

/// Recurring maintenance cadence a checklist task is instantiated for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChecklistKind {
    Monthly,
    Quarterly,
}

impl ChecklistKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecklistKind::Monthly => "monthly",
            ChecklistKind::Quarterly => "quarterly",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ChecklistKind::Monthly => "Monthly maintenance checklist",
            ChecklistKind::Quarterly => "Quarterly maintenance checklist",
        }
    }
}

impl fmt::Display for ChecklistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChecklistKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "monthly" => Ok(ChecklistKind::Monthly),
            "quarterly" => Ok(ChecklistKind::Quarterly),
            other => Err(anyhow!(
                "Unknown checklist '{}': expected monthly|quarterly",
                other
            )),
        }
    }
}

impl ValueEnum for ChecklistKind {
    fn value_variants<'a>() -> &'a [Self] {
        &[ChecklistKind::Monthly, ChecklistKind::Quarterly]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

/// Status narrowing applied on top of the day's visible tasks.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskFilter {
    #[default]
    All,
    Pending,
    Completed,
    Important,
}

impl TaskFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskFilter::All => "all",
            TaskFilter::Pending => "pending",
            TaskFilter::Completed => "completed",
            TaskFilter::Important => "important",
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Pending => !task.completed,
            TaskFilter::Completed => task.completed,
            TaskFilter::Important => task.important,
        }
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(TaskFilter::All),
            "pending" | "open" => Ok(TaskFilter::Pending),
            "completed" | "done" => Ok(TaskFilter::Completed),
            "important" | "starred" => Ok(TaskFilter::Important),
            other => Err(anyhow!(
                "Unknown filter '{}': expected all|pending|completed|important",
                other
            )),
        }
    }
}

impl ValueEnum for TaskFilter {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            TaskFilter::All,
            TaskFilter::Pending,
            TaskFilter::Completed,
            TaskFilter::Important,
        ]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subtask {
    pub id: String,
    pub text: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl Subtask {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            text: text.into(),
            completed: false,
            photo: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub created: NaiveDate,
    pub completed: bool,
    pub important: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apartment: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub owner: String,
    #[serde(default)]
    pub decomposing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn all_subtasks_completed(&self) -> bool {
        !self.subtasks.is_empty() && self.subtasks.iter().all(|s| s.completed)
    }

    pub fn subtask(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub text: String,
    pub owner: String,
    pub created: Option<NaiveDate>,
    pub important: bool,
    pub due: Option<NaiveDate>,
    pub note: Option<String>,
    pub apartment: Option<String>,
    pub subtasks: Vec<Subtask>,
}

impl NewTask {
    /// Materialize the record with a fresh id; `today` fills a missing creation key.
    pub fn into_task(self, today: NaiveDate) -> Task {
        Task {
            id: new_id(),
            text: self.text,
            created: self.created.unwrap_or(today),
            completed: false,
            important: self.important,
            due: self.due,
            note: self.note,
            photo: None,
            apartment: self.apartment,
            subtasks: self.subtasks,
            owner: self.owner,
            decomposing: false,
            completed_at: None,
        }
    }
}

/// Partial-field update for a task document. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub completed: Option<bool>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub important: Option<bool>,
    pub due: Option<Option<NaiveDate>>,
    pub note: Option<Option<String>>,
    pub photo: Option<Option<String>>,
    pub apartment: Option<Option<String>>,
    pub subtasks: Option<Vec<Subtask>>,
    pub decomposing: Option<bool>,
}

impl TaskPatch {
    pub fn completion(completed: bool, now: DateTime<Utc>) -> Self {
        Self {
            completed: Some(completed),
            completed_at: Some(completed.then_some(now)),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(text) = &self.text {
            task.text = text.clone();
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(completed_at) = self.completed_at {
            task.completed_at = completed_at;
        }
        if let Some(important) = self.important {
            task.important = important;
        }
        if let Some(due) = self.due {
            task.due = due;
        }
        if let Some(note) = &self.note {
            task.note = note.clone();
        }
        if let Some(photo) = &self.photo {
            task.photo = photo.clone();
        }
        if let Some(apartment) = &self.apartment {
            task.apartment = apartment.clone();
        }
        if let Some(subtasks) = &self.subtasks {
            task.subtasks = subtasks.clone();
        }
        if let Some(decomposing) = self.decomposing {
            task.decomposing = decomposing;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub kind: TransactionKind,
    pub amount: f64,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub recorded_by: String,
}

impl Transaction {
    /// Contribution of this entry to the ledger balance.
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            TransactionKind::Deposit => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub amount: f64,
    pub description: String,
    pub photo: Option<String>,
    pub recorded_by: String,
}

impl NewTransaction {
    pub fn into_transaction(self, now: DateTime<Utc>) -> Transaction {
        Transaction {
            id: new_id(),
            kind: self.kind,
            amount: self.amount,
            description: self.description,
            recorded_at: now,
            photo: self.photo,
            recorded_by: self.recorded_by,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddOutcome {
    pub id: String,
    pub text: String,
    pub owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,
}

impl From<&Task> for AddOutcome {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            text: task.text.clone(),
            owner: task.owner.clone(),
            due: task.due,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub id: String,
    pub deleted: bool,
}
