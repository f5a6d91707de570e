use std::path::PathBuf;

use clap::{value_parser, Args, Parser, Subcommand};

use crate::core::capture::TaskInput;
use crate::model::{ChecklistKind, TaskFilter, TransactionKind};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "housekeep",
    version,
    about = "Shared household chores, checklists and a common cash box.",
    after_help = "Examples:\n  housekeep                      Show today's board (same as `housekeep day`)\n  housekeep --as ana@household.local add Fix tap due:fri apt:attic !\n  housekeep --date tomorrow day --filter pending\n  housekeep checklist monthly --apartment \"First Floor\"\n  housekeep ledger add expense 12.50 Light bulbs\n  housekeep mcp --log debug"
)]
pub struct Cli {
    /// Override the data directory (defaults to platform-specific app dir)
    #[arg(long, value_name = "PATH", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Act as the roster member with this email (defaults to the first admin)
    #[arg(long = "as", value_name = "EMAIL", global = true)]
    pub user: Option<String>,

    /// Reference date for the board (ISO, today, tomorrow, +3d, mon)
    #[arg(long = "date", value_name = "DATE", global = true)]
    pub date: Option<String>,

    /// Tracing filter written to stderr (e.g. "info", "debug")
    #[arg(long = "log", value_name = "DIRECTIVE", global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Show the board for the reference date (default command)
    Day(DayArgs),
    /// Add a task; inline tokens: due:<date>, apt:<apartment>, @member, !
    Add(AddArgs),
    /// Edit a task's text, due date or apartment
    Edit(EditArgs),
    /// Toggle a task between open and completed
    Toggle(IdArgs),
    /// Toggle the important flag of a task
    Star(IdArgs),
    /// Manage subtasks of a task
    #[command(subcommand)]
    Subtask(SubtaskCommand),
    /// Replace a task's note; pass no text to clear it
    Note(NoteArgs),
    /// Attach a photo to a task or one of its subtasks
    Photo(PhotoArgs),
    /// Delete one or more tasks by id
    Delete(DeleteArgs),
    /// Create a maintenance checklist task
    Checklist(ChecklistArgs),
    /// Ask the suggestion service for new task ideas
    Suggest(SuggestArgs),
    /// Split a task into suggested subtasks
    Decompose(IdArgs),
    /// Admin dashboard: progress per member and all tasks
    Overview,
    /// The shared finance ledger
    #[command(subcommand)]
    Ledger(LedgerCommand),
    /// Run the Model Context Protocol server over stdio (honours --log)
    Mcp,
}

impl Default for CliCommand {
    fn default() -> Self {
        CliCommand::Day(DayArgs::default())
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct DayArgs {
    /// Narrow the board to open, completed or important tasks
    #[arg(long, value_enum, default_value_t = TaskFilter::All)]
    pub filter: TaskFilter,

    /// Only show one apartment ("general" for untagged tasks)
    #[arg(long, value_name = "APARTMENT")]
    pub apartment: Option<String>,

    /// Admin only: show another member's board
    #[arg(long, value_name = "NAME")]
    pub member: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Task text with optional inline tokens
    #[arg(value_name = "TEXT", required = true)]
    pub text: Vec<String>,

    /// Optional note
    #[arg(long)]
    pub note: Option<String>,

    /// Due date (overrides inline due: token)
    #[arg(long, value_name = "DATE")]
    pub due: Option<String>,

    /// Apartment (overrides inline apt: token)
    #[arg(long, value_name = "APARTMENT")]
    pub apartment: Option<String>,

    /// Owner (admins only; overrides inline @member token)
    #[arg(long, value_name = "NAME")]
    pub owner: Option<String>,

    /// Mark the task important
    #[arg(long)]
    pub important: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    /// New task text
    #[arg(long)]
    pub text: Option<String>,

    /// New due date, or "none" to clear it
    #[arg(long, value_name = "DATE")]
    pub due: Option<String>,

    /// New apartment, or "none" to clear it
    #[arg(long, value_name = "APARTMENT")]
    pub apartment: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct IdArgs {
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubtaskCommand {
    /// Append a subtask
    Add {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
        #[arg(value_name = "TEXT", required = true)]
        text: Vec<String>,
    },
    /// Toggle a subtask; completing the last open one completes the task
    Toggle {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
        #[arg(value_name = "SUBTASK_ID")]
        subtask_id: String,
    },
    /// Remove a subtask
    Delete {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
        #[arg(value_name = "SUBTASK_ID")]
        subtask_id: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct NoteArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    #[arg(value_name = "TEXT")]
    pub text: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PhotoArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    /// Image file to upload
    #[arg(value_name = "FILE", value_parser = value_parser!(PathBuf))]
    pub file: PathBuf,

    /// Attach to this subtask instead of the task
    #[arg(long, value_name = "SUBTASK_ID")]
    pub subtask: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// One or more task ids to delete
    #[arg(value_name = "ID", required = true)]
    pub ids: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ChecklistArgs {
    #[arg(value_enum)]
    pub kind: ChecklistKind,

    /// Owner (admins only; defaults to yourself)
    #[arg(long, value_name = "NAME")]
    pub owner: Option<String>,

    #[arg(long, value_name = "APARTMENT")]
    pub apartment: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SuggestArgs {
    /// Create a task for every suggestion received
    #[arg(long)]
    pub accept: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum LedgerCommand {
    /// List entries, newest first, with the running balance
    List,
    /// Record a deposit or expense
    Add {
        #[arg(value_enum)]
        kind: TransactionKind,
        #[arg(value_name = "AMOUNT", allow_negative_numbers = true)]
        amount: f64,
        #[arg(value_name = "DESCRIPTION", required = true)]
        description: Vec<String>,
        /// Receipt image to attach
        #[arg(long, value_name = "FILE")]
        receipt: Option<PathBuf>,
    },
    /// Delete entries by id
    Delete {
        #[arg(value_name = "ID", required = true)]
        ids: Vec<String>,
    },
}

impl From<AddArgs> for TaskInput {
    fn from(args: AddArgs) -> Self {
        TaskInput {
            text: args.text,
            note: args.note,
            due: args.due,
            apartment: args.apartment,
            owner: args.owner,
            important: args.important,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "housekeep",
            "add",
            "Fix",
            "tap",
            "--as",
            "ana@household.local",
            "--date",
            "tomorrow",
        ])
        .unwrap();
        assert_eq!(cli.user.as_deref(), Some("ana@household.local"));
        assert_eq!(cli.date.as_deref(), Some("tomorrow"));
        match cli.command {
            Some(CliCommand::Add(args)) => assert_eq!(args.text, vec!["Fix", "tap"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn ledger_add_parses_kind_and_amount() {
        let cli =
            Cli::try_parse_from(["housekeep", "ledger", "add", "expense", "12.5", "Bulbs"]).unwrap();
        match cli.command {
            Some(CliCommand::Ledger(LedgerCommand::Add { kind, amount, .. })) => {
                assert_eq!(kind, TransactionKind::Expense);
                assert_eq!(amount, 12.5);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
