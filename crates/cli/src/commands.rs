use std::fmt;
use std::fs;
use std::future::Future;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::cli::{
    AddArgs, ChecklistArgs, CliCommand, DayArgs, DeleteArgs, EditArgs, LedgerCommand, NoteArgs,
    PhotoArgs, SubtaskCommand, SuggestArgs,
};
use crate::config::Invocation;
use crate::core::dates::{date_key, parse_date_spec};
use crate::core::grouping::BucketKey;
use crate::core::services::ledger::Receipt;
use crate::core::services::tasks::PhotoTarget;
use crate::core::suggest::{HttpSuggester, Suggester, SuggestionOutcome};
use crate::core::view::{Action, DayView, ViewState};
use crate::core::TasksService;
use crate::model::{DeleteResult, Task, TaskPatch, Urgency};

pub fn execute<W: Write>(invocation: &Invocation, command: CliCommand, writer: W) -> Result<()> {
    let service = TasksService::new(&invocation.config)?;
    let suggester = invocation
        .config
        .suggestions()
        .cloned()
        .map(HttpSuggester::new);
    let suggester = suggester.as_ref().map(|s| s as &dyn Suggester);
    dispatch(invocation, &service, suggester, command, writer)
}

fn dispatch<W: Write>(
    invocation: &Invocation,
    service: &TasksService,
    suggester: Option<&dyn Suggester>,
    command: CliCommand,
    mut writer: W,
) -> Result<()> {
    let session = &invocation.session;
    match command {
        CliCommand::Day(args) => handle_day(invocation, service, &args, &mut writer),
        CliCommand::Add(args) => handle_add(invocation, service, args, &mut writer),
        CliCommand::Edit(args) => handle_edit(invocation, service, args, &mut writer),
        CliCommand::Toggle(args) => {
            match service.toggle_completion(session, &args.id)? {
                Some(task) if task.completed => writeln!(writer, "Completed \"{}\"", task.text)?,
                Some(task) => writeln!(writer, "Reopened \"{}\"", task.text)?,
                None => writeln!(writer, "Not found: {}", args.id)?,
            }
            Ok(())
        }
        CliCommand::Star(args) => {
            match service.toggle_importance(session, &args.id)? {
                Some(task) if task.important => writeln!(writer, "Starred \"{}\"", task.text)?,
                Some(task) => writeln!(writer, "Unstarred \"{}\"", task.text)?,
                None => writeln!(writer, "Not found: {}", args.id)?,
            }
            Ok(())
        }
        CliCommand::Subtask(command) => handle_subtask(invocation, service, command, &mut writer),
        CliCommand::Note(args) => handle_note(invocation, service, &args, &mut writer),
        CliCommand::Photo(args) => handle_photo(invocation, service, &args, &mut writer),
        CliCommand::Delete(args) => handle_delete(invocation, service, &args, &mut writer),
        CliCommand::Checklist(args) => handle_checklist(invocation, service, &args, &mut writer),
        CliCommand::Suggest(args) => {
            let suggester = require_suggester(suggester)?;
            handle_suggest(invocation, service, suggester, &args, &mut writer)
        }
        CliCommand::Decompose(args) => {
            let suggester = require_suggester(suggester)?;
            let task = block_on(service.decompose_task(session, &args.id, suggester))??;
            match task {
                Some(task) if task.subtasks.is_empty() => {
                    writeln!(writer, "No subtasks suggested for \"{}\"", task.text)?
                }
                Some(task) => {
                    writeln!(writer, "\"{}\" now has {} subtasks", task.text, task.subtasks.len())?;
                    for subtask in &task.subtasks {
                        writeln!(writer, "  [ ] {}  id:{}", subtask.text, subtask.id)?;
                    }
                }
                None => writeln!(writer, "Not found: {}", args.id)?,
            }
            Ok(())
        }
        CliCommand::Overview => handle_overview(invocation, service, &mut writer),
        CliCommand::Ledger(command) => handle_ledger(invocation, service, command, &mut writer),
        CliCommand::Mcp => Err(anyhow!("launch the MCP server directly")),
    }
}

fn view_state(invocation: &Invocation, service: &TasksService) -> ViewState {
    let mut state = ViewState::new(
        invocation.session.clone(),
        service.household().clone(),
        invocation.today,
    );
    state.reduce(Action::Snapshot(service.snapshot()));
    state
}

fn handle_day<W: Write>(
    invocation: &Invocation,
    service: &TasksService,
    args: &DayArgs,
    mut writer: W,
) -> Result<()> {
    let mut state = view_state(invocation, service);
    state.reduce(Action::SetFilter(args.filter));
    if let Some(member) = &args.member {
        if !invocation.session.is_admin() {
            return Err(anyhow!("Only an admin can view another member's board"));
        }
        if service.household().member(member).is_none() {
            return Err(anyhow!("'{}' is not a household member", member));
        }
        state.reduce(Action::SelectMember(Some(member.clone())));
    }
    if let Some(apartment) = &args.apartment {
        state.reduce(Action::SetScope(Some(bucket_for(service, apartment)?)));
    }

    let view = state.day_view();
    writeln!(
        writer,
        "Board for {} on {} ({})",
        view.owner,
        date_key(view.reference),
        view.filter
    )?;
    if view.groups.total() == 0 {
        writeln!(writer, "Nothing on the board")?;
        return Ok(());
    }
    for bucket in view.groups.non_empty() {
        writeln!(writer, "{}", bucket.key)?;
        for task in &bucket.tasks {
            write_task(&mut writer, task, day_urgency(&view, task))?;
        }
    }
    Ok(())
}

fn bucket_for(service: &TasksService, apartment: &str) -> Result<BucketKey> {
    if apartment.eq_ignore_ascii_case(BucketKey::General.label()) {
        return Ok(BucketKey::General);
    }
    service
        .household()
        .resolve_apartment(apartment)
        .map(|name| BucketKey::Apartment(name.to_string()))
        .ok_or_else(|| anyhow!("Unknown apartment '{}'", apartment))
}

fn day_urgency(view: &DayView, task: &Task) -> Urgency {
    if task.completed {
        Urgency::None
    } else {
        view.urgency(task)
    }
}

fn write_task<W: Write>(mut writer: W, task: &Task, urgency: Urgency) -> Result<()> {
    let mut line = format!(
        "  [{}] {}",
        if task.completed { "x" } else { " " },
        task.text
    );
    if task.important {
        line.push_str(" !");
    }
    if let Some(due) = task.due {
        line.push_str(&format!("  due {}", date_key(due)));
        if urgency != Urgency::None {
            line.push_str(&format!(" ({})", urgency));
        }
    }
    if task.photo.is_some() {
        line.push_str("  [photo]");
    }
    writeln!(writer, "{}  id:{}", line, task.id)?;
    if let Some(note) = &task.note {
        writeln!(writer, "      note: {}", note)?;
    }
    for subtask in &task.subtasks {
        writeln!(
            writer,
            "      [{}] {}  id:{}",
            if subtask.completed { "x" } else { " " },
            subtask.text,
            subtask.id
        )?;
    }
    Ok(())
}

fn handle_add<W: Write>(
    invocation: &Invocation,
    service: &TasksService,
    args: AddArgs,
    mut writer: W,
) -> Result<()> {
    let outcome = service.capture(&invocation.session, args.into())?;
    write!(
        writer,
        "Added \"{}\" for {} (id {})",
        outcome.text, outcome.owner, outcome.id
    )?;
    if let Some(due) = outcome.due {
        write!(writer, " due {}", date_key(due))?;
    }
    writeln!(writer)?;
    Ok(())
}

fn handle_edit<W: Write>(
    invocation: &Invocation,
    service: &TasksService,
    args: EditArgs,
    mut writer: W,
) -> Result<()> {
    let due = match args.due.as_deref() {
        Some("none") => Some(None),
        Some(spec) => Some(Some(parse_date_spec(spec, invocation.today)?)),
        None => None,
    };
    let apartment = match args.apartment.as_deref() {
        Some("none") => Some(None),
        Some(tag) => Some(Some(
            service
                .household()
                .resolve_apartment(tag)
                .unwrap_or(tag)
                .to_string(),
        )),
        None => None,
    };
    let patch = TaskPatch {
        text: args.text,
        due,
        apartment,
        ..TaskPatch::default()
    };
    if patch.is_empty() {
        return Err(anyhow!("Nothing to change: pass --text, --due or --apartment"));
    }
    match service.edit_task(&invocation.session, &args.id, patch)? {
        Some(task) => writeln!(writer, "Updated \"{}\"", task.text)?,
        None => writeln!(writer, "Not found: {}", args.id)?,
    }
    Ok(())
}

fn handle_subtask<W: Write>(
    invocation: &Invocation,
    service: &TasksService,
    command: SubtaskCommand,
    mut writer: W,
) -> Result<()> {
    let session = &invocation.session;
    match command {
        SubtaskCommand::Add { task_id, text } => {
            match service.add_subtask(session, &task_id, &text.join(" "))? {
                Some(task) => {
                    let added = task.subtasks.last().map(|s| s.id.as_str()).unwrap_or_default();
                    writeln!(writer, "Added subtask to \"{}\" (id {})", task.text, added)?;
                }
                None => writeln!(writer, "Not found: {}", task_id)?,
            }
        }
        SubtaskCommand::Toggle {
            task_id,
            subtask_id,
        } => match service.toggle_subtask(session, &task_id, &subtask_id)? {
            Some(task) => {
                let done = task.subtask(&subtask_id).is_some_and(|s| s.completed);
                write!(
                    writer,
                    "Subtask {}",
                    if done { "done" } else { "reopened" }
                )?;
                if done && task.completed {
                    write!(writer, "; \"{}\" is complete", task.text)?;
                }
                writeln!(writer)?;
            }
            None => writeln!(writer, "Not found: {}/{}", task_id, subtask_id)?,
        },
        SubtaskCommand::Delete {
            task_id,
            subtask_id,
        } => match service.delete_subtask(session, &task_id, &subtask_id)? {
            Some(task) => writeln!(writer, "Removed subtask from \"{}\"", task.text)?,
            None => writeln!(writer, "Not found: {}/{}", task_id, subtask_id)?,
        },
    }
    Ok(())
}

fn handle_note<W: Write>(
    invocation: &Invocation,
    service: &TasksService,
    args: &NoteArgs,
    mut writer: W,
) -> Result<()> {
    match service.update_note(&invocation.session, &args.id, &args.text.join(" "))? {
        Some(task) if task.note.is_some() => writeln!(writer, "Note saved on \"{}\"", task.text)?,
        Some(task) => writeln!(writer, "Note cleared on \"{}\"", task.text)?,
        None => writeln!(writer, "Not found: {}", args.id)?,
    }
    Ok(())
}

fn handle_photo<W: Write>(
    invocation: &Invocation,
    service: &TasksService,
    args: &PhotoArgs,
    mut writer: W,
) -> Result<()> {
    let (file_name, bytes) = read_upload(&args.file)?;
    let target = match &args.subtask {
        Some(subtask_id) => PhotoTarget::Subtask(subtask_id),
        None => PhotoTarget::Task,
    };
    match service.attach_photo(&invocation.session, &args.id, target, &file_name, &bytes)? {
        Some(task) => writeln!(writer, "Attached {} to \"{}\"", file_name, task.text)?,
        None => writeln!(writer, "Not found: {}", args.id)?,
    }
    Ok(())
}

fn read_upload(path: &Path) -> Result<(String, Vec<u8>)> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read photo at {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("photo")
        .to_string();
    Ok((file_name, bytes))
}

fn handle_delete<W: Write>(
    invocation: &Invocation,
    service: &TasksService,
    args: &DeleteArgs,
    mut writer: W,
) -> Result<()> {
    DeleteSummary::collect(&args.ids, |id| service.delete_task(&invocation.session, id))
        .finish(Noun::Task, &mut writer)
}

fn handle_checklist<W: Write>(
    invocation: &Invocation,
    service: &TasksService,
    args: &ChecklistArgs,
    mut writer: W,
) -> Result<()> {
    let outcome = service.create_checklist_task(
        &invocation.session,
        args.kind,
        args.owner.as_deref(),
        args.apartment.as_deref(),
    )?;
    let items = service
        .fetch_task(&outcome.id)?
        .map(|task| task.subtasks.len())
        .unwrap_or_default();
    writeln!(
        writer,
        "Created \"{}\" for {} with {} items (id {})",
        outcome.text, outcome.owner, items, outcome.id
    )?;
    Ok(())
}

fn handle_suggest<W: Write>(
    invocation: &Invocation,
    service: &TasksService,
    suggester: &dyn Suggester,
    args: &SuggestArgs,
    mut writer: W,
) -> Result<()> {
    let session = &invocation.session;
    let mut state = view_state(invocation, service);
    state.reduce(Action::SuggestionsRequested);
    let outcome = block_on(service.suggest_tasks(session, suggester))?;
    state.reduce(Action::SuggestionsSettled(outcome.clone()));

    let items = match outcome {
        SuggestionOutcome::Items(items) if !items.is_empty() => items,
        SuggestionOutcome::Items(_) => {
            writeln!(writer, "No suggestions")?;
            return Ok(());
        }
        SuggestionOutcome::Failed(_) => {
            writeln!(
                writer,
                "Suggestions unavailable: {}",
                state.notice().unwrap_or("unknown error")
            )?;
            return Ok(());
        }
    };

    if args.accept {
        let created = service.accept_suggestions(session, &items)?;
        writeln!(writer, "Added {} suggested task{}", created.len(), plural(created.len()))?;
        for outcome in created {
            writeln!(writer, "  {}  id:{}", outcome.text, outcome.id)?;
        }
    } else {
        writeln!(writer, "Suggestions (rerun with --accept to add them):")?;
        for item in items {
            writeln!(writer, "  - {}", item)?;
        }
    }
    Ok(())
}

fn handle_overview<W: Write>(
    invocation: &Invocation,
    service: &TasksService,
    mut writer: W,
) -> Result<()> {
    let state = view_state(invocation, service);
    let admin = state
        .admin_overview()
        .ok_or_else(|| anyhow!("The overview is only available to admins"))?;

    let global = admin.overview.global;
    writeln!(
        writer,
        "Pending: {}  Completed in the last week: {}",
        global.total_pending, global.completed_last_week
    )?;
    for member in &admin.overview.members {
        writeln!(
            writer,
            "  {:<12} {}/{} done ({:.0}%)",
            member.name, member.stats.completed, member.stats.total, member.stats.progress
        )?;
    }
    for bucket in admin.tasks.non_empty() {
        writeln!(writer, "{}", bucket.key)?;
        for task in &bucket.tasks {
            write!(writer, "  {}: ", task.owner)?;
            write_task(&mut writer, task, Urgency::None)?;
        }
    }
    Ok(())
}

fn handle_ledger<W: Write>(
    invocation: &Invocation,
    service: &TasksService,
    command: LedgerCommand,
    mut writer: W,
) -> Result<()> {
    let ledger = service.ledger();
    match command {
        LedgerCommand::List => {
            let view = view_state(invocation, service).ledger();
            writeln!(
                writer,
                "Balance: {:.2} (deposits {:.2}, expenses {:.2})",
                view.summary.balance, view.summary.deposits, view.summary.expenses
            )?;
            for entry in &view.entries {
                writeln!(
                    writer,
                    "  {} {:>10.2} {} ({})  id:{}",
                    entry.recorded_at.format("%Y-%m-%d"),
                    entry.signed_amount(),
                    entry.description,
                    entry.recorded_by,
                    entry.id
                )?;
            }
            Ok(())
        }
        LedgerCommand::Add {
            kind,
            amount,
            description,
            receipt,
        } => {
            let upload = receipt.as_deref().map(read_upload).transpose()?;
            let receipt = upload.as_ref().map(|(file_name, bytes)| Receipt {
                file_name,
                bytes,
            });
            let entry = ledger.record_transaction(
                &invocation.session,
                kind,
                amount,
                &description.join(" "),
                receipt,
            )?;
            let summary = ledger.summary()?;
            writeln!(
                writer,
                "Recorded {} of {:.2}: {} (balance {:.2})",
                entry.kind, entry.amount, entry.description, summary.balance
            )?;
            Ok(())
        }
        LedgerCommand::Delete { ids } => {
            DeleteSummary::collect(&ids, |id| ledger.delete_transaction(&invocation.session, id))
                .finish(Noun::Entry, &mut writer)
        }
    }
}

fn require_suggester(suggester: Option<&dyn Suggester>) -> Result<&dyn Suggester> {
    suggester.ok_or_else(|| {
        anyhow!("No suggestion service configured: set HOUSEKEEP_SUGGEST_URL")
    })
}

fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    Ok(runtime.block_on(future))
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

#[derive(Default)]
struct DeleteSummary {
    deleted: usize,
    missing: Vec<String>,
    failed: Vec<(String, String)>,
}

impl DeleteSummary {
    /// Attempts every id; a failing id does not stop the rest.
    fn collect(ids: &[String], mut delete: impl FnMut(&str) -> Result<DeleteResult>) -> Self {
        let mut summary = Self::default();
        for id in ids {
            match delete(id) {
                Ok(result) if result.deleted => summary.deleted += 1,
                Ok(result) => summary.missing.push(result.id),
                Err(err) => summary.failed.push((id.clone(), err.to_string())),
            }
        }
        summary
    }

    /// Writes the summary, then reports an error if any id failed.
    fn finish<W: Write>(&self, noun: Noun, mut writer: W) -> Result<()> {
        writeln!(writer, "{}", SummaryLine::deleted(self.deleted, noun))?;
        if !self.missing.is_empty() {
            writeln!(writer, "Not found: {}", self.missing.join(", "))?;
        }
        for (id, reason) in &self.failed {
            writeln!(writer, "Failed {}: {}", id, reason)?;
        }
        if self.failed.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(
                "{} {} could not be deleted",
                self.failed.len(),
                noun.form(self.failed.len())
            ))
        }
    }
}

#[derive(Clone, Copy)]
enum Noun {
    Task,
    Entry,
}

impl Noun {
    fn form(self, count: usize) -> &'static str {
        match (self, count == 1) {
            (Noun::Task, true) => "task",
            (Noun::Task, false) => "tasks",
            (Noun::Entry, true) => "entry",
            (Noun::Entry, false) => "entries",
        }
    }
}

enum SummaryLine {
    Deleted(usize, Noun),
    NoneDeleted(Noun),
}

impl SummaryLine {
    fn deleted(count: usize, noun: Noun) -> Self {
        if count > 0 {
            SummaryLine::Deleted(count, noun)
        } else {
            SummaryLine::NoneDeleted(noun)
        }
    }
}

impl fmt::Display for SummaryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryLine::Deleted(count, noun) => {
                write!(f, "Deleted {} {}", count, noun.form(*count))
            }
            SummaryLine::NoneDeleted(noun) => write!(f, "No {} deleted", noun.form(0)),
        }
    }
}
