use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;

use super::{authorize, Backend, LedgerService};
use crate::blob::{BlobStore, FsBlobStore};
use crate::capture::TaskInput;
use crate::checklist;
use crate::config::AppConfig;
use crate::database::Database;
use crate::dates;
use crate::error::ValidationError;
use crate::feed::{Snapshot, Subscription};
use crate::household::{Household, Session};
use crate::model::{
    AddOutcome, ChecklistKind, DeleteResult, NewTask, Subtask, Task, TaskPatch,
};
use crate::parser;
use crate::store::RecordStore;
use crate::suggest::{self, Suggester, SuggestionOutcome};

/// Where a photo is attached: the task itself or one of its subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoTarget<'a> {
    Task,
    Subtask(&'a str),
}

/// The record mutation gateway for tasks. Every operation is one store write
/// followed by a snapshot publish; ids that no longer exist are no-ops.
#[derive(Clone)]
pub struct TasksService {
    backend: Backend,
    blobs: Arc<dyn BlobStore>,
    household: Household,
}

impl TasksService {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let database = Database::initialize(config).context("failed to open task database")?;
        let service = Self::with_parts(
            Arc::new(database),
            Arc::new(FsBlobStore::new(config.photos_dir())),
            config.household().clone(),
        );
        service.refresh()?;
        Ok(service)
    }

    pub fn with_parts(
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        household: Household,
    ) -> Self {
        Self {
            backend: Backend::new(store),
            blobs,
            household,
        }
    }

    /// Ledger operations over the same store and feed.
    pub fn ledger(&self) -> LedgerService {
        LedgerService::new(self.backend.clone(), self.blobs.clone())
    }

    pub fn household(&self) -> &Household {
        &self.household
    }

    pub fn subscribe(&self) -> Subscription {
        self.backend.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.backend.current()
    }

    pub fn refresh(&self) -> Result<Arc<Snapshot>> {
        self.backend.refresh()
    }

    /// Every task for an admin, the member's own tasks otherwise.
    pub fn tasks_for(&self, session: &Session) -> Result<Vec<Task>> {
        let owner = (!session.is_admin()).then_some(session.name.as_str());
        self.backend.store().tasks(owner)
    }

    pub fn fetch_task(&self, id: &str) -> Result<Option<Task>> {
        self.backend.store().task(id)
    }

    pub fn create_task(&self, session: &Session, new_task: NewTask) -> Result<AddOutcome> {
        self.backend.mutation("create_task", |store| {
            let new_task = self.validate_new_task(session, new_task)?;
            let task = new_task.into_task(dates::today());
            store.insert_task(&task)?;
            Ok(AddOutcome::from(&task))
        })
    }

    /// Create a task from free text with inline tokens.
    pub fn capture(&self, session: &Session, input: TaskInput) -> Result<AddOutcome> {
        let new_task = match parser::prepare_new_task(
            &input,
            &self.household,
            session,
            dates::today(),
        ) {
            Ok(new_task) => new_task,
            Err(err) => {
                tracing::debug!(error = %err, "capture rejected");
                return Err(err);
            }
        };
        self.create_task(session, new_task)
    }

    /// Apply an edit to text, due date, apartment or note.
    pub fn edit_task(&self, session: &Session, id: &str, edit: TaskPatch) -> Result<Option<Task>> {
        self.backend.mutation("edit_task", |store| {
            if let Some(text) = &edit.text {
                if text.trim().is_empty() {
                    return Err(ValidationError::EmptyText.into());
                }
            }
            let apartment = match edit.apartment {
                Some(Some(tag)) => Some(Some(self.canonical_apartment(&tag)?)),
                other => other,
            };
            let Some(task) = self.existing(store, id)? else {
                return Ok(None);
            };
            authorize(session, &task.owner)?;

            let patch = TaskPatch {
                text: edit.text.map(|text| text.trim().to_string()),
                due: edit.due,
                apartment,
                note: edit.note,
                ..TaskPatch::default()
            };
            store.update_task(id, &patch)
        })
    }

    pub fn toggle_completion(&self, session: &Session, id: &str) -> Result<Option<Task>> {
        self.backend.mutation("toggle_completion", |store| {
            let Some(task) = self.existing(store, id)? else {
                return Ok(None);
            };
            authorize(session, &task.owner)?;
            store.update_task(id, &TaskPatch::completion(!task.completed, Utc::now()))
        })
    }

    pub fn toggle_importance(&self, session: &Session, id: &str) -> Result<Option<Task>> {
        self.backend.mutation("toggle_importance", |store| {
            let Some(task) = self.existing(store, id)? else {
                return Ok(None);
            };
            authorize(session, &task.owner)?;
            let patch = TaskPatch {
                important: Some(!task.important),
                ..TaskPatch::default()
            };
            store.update_task(id, &patch)
        })
    }

    /// Flip one subtask. When that leaves every subtask done the parent is
    /// completed in the same write; reopening a subtask never reopens the parent.
    pub fn toggle_subtask(
        &self,
        session: &Session,
        task_id: &str,
        subtask_id: &str,
    ) -> Result<Option<Task>> {
        self.backend.mutation("toggle_subtask", |store| {
            let Some(task) = self.existing(store, task_id)? else {
                return Ok(None);
            };
            authorize(session, &task.owner)?;

            let mut toggled = task.clone();
            let Some(subtask) = toggled.subtasks.iter_mut().find(|s| s.id == subtask_id) else {
                tracing::debug!(task_id, subtask_id, "subtask not found");
                return Ok(None);
            };
            subtask.completed = !subtask.completed;

            let mut patch = if toggled.all_subtasks_completed() && !task.completed {
                TaskPatch::completion(true, Utc::now())
            } else {
                TaskPatch::default()
            };
            patch.subtasks = Some(toggled.subtasks);
            store.update_task(task_id, &patch)
        })
    }

    pub fn add_subtask(&self, session: &Session, task_id: &str, text: &str) -> Result<Option<Task>> {
        self.backend.mutation("add_subtask", |store| {
            let text = text.trim();
            if text.is_empty() {
                return Err(ValidationError::EmptyText.into());
            }
            let Some(task) = self.existing(store, task_id)? else {
                return Ok(None);
            };
            authorize(session, &task.owner)?;

            let mut subtasks = task.subtasks;
            subtasks.push(Subtask::new(text));
            let patch = TaskPatch {
                subtasks: Some(subtasks),
                ..TaskPatch::default()
            };
            store.update_task(task_id, &patch)
        })
    }

    pub fn delete_subtask(
        &self,
        session: &Session,
        task_id: &str,
        subtask_id: &str,
    ) -> Result<Option<Task>> {
        self.backend.mutation("delete_subtask", |store| {
            let Some(task) = self.existing(store, task_id)? else {
                return Ok(None);
            };
            authorize(session, &task.owner)?;
            if task.subtask(subtask_id).is_none() {
                return Ok(None);
            }

            let subtasks = task
                .subtasks
                .into_iter()
                .filter(|s| s.id != subtask_id)
                .collect();
            let patch = TaskPatch {
                subtasks: Some(subtasks),
                ..TaskPatch::default()
            };
            store.update_task(task_id, &patch)
        })
    }

    /// Upload `bytes` and attach the returned URL to the task or one of its subtasks.
    pub fn attach_photo(
        &self,
        session: &Session,
        task_id: &str,
        target: PhotoTarget<'_>,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Option<Task>> {
        self.backend.mutation("attach_photo", |store| {
            let Some(task) = self.existing(store, task_id)? else {
                return Ok(None);
            };
            authorize(session, &task.owner)?;
            if let PhotoTarget::Subtask(subtask_id) = target {
                if task.subtask(subtask_id).is_none() {
                    tracing::debug!(task_id, subtask_id, "subtask not found");
                    return Ok(None);
                }
            }

            let url = self.blobs.upload(file_name, bytes)?;
            let patch = match target {
                PhotoTarget::Task => TaskPatch {
                    photo: Some(Some(url)),
                    ..TaskPatch::default()
                },
                PhotoTarget::Subtask(subtask_id) => {
                    let subtasks = task
                        .subtasks
                        .into_iter()
                        .map(|mut s| {
                            if s.id == subtask_id {
                                s.photo = Some(url.clone());
                            }
                            s
                        })
                        .collect();
                    TaskPatch {
                        subtasks: Some(subtasks),
                        ..TaskPatch::default()
                    }
                }
            };
            store.update_task(task_id, &patch)
        })
    }

    /// Replace the note; blank text clears it.
    pub fn update_note(&self, session: &Session, id: &str, note: &str) -> Result<Option<Task>> {
        self.backend.mutation("update_note", |store| {
            let Some(task) = self.existing(store, id)? else {
                return Ok(None);
            };
            authorize(session, &task.owner)?;
            let note = Some(note.trim().to_string()).filter(|note| !note.is_empty());
            let patch = TaskPatch {
                note: Some(note),
                ..TaskPatch::default()
            };
            store.update_task(id, &patch)
        })
    }

    pub fn delete_task(&self, session: &Session, id: &str) -> Result<DeleteResult> {
        self.backend.mutation("delete_task", |store| {
            let deleted = match self.existing(store, id)? {
                Some(task) => {
                    authorize(session, &task.owner)?;
                    store.delete_task(id)?
                }
                None => false,
            };
            Ok(DeleteResult {
                id: id.to_string(),
                deleted,
            })
        })
    }

    /// Create a task pre-filled with the cadence's checklist items.
    pub fn create_checklist_task(
        &self,
        session: &Session,
        kind: ChecklistKind,
        owner: Option<&str>,
        apartment: Option<&str>,
    ) -> Result<AddOutcome> {
        let new_task = NewTask {
            text: kind.title().to_string(),
            owner: owner.unwrap_or(&session.name).to_string(),
            apartment: apartment.map(str::to_string),
            subtasks: checklist::instantiate(kind),
            ..NewTask::default()
        };
        self.create_task(session, new_task)
    }

    /// Turn accepted suggestion titles into tasks owned by the session's member.
    pub fn accept_suggestions(&self, session: &Session, items: &[String]) -> Result<Vec<AddOutcome>> {
        items
            .iter()
            .filter(|item| !item.trim().is_empty())
            .map(|item| {
                self.create_task(
                    session,
                    NewTask {
                        text: item.trim().to_string(),
                        owner: session.name.clone(),
                        ..NewTask::default()
                    },
                )
            })
            .collect()
    }

    /// Ask for new task ideas based on the session's open tasks.
    pub async fn suggest_tasks(
        &self,
        session: &Session,
        suggester: &dyn Suggester,
    ) -> SuggestionOutcome {
        let titles: Vec<String> = match self.tasks_for(session) {
            Ok(tasks) => tasks
                .into_iter()
                .filter(|task| !task.completed)
                .map(|task| task.text)
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "could not read tasks for suggestions");
                return SuggestionOutcome::Failed(err.to_string());
            }
        };
        suggest::suggest_tasks(suggester, &titles).await
    }

    /// Expand a task into AI-proposed subtasks. The `decomposing` flag is
    /// raised while the request is in flight and lowered once it settles,
    /// whether or not it succeeded.
    pub async fn decompose_task(
        &self,
        session: &Session,
        id: &str,
        suggester: &dyn Suggester,
    ) -> Result<Option<Task>> {
        let flagged = self.backend.mutation("decompose_start", |store| {
            let Some(task) = self.existing(store, id)? else {
                return Ok(None);
            };
            authorize(session, &task.owner)?;
            let patch = TaskPatch {
                decomposing: Some(true),
                ..TaskPatch::default()
            };
            store.update_task(id, &patch)
        })?;
        let Some(task) = flagged else {
            return Ok(None);
        };

        let outcome = suggest::decompose(suggester, &task.text).await;

        self.backend.mutation("decompose_finish", |store| {
            // Re-read: the task may have changed or vanished while the request was out.
            let Some(current) = self.existing(store, id)? else {
                return Ok(None);
            };
            let mut patch = TaskPatch {
                decomposing: Some(false),
                ..TaskPatch::default()
            };
            if let SuggestionOutcome::Items(items) = &outcome {
                let mut subtasks = current.subtasks;
                subtasks.extend(items.iter().map(Subtask::new));
                patch.subtasks = Some(subtasks);
            }
            store.update_task(id, &patch)
        })
    }

    fn existing(&self, store: &dyn RecordStore, id: &str) -> Result<Option<Task>> {
        let task = store.task(id)?;
        if task.is_none() {
            tracing::debug!(task_id = id, "task not found, nothing to do");
        }
        Ok(task)
    }

    fn validate_new_task(&self, session: &Session, mut new_task: NewTask) -> Result<NewTask> {
        new_task.text = new_task.text.trim().to_string();
        if new_task.text.is_empty() {
            return Err(ValidationError::EmptyText.into());
        }
        if self.household.member(&new_task.owner).is_none() {
            return Err(ValidationError::UnknownMember(new_task.owner).into());
        }
        authorize(session, &new_task.owner)?;
        if let Some(tag) = &new_task.apartment {
            new_task.apartment = Some(self.canonical_apartment(tag)?);
        }
        Ok(new_task)
    }

    fn canonical_apartment(&self, tag: &str) -> Result<String> {
        self.household
            .resolve_apartment(tag)
            .map(str::to_string)
            .ok_or_else(|| ValidationError::UnknownApartment(tag.to_string()).into())
    }
}
