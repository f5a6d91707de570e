//! Client-side view state: one container, one reducer, derived views on demand.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::dates::classify_urgency;
use crate::feed::Snapshot;
use crate::grouping::{group_by_apartment, newest_first, ApartmentGroups, BucketKey};
use crate::household::{Household, Session};
use crate::model::{Task, TaskFilter, Transaction, Urgency};
use crate::stats::{by_owner, overview, LedgerSummary, Overview};
use crate::suggest::SuggestionOutcome;
use crate::visibility::{apply_filter, visible_tasks};

/// The dialog currently open over the board, with the record it targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Modal {
    #[default]
    None,
    AddTask,
    EditTask {
        id: String,
    },
    Note {
        id: String,
    },
    Photo {
        task_id: String,
        subtask_id: Option<String>,
    },
    Suggestions {
        items: Vec<String>,
    },
    Checklist,
    Transaction,
    ConfirmDelete {
        id: String,
    },
}

impl Modal {
    /// Task the modal is about, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Modal::EditTask { id } | Modal::Note { id } | Modal::ConfirmDelete { id } => {
                Some(id.as_str())
            }
            Modal::Photo { task_id, .. } => Some(task_id.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    Snapshot(Arc<Snapshot>),
    SetReference(NaiveDate),
    SetScope(Option<BucketKey>),
    SetFilter(TaskFilter),
    /// Admin only: look at one member's board instead of their own.
    SelectMember(Option<String>),
    OpenModal(Modal),
    CloseModal,
    SuggestionsRequested,
    SuggestionsSettled(SuggestionOutcome),
    WriteStarted(String),
    WriteSettled(String),
    DismissNotice,
}

#[derive(Debug, Clone)]
pub struct ViewState {
    session: Session,
    household: Household,
    reference: NaiveDate,
    scope: Option<BucketKey>,
    filter: TaskFilter,
    selected_member: Option<String>,
    snapshot: Arc<Snapshot>,
    modal: Modal,
    suggestions_loading: bool,
    pending: BTreeSet<String>,
    notice: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayView {
    pub reference: NaiveDate,
    pub owner: String,
    pub filter: TaskFilter,
    pub groups: ApartmentGroups,
}

impl DayView {
    pub fn urgency(&self, task: &Task) -> Urgency {
        classify_urgency(task.due, self.reference)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminOverview {
    pub overview: Overview,
    /// Every member's tasks, newest first, grouped and scoped like the day view.
    pub tasks: ApartmentGroups,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerView {
    pub summary: LedgerSummary,
    pub entries: Vec<Transaction>,
}

impl ViewState {
    pub fn new(session: Session, household: Household, reference: NaiveDate) -> Self {
        Self {
            session,
            household,
            reference,
            scope: None,
            filter: TaskFilter::default(),
            selected_member: None,
            snapshot: Arc::new(Snapshot::default()),
            modal: Modal::None,
            suggestions_loading: false,
            pending: BTreeSet::new(),
            notice: None,
        }
    }

    pub fn reduce(&mut self, action: Action) {
        match action {
            Action::Snapshot(snapshot) => {
                if snapshot.version < self.snapshot.version {
                    tracing::debug!(
                        held = self.snapshot.version,
                        received = snapshot.version,
                        "ignoring stale snapshot"
                    );
                    return;
                }
                self.snapshot = snapshot;
                let target_gone = self
                    .modal
                    .task_id()
                    .is_some_and(|id| self.snapshot.task(id).is_none());
                if target_gone {
                    self.modal = Modal::None;
                }
            }
            Action::SetReference(reference) => self.reference = reference,
            Action::SetScope(scope) => self.scope = scope,
            Action::SetFilter(filter) => self.filter = filter,
            Action::SelectMember(member) => {
                if self.session.is_admin() {
                    self.selected_member = member;
                }
            }
            Action::OpenModal(modal) => self.modal = modal,
            Action::CloseModal => self.modal = Modal::None,
            Action::SuggestionsRequested => {
                self.suggestions_loading = true;
                self.notice = None;
            }
            Action::SuggestionsSettled(outcome) => {
                self.suggestions_loading = false;
                match outcome {
                    SuggestionOutcome::Items(items) => self.modal = Modal::Suggestions { items },
                    SuggestionOutcome::Failed(message) => self.notice = Some(message),
                }
            }
            Action::WriteStarted(id) => {
                self.pending.insert(id);
            }
            Action::WriteSettled(id) => {
                self.pending.remove(&id);
            }
            Action::DismissNotice => self.notice = None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn reference(&self) -> NaiveDate {
        self.reference
    }

    pub fn modal(&self) -> &Modal {
        &self.modal
    }

    pub fn filter(&self) -> TaskFilter {
        self.filter
    }

    pub fn scope(&self) -> Option<&BucketKey> {
        self.scope.as_ref()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn suggestions_loading(&self) -> bool {
        self.suggestions_loading
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Whose board the day view shows.
    pub fn board_owner(&self) -> &str {
        self.selected_member
            .as_deref()
            .unwrap_or(self.session.name.as_str())
    }

    pub fn day_view(&self) -> DayView {
        let owner = self.board_owner();
        let visible = visible_tasks(self.snapshot.tasks_owned_by(owner), self.reference);
        let filtered = apply_filter(visible, self.filter);
        DayView {
            reference: self.reference,
            owner: owner.to_string(),
            filter: self.filter,
            groups: group_by_apartment(&filtered, &self.household.apartments)
                .scoped(self.scope.as_ref()),
        }
    }

    /// Dashboard figures and the all-tasks list. `None` for non-admin sessions.
    pub fn admin_overview(&self) -> Option<AdminOverview> {
        if !self.session.is_admin() {
            return None;
        }
        let members: Vec<String> = self
            .household
            .members
            .iter()
            .filter(|member| !member.role.is_admin())
            .map(|member| member.name.clone())
            .collect();
        let grouped = by_owner(&self.snapshot.tasks, &members);
        let all = apply_filter(newest_first(self.snapshot.tasks.clone()), self.filter);
        Some(AdminOverview {
            overview: overview(&grouped, &members, self.reference),
            tasks: group_by_apartment(&all, &self.household.apartments)
                .scoped(self.scope.as_ref()),
        })
    }

    pub fn ledger(&self) -> LedgerView {
        let transactions = &self.snapshot.transactions;
        LedgerView {
            summary: LedgerSummary::from_transactions(transactions),
            entries: transactions.iter().rev().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewTask, NewTransaction, TransactionKind};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn session(email: &str) -> Session {
        Household::default().session_for_email("uid", email).unwrap()
    }

    fn task(owner: &str, text: &str, created: NaiveDate, apartment: Option<&str>) -> Task {
        NewTask {
            text: text.into(),
            owner: owner.into(),
            created: Some(created),
            apartment: apartment.map(str::to_string),
            ..NewTask::default()
        }
        .into_task(created)
    }

    fn snapshot(version: u64, tasks: Vec<Task>, transactions: Vec<Transaction>) -> Arc<Snapshot> {
        Arc::new(Snapshot {
            version,
            tasks,
            transactions,
        })
    }

    fn state_for(email: &str, tasks: Vec<Task>) -> ViewState {
        let mut state = ViewState::new(session(email), Household::default(), d(10));
        state.reduce(Action::Snapshot(snapshot(1, tasks, Vec::new())));
        state
    }

    #[test]
    fn day_view_shows_own_visible_tasks_grouped() {
        let mut done = task("ana", "Done today", d(10), None);
        done.completed = true;
        let mut old_done = task("ana", "Done before", d(8), None);
        old_done.completed = true;
        let tasks = vec![
            task("ana", "Sweep", d(9), Some("Attic")),
            task("ana", "Tomorrow", d(11), None),
            task("luca", "Not mine", d(9), None),
            done,
            old_done,
        ];
        let state = state_for("ana@household.local", tasks);

        let view = state.day_view();
        assert_eq!(view.owner, "ana");
        assert_eq!(view.groups.total(), 2);
        assert_eq!(view.groups.get(&BucketKey::Apartment("Attic".into())).unwrap().len(), 1);
        assert_eq!(view.groups.general()[0].text, "Done today");
    }

    #[test]
    fn scope_and_filter_narrow_the_day_view() {
        let mut starred = task("ana", "Starred", d(9), None);
        starred.important = true;
        let tasks = vec![task("ana", "Sweep", d(9), Some("Attic")), starred];
        let mut state = state_for("ana@household.local", tasks);

        state.reduce(Action::SetScope(Some(BucketKey::General)));
        assert_eq!(state.day_view().groups.buckets.len(), 1);
        assert_eq!(state.day_view().groups.total(), 1);

        state.reduce(Action::SetScope(None));
        state.reduce(Action::SetFilter(TaskFilter::Important));
        let view = state.day_view();
        assert_eq!(view.groups.total(), 1);
        assert_eq!(view.groups.general()[0].text, "Starred");
    }

    #[test]
    fn only_admins_switch_boards() {
        let tasks = vec![task("luca", "Fix fence", d(9), None)];
        let mut member = state_for("ana@household.local", tasks.clone());
        member.reduce(Action::SelectMember(Some("luca".into())));
        assert_eq!(member.board_owner(), "ana");
        assert!(member.admin_overview().is_none());

        let mut admin = state_for("admin@household.local", tasks);
        admin.reduce(Action::SelectMember(Some("luca".into())));
        assert_eq!(admin.day_view().groups.total(), 1);
    }

    #[test]
    fn admin_overview_counts_every_member() {
        let mut done = task("mia", "Done", d(9), None);
        done.completed = true;
        let tasks = vec![
            task("ana", "Older", d(2), None),
            task("luca", "Newer", d(9), None),
            done,
        ];
        let state = state_for("admin@household.local", tasks);
        let admin = state.admin_overview().unwrap();

        assert_eq!(admin.overview.global.total_pending, 2);
        assert_eq!(admin.overview.global.completed_last_week, 1);
        let names: Vec<&str> = admin.overview.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["ana", "luca", "mia"]);
        assert_eq!(admin.tasks.general()[0].created, d(9));
        assert_eq!(admin.tasks.general()[2].text, "Older");
    }

    #[test]
    fn ledger_view_is_recomputed_from_snapshot() {
        let entry = |kind: TransactionKind, amount: f64| {
            NewTransaction {
                kind,
                amount,
                description: "entry".into(),
                photo: None,
                recorded_by: "ana".into(),
            }
            .into_transaction(Utc::now())
        };
        let mut state = ViewState::new(session("ana@household.local"), Household::default(), d(10));
        state.reduce(Action::Snapshot(snapshot(
            1,
            Vec::new(),
            vec![
                entry(TransactionKind::Deposit, 100.0),
                entry(TransactionKind::Deposit, 50.0),
                entry(TransactionKind::Expense, 30.0),
            ],
        )));
        let ledger = state.ledger();
        assert_eq!(ledger.summary.balance, 120.0);
        assert_eq!(ledger.entries[0].kind, TransactionKind::Expense);

        state.reduce(Action::Snapshot(snapshot(2, Vec::new(), Vec::new())));
        assert_eq!(state.ledger().summary.balance, 0.0);
    }

    #[test]
    fn stale_snapshots_are_ignored() {
        let mut state = state_for("ana@household.local", Vec::new());
        state.reduce(Action::Snapshot(snapshot(
            5,
            vec![task("ana", "Current", d(10), None)],
            Vec::new(),
        )));
        state.reduce(Action::Snapshot(snapshot(3, Vec::new(), Vec::new())));
        assert_eq!(state.snapshot().version, 5);
        assert_eq!(state.day_view().groups.total(), 1);
    }

    #[test]
    fn modal_closes_when_its_task_disappears() {
        let target = task("ana", "Note me", d(10), None);
        let id = target.id.clone();
        let mut state = state_for("ana@household.local", vec![target]);
        state.reduce(Action::OpenModal(Modal::Note { id: id.clone() }));
        assert_eq!(state.modal().task_id(), Some(id.as_str()));

        state.reduce(Action::Snapshot(snapshot(2, Vec::new(), Vec::new())));
        assert_eq!(state.modal(), &Modal::None);
    }

    #[test]
    fn suggestion_flow_tracks_loading() {
        let mut state = state_for("ana@household.local", Vec::new());
        state.reduce(Action::SuggestionsRequested);
        assert!(state.suggestions_loading());

        state.reduce(Action::SuggestionsSettled(SuggestionOutcome::Failed("offline".into())));
        assert!(!state.suggestions_loading());
        assert_eq!(state.notice(), Some("offline"));
        assert_eq!(state.modal(), &Modal::None);

        state.reduce(Action::SuggestionsRequested);
        state.reduce(Action::SuggestionsSettled(SuggestionOutcome::Items(vec![
            "Oil hinges".into(),
        ])));
        assert_eq!(
            state.modal(),
            &Modal::Suggestions {
                items: vec!["Oil hinges".into()]
            }
        );
        assert!(state.notice().is_none());
    }

    #[test]
    fn pending_writes_are_tracked_per_id() {
        let mut state = state_for("ana@household.local", Vec::new());
        state.reduce(Action::WriteStarted("a".into()));
        state.reduce(Action::WriteStarted("b".into()));
        state.reduce(Action::WriteSettled("a".into()));
        assert!(!state.is_pending("a"));
        assert!(state.is_pending("b"));
    }
}
