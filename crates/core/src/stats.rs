use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::model::{Task, Transaction, TransactionKind};

pub const COMPLETED_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub total_pending: usize,
    pub completed_last_week: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UserStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// Percentage of completed tasks, `0.0` for a user without tasks.
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberOverview {
    pub name: String,
    pub stats: UserStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub global: GlobalStats,
    pub members: Vec<MemberOverview>,
}

pub fn user_stats(tasks: &[Task]) -> UserStats {
    let total = tasks.len();
    let completed = tasks.iter().filter(|task| task.completed).count();
    let progress = if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    };
    UserStats {
        total,
        completed,
        pending: total - completed,
        progress,
    }
}

pub fn global_stats(by_user: &BTreeMap<String, Vec<Task>>, today: NaiveDate) -> GlobalStats {
    let window_start = today - Duration::days(COMPLETED_WINDOW_DAYS);
    by_user
        .values()
        .flatten()
        .fold(GlobalStats::default(), |mut stats, task| {
            if !task.completed {
                stats.total_pending += 1;
            } else if task.created >= window_start {
                stats.completed_last_week += 1;
            }
            stats
        })
}

/// Split a flat task list by owner. Every roster member gets an entry, even without tasks.
pub fn by_owner<'a, I>(tasks: I, members: &[String]) -> BTreeMap<String, Vec<Task>>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut grouped: BTreeMap<String, Vec<Task>> = members
        .iter()
        .map(|name| (name.clone(), Vec::new()))
        .collect();
    for task in tasks {
        grouped
            .entry(task.owner.clone())
            .or_default()
            .push(task.clone());
    }
    grouped
}

/// Admin dashboard figures; members are listed in roster order.
pub fn overview(
    by_user: &BTreeMap<String, Vec<Task>>,
    members: &[String],
    today: NaiveDate,
) -> Overview {
    let members = members
        .iter()
        .map(|name| MemberOverview {
            name: name.clone(),
            stats: by_user
                .get(name)
                .map(|tasks| user_stats(tasks))
                .unwrap_or_default(),
        })
        .collect();
    Overview {
        global: global_stats(by_user, today),
        members,
    }
}

pub fn balance(transactions: &[Transaction]) -> f64 {
    transactions
        .iter()
        .fold(0.0, |total, entry| total + entry.signed_amount())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub deposits: f64,
    pub expenses: f64,
    pub balance: f64,
    pub entries: usize,
}

impl LedgerSummary {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let sum = |kind: TransactionKind| -> f64 {
            transactions
                .iter()
                .filter(|entry| entry.kind == kind)
                .map(|entry| entry.amount)
                .sum()
        };
        Self {
            deposits: sum(TransactionKind::Deposit),
            expenses: sum(TransactionKind::Expense),
            balance: balance(transactions),
            entries: transactions.len(),
        }
    }
}
