use chrono::NaiveDate;

use crate::model::{Task, TaskFilter};

/// Whether `task` belongs on the board for `reference`.
///
/// Completed tasks only show on their creation day. Open tasks show from
/// their creation day through their due day; a due day before the creation
/// day makes the task visible on no day at all.
pub fn is_visible(task: &Task, reference: NaiveDate) -> bool {
    if task.completed {
        return task.created == reference;
    }

    let started = task.created <= reference;
    let expired = task.due.is_some_and(|due| reference > due);
    started && !expired
}

/// Tasks visible on `reference`, important open tasks first, input order otherwise.
pub fn visible_tasks<'a, I>(tasks: I, reference: NaiveDate) -> Vec<Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut visible: Vec<Task> = tasks
        .into_iter()
        .filter(|task| is_visible(task, reference))
        .cloned()
        .collect();
    // sort_by_key is stable
    visible.sort_by_key(|task| !(task.important && !task.completed));
    visible
}

pub fn apply_filter(tasks: Vec<Task>, filter: TaskFilter) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|task| filter.matches(task))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewTask;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn task(text: &str, created: NaiveDate, due: Option<NaiveDate>) -> Task {
        NewTask {
            text: text.into(),
            owner: "ana".into(),
            created: Some(created),
            due,
            ..NewTask::default()
        }
        .into_task(created)
    }

    #[test]
    fn open_task_visible_between_creation_and_due() {
        let t = task("Paint fence", d(2024, 1, 1), Some(d(2024, 1, 10)));
        assert!(!is_visible(&t, d(2023, 12, 31)));
        assert!(is_visible(&t, d(2024, 1, 1)));
        assert!(is_visible(&t, d(2024, 1, 9)));
        assert!(is_visible(&t, d(2024, 1, 10)));
        assert!(!is_visible(&t, d(2024, 1, 11)));
    }

    #[test]
    fn open_task_without_due_never_expires() {
        let t = task("Sort garage", d(2024, 1, 1), None);
        assert!(is_visible(&t, d(2030, 6, 1)));
    }

    #[test]
    fn completed_task_only_on_creation_day() {
        let mut t = task("Replace bulb", d(2024, 1, 5), None);
        t.completed = true;
        assert!(is_visible(&t, d(2024, 1, 5)));
        assert!(!is_visible(&t, d(2024, 1, 6)));
        assert!(!is_visible(&t, d(2024, 1, 4)));
    }

    #[test]
    fn due_before_creation_is_never_visible() {
        let t = task("Backdated", d(2024, 1, 10), Some(d(2024, 1, 5)));
        let start = d(2024, 1, 1);
        for offset in 0..30 {
            assert!(!is_visible(&t, start + Duration::days(offset)));
        }
    }

    #[test]
    fn important_open_tasks_sort_first_and_stably() {
        let day = d(2024, 1, 5);
        let plain_a = task("a", day, None);
        let mut starred_b = task("b", day, None);
        starred_b.important = true;
        let plain_c = task("c", day, None);
        let mut starred_done_d = task("d", day, None);
        starred_done_d.important = true;
        starred_done_d.completed = true;
        let mut starred_e = task("e", day, None);
        starred_e.important = true;

        let tasks = vec![plain_a, starred_b, plain_c, starred_done_d, starred_e];
        let order: Vec<String> = visible_tasks(&tasks, day)
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(order, vec!["b", "e", "a", "c", "d"]);
    }

    #[test]
    fn filter_narrows_visible_tasks() {
        let day = d(2024, 1, 5);
        let open = task("open", day, None);
        let mut done = task("done", day, None);
        done.completed = true;

        let visible = visible_tasks(&[open, done], day);
        let pending = apply_filter(visible.clone(), TaskFilter::Pending);
        let completed = apply_filter(visible, TaskFilter::Completed);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].text, "open");
        assert_eq!(completed[0].text, "done");
    }

    proptest! {
        #[test]
        fn visibility_matches_rule(
            created in 0i64..60,
            due in proptest::option::of(0i64..60),
            completed in any::<bool>(),
            reference in 0i64..60,
        ) {
            let base = d(2024, 1, 1);
            let created = base + Duration::days(created);
            let due = due.map(|offset| base + Duration::days(offset));
            let reference = base + Duration::days(reference);

            let mut t = task("prop", created, due);
            t.completed = completed;

            let expected = if completed {
                created == reference
            } else {
                created <= reference && due.map_or(true, |due| reference <= due)
            };
            prop_assert_eq!(is_visible(&t, reference), expected);
        }
    }
}
