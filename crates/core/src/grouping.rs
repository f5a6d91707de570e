use std::fmt;

use serde::Serialize;

use crate::model::Task;

/// Bucket a task is filed under on the board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum BucketKey {
    Apartment(String),
    General,
}

impl BucketKey {
    /// Bucket for a tag, given the roster's apartment names.
    pub fn for_tag(tag: Option<&str>, apartments: &[String]) -> Self {
        match tag {
            Some(tag) if apartments.iter().any(|a| a == tag) => BucketKey::Apartment(tag.into()),
            _ => BucketKey::General,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            BucketKey::Apartment(name) => name,
            BucketKey::General => "general",
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApartmentBucket {
    pub key: BucketKey,
    pub tasks: Vec<Task>,
}

/// Tasks partitioned by apartment: one bucket per roster apartment, in roster order, then `general`.
#[derive(Debug, Clone, Serialize)]
pub struct ApartmentGroups {
    pub buckets: Vec<ApartmentBucket>,
}

impl ApartmentGroups {
    pub fn get(&self, key: &BucketKey) -> Option<&[Task]> {
        self.buckets
            .iter()
            .find(|bucket| &bucket.key == key)
            .map(|bucket| bucket.tasks.as_slice())
    }

    pub fn general(&self) -> &[Task] {
        self.get(&BucketKey::General).unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.tasks.len()).sum()
    }

    pub fn non_empty(&self) -> impl Iterator<Item = &ApartmentBucket> {
        self.buckets.iter().filter(|bucket| !bucket.tasks.is_empty())
    }

    /// Keep only the bucket matching `key`, or everything when `key` is `None`.
    pub fn scoped(mut self, key: Option<&BucketKey>) -> Self {
        if let Some(key) = key {
            self.buckets.retain(|bucket| &bucket.key == key);
        }
        self
    }
}

pub fn group_by_apartment<'a, I>(tasks: I, apartments: &[String]) -> ApartmentGroups
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut buckets: Vec<ApartmentBucket> = apartments
        .iter()
        .map(|name| ApartmentBucket {
            key: BucketKey::Apartment(name.clone()),
            tasks: Vec::new(),
        })
        .collect();
    let mut general = Vec::new();

    for task in tasks {
        let slot = task
            .apartment
            .as_deref()
            .and_then(|tag| apartments.iter().position(|name| name == tag));
        match slot {
            Some(index) => buckets[index].tasks.push(task.clone()),
            None => general.push(task.clone()),
        }
    }

    buckets.push(ApartmentBucket {
        key: BucketKey::General,
        tasks: general,
    });
    ApartmentGroups { buckets }
}

/// Stable newest-first ordering by creation key, used by the admin "all tasks" views.
pub fn newest_first(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| b.created.cmp(&a.created));
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewTask;
    use chrono::{Duration, NaiveDate};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn apartments() -> Vec<String> {
        vec!["Garden Flat".into(), "Attic".into()]
    }

    fn task(text: &str, apartment: Option<&str>, created_offset: i64) -> Task {
        let created = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(created_offset);
        NewTask {
            text: text.into(),
            owner: "luca".into(),
            created: Some(created),
            apartment: apartment.map(str::to_string),
            ..NewTask::default()
        }
        .into_task(created)
    }

    #[test]
    fn every_apartment_bucket_is_present() {
        let groups = group_by_apartment(&Vec::<Task>::new(), &apartments());
        let keys: Vec<&str> = groups.buckets.iter().map(|b| b.key.label()).collect();
        assert_eq!(keys, vec!["Garden Flat", "Attic", "general"]);
        assert_eq!(groups.total(), 0);
    }

    #[test]
    fn unknown_and_missing_tags_fall_into_general() {
        let tasks = vec![
            task("a", Some("Attic"), 0),
            task("b", Some("Basement"), 0),
            task("c", None, 0),
            task("d", Some("Attic"), 0),
        ];
        let groups = group_by_apartment(&tasks, &apartments());

        let attic: Vec<&str> = groups
            .get(&BucketKey::Apartment("Attic".into()))
            .unwrap()
            .iter()
            .map(|t| t.text.as_str())
            .collect();
        let general: Vec<&str> = groups.general().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(attic, vec!["a", "d"]);
        assert_eq!(general, vec!["b", "c"]);
        assert!(groups
            .get(&BucketKey::Apartment("Garden Flat".into()))
            .unwrap()
            .is_empty());
        assert_eq!(groups.non_empty().count(), 2);
    }

    #[test]
    fn scoping_keeps_single_bucket() {
        let tasks = vec![task("a", Some("Attic"), 0), task("b", None, 0)];
        let groups = group_by_apartment(&tasks, &apartments()).scoped(Some(&BucketKey::General));
        assert_eq!(groups.buckets.len(), 1);
        assert_eq!(groups.total(), 1);
    }

    #[test]
    fn newest_first_is_stable_on_ties() {
        let tasks = vec![
            task("old", None, 0),
            task("new-1", None, 5),
            task("mid", None, 2),
            task("new-2", None, 5),
        ];
        let order: Vec<String> = newest_first(tasks).into_iter().map(|t| t.text).collect();
        assert_eq!(order, vec!["new-1", "new-2", "mid", "old"]);
    }

    #[test]
    fn bucket_key_for_tag() {
        let apartments = apartments();
        assert_eq!(
            BucketKey::for_tag(Some("Attic"), &apartments),
            BucketKey::Apartment("Attic".into())
        );
        assert_eq!(BucketKey::for_tag(Some("Cellar"), &apartments), BucketKey::General);
        assert_eq!(BucketKey::for_tag(None, &apartments), BucketKey::General);
    }

    proptest! {
        #[test]
        fn grouping_is_a_partition(tags in proptest::collection::vec(
            proptest::option::of(prop_oneof![
                Just("Garden Flat"),
                Just("Attic"),
                Just("Cellar"),
            ]),
            0..40,
        )) {
            let tasks: Vec<Task> = tags
                .iter()
                .enumerate()
                .map(|(i, tag)| task(&i.to_string(), *tag, 0))
                .collect();
            let groups = group_by_apartment(&tasks, &apartments());

            prop_assert_eq!(groups.total(), tasks.len());
            for t in &tasks {
                let hits = groups
                    .buckets
                    .iter()
                    .filter(|b| b.tasks.iter().any(|x| x.id == t.id))
                    .count();
                prop_assert_eq!(hits, 1);
                let expected = BucketKey::for_tag(t.apartment.as_deref(), &apartments());
                prop_assert!(groups.get(&expected).unwrap().iter().any(|x| x.id == t.id));
            }
        }
    }
}
