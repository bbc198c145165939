/*!
    The task list and its undo/redo history.

    Every mutation goes through [`TaskStore`]; the shells only ever read
    the list back through [`TaskStore::filter`] and friends.
!*/
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::csv_format;
use crate::error::{Error, Result};
use crate::task::{Priority, Task};

/// Sentinel the shells use for "no constraint" in the category and
/// priority pickers.
pub const ALL: &str = "All";

/// One reversible mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEntry {
    Add(Task),
    Remove(Task),
    Update { before: Task, after: Task },
}

impl HistoryEntry {
    /// Reverts the entry. Returns false if its task is no longer in the list.
    fn revert(&self, tasks: &mut Vec<Task>) -> bool {
        match self {
            HistoryEntry::Add(task) => remove_matching(tasks, task),
            HistoryEntry::Remove(task) => {
                tasks.push(task.clone());
                true
            }
            HistoryEntry::Update { before, after } => replace_matching(tasks, after, before),
        }
    }

    /// Replays the entry forward.
    fn apply(&self, tasks: &mut Vec<Task>) -> bool {
        match self {
            HistoryEntry::Add(task) => {
                tasks.push(task.clone());
                true
            }
            HistoryEntry::Remove(task) => remove_matching(tasks, task),
            HistoryEntry::Update { before, after } => replace_matching(tasks, before, after),
        }
    }
}

fn remove_matching(tasks: &mut Vec<Task>, task: &Task) -> bool {
    match tasks.iter().rposition(|t| t == task) {
        Some(index) => {
            tasks.remove(index);
            true
        }
        None => false,
    }
}

fn replace_matching(tasks: &mut [Task], from: &Task, to: &Task) -> bool {
    match tasks.iter_mut().rev().find(|t| **t == *from) {
        Some(slot) => {
            *slot = to.clone();
            true
        }
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Text,
    Category,
    Priority,
    DueDate,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::Text,
        SortKey::Category,
        SortKey::Priority,
        SortKey::DueDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Text => "text",
            SortKey::Category => "category",
            SortKey::Priority => "priority",
            SortKey::DueDate => "due_date",
        }
    }

    // Priority compares on its label, so High < Low < Medium.
    fn value<'t>(&self, task: &'t Task) -> &'t str {
        match self {
            SortKey::Text => &task.text,
            SortKey::Category => &task.category,
            SortKey::Priority => task.priority.as_str(),
            SortKey::DueDate => &task.due_date,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SortKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::InvalidSortKey(s.to_string()))
    }
}

/// Fields to change in an update. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
}

impl TaskPatch {
    fn apply_to(&self, task: &Task) -> Result<Task> {
        let mut updated = task.clone();
        if let Some(text) = &self.text {
            updated.text = validated_text(text)?;
        }
        if let Some(category) = &self.category {
            updated.category = category.clone();
        }
        if let Some(priority) = self.priority {
            updated.priority = priority;
        }
        if let Some(due_date) = &self.due_date {
            updated.due_date = due_date.clone();
        }
        Ok(updated)
    }
}

/// Search term plus category/priority constraints, all combined by AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub term: String,
    pub category: Option<String>,
    pub priority: Option<Priority>,
}

impl Query {
    /// Builds a query from picker values, where [`ALL`] means unconstrained.
    pub fn from_choices(term: &str, category: &str, priority: &str) -> Result<Self> {
        let category = (category != ALL).then(|| category.to_string());
        let priority = match priority {
            ALL => None,
            label => Some(label.parse()?),
        };
        Ok(Query {
            term: term.to_string(),
            category,
            priority,
        })
    }

    pub fn matches(&self, task: &Task) -> bool {
        matches_term(task, &self.term.to_lowercase())
            && self.category.as_ref().is_none_or(|c| *c == task.category)
            && self.priority.is_none_or(|p| p == task.priority)
    }
}

fn matches_term(task: &Task, lowered_term: &str) -> bool {
    task.text.to_lowercase().contains(lowered_term)
}

fn validated_text(text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::EmptyText);
    }
    Ok(text.to_string())
}

#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already loaded list with an empty history.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        TaskStore {
            tasks,
            ..Self::default()
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Task> {
        self.tasks.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.tasks.len(),
        })
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    fn record(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
        self.redo.clear();
    }

    /// Appends a new task and returns it.
    pub fn add(
        &mut self,
        text: &str,
        category: &str,
        priority: Priority,
        due_date: &str,
    ) -> Result<Task> {
        let task = Task::new(&validated_text(text)?, category, priority, due_date);
        debug!(text = %task.text, "add task");
        self.tasks.push(task.clone());
        self.record(HistoryEntry::Add(task.clone()));
        Ok(task)
    }

    pub fn remove(&mut self, index: usize) -> Result<Task> {
        self.get(index)?;
        let task = self.tasks.remove(index);
        debug!(index, text = %task.text, "remove task");
        self.record(HistoryEntry::Remove(task.clone()));
        Ok(task)
    }

    /// Applies `patch` to the task at `index`. `created_at` never changes.
    pub fn update(&mut self, index: usize, patch: &TaskPatch) -> Result<Task> {
        let before = self.get(index)?.clone();
        let after = patch.apply_to(&before)?;
        debug!(index, text = %after.text, "update task");
        self.tasks[index] = after.clone();
        self.record(HistoryEntry::Update {
            before,
            after: after.clone(),
        });
        Ok(after)
    }

    /// Stable ascending sort on the string value of `key`. Not recorded in
    /// the history.
    pub fn sort(&mut self, key: SortKey) {
        debug!(%key, "sort tasks");
        self.tasks.sort_by(|a, b| key.value(a).cmp(key.value(b)));
    }

    /// Reverts the most recent mutation. Returns false if nothing was undone.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.undo.pop() else {
            return false;
        };
        if !entry.revert(&mut self.tasks) {
            warn!(?entry, "dropping undo entry, its task is gone");
            return false;
        }
        debug!(?entry, "undo");
        self.redo.push(entry);
        true
    }

    /// Replays the most recently undone mutation. Returns false if nothing
    /// was redone.
    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.redo.pop() else {
            return false;
        };
        if !entry.apply(&mut self.tasks) {
            warn!(?entry, "dropping redo entry, its task is gone");
            return false;
        }
        debug!(?entry, "redo");
        self.undo.push(entry);
        true
    }

    /// Tasks whose text contains `term`, ignoring case.
    pub fn search<'a>(&'a self, term: &str) -> impl Iterator<Item = &'a Task> + Clone + use<'a> {
        let lowered = term.to_lowercase();
        self.tasks
            .iter()
            .filter(move |task| matches_term(task, &lowered))
    }

    pub fn filter<'a>(&'a self, query: &'a Query) -> impl Iterator<Item = &'a Task> + Clone + 'a {
        self.visible(query).map(|(_, task)| task)
    }

    /// Like [`TaskStore::filter`], paired with each task's position in the
    /// full list.
    pub fn visible<'a>(
        &'a self,
        query: &'a Query,
    ) -> impl Iterator<Item = (usize, &'a Task)> + Clone + 'a {
        self.tasks
            .iter()
            .enumerate()
            .filter(move |(_, task)| query.matches(task))
    }

    /// Distinct non-empty categories, in the order they first appear.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for task in &self.tasks {
            if !task.category.is_empty() && !seen.contains(&task.category.as_str()) {
                seen.push(&task.category);
            }
        }
        seen
    }

    pub fn serialize_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.tasks)?)
    }

    /// Replaces the list with the JSON array in `bytes` and starts a fresh
    /// history. Leaves the store untouched on failure.
    pub fn deserialize_json(&mut self, bytes: &[u8]) -> Result<()> {
        let mut tasks: Vec<Task> = serde_json::from_slice(bytes)?;
        for (index, task) in tasks.iter_mut().enumerate() {
            task.text = validated_text(&task.text).map_err(|_| Error::InvalidRecord {
                index,
                reason: "task text is empty".to_string(),
            })?;
        }
        self.replace(tasks);
        Ok(())
    }

    pub fn export_csv(&self) -> String {
        csv_format::write_tasks(&self.tasks)
    }

    /// Replaces the list with the rows of a CSV document. Returns the number
    /// of imported tasks.
    pub fn import_csv(&mut self, text: &str) -> Result<usize> {
        let tasks = csv_format::read_tasks(text)?;
        let count = tasks.len();
        self.replace(tasks);
        Ok(count)
    }

    fn replace(&mut self, tasks: Vec<Task>) {
        debug!(count = tasks.len(), "replace task list");
        *self = TaskStore::from_tasks(tasks);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn task(text: &str, category: &str, priority: Priority) -> Task {
        Task {
            text: text.to_string(),
            category: category.to_string(),
            priority,
            due_date: String::new(),
            created_at: None,
        }
    }

    fn texts(store: &TaskStore) -> Vec<&str> {
        store.tasks().iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_add_appends() {
        let mut store = TaskStore::new();
        store.add("Buy milk", "Errand", Priority::Medium, "2024-01-01").unwrap();
        let added = store.add("  Call bank ", "Finance", Priority::High, "").unwrap();
        assert_eq!(added.text, "Call bank");
        assert!(added.created_at.is_some());
        assert_eq!(texts(&store), ["Buy milk", "Call bank"]);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_add_rejects_empty_text(#[case] text: &str) {
        let mut store = TaskStore::new();
        assert!(matches!(
            store.add(text, "", Priority::Low, ""),
            Err(Error::EmptyText)
        ));
        assert!(store.is_empty());
        assert!(!store.can_undo());
    }

    #[test]
    fn test_add_undo_redo() {
        let mut store = TaskStore::new();
        store.add("Buy milk", "Errand", Priority::Medium, "").unwrap();
        let before = store.tasks().to_vec();
        store.add("Call bank", "Finance", Priority::High, "").unwrap();
        let after = store.tasks().to_vec();

        assert!(store.undo());
        assert_eq!(store.tasks(), before.as_slice());
        assert!(store.redo());
        assert_eq!(store.tasks(), after.as_slice());
    }

    #[test]
    fn test_remove_then_undo_appends() {
        let mut store = TaskStore::from_tasks(vec![
            task("a", "", Priority::Low),
            task("b", "", Priority::Low),
            task("c", "", Priority::Low),
        ]);
        let removed = store.remove(0).unwrap();
        assert_eq!(removed.text, "a");
        assert_eq!(texts(&store), ["b", "c"]);

        assert!(store.undo());
        assert_eq!(texts(&store), ["b", "c", "a"]);

        assert!(store.redo());
        assert_eq!(texts(&store), ["b", "c"]);
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut store = TaskStore::from_tasks(vec![task("a", "", Priority::Low)]);
        assert!(matches!(
            store.remove(1),
            Err(Error::IndexOutOfRange { index: 1, len: 1 })
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_last_then_redo_is_noop() {
        let mut store = TaskStore::from_tasks(vec![task("a", "", Priority::Low)]);
        store.remove(0).unwrap();
        assert!(!store.redo());
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_is_partial_and_keeps_created_at() {
        let mut store = TaskStore::new();
        let original = store.add("Buy milk", "Errand", Priority::Low, "2024-01-01").unwrap();
        let patch = TaskPatch {
            priority: Some(Priority::High),
            due_date: Some("2024-02-01".into()),
            ..TaskPatch::default()
        };
        let updated = store.update(0, &patch).unwrap();

        assert_eq!(updated.text, "Buy milk");
        assert_eq!(updated.category, "Errand");
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.due_date, "2024-02-01");
        assert_eq!(updated.created_at, original.created_at);
    }

    #[test]
    fn test_update_undo_restores_fields() {
        let mut store = TaskStore::from_tasks(vec![task("a", "Home", Priority::Low)]);
        let patch = TaskPatch {
            text: Some("b".into()),
            category: Some("Work".into()),
            ..TaskPatch::default()
        };
        store.update(0, &patch).unwrap();

        assert!(store.undo());
        assert_eq!(store.tasks(), [task("a", "Home", Priority::Low)]);
        assert!(store.redo());
        assert_eq!(store.tasks(), [task("b", "Work", Priority::Low)]);
    }

    #[test]
    fn test_update_failures_leave_state() {
        let mut store = TaskStore::from_tasks(vec![task("a", "", Priority::Low)]);
        let blank = TaskPatch {
            text: Some(" ".into()),
            ..TaskPatch::default()
        };
        assert!(matches!(store.update(0, &blank), Err(Error::EmptyText)));
        assert!(matches!(
            store.update(4, &TaskPatch::default()),
            Err(Error::IndexOutOfRange { .. })
        ));
        assert_eq!(store.tasks(), [task("a", "", Priority::Low)]);
        assert!(!store.can_undo());
    }

    #[test]
    fn test_new_action_clears_redo() {
        let mut store = TaskStore::new();
        store.add("a", "", Priority::Low, "").unwrap();
        store.undo();
        assert!(store.can_redo());
        store.add("b", "", Priority::Low, "").unwrap();
        assert!(!store.can_redo());
        assert!(!store.redo());
        assert_eq!(texts(&store), ["b"]);
    }

    #[test]
    fn test_undo_on_empty_history() {
        let mut store = TaskStore::from_tasks(vec![task("a", "", Priority::Low)]);
        assert!(!store.undo());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sort_priority_is_lexical_and_not_undoable() {
        let mut store = TaskStore::new();
        store.add("Buy milk", "Errand", Priority::Medium, "2024-01-01").unwrap();
        store.add("Call bank", "Finance", Priority::High, "2024-01-02").unwrap();
        store.sort(SortKey::Priority);
        assert_eq!(texts(&store), ["Call bank", "Buy milk"]);

        // The undo reverts the last add, not the sort.
        assert!(store.undo());
        assert_eq!(texts(&store), ["Buy milk"]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut store = TaskStore::from_tasks(vec![
            task("d", "", Priority::Medium),
            task("c", "", Priority::High),
            task("b", "", Priority::Medium),
            task("a", "", Priority::High),
            task("e", "", Priority::Low),
        ]);
        store.sort(SortKey::Priority);
        assert_eq!(texts(&store), ["c", "a", "e", "d", "b"]);
    }

    #[test]
    fn test_undo_after_sort_finds_task() {
        let mut store = TaskStore::new();
        store.add("b", "", Priority::Low, "").unwrap();
        store.add("a", "", Priority::Low, "").unwrap();
        store.update(1, &TaskPatch {
            category: Some("x".into()),
            ..TaskPatch::default()
        })
        .unwrap();
        store.sort(SortKey::Text);
        assert!(store.undo());
        assert_eq!(store.tasks()[0].category, "");
    }

    #[rstest]
    #[case("text", SortKey::Text)]
    #[case("category", SortKey::Category)]
    #[case("priority", SortKey::Priority)]
    #[case("due_date", SortKey::DueDate)]
    fn test_sort_key_parse(#[case] name: &str, #[case] key: SortKey) {
        assert_eq!(name.parse::<SortKey>().unwrap(), key);
    }

    #[rstest]
    #[case("created_at")]
    #[case("Text")]
    #[case("")]
    fn test_sort_key_rejects(#[case] name: &str) {
        assert!(matches!(
            name.parse::<SortKey>(),
            Err(Error::InvalidSortKey(_))
        ));
    }

    #[test]
    fn test_search_ignores_case_and_restarts() {
        let store = TaskStore::from_tasks(vec![
            task("Buy MILK", "", Priority::Low),
            task("Call bank", "", Priority::Low),
            task("milkshake", "", Priority::Low),
        ]);
        let hits = store.search("Milk");
        assert_eq!(hits.clone().count(), 2);
        let found: Vec<&str> = hits.map(|t| t.text.as_str()).collect();
        assert_eq!(found, ["Buy MILK", "milkshake"]);
    }

    #[test]
    fn test_filter_priority_only() {
        let store = TaskStore::from_tasks(vec![
            task("a", "Home", Priority::High),
            task("b", "Work", Priority::Low),
            task("c", "Work", Priority::High),
        ]);
        let query = Query::from_choices("", ALL, "High").unwrap();
        let found: Vec<&str> = store.filter(&query).map(|t| t.text.as_str()).collect();
        assert_eq!(found, ["a", "c"]);
    }

    #[rstest]
    #[case("", "Work", ALL, vec![1, 2])]
    #[case("C", "Work", "High", vec![2])]
    #[case("", ALL, ALL, vec![0, 1, 2])]
    #[case("zzz", ALL, ALL, vec![])]
    fn test_visible_conjunction(
        #[case] term: &str,
        #[case] category: &str,
        #[case] priority: &str,
        #[case] expected: Vec<usize>,
    ) {
        let store = TaskStore::from_tasks(vec![
            task("a", "Home", Priority::High),
            task("b", "Work", Priority::Low),
            task("c", "Work", Priority::High),
        ]);
        let query = Query::from_choices(term, category, priority).unwrap();
        let indexes: Vec<usize> = store.visible(&query).map(|(i, _)| i).collect();
        assert_eq!(indexes, expected);
    }

    #[test]
    fn test_query_rejects_unknown_priority() {
        assert!(matches!(
            Query::from_choices("", ALL, "Urgent"),
            Err(Error::InvalidPriority(_))
        ));
    }

    #[test]
    fn test_categories() {
        let store = TaskStore::from_tasks(vec![
            task("a", "Work", Priority::Low),
            task("b", "", Priority::Low),
            task("c", "Home", Priority::Low),
            task("d", "Work", Priority::Low),
        ]);
        assert_eq!(store.categories(), ["Work", "Home"]);
    }

    #[test]
    fn test_json_round_trip() {
        let mut store = TaskStore::new();
        store.add("Buy milk", "Errand", Priority::Medium, "2024-01-01").unwrap();
        store.add("Call, \"bank\"", "", Priority::High, "next week").unwrap();
        let bytes = store.serialize_json().unwrap();

        let mut loaded = TaskStore::new();
        loaded.deserialize_json(&bytes).unwrap();
        assert_eq!(loaded.tasks(), store.tasks());
        assert!(!loaded.can_undo());
    }

    #[test]
    fn test_deserialize_failure_keeps_state() {
        let mut store = TaskStore::new();
        store.add("keep me", "", Priority::Low, "").unwrap();

        assert!(matches!(
            store.deserialize_json(b"not json"),
            Err(Error::Json(_))
        ));
        assert!(matches!(
            store.deserialize_json(br#"[{"category": "x"}]"#),
            Err(Error::InvalidRecord { index: 0, .. })
        ));
        assert_eq!(texts(&store), ["keep me"]);
        assert!(store.can_undo());
    }

    #[test]
    fn test_deserialize_trims_text() {
        let mut store = TaskStore::new();
        store
            .deserialize_json(br#"[{"task": "  padded  ", "priority": "Low"}]"#)
            .unwrap();
        assert_eq!(texts(&store), ["padded"]);
        assert_eq!(store.search("padded").count(), 1);
    }

    #[test]
    fn test_deserialize_older_timestamps() {
        let mut store = TaskStore::new();
        store
            .deserialize_json(
                br#"[
                    {"task": "a", "created_at": "2024-03-01 12:00"},
                    {"task": "b", "created_at": "2024-03-01"},
                    {"task": "c", "created_at": "2024-03-01T12:00:05.250"}
                ]"#,
            )
            .unwrap();
        assert_eq!(store.len(), 3);

        let mut reloaded = TaskStore::new();
        reloaded.deserialize_json(&store.serialize_json().unwrap()).unwrap();
        assert_eq!(reloaded.tasks(), store.tasks());
    }

    #[test]
    fn test_csv_round_trip_through_store() {
        let mut store = TaskStore::new();
        store.add("Buy milk", "Errand", Priority::Medium, "2024-01-01").unwrap();
        store.add("Call bank", "Finance", Priority::High, "").unwrap();
        let csv = store.export_csv();

        let mut imported = TaskStore::new();
        assert_eq!(imported.import_csv(&csv).unwrap(), 2);
        assert_eq!(imported.tasks(), store.tasks());
    }
}
