//! The board aggregate and its store.
//!
//! Task records live in one id-keyed map; columns only hold ordered id lists.
//! Every task id listed by a column exists in the map and is listed by exactly
//! one column.

use crate::error::BoardError;
use crate::storage::{self, SharedStorage, BOARD_KEY};
use crate::task::{Task, TaskDraft, TaskUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum number of activity log entries kept, most recent first.
pub const ACTIVITY_LOG_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnId {
    Todo,
    Doing,
    Done,
}

impl ColumnId {
    pub const ALL: [ColumnId; 3] = [ColumnId::Todo, ColumnId::Doing, ColumnId::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnId::Todo => "todo",
            ColumnId::Doing => "doing",
            ColumnId::Done => "done",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ColumnId::Todo => "To Do",
            ColumnId::Doing => "Doing",
            ColumnId::Done => "Done",
        }
    }

    pub fn position(self) -> usize {
        match self {
            ColumnId::Todo => 0,
            ColumnId::Doing => 1,
            ColumnId::Done => 2,
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.position() + 1).copied()
    }

    pub fn prev(self) -> Option<Self> {
        self.position()
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i).copied())
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for ColumnId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ColumnId::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s) || c.title().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown column '{s}' (expected todo, doing or done)"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    pub task_ids: Vec<String>,
}

impl Column {
    fn empty(id: ColumnId) -> Self {
        Self {
            id,
            title: id.title().to_string(),
            task_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    fn new(action: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action: action.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A position inside a column's ordered id list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub column: ColumnId,
    pub index: usize,
}

impl Slot {
    pub fn new(column: ColumnId, index: usize) -> Self {
        Self { column, index }
    }
}

/// A drag of `task_id` from `source`. No destination means the drag was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMove {
    pub task_id: String,
    pub source: Slot,
    pub destination: Option<Slot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    tasks: HashMap<String, Task>,
    columns: BTreeMap<ColumnId, Column>,
    column_order: Vec<ColumnId>,
    activity_log: Vec<LogEntry>,
}

impl Default for Board {
    fn default() -> Self {
        Self {
            tasks: HashMap::new(),
            columns: ColumnId::ALL
                .into_iter()
                .map(|id| (id, Column::empty(id)))
                .collect(),
            column_order: ColumnId::ALL.to_vec(),
            activity_log: Vec::new(),
        }
    }
}

impl Board {
    pub fn tasks(&self) -> &HashMap<String, Task> {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn column_order(&self) -> &[ColumnId] {
        &self.column_order
    }

    pub fn activity_log(&self) -> &[LogEntry] {
        &self.activity_log
    }

    /// Ordered task ids of a column.
    pub fn task_ids(&self, column: ColumnId) -> &[String] {
        self.columns
            .get(&column)
            .map(|c| c.task_ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn column(&self, column: ColumnId) -> Option<&Column> {
        self.columns.get(&column)
    }

    /// Tasks of a column in stored order.
    pub fn tasks_in(&self, column: ColumnId) -> impl Iterator<Item = &Task> + '_ {
        self.task_ids(column)
            .iter()
            .filter_map(move |id| self.tasks.get(id))
    }

    /// Column and index currently holding `id`.
    pub fn locate(&self, id: &str) -> Option<Slot> {
        self.column_order.iter().find_map(|&column| {
            self.task_ids(column)
                .iter()
                .position(|t| t == id)
                .map(|index| Slot::new(column, index))
        })
    }

    /// Check the structural invariants of a board read back from storage.
    pub fn validate(&self) -> Result<(), String> {
        let mut order = self.column_order.clone();
        order.sort();
        if order != ColumnId::ALL {
            return Err(format!("bad column order {:?}", self.column_order));
        }

        let mut seen = HashSet::new();
        for id in ColumnId::ALL {
            let column = self
                .columns
                .get(&id)
                .ok_or_else(|| format!("missing column '{}'", id.as_str()))?;
            if column.id != id {
                return Err(format!("column '{}' stored under '{}'", column.id.as_str(), id.as_str()));
            }
            for task_id in &column.task_ids {
                if !self.tasks.contains_key(task_id) {
                    return Err(format!("column '{}' lists unknown task {task_id}", id.as_str()));
                }
                if !seen.insert(task_id.as_str()) {
                    return Err(format!("task {task_id} listed more than once"));
                }
            }
        }

        if self.activity_log.len() > ACTIVITY_LOG_LIMIT {
            return Err(format!("activity log has {} entries", self.activity_log.len()));
        }
        Ok(())
    }

    fn column_mut(&mut self, id: ColumnId) -> &mut Column {
        self.columns.entry(id).or_insert_with(|| Column::empty(id))
    }

    fn log_activity(&mut self, action: impl Into<String>) {
        self.activity_log.insert(0, LogEntry::new(action));
        self.activity_log.truncate(ACTIVITY_LOG_LIMIT);
    }

    fn add_task(&mut self, draft: TaskDraft) -> Result<String, BoardError> {
        if draft.title.trim().is_empty() {
            return Err(BoardError::EmptyTitle);
        }

        let mut id = Uuid::new_v4().to_string();
        while self.tasks.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }

        let action = format!("Created task \"{}\"", draft.title);
        self.tasks
            .insert(id.clone(), draft.into_task(id.clone(), Utc::now()));
        self.column_mut(ColumnId::Todo).task_ids.insert(0, id.clone());
        self.log_activity(action);
        Ok(id)
    }

    fn update_task(&mut self, id: &str, update: TaskUpdate) -> Result<(), BoardError> {
        if matches!(&update.title, Some(title) if title.trim().is_empty()) {
            return Err(BoardError::EmptyTitle);
        }
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| BoardError::TaskNotFound { id: id.to_string() })?;

        update.apply(task);
        let action = format!("Edited task \"{}\"", task.title);
        self.log_activity(action);
        Ok(())
    }

    fn delete_task(&mut self, id: &str, column: ColumnId) -> Result<Task, BoardError> {
        let task = self
            .tasks
            .remove(id)
            .ok_or_else(|| BoardError::TaskNotFound { id: id.to_string() })?;

        match self.locate(id) {
            Some(slot) => {
                if slot.column != column {
                    tracing::warn!(
                        "Task {} was deleted from '{}' but is a member of '{}'",
                        id,
                        column.as_str(),
                        slot.column.as_str()
                    );
                }
                self.column_mut(slot.column).task_ids.remove(slot.index);
            }
            None => tracing::warn!("Task {} had no column membership", id),
        }

        self.log_activity("Deleted a task");
        Ok(task)
    }

    fn move_task(&mut self, mv: &TaskMove) -> Result<bool, BoardError> {
        let Some(destination) = mv.destination else {
            return Ok(false);
        };
        let source = mv.source;
        if source == destination {
            return Ok(false);
        }

        if self.task_ids(source.column).get(source.index) != Some(&mv.task_id) {
            return Err(BoardError::InvalidMove {
                task_id: mv.task_id.clone(),
                column: source.column,
                index: source.index,
            });
        }

        let id = self.column_mut(source.column).task_ids.remove(source.index);
        let dest_ids = &mut self.column_mut(destination.column).task_ids;
        let index = destination.index.min(dest_ids.len());
        dest_ids.insert(index, id);

        if source.column != destination.column {
            self.log_activity(format!("Moved task to {}", destination.column.title()));
        }
        Ok(true)
    }
}

/// Owns the current board and writes every change through to storage.
///
/// Each mutation is applied to a copy of the board, persisted, and only then
/// becomes current; a failed write leaves the previous board in place.
pub struct BoardStore {
    storage: SharedStorage,
    board: Board,
}

impl BoardStore {
    /// Restore the board from storage, falling back to the empty default.
    pub fn open(storage: SharedStorage) -> Self {
        let board = match storage::load_json::<Board>(storage.as_ref(), BOARD_KEY) {
            Some(board) => match board.validate() {
                Ok(()) => {
                    tracing::debug!("Restored board with {} tasks", board.tasks.len());
                    board
                }
                Err(reason) => {
                    tracing::warn!("Discarding stored board: {}", reason);
                    Board::default()
                }
            },
            None => Board::default(),
        };
        Self { storage, board }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    fn commit(&mut self, next: Board) -> Result<(), BoardError> {
        storage::save_json(self.storage.as_ref(), BOARD_KEY, &next)?;
        self.board = next;
        Ok(())
    }

    fn apply<T>(
        &mut self,
        op: impl FnOnce(&mut Board) -> Result<T, BoardError>,
    ) -> Result<T, BoardError> {
        let mut next = self.board.clone();
        let out = op(&mut next)?;
        self.commit(next)?;
        Ok(out)
    }

    /// Add a task at the top of the To Do column. Returns the new id.
    pub fn add_task(&mut self, draft: TaskDraft) -> Result<String, BoardError> {
        let id = self.apply(|board| board.add_task(draft))?;
        tracing::debug!("Added task {}", id);
        Ok(id)
    }

    /// Shallow-merge `update` into the task. Column membership is unchanged.
    pub fn update_task(&mut self, id: &str, update: TaskUpdate) -> Result<(), BoardError> {
        self.apply(|board| board.update_task(id, update))?;
        tracing::debug!("Updated task {}", id);
        Ok(())
    }

    /// Delete a task. The owning column is resolved from membership; `column`
    /// is what the caller believes it to be.
    pub fn delete_task(&mut self, id: &str, column: ColumnId) -> Result<Task, BoardError> {
        let task = self.apply(|board| board.delete_task(id, column))?;
        tracing::debug!("Deleted task {}", id);
        Ok(task)
    }

    /// Returns `false` when the move was a no-op (cancelled, or dropped in place).
    pub fn move_task(&mut self, mv: TaskMove) -> Result<bool, BoardError> {
        let mut next = self.board.clone();
        if !next.move_task(&mv)? {
            return Ok(false);
        }
        self.commit(next)?;
        tracing::debug!("Moved task {} to {:?}", mv.task_id, mv.destination);
        Ok(true)
    }

    /// Restore the empty board and clear storage if `confirm` agrees.
    pub fn reset_board(&mut self, confirm: impl FnOnce() -> bool) -> Result<bool, BoardError> {
        if !confirm() {
            return Ok(false);
        }
        self.storage.remove(BOARD_KEY)?;
        self.board = Board::default();
        tracing::info!("Board reset");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::{MemoryStorage, Storage};
    use crate::task::Priority;
    use std::sync::Arc;

    fn store() -> (Arc<MemoryStorage>, BoardStore) {
        let storage = MemoryStorage::shared();
        let store = BoardStore::open(storage.clone());
        (storage, store)
    }

    fn stored_board(storage: &MemoryStorage) -> Option<Board> {
        storage
            .get(BOARD_KEY)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    #[test]
    fn default_board_is_three_empty_columns() {
        let board = Board::default();
        assert_eq!(board.column_order(), &ColumnId::ALL);
        for id in ColumnId::ALL {
            assert!(board.task_ids(id).is_empty());
            assert_eq!(board.column(id).unwrap().title, id.title());
        }
        assert!(board.activity_log().is_empty());
        assert!(board.validate().is_ok());
    }

    #[test]
    fn add_task_prepends_to_todo_and_persists() {
        let (storage, mut store) = store();
        let first = store.add_task(TaskDraft::new("first")).unwrap();
        let second = store.add_task(TaskDraft::new("second")).unwrap();

        assert_eq!(store.board().task_ids(ColumnId::Todo), &[second.clone(), first]);
        assert_eq!(
            store.board().activity_log()[0].action,
            "Created task \"second\""
        );
        assert_eq!(stored_board(&storage).as_ref(), Some(store.board()));
        assert_eq!(store.board().task(&second).unwrap().priority, Priority::Medium);
    }

    #[test]
    fn add_task_ids_are_unique_and_in_exactly_one_column() {
        let (_, mut store) = store();
        for i in 0..40 {
            store.add_task(TaskDraft::new(format!("task {i}"))).unwrap();
        }
        let board = store.board();
        assert_eq!(board.tasks().len(), 40);
        assert!(board.validate().is_ok());
        for id in board.tasks().keys() {
            let count = ColumnId::ALL
                .iter()
                .filter(|c| board.task_ids(**c).contains(id))
                .count();
            assert_eq!(count, 1);
        }
    }

    #[test]
    fn empty_title_is_rejected() {
        let (storage, mut store) = store();
        assert!(matches!(
            store.add_task(TaskDraft::new("   ")),
            Err(BoardError::EmptyTitle)
        ));
        assert!(store.board().tasks().is_empty());
        assert!(stored_board(&storage).is_none());
    }

    #[test]
    fn update_merges_fields_and_logs() {
        let (_, mut store) = store();
        let id = store
            .add_task(TaskDraft::new("draft").with_description("keep me"))
            .unwrap();
        store
            .update_task(
                &id,
                TaskUpdate {
                    title: Some("final".into()),
                    priority: Some(Priority::High),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();

        let task = store.board().task(&id).unwrap();
        assert_eq!(task.title, "final");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.description.as_deref(), Some("keep me"));
        assert_eq!(store.board().task_ids(ColumnId::Todo), &[id]);
        assert_eq!(store.board().activity_log()[0].action, "Edited task \"final\"");
    }

    #[test]
    fn update_without_title_logs_current_title() {
        let (_, mut store) = store();
        let id = store.add_task(TaskDraft::new("stable")).unwrap();
        store
            .update_task(
                &id,
                TaskUpdate {
                    tags: Some(vec!["x".into()]),
                    ..TaskUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(store.board().activity_log()[0].action, "Edited task \"stable\"");
    }

    #[test]
    fn update_missing_task_is_not_found_and_leaves_log_alone() {
        let (_, mut store) = store();
        let err = store.update_task("nope", TaskUpdate::default()).unwrap_err();
        assert!(matches!(err, BoardError::TaskNotFound { id } if id == "nope"));
        assert!(store.board().activity_log().is_empty());
    }

    #[test]
    fn delete_removes_record_and_membership() {
        let (_, mut store) = store();
        let id = store.add_task(TaskDraft::new("doomed")).unwrap();
        let removed = store.delete_task(&id, ColumnId::Todo).unwrap();

        assert_eq!(removed.title, "doomed");
        assert!(store.board().task(&id).is_none());
        assert!(store.board().task_ids(ColumnId::Todo).is_empty());
        assert_eq!(store.board().activity_log()[0].action, "Deleted a task");
    }

    #[test]
    fn delete_with_wrong_column_resolves_owner() {
        let (_, mut store) = store();
        let id = store.add_task(TaskDraft::new("misplaced")).unwrap();
        store.delete_task(&id, ColumnId::Done).unwrap();

        assert!(store.board().task_ids(ColumnId::Todo).is_empty());
        assert!(store.board().validate().is_ok());
    }

    #[test]
    fn delete_missing_task_is_not_found() {
        let (_, mut store) = store();
        assert!(matches!(
            store.delete_task("ghost", ColumnId::Todo),
            Err(BoardError::TaskNotFound { .. })
        ));
    }

    #[test]
    fn same_column_move_uses_splice_semantics_without_logging() {
        let (_, mut store) = store();
        let c = store.add_task(TaskDraft::new("c")).unwrap();
        let b = store.add_task(TaskDraft::new("b")).unwrap();
        let a = store.add_task(TaskDraft::new("a")).unwrap();
        let log_len = store.board().activity_log().len();

        let moved = store
            .move_task(TaskMove {
                task_id: a.clone(),
                source: Slot::new(ColumnId::Todo, 0),
                destination: Some(Slot::new(ColumnId::Todo, 2)),
            })
            .unwrap();

        assert!(moved);
        assert_eq!(store.board().task_ids(ColumnId::Todo), &[b, c, a]);
        assert_eq!(store.board().activity_log().len(), log_len);
    }

    #[test]
    fn move_then_inverse_restores_order() {
        let (_, mut store) = store();
        for name in ["x", "y", "z", "w"] {
            store.add_task(TaskDraft::new(name)).unwrap();
        }
        let before = store.board().task_ids(ColumnId::Todo).to_vec();
        let id = before[1].clone();

        store
            .move_task(TaskMove {
                task_id: id.clone(),
                source: Slot::new(ColumnId::Todo, 1),
                destination: Some(Slot::new(ColumnId::Todo, 3)),
            })
            .unwrap();
        store
            .move_task(TaskMove {
                task_id: id,
                source: Slot::new(ColumnId::Todo, 3),
                destination: Some(Slot::new(ColumnId::Todo, 1)),
            })
            .unwrap();

        assert_eq!(store.board().task_ids(ColumnId::Todo), before.as_slice());
    }

    #[test]
    fn cross_column_move_logs_destination_title() {
        let (_, mut store) = store();
        let id = store.add_task(TaskDraft::new("go")).unwrap();
        store
            .move_task(TaskMove {
                task_id: id.clone(),
                source: Slot::new(ColumnId::Todo, 0),
                destination: Some(Slot::new(ColumnId::Done, 10)),
            })
            .unwrap();

        assert!(store.board().task_ids(ColumnId::Todo).is_empty());
        assert_eq!(store.board().task_ids(ColumnId::Done), &[id]);
        assert_eq!(store.board().activity_log()[0].action, "Moved task to Done");
    }

    #[test]
    fn cancelled_or_in_place_moves_are_no_ops() {
        let (_, mut store) = store();
        let id = store.add_task(TaskDraft::new("stay")).unwrap();
        let before = store.board().clone();

        let cancelled = TaskMove {
            task_id: id.clone(),
            source: Slot::new(ColumnId::Todo, 0),
            destination: None,
        };
        assert!(!store.move_task(cancelled).unwrap());

        let in_place = TaskMove {
            task_id: id,
            source: Slot::new(ColumnId::Todo, 0),
            destination: Some(Slot::new(ColumnId::Todo, 0)),
        };
        assert!(!store.move_task(in_place).unwrap());
        assert_eq!(store.board(), &before);
    }

    #[test]
    fn move_with_stale_source_is_rejected() {
        let (_, mut store) = store();
        let id = store.add_task(TaskDraft::new("one")).unwrap();
        let err = store
            .move_task(TaskMove {
                task_id: id,
                source: Slot::new(ColumnId::Doing, 0),
                destination: Some(Slot::new(ColumnId::Done, 0)),
            })
            .unwrap_err();
        assert!(matches!(err, BoardError::InvalidMove { column: ColumnId::Doing, .. }));
        assert!(store.board().validate().is_ok());
    }

    #[test]
    fn activity_log_is_capped_with_oldest_evicted() {
        let (_, mut store) = store();
        for i in 0..60 {
            store.add_task(TaskDraft::new(format!("t{i}"))).unwrap();
        }
        let log = store.board().activity_log();
        assert_eq!(log.len(), ACTIVITY_LOG_LIMIT);
        assert_eq!(log[0].action, "Created task \"t59\"");
        assert_eq!(log[ACTIVITY_LOG_LIMIT - 1].action, "Created task \"t10\"");
    }

    #[test]
    fn reset_requires_confirmation() {
        let (storage, mut store) = store();
        store.add_task(TaskDraft::new("keep")).unwrap();

        assert!(!store.reset_board(|| false).unwrap());
        assert_eq!(store.board().tasks().len(), 1);

        assert!(store.reset_board(|| true).unwrap());
        assert_eq!(store.board(), &Board::default());
        assert!(storage.get(BOARD_KEY).unwrap().is_none());
    }

    #[test]
    fn open_restores_persisted_board() {
        let (storage, mut store) = store();
        let id = store.add_task(TaskDraft::new("survive")).unwrap();

        let reopened = BoardStore::open(storage);
        assert_eq!(reopened.board(), store.board());
        assert_eq!(reopened.board().task(&id).unwrap().title, "survive");
    }

    #[test]
    fn open_discards_malformed_or_inconsistent_board() {
        let storage = MemoryStorage::shared();
        storage.set(BOARD_KEY, "not json").unwrap();
        assert_eq!(BoardStore::open(storage.clone()).board(), &Board::default());

        let mut board = Board::default();
        board.column_mut(ColumnId::Doing).task_ids.push("dangling".into());
        storage::save_json(storage.as_ref(), BOARD_KEY, &board).unwrap();
        assert_eq!(BoardStore::open(storage).board(), &Board::default());
    }

    struct FailingStorage;

    impl Storage for FailingStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }
    }

    #[test]
    fn failed_write_leaves_board_unchanged() {
        let mut store = BoardStore::open(Arc::new(FailingStorage));
        assert!(matches!(
            store.add_task(TaskDraft::new("lost")),
            Err(BoardError::Storage(_))
        ));
        assert_eq!(store.board(), &Board::default());
    }

    #[test]
    fn column_id_parses_ids_and_titles() {
        assert_eq!("doing".parse::<ColumnId>().unwrap(), ColumnId::Doing);
        assert_eq!("To Do".parse::<ColumnId>().unwrap(), ColumnId::Todo);
        assert!("later".parse::<ColumnId>().is_err());
        assert_eq!(ColumnId::Todo.next(), Some(ColumnId::Doing));
        assert_eq!(ColumnId::Todo.prev(), None);
        assert_eq!(ColumnId::Done.next(), None);
    }
}
