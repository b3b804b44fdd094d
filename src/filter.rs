//! Read-side projection of the board for display.

use std::cmp::Ordering;
use std::fmt;

use crate::kanban_board::{Board, ColumnId};
use crate::task::{Priority, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityFilter {
    #[default]
    All,
    Only(Priority),
}

impl PriorityFilter {
    /// All → Low → Medium → High → All.
    pub fn cycle(self) -> Self {
        match self {
            PriorityFilter::All => PriorityFilter::Only(Priority::Low),
            PriorityFilter::Only(Priority::High) => PriorityFilter::All,
            PriorityFilter::Only(p) => PriorityFilter::Only(p.next()),
        }
    }

    pub fn matches(self, priority: Priority) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::Only(p) => p == priority,
        }
    }
}

impl fmt::Display for PriorityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityFilter::All => f.write_str("All"),
            PriorityFilter::Only(p) => write!(f, "{p}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardFilter {
    pub search: String,
    pub priority: PriorityFilter,
}

impl BoardFilter {
    /// Case-insensitive title substring match and priority match.
    pub fn matches(&self, task: &Task) -> bool {
        let needle = self.search.to_lowercase();
        task.title.to_lowercase().contains(&needle) && self.priority.matches(task.priority)
    }
}

/// Undated tasks sort after dated ones.
fn by_due_date(a: &Task, b: &Task) -> Ordering {
    match (a.due_date, b.due_date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Visible tasks of one column, filtered and ordered by due date.
pub fn visible_tasks<'a>(board: &'a Board, column: ColumnId, filter: &BoardFilter) -> Vec<&'a Task> {
    let mut tasks: Vec<&Task> = board.tasks_in(column).filter(|t| filter.matches(t)).collect();
    tasks.sort_by(|a, b| by_due_date(a, b));
    tasks
}

/// Visible tasks of every column, in column order.
pub fn visible_columns<'a>(board: &'a Board, filter: &BoardFilter) -> Vec<(ColumnId, Vec<&'a Task>)> {
    board
        .column_order()
        .iter()
        .map(|&column| (column, visible_tasks(board, column, filter)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kanban_board::BoardStore;
    use crate::storage::MemoryStorage;
    use crate::task::TaskDraft;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    fn seeded() -> BoardStore {
        let mut store = BoardStore::open(MemoryStorage::shared());
        store.add_task(TaskDraft::new("Undated report")).unwrap();
        store
            .add_task(TaskDraft::new("Late report").with_due_date(date(20)))
            .unwrap();
        store
            .add_task(
                TaskDraft::new("Early fix")
                    .with_due_date(date(2))
                    .with_priority(Priority::High),
            )
            .unwrap();
        store
    }

    fn titles(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.title.clone()).collect()
    }

    #[test]
    fn sorts_by_due_date_with_undated_last() {
        let store = seeded();
        let tasks = visible_tasks(store.board(), ColumnId::Todo, &BoardFilter::default());
        assert_eq!(titles(&tasks), vec!["Early fix", "Late report", "Undated report"]);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let store = seeded();
        let filter = BoardFilter {
            search: "REPORT".into(),
            ..BoardFilter::default()
        };
        let tasks = visible_tasks(store.board(), ColumnId::Todo, &filter);
        assert_eq!(titles(&tasks), vec!["Late report", "Undated report"]);
    }

    #[test]
    fn search_and_priority_must_both_match() {
        let store = seeded();
        let filter = BoardFilter {
            search: "report".into(),
            priority: PriorityFilter::Only(Priority::High),
        };
        assert!(visible_tasks(store.board(), ColumnId::Todo, &filter).is_empty());

        let filter = BoardFilter {
            search: String::new(),
            priority: PriorityFilter::Only(Priority::High),
        };
        let tasks = visible_tasks(store.board(), ColumnId::Todo, &filter);
        assert_eq!(titles(&tasks), vec!["Early fix"]);
    }

    #[test]
    fn projection_does_not_touch_board() {
        let store = seeded();
        let before = store.board().clone();
        let columns = visible_columns(store.board(), &BoardFilter::default());
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].0, ColumnId::Todo);
        assert!(columns[1].1.is_empty());
        assert_eq!(store.board(), &before);
    }

    #[test]
    fn priority_filter_cycles_back_to_all() {
        let mut filter = PriorityFilter::All;
        for _ in 0..4 {
            filter = filter.cycle();
        }
        assert_eq!(filter, PriorityFilter::All);
        assert_eq!(PriorityFilter::All.cycle().to_string(), "Low");
    }
}
