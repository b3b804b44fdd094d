//! A three-column kanban board (To Do / Doing / Done) with a login gate,
//! an activity log, and state persisted to a local key-value store.

pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod kanban_board;
pub mod logging;
pub mod session;
pub mod storage;
pub mod task;
pub mod ui;

pub use error::{BoardError, SessionError, StorageError};
pub use kanban_board::{Board, BoardStore, Column, ColumnId, LogEntry, Slot, TaskMove};
pub use session::{LoginOutcome, Session, SessionStore, User};
pub use storage::{FileStorage, MemoryStorage, SharedStorage, Storage};
pub use task::{Priority, Task, TaskDraft, TaskUpdate};
