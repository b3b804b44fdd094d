//! Error types for board, session and storage operations.
//!
//! Login mismatch is not an error: it is reported as
//! [`LoginOutcome::Declined`](crate::session::LoginOutcome::Declined).

use std::path::PathBuf;
use thiserror::Error;

use crate::kanban_board::ColumnId;

/// Failure reading or writing the persisted key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize record '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Failure of a board mutation. The board is left unchanged.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Task not found: {id}")]
    TaskNotFound { id: String },

    #[error("Task title must not be empty")]
    EmptyTitle,

    #[error("Invalid move of task {task_id}: no such task at {column} index {index}")]
    InvalidMove {
        task_id: String,
        column: ColumnId,
        index: usize,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure of a session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}
