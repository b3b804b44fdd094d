//! Command-line interface.
//!
//! With no subcommand the terminal UI starts. Board subcommands require a
//! remembered login, the same gate the UI applies.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};

use crate::filter::{visible_columns, BoardFilter, PriorityFilter};
use crate::kanban_board::{Board, BoardStore, ColumnId, Slot, TaskMove};
use crate::session::{LoginOutcome, SessionStore};
use crate::storage::SharedStorage;
use crate::task::{parse_tags, Priority, Task, TaskDraft, TaskUpdate};

/// Three-column kanban board for the terminal.
#[derive(Debug, Parser)]
#[command(name = "taskboard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the persisted session and board
    #[arg(long, global = true, env = "TASKBOARD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Skip the simulated login delay in the terminal UI
    #[arg(long, global = true)]
    pub no_login_delay: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in with the demo credential
    Login(LoginArgs),

    /// Forget the remembered login
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Show the board
    List(ListArgs),

    /// Add a task to To Do
    Add(AddArgs),

    /// Edit fields of a task
    Edit(EditArgs),

    /// Move a task to a column
    Move(MoveArgs),

    /// Delete a task
    Delete(DeleteArgs),

    /// Show the activity log
    Log,

    /// Delete every task and the activity log
    Reset(ResetArgs),
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub password: String,

    /// Check the credential without remembering the login
    #[arg(long)]
    pub forget: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only tasks whose title contains this text
    #[arg(long, default_value = "")]
    pub search: String,

    /// Only tasks with this priority
    #[arg(long)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, default_value = "Medium")]
    pub priority: Priority,

    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<NaiveDate>,

    /// Comma-separated tags
    #[arg(long)]
    pub tags: Option<String>,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Task id or unique id prefix
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, conflicts_with = "no_description")]
    pub description: Option<String>,

    /// Clear the description
    #[arg(long)]
    pub no_description: bool,

    #[arg(long)]
    pub priority: Option<Priority>,

    /// Due date (YYYY-MM-DD)
    #[arg(long, conflicts_with = "no_due")]
    pub due: Option<NaiveDate>,

    /// Clear the due date
    #[arg(long)]
    pub no_due: bool,

    /// Comma-separated tags, replacing the current ones
    #[arg(long)]
    pub tags: Option<String>,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    /// Task id or unique id prefix
    pub id: String,

    /// Destination column (todo, doing, done)
    pub column: ColumnId,

    /// Position in the destination column, 0 is the top
    #[arg(long, default_value_t = 0)]
    pub index: usize,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Task id or unique id prefix
    pub id: String,
}

#[derive(Debug, Args)]
pub struct ResetArgs {
    /// Do not ask for confirmation
    #[arg(long)]
    pub yes: bool,
}

impl From<EditArgs> for TaskUpdate {
    fn from(args: EditArgs) -> Self {
        TaskUpdate {
            title: args.title,
            description: if args.no_description {
                Some(None)
            } else {
                args.description.map(Some)
            },
            priority: args.priority,
            due_date: if args.no_due {
                Some(None)
            } else {
                args.due.map(Some)
            },
            tags: args.tags.as_deref().map(parse_tags),
        }
    }
}

/// Runs one non-interactive command against `storage`.
///
/// `confirm` answers yes/no questions, such as the reset prompt.
pub fn dispatch(
    command: Commands,
    storage: SharedStorage,
    out: &mut dyn Write,
    mut confirm: impl FnMut(&str) -> bool,
) -> Result<()> {
    let mut session = SessionStore::open(storage.clone());

    let command = match command {
        Commands::Login(args) => {
            match session.login(&args.email, &args.password, !args.forget)? {
                LoginOutcome::Success(user) => {
                    writeln!(out, "Logged in as {} <{}>", user.name, user.email)?
                }
                LoginOutcome::Declined { message } => bail!(message),
            }
            return Ok(());
        }
        Commands::Logout => {
            session.logout()?;
            writeln!(out, "Logged out")?;
            return Ok(());
        }
        Commands::Whoami => {
            match session.user() {
                Some(user) => writeln!(out, "{} <{}>", user.name, user.email)?,
                None => writeln!(out, "Not logged in")?,
            }
            return Ok(());
        }
        other => other,
    };

    if !session.is_authenticated() {
        bail!("Not logged in. Run `taskboard login` first.");
    }

    let mut store = BoardStore::open(storage);
    match command {
        Commands::List(args) => {
            let filter = BoardFilter {
                search: args.search,
                priority: args.priority.map_or(PriorityFilter::All, PriorityFilter::Only),
            };
            print_board(store.board(), &filter, out)?;
        }
        Commands::Add(args) => {
            let mut draft = TaskDraft::new(args.title).with_priority(args.priority);
            draft.description = args.description;
            draft.due_date = args.due;
            draft.tags = args.tags.as_deref().map(parse_tags).unwrap_or_default();
            let id = store.add_task(draft)?;
            writeln!(out, "Created {}", id)?;
        }
        Commands::Edit(args) => {
            let id = resolve_id(store.board(), &args.id)?;
            let update = TaskUpdate::from(args);
            if update.is_empty() {
                bail!("Nothing to change");
            }
            store.update_task(&id, update)?;
            writeln!(out, "Updated {}", id)?;
        }
        Commands::Move(args) => {
            let id = resolve_id(store.board(), &args.id)?;
            let source = store
                .board()
                .locate(&id)
                .ok_or_else(|| anyhow!("Task {} is not on any column", id))?;
            let moved = store.move_task(TaskMove {
                task_id: id.clone(),
                source,
                destination: Some(Slot::new(args.column, args.index)),
            })?;
            if moved {
                writeln!(out, "Moved {} to {}", id, args.column)?;
            } else {
                writeln!(out, "{} is already there", id)?;
            }
        }
        Commands::Delete(args) => {
            let id = resolve_id(store.board(), &args.id)?;
            let column = store
                .board()
                .locate(&id)
                .map_or(ColumnId::Todo, |slot| slot.column);
            let task = store.delete_task(&id, column)?;
            writeln!(out, "Deleted \"{}\"", task.title)?;
        }
        Commands::Log => {
            for entry in store.board().activity_log() {
                let local = entry.timestamp.with_timezone(&Local);
                writeln!(out, "[{}] {}", local.format("%H:%M:%S"), entry.action)?;
            }
        }
        Commands::Reset(args) => {
            let reset = store
                .reset_board(|| args.yes || confirm("Are you sure? This will delete all data."))
                .context("Failed to reset board")?;
            writeln!(out, "{}", if reset { "Board reset" } else { "Reset cancelled" })?;
        }
        Commands::Login(_) | Commands::Logout | Commands::Whoami => {}
    }
    Ok(())
}

/// Accept a full task id or an unambiguous prefix of one.
pub fn resolve_id(board: &Board, query: &str) -> Result<String> {
    if board.task(query).is_some() {
        return Ok(query.to_string());
    }
    let mut matches = board.tasks().keys().filter(|id| id.starts_with(query));
    match (matches.next(), matches.next()) {
        (Some(id), None) if !query.is_empty() => Ok(id.clone()),
        (Some(_), Some(_)) => bail!("Task id prefix '{}' is ambiguous", query),
        _ => bail!("Task not found: {}", query),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn describe(task: &Task) -> String {
    let mut line = format!("{}  {}  ({}", short_id(&task.id), task.title, task.priority);
    if let Some(due) = task.due_date {
        line.push_str(&format!(", due {}", due));
    }
    line.push(')');
    for tag in &task.tags {
        line.push_str(&format!(" #{}", tag));
    }
    line
}

fn print_board(board: &Board, filter: &BoardFilter, out: &mut dyn Write) -> Result<()> {
    for (column, tasks) in visible_columns(board, filter) {
        writeln!(out, "{} [{:02}]", column.title(), tasks.len())?;
        for task in tasks {
            writeln!(out, "  {}", describe(task))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DEMO_EMAIL, DEMO_PASSWORD};
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    fn run(storage: &Arc<MemoryStorage>, args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("taskboard").chain(args.iter().copied()))?;
        let command = cli.command.ok_or_else(|| anyhow!("no command"))?;
        let mut out = Vec::new();
        dispatch(command, storage.clone(), &mut out, |_| false)?;
        Ok(String::from_utf8(out)?)
    }

    fn logged_in() -> Arc<MemoryStorage> {
        let storage = MemoryStorage::shared();
        run(
            &storage,
            &["login", "--email", DEMO_EMAIL, "--password", DEMO_PASSWORD],
        )
        .unwrap();
        storage
    }

    fn only_task_id(storage: &Arc<MemoryStorage>) -> String {
        let store = BoardStore::open(storage.clone());
        store.board().tasks().keys().next().unwrap().clone()
    }

    #[test]
    fn board_commands_require_login() {
        let storage = MemoryStorage::shared();
        let err = run(&storage, &["list"]).unwrap_err();
        assert!(err.to_string().contains("Not logged in"));
    }

    #[test]
    fn bad_credentials_fail() {
        let storage = MemoryStorage::shared();
        let err = run(&storage, &["login", "--email", "a", "--password", "b"]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
        assert_eq!(run(&storage, &["whoami"]).unwrap(), "Not logged in\n");
    }

    #[test]
    fn add_list_move_delete() {
        let storage = logged_in();
        run(
            &storage,
            &["add", "--title", "Draft roadmap", "--priority", "high", "--tags", "docs, ui"],
        )
        .unwrap();
        let id = only_task_id(&storage);

        let listing = run(&storage, &["list"]).unwrap();
        assert!(listing.contains("To Do [01]"));
        assert!(listing.contains("Draft roadmap  (High) #docs #ui"));

        run(&storage, &["move", &id[..8], "doing"]).unwrap();
        let listing = run(&storage, &["list"]).unwrap();
        assert!(listing.contains("To Do [00]"));
        assert!(listing.contains("Doing [01]"));

        let out = run(&storage, &["delete", &id]).unwrap();
        assert_eq!(out, "Deleted \"Draft roadmap\"\n");

        let log = run(&storage, &["log"]).unwrap();
        let actions: Vec<&str> = log.lines().map(|l| l.split("] ").nth(1).unwrap()).collect();
        assert_eq!(
            actions,
            vec!["Deleted a task", "Moved task to Doing", "Created task \"Draft roadmap\""]
        );
    }

    #[test]
    fn edit_updates_fields() {
        let storage = logged_in();
        run(&storage, &["add", "--title", "draft", "--due", "2026-01-05"]).unwrap();
        let id = only_task_id(&storage);

        run(&storage, &["edit", &id, "--title", "final", "--no-due"]).unwrap();
        let store = BoardStore::open(storage.clone());
        let task = store.board().task(&id).unwrap();
        assert_eq!(task.title, "final");
        assert_eq!(task.due_date, None);

        assert!(run(&storage, &["edit", &id]).is_err());
    }

    #[test]
    fn reset_honours_confirmation() {
        let storage = logged_in();
        run(&storage, &["add", "--title", "x"]).unwrap();

        assert_eq!(run(&storage, &["reset"]).unwrap(), "Reset cancelled\n");
        assert_eq!(run(&storage, &["reset", "--yes"]).unwrap(), "Board reset\n");
        assert!(BoardStore::open(storage).board().tasks().is_empty());
    }

    #[test]
    fn resolve_id_rejects_unknown_and_ambiguous() {
        let board = Board::default();
        assert!(resolve_id(&board, "abc").is_err());
        assert!(resolve_id(&board, "").is_err());
    }
}
