//! Terminal front-end: login screen, board, task form and prompts.

use crate::filter::{visible_tasks, BoardFilter};
use crate::kanban_board::{Board, BoardStore, ColumnId, Slot, TaskMove};
use crate::session::{LoginOutcome, SessionStore};
use crate::task::{parse_due_date, parse_tags, Priority, Task, TaskDraft, TaskUpdate};
use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(100);

pub fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    while !app.should_quit() {
        terminal.draw(|f| draw(f, app))?;
        app.tick(Instant::now());

        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LoginField {
    #[default]
    Email,
    Password,
    Remember,
}

impl LoginField {
    fn next(self) -> Self {
        match self {
            LoginField::Email => LoginField::Password,
            LoginField::Password => LoginField::Remember,
            LoginField::Remember => LoginField::Email,
        }
    }

    fn prev(self) -> Self {
        match self {
            LoginField::Email => LoginField::Remember,
            LoginField::Password => LoginField::Email,
            LoginField::Remember => LoginField::Password,
        }
    }
}

#[derive(Debug, Default)]
struct LoginForm {
    email: String,
    password: String,
    remember: bool,
    show_password: bool,
    focus: LoginField,
    error: Option<String>,
    /// Deadline of a submitted login still "in flight".
    pending: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
    Title,
    Description,
    Priority,
    DueDate,
    Tags,
}

impl FormField {
    const ALL: [FormField; 5] = [
        FormField::Title,
        FormField::Description,
        FormField::Priority,
        FormField::DueDate,
        FormField::Tags,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    fn label(self) -> &'static str {
        match self {
            FormField::Title => "Title",
            FormField::Description => "Description",
            FormField::Priority => "Priority",
            FormField::DueDate => "Due date",
            FormField::Tags => "Tags",
        }
    }
}

#[derive(Debug)]
struct TaskForm {
    /// Id of the task being edited, `None` for a new task.
    editing: Option<String>,
    title: String,
    description: String,
    priority: Priority,
    due_date: String,
    tags: String,
    focus: FormField,
    error: Option<String>,
}

impl TaskForm {
    fn new() -> Self {
        Self {
            editing: None,
            title: String::new(),
            description: String::new(),
            priority: Priority::Medium,
            due_date: String::new(),
            tags: String::new(),
            focus: FormField::Title,
            error: None,
        }
    }

    fn edit(task: &Task) -> Self {
        Self {
            editing: Some(task.id.clone()),
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            priority: task.priority,
            due_date: task
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            tags: task.tags.join(", "),
            focus: FormField::Title,
            error: None,
        }
    }

    fn text_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            FormField::Title => Some(&mut self.title),
            FormField::Description => Some(&mut self.description),
            FormField::Priority => None,
            FormField::DueDate => Some(&mut self.due_date),
            FormField::Tags => Some(&mut self.tags),
        }
    }

    /// Validate and write the form to the board. Returns the task id.
    fn submit(&self, store: &mut BoardStore) -> Result<String, String> {
        if self.title.trim().is_empty() {
            return Err("Title is required".to_string());
        }
        let due_date =
            parse_due_date(&self.due_date).map_err(|_| "Due date must be YYYY-MM-DD".to_string())?;
        let description = Some(self.description.trim().to_string()).filter(|d| !d.is_empty());
        let tags = parse_tags(&self.tags);

        let result = match &self.editing {
            Some(id) => store
                .update_task(
                    id,
                    TaskUpdate {
                        title: Some(self.title.clone()),
                        description: Some(description),
                        priority: Some(self.priority),
                        due_date: Some(due_date),
                        tags: Some(tags),
                    },
                )
                .map(|_| id.clone()),
            None => store.add_task(TaskDraft {
                title: self.title.clone(),
                description,
                priority: self.priority,
                due_date,
                tags,
            }),
        };
        result.map_err(|err| err.to_string())
    }
}

#[derive(Debug)]
enum Mode {
    Normal,
    Search,
    Form(TaskForm),
    ConfirmReset,
}

#[derive(Debug)]
struct BoardView {
    filter: BoardFilter,
    column: ColumnId,
    selected: usize,
    mode: Mode,
    status: Option<String>,
}

impl Default for BoardView {
    fn default() -> Self {
        Self {
            filter: BoardFilter::default(),
            column: ColumnId::Todo,
            selected: 0,
            mode: Mode::Normal,
            status: None,
        }
    }
}

impl BoardView {
    fn selected_task<'a>(&self, board: &'a Board) -> Option<&'a Task> {
        visible_tasks(board, self.column, &self.filter)
            .get(self.selected)
            .copied()
    }

    fn clamp(&mut self, board: &Board) {
        let len = visible_tasks(board, self.column, &self.filter).len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    /// Follow a task to wherever it is displayed now.
    fn focus_task(&mut self, board: &Board, id: &str) {
        if let Some(slot) = board.locate(id) {
            self.column = slot.column;
        }
        self.selected = visible_tasks(board, self.column, &self.filter)
            .iter()
            .position(|t| t.id == id)
            .unwrap_or(0);
    }

    fn report<T>(&mut self, result: Result<T, crate::error::BoardError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::error!("{}", err);
                self.status = Some(err.to_string());
                None
            }
        }
    }
}

enum Screen {
    Login(LoginForm),
    Board(BoardView),
}

enum Action {
    None,
    Quit,
    SubmitLogin,
    Logout,
}

pub struct App {
    session: SessionStore,
    board: BoardStore,
    screen: Screen,
    login_delay: Duration,
    should_quit: bool,
}

impl App {
    /// Opens on the board when a remembered session was restored.
    pub fn new(session: SessionStore, board: BoardStore, login_delay: Duration) -> Self {
        let screen = if session.is_authenticated() {
            Screen::Board(BoardView::default())
        } else {
            Screen::Login(LoginForm::default())
        };
        Self {
            session,
            board,
            screen,
            login_delay,
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn board(&self) -> &Board {
        self.board.board()
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn is_board_screen(&self) -> bool {
        matches!(self.screen, Screen::Board(_))
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        let action = match &mut self.screen {
            Screen::Login(form) => login_key(form, key),
            Screen::Board(view) => board_key(view, &mut self.board, key),
        };

        match action {
            Action::None => {}
            Action::Quit => self.should_quit = true,
            Action::SubmitLogin => {
                let now = Instant::now();
                if let Screen::Login(form) = &mut self.screen {
                    form.error = None;
                    form.pending = Some(now + self.login_delay);
                }
                self.tick(now);
            }
            Action::Logout => {
                if let Err(err) = self.session.logout() {
                    tracing::error!("Logout failed: {}", err);
                }
                self.screen = Screen::Login(LoginForm::default());
            }
        }
    }

    /// Completes a pending login once its delay has elapsed.
    pub fn tick(&mut self, now: Instant) {
        let Screen::Login(form) = &mut self.screen else {
            return;
        };
        if !matches!(form.pending, Some(deadline) if now >= deadline) {
            return;
        }
        form.pending = None;

        let outcome = self
            .session
            .login(&form.email, &form.password, form.remember);
        match outcome {
            Ok(LoginOutcome::Success(_)) => self.screen = Screen::Board(BoardView::default()),
            Ok(LoginOutcome::Declined { message }) => form.error = Some(message),
            Err(err) => {
                tracing::error!("Login failed: {}", err);
                form.error = Some(err.to_string());
            }
        }
    }
}

fn login_key(form: &mut LoginForm, key: KeyEvent) -> Action {
    if form.pending.is_some() {
        return Action::None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        if key.code == KeyCode::Char('r') {
            form.show_password = !form.show_password;
        }
        return Action::None;
    }

    match key.code {
        KeyCode::Esc => return Action::Quit,
        KeyCode::Enter => return Action::SubmitLogin,
        KeyCode::Tab | KeyCode::Down => form.focus = form.focus.next(),
        KeyCode::BackTab | KeyCode::Up => form.focus = form.focus.prev(),
        KeyCode::Char(' ') if form.focus == LoginField::Remember => {
            form.remember = !form.remember;
        }
        KeyCode::Char(c) => match form.focus {
            LoginField::Email => form.email.push(c),
            LoginField::Password => form.password.push(c),
            LoginField::Remember => {}
        },
        KeyCode::Backspace => match form.focus {
            LoginField::Email => {
                form.email.pop();
            }
            LoginField::Password => {
                form.password.pop();
            }
            LoginField::Remember => {}
        },
        _ => {}
    }
    Action::None
}

fn board_key(view: &mut BoardView, store: &mut BoardStore, key: KeyEvent) -> Action {
    let mode = std::mem::replace(&mut view.mode, Mode::Normal);
    match mode {
        Mode::Normal => return normal_key(view, store, key),
        Mode::Search => match key.code {
            KeyCode::Enter => {}
            KeyCode::Esc => view.filter.search.clear(),
            KeyCode::Backspace => {
                view.filter.search.pop();
                view.mode = Mode::Search;
            }
            KeyCode::Char(c) => {
                view.filter.search.push(c);
                view.mode = Mode::Search;
            }
            _ => view.mode = Mode::Search,
        },
        Mode::Form(mut form) => match key.code {
            KeyCode::Esc => {}
            KeyCode::Enter => match form.submit(store) {
                Ok(id) => view.focus_task(store.board(), &id),
                Err(message) => {
                    form.error = Some(message);
                    view.mode = Mode::Form(form);
                }
            },
            code => {
                form_key(&mut form, code);
                view.mode = Mode::Form(form);
            }
        },
        Mode::ConfirmReset => {
            let confirmed = matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y'));
            if let Some(true) = view.report(store.reset_board(|| confirmed)) {
                view.column = ColumnId::Todo;
                view.selected = 0;
                view.status = Some("Board reset".to_string());
            }
        }
    }
    view.clamp(store.board());
    Action::None
}

fn form_key(form: &mut TaskForm, code: KeyCode) {
    match code {
        KeyCode::Tab | KeyCode::Down => form.focus = form.focus.next(),
        KeyCode::BackTab | KeyCode::Up => form.focus = form.focus.prev(),
        KeyCode::Left if form.focus == FormField::Priority => form.priority = form.priority.prev(),
        KeyCode::Right if form.focus == FormField::Priority => form.priority = form.priority.next(),
        KeyCode::Char(c) => {
            if let Some(text) = form.text_mut() {
                text.push(c);
            }
        }
        KeyCode::Backspace => {
            if let Some(text) = form.text_mut() {
                text.pop();
            }
        }
        _ => {}
    }
}

fn normal_key(view: &mut BoardView, store: &mut BoardStore, key: KeyEvent) -> Action {
    view.status = None;
    match key.code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('o') => return Action::Logout,
        KeyCode::Left | KeyCode::Char('h') => {
            if let Some(prev) = view.column.prev() {
                view.column = prev;
                view.selected = 0;
            }
        }
        KeyCode::Right | KeyCode::Char('l') => {
            if let Some(next) = view.column.next() {
                view.column = next;
                view.selected = 0;
            }
        }
        KeyCode::Up | KeyCode::Char('k') => view.selected = view.selected.saturating_sub(1),
        KeyCode::Down | KeyCode::Char('j') => view.selected += 1,
        KeyCode::Char('n') => view.mode = Mode::Form(TaskForm::new()),
        KeyCode::Char('e') => {
            if let Some(task) = view.selected_task(store.board()) {
                view.mode = Mode::Form(TaskForm::edit(task));
            }
        }
        KeyCode::Char('d') => {
            if let Some(id) = view.selected_task(store.board()).map(|t| t.id.clone()) {
                let column = view.column;
                view.report(store.delete_task(&id, column));
            }
        }
        KeyCode::Char('H') => move_across(view, store, ColumnId::prev),
        KeyCode::Char('L') => move_across(view, store, ColumnId::next),
        KeyCode::Char('K') => reorder(view, store, -1),
        KeyCode::Char('J') => reorder(view, store, 1),
        KeyCode::Char('/') => view.mode = Mode::Search,
        KeyCode::Char('p') => {
            view.filter.priority = view.filter.priority.cycle();
            view.selected = 0;
        }
        KeyCode::Char('r') => view.mode = Mode::ConfirmReset,
        _ => {}
    }
    view.clamp(store.board());
    Action::None
}

/// Move the selected task to the top of a neighbouring column.
fn move_across(
    view: &mut BoardView,
    store: &mut BoardStore,
    neighbour: fn(ColumnId) -> Option<ColumnId>,
) {
    let Some(id) = view.selected_task(store.board()).map(|t| t.id.clone()) else {
        return;
    };
    let (Some(source), Some(dest)) = (store.board().locate(&id), neighbour(view.column)) else {
        return;
    };
    let mv = TaskMove {
        task_id: id.clone(),
        source,
        destination: Some(Slot::new(dest, 0)),
    };
    if view.report(store.move_task(mv)).is_some() {
        view.focus_task(store.board(), &id);
    }
}

/// Shift the selected task one place within its column's stored order.
fn reorder(view: &mut BoardView, store: &mut BoardStore, delta: isize) {
    let Some(id) = view.selected_task(store.board()).map(|t| t.id.clone()) else {
        return;
    };
    let Some(source) = store.board().locate(&id) else {
        return;
    };
    let len = store.board().task_ids(source.column).len();
    let Some(index) = source.index.checked_add_signed(delta).filter(|i| *i < len) else {
        return;
    };
    let mv = TaskMove {
        task_id: id.clone(),
        source,
        destination: Some(Slot::new(source.column, index)),
    };
    if view.report(store.move_task(mv)).is_some() {
        view.focus_task(store.board(), &id);
    }
}

fn draw(f: &mut Frame, app: &App) {
    match &app.screen {
        Screen::Login(form) => draw_login(f, form),
        Screen::Board(view) => draw_board(f, app, view),
    }
}

/// A box of fixed height, `percent_x` wide, centered in `area`.
fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Fill(1),
            Constraint::Length(height),
            Constraint::Fill(1),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn field_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::Low => Color::Green,
        Priority::Medium => Color::Yellow,
        Priority::High => Color::Red,
    }
}

fn draw_login(f: &mut Frame, form: &LoginForm) {
    let area = centered_rect(60, 11, f.area());
    let password = if form.show_password {
        form.password.clone()
    } else {
        "*".repeat(form.password.chars().count())
    };
    let checkbox = if form.remember { "[x]" } else { "[ ]" };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Email:    ", field_style(form.focus == LoginField::Email)),
            Span::raw(form.email.as_str()),
        ]),
        Line::from(vec![
            Span::styled("Password: ", field_style(form.focus == LoginField::Password)),
            Span::raw(password),
        ]),
        Line::from(Span::styled(
            format!("{} Remember me", checkbox),
            field_style(form.focus == LoginField::Remember),
        )),
        Line::from(""),
    ];
    if form.pending.is_some() {
        lines.push(Line::from(Span::styled(
            "Authenticating...",
            Style::default().fg(Color::Yellow),
        )));
    } else if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            error.as_str(),
            Style::default().fg(Color::Red),
        )));
    } else {
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        "Tab: next field  Space: toggle  Ctrl-R: reveal  Enter: login  Esc: quit",
        Style::default().fg(Color::DarkGray),
    )));

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines)
            .block(Block::default().title(" Login ").borders(Borders::ALL))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn task_item(task: &Task) -> ListItem<'_> {
    let due = task
        .due_date
        .map(|d| d.format("%b %d").to_string().to_uppercase())
        .unwrap_or_else(|| "N/A".to_string());
    let mut meta = vec![
        Span::styled(
            format!("{:<6} ", task.priority.as_str()),
            Style::default().fg(priority_color(task.priority)),
        ),
        Span::styled(format!("due {}", due), Style::default().fg(Color::DarkGray)),
    ];
    for tag in task.tags.iter().take(2) {
        meta.push(Span::styled(
            format!(" #{}", tag),
            Style::default().fg(Color::Magenta),
        ));
    }
    ListItem::new(vec![
        Line::from(Span::styled(
            task.title.as_str(),
            Style::default().fg(Color::White),
        )),
        Line::from(meta),
    ])
}

fn draw_board(f: &mut Frame, app: &App, view: &BoardView) {
    let board = app.board();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(8),
            Constraint::Length(1),
        ])
        .split(f.area());

    let user = app
        .session
        .user()
        .map(|u| u.name.as_str())
        .unwrap_or("guest");
    let search_style = field_style(matches!(view.mode, Mode::Search));
    let header = Line::from(vec![
        Span::styled("TASKBOARD", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("  {}   ", user)),
        Span::styled(format!("Search: {}", view.filter.search), search_style),
        Span::raw(format!("   Priority: {}", view.filter.priority)),
    ]);
    f.render_widget(
        Paragraph::new(header).block(Block::default().borders(Borders::ALL)),
        rows[0],
    );

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![
            Constraint::Percentage(33),
            Constraint::Percentage(33),
            Constraint::Percentage(34),
        ])
        .split(rows[1]);

    for (i, &column) in board.column_order().iter().enumerate() {
        let tasks = visible_tasks(board, column, &view.filter);
        let count = tasks.len();
        let items: Vec<ListItem> = tasks.into_iter().map(task_item).collect();
        let focused = view.column == column;

        let list = List::new(items)
            .block(
                Block::default()
                    .title(format!(" {} [{:02}] ", column.title(), count))
                    .borders(Borders::ALL)
                    .border_style(if focused {
                        Style::default().fg(Color::Cyan)
                    } else {
                        Style::default()
                    }),
            )
            .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));

        let mut state = ListState::default();
        if focused && count > 0 {
            state.select(Some(view.selected));
        }
        if let Some(area) = chunks.get(i) {
            f.render_stateful_widget(list, *area, &mut state);
        }
    }

    let log: Vec<ListItem> = board
        .activity_log()
        .iter()
        .map(|entry| {
            let local = entry.timestamp.with_timezone(&Local);
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("[{}] ", local.format("%H:%M:%S")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(entry.action.as_str()),
            ]))
        })
        .collect();
    f.render_widget(
        List::new(log).block(Block::default().title(" Activity ").borders(Borders::ALL)),
        rows[2],
    );

    let footer = match &view.status {
        Some(status) => Span::styled(status.as_str(), Style::default().fg(Color::Yellow)),
        None => Span::styled(
            "n new  e edit  d delete  H/L move  K/J reorder  / search  p priority  r reset  o logout  q quit",
            Style::default().fg(Color::DarkGray),
        ),
    };
    f.render_widget(Paragraph::new(Line::from(footer)), rows[3]);

    match &view.mode {
        Mode::Form(form) => draw_form(f, form),
        Mode::ConfirmReset => {
            let area = centered_rect(50, 3, f.area());
            f.render_widget(Clear, area);
            f.render_widget(
                Paragraph::new("Are you sure? This will delete all data. (y/N)")
                    .block(Block::default().title(" Reset ").borders(Borders::ALL)),
                area,
            );
        }
        Mode::Normal | Mode::Search => {}
    }
}

fn draw_form(f: &mut Frame, form: &TaskForm) {
    let area = centered_rect(60, 10, f.area());
    let title = if form.editing.is_some() {
        " Edit task "
    } else {
        " New task "
    };

    let mut lines: Vec<Line> = FormField::ALL
        .iter()
        .map(|&field| {
            let value = match field {
                FormField::Title => form.title.clone(),
                FormField::Description => form.description.clone(),
                FormField::Priority => format!("< {} >", form.priority),
                FormField::DueDate => form.due_date.clone(),
                FormField::Tags => form.tags.clone(),
            };
            Line::from(vec![
                Span::styled(
                    format!("{:<12}", field.label()),
                    field_style(form.focus == field),
                ),
                Span::raw(value),
            ])
        })
        .collect();
    lines.push(Line::from(match &form.error {
        Some(error) => Span::styled(error.as_str(), Style::default().fg(Color::Red)),
        None => Span::raw(""),
    }));
    lines.push(Line::from(Span::styled(
        "Tab: next  </>: priority  Enter: save  Esc: cancel",
        Style::default().fg(Color::DarkGray),
    )));

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines).block(Block::default().title(title).borders(Borders::ALL)),
        area,
    );
}
