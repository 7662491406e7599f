pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    fs::File,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

use typemaster::{
    config::{Config, ConfigStore, FileConfigStore},
    passages::Difficulty,
    runtime::{AppEvent, Clock, CrosstermEventSource, FixedTicker, MonotonicClock, Runner},
    service::{ServiceError, TypeMaster},
    session::{ReferenceText, Status, TypingSession},
    store::{write_results_csv, LeaderboardEntry, SqliteStore, Store, UserRecord},
};

const TICK_RATE_MS: u64 = 100;

/// terminal typing trainer with tiered passages and a persistent leaderboard
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal typing trainer: pick a difficulty, type the passage with live wpm and accuracy feedback, and track your best runs on a local leaderboard."
)]
pub struct Cli {
    /// name to record results under
    #[clap(short = 'u', long)]
    username: Option<String>,

    /// email for the user profile
    #[clap(short = 'e', long)]
    email: Option<String>,

    /// passage difficulty tier
    #[clap(short = 'd', long, value_enum)]
    difficulty: Option<Difficulty>,

    /// practice a custom passage instead of a stored one (result is not recorded)
    #[clap(short = 'p', long)]
    passage: Option<String>,

    /// path to the results database
    #[clap(long)]
    db: Option<PathBuf>,

    /// add a passage to the store at the chosen difficulty, then exit
    #[clap(long, value_name = "CONTENT")]
    add_passage: Option<String>,

    /// print the leaderboard and exit
    #[clap(long)]
    leaderboard: bool,

    /// export your result history as CSV to this path, then exit
    #[clap(long, value_name = "PATH")]
    export_csv: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Typing,
    Results,
    Leaderboard,
}

pub struct App {
    pub service: TypeMaster<SqliteStore>,
    pub session: TypingSession,
    pub typed: String,
    pub user: UserRecord,
    pub state: AppState,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub leaderboard_size: usize,
    pub notice: Option<String>,
    pub difficulty: Difficulty,
    pub custom_passage: Option<String>,
    clock: MonotonicClock,
}

impl App {
    pub fn new(
        service: TypeMaster<SqliteStore>,
        user: UserRecord,
        difficulty: Difficulty,
        custom_passage: Option<String>,
        leaderboard_size: usize,
    ) -> Result<Self, ServiceError> {
        let mut app = Self {
            session: TypingSession::new(user.id),
            service,
            typed: String::new(),
            user,
            state: AppState::Typing,
            leaderboard: Vec::new(),
            leaderboard_size,
            notice: None,
            difficulty,
            custom_passage,
            clock: MonotonicClock::new(),
        };
        app.next_passage()?;
        Ok(app)
    }

    /// Assign a fresh passage and return to the typing screen.
    pub fn next_passage(&mut self) -> Result<(), ServiceError> {
        let reference = match &self.custom_passage {
            // id 0 marks a passage that is not in the store; the finished
            // result stays local
            Some(content) => ReferenceText {
                id: 0,
                content: content.clone(),
                difficulty: self.difficulty,
            },
            None => self.service.random_text(self.difficulty)?,
        };
        self.session.assign(reference);
        self.typed.clear();
        self.notice = None;
        self.state = AppState::Typing;
        Ok(())
    }

    /// Restart the current passage from the top.
    pub fn retry(&mut self) {
        if let Some(reference) = self.session.reference().cloned() {
            self.session.assign(reference);
            self.typed.clear();
            self.notice = None;
            self.state = AppState::Typing;
        }
    }

    /// Push the current snapshot through the session and handle completion.
    fn observe_now(&mut self) {
        let now = self.clock.now_secs();
        let snapshot = self.typed.clone();
        self.session.observe(&snapshot, now);
        if self.session.has_finished() {
            self.on_finish();
        }
    }

    fn submit_now(&mut self) {
        self.session.submit(self.clock.now_secs());
        if self.session.has_finished() {
            self.on_finish();
        }
    }

    /// Hand the finished result to the store, exactly once. A store failure
    /// is reported on screen and otherwise swallowed; the session stays
    /// finished either way.
    fn on_finish(&mut self) {
        if let Some(record) = self.session.take_result() {
            if record.text_id > 0 {
                self.notice = Some(match self.service.submit_result(&record) {
                    Ok(_) => String::from("result saved"),
                    Err(e) => format!("result not saved: {e}"),
                });
            } else {
                self.notice = Some(String::from("custom passage: result not recorded"));
            }
        }
        self.refresh_leaderboard();
        self.state = AppState::Results;
    }

    pub fn refresh_leaderboard(&mut self) {
        self.leaderboard = self
            .service
            .leaderboard(self.leaderboard_size)
            .unwrap_or_default();
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_store = FileConfigStore::new();
    let config = config_store.load();

    let username = cli
        .username
        .clone()
        .or_else(|| config.username.clone())
        .unwrap_or_else(|| String::from("guest"));
    let email = cli
        .email
        .clone()
        .unwrap_or_else(|| format!("{username}@typemaster.local"));
    let difficulty = cli.difficulty.unwrap_or(config.difficulty);

    let db_path = match cli.db.clone().or_else(SqliteStore::default_path) {
        Some(p) => p,
        None => {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::Io, "could not resolve a database path")
                .exit();
        }
    };
    let store = SqliteStore::open(db_path)?;
    let service = TypeMaster::new(store);

    if let Some(content) = &cli.add_passage {
        let text = service.add_text(content, difficulty)?;
        println!("added {} passage #{}", text.difficulty, text.id);
        return Ok(());
    }

    if cli.leaderboard {
        print_leaderboard(&service, config.leaderboard_size)?;
        return Ok(());
    }

    let user = service.register_user(&username, &email, None)?;

    if let Some(path) = &cli.export_csv {
        let results = service.user_results(user.id)?;
        let file = File::create(path)?;
        let count = write_results_csv(&results, file)?;
        println!("exported {} results to {}", count, path.display());
        return Ok(());
    }

    // remember the resolved preferences for next time
    let _ = config_store.save(&Config {
        username: Some(username),
        difficulty,
        leaderboard_size: config.leaderboard_size,
    });

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut app = App::new(
        service,
        user,
        difficulty,
        cli.passage.clone(),
        config.leaderboard_size,
    )?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_outcome = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    run_outcome
}

fn print_leaderboard<S: Store>(
    service: &TypeMaster<S>,
    limit: usize,
) -> Result<(), Box<dyn Error>> {
    let board = service.leaderboard(limit)?;
    if board.is_empty() {
        println!("leaderboard is empty");
        return Ok(());
    }
    println!("{:<4} {:<20} {:>8} {:>12}", "#", "user", "wpm", "accuracy");
    for (rank, entry) in board.iter().enumerate() {
        println!(
            "{:<4} {:<20} {:>8.2} {:>11.2}%",
            rank + 1,
            entry.username,
            entry.wpm,
            entry.accuracy
        );
    }
    Ok(())
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        terminal.draw(|f| ui(app, f))?;

        match runner.step() {
            AppEvent::Tick => {
                // live recomputation on a fixed cadence; a finished session
                // ignores further observations
                if app.session.status() == Status::Active && app.session.has_started() {
                    app.observe_now();
                }
            }
            AppEvent::Resize => {}
            AppEvent::Key(key) => {
                if key.modifiers.contains(KeyModifiers::CONTROL)
                    && key.code == KeyCode::Char('c')
                {
                    break;
                }

                match app.state {
                    AppState::Typing => match key.code {
                        KeyCode::Esc => break,
                        KeyCode::Backspace => {
                            app.typed.pop();
                            app.observe_now();
                        }
                        KeyCode::Enter => app.submit_now(),
                        KeyCode::Char(c) => {
                            app.typed.push(c);
                            app.observe_now();
                        }
                        _ => {}
                    },
                    AppState::Results => match key.code {
                        KeyCode::Esc => break,
                        KeyCode::Char('r') => app.retry(),
                        KeyCode::Char('n') => {
                            if let Err(e) = app.next_passage() {
                                app.notice = Some(format!("no new passage: {e}"));
                            }
                        }
                        KeyCode::Char('l') => {
                            app.refresh_leaderboard();
                            app.state = AppState::Leaderboard;
                        }
                        _ => {}
                    },
                    AppState::Leaderboard => match key.code {
                        KeyCode::Esc => break,
                        KeyCode::Char('b') | KeyCode::Backspace => {
                            app.state = if app.session.has_finished() {
                                AppState::Results
                            } else {
                                AppState::Typing
                            };
                        }
                        _ => {}
                    },
                }
            }
        }
    }

    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    f.render_widget(&*app, f.area());
}
