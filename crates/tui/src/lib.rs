mod app;
mod render;
pub mod worker;

use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use pgview_adapters::postgres::PostgresConnectionBackend;
use pgview_core::connection_manager::ConnectionManager;
use pgview_core::profiles::ConnectionProfile;
use pgview_core::saved_queries::SavedQueryStore;
use pgview_core::session::{SessionController, DEFAULT_ROW_LIMIT};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};

use crate::app::{map_key_event, TuiApp};
use crate::render::render;
use crate::worker::{Dispatcher, WorkerEvent};

const TICK_RATE: Duration = Duration::from_millis(120);

type PostgresManager = ConnectionManager<PostgresConnectionBackend>;

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Everything the browser needs before the terminal takes over.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub profile: ConnectionProfile,
    pub row_limit: u32,
    pub saved_queries: SavedQueryStore,
    pub export_dir: PathBuf,
}

impl LaunchOptions {
    #[must_use]
    pub fn new(profile: ConnectionProfile, saved_queries: SavedQueryStore) -> Self {
        Self {
            profile,
            row_limit: DEFAULT_ROW_LIMIT,
            saved_queries,
            export_dir: PathBuf::from("."),
        }
    }
}

pub fn run(options: LaunchOptions) -> Result<(), TuiError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let profile_label = format!(
        "{}@{}:{}/{}",
        options.profile.user,
        options.profile.host,
        options.profile.port,
        options.profile.database.as_deref().unwrap_or("-")
    );
    let manager = Arc::new(ConnectionManager::new(
        PostgresConnectionBackend,
        options.profile,
    ));
    let connect_error = runtime
        .block_on(manager.try_connect())
        .err()
        .map(|err| err.to_string());

    let (dispatcher, receiver) = Dispatcher::new(runtime.handle().clone(), Arc::clone(&manager));
    let session = SessionController::new().with_row_limit(options.row_limit.max(1));
    let mut app = TuiApp::new(
        session,
        options.saved_queries,
        options.export_dir,
        profile_label,
    );
    app.session.start();
    if let Some(message) = connect_error {
        error!(error = %message, "initial connection failed");
        app.session.connection_failed(message);
    } else {
        info!("connected");
    }

    let mut terminal = setup_terminal()?;
    let run_result = run_loop(&mut terminal, &mut app, &dispatcher, receiver);
    let restore_result = restore_terminal(&mut terminal);

    runtime.block_on(manager.close());

    if let Err(error) = run_result {
        restore_result?;
        return Err(error);
    }

    restore_result?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), TuiError> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut TuiApp,
    dispatcher: &Dispatcher<PostgresManager>,
    mut receiver: UnboundedReceiver<WorkerEvent>,
) -> Result<(), TuiError> {
    loop {
        for command in app.take_commands() {
            dispatcher.dispatch(command);
        }

        terminal.draw(|frame| render(frame, app))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(message) = map_key_event(key, app.input_mode()) {
                        app.handle(message);
                    }
                }
            }
        }

        while let Ok(event) = receiver.try_recv() {
            app.apply_worker_event(event);
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}
