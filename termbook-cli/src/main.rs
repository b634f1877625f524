mod config;
mod library;

use std::fs;
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use directories::ProjectDirs;
use termbook_core::{ContainerProvider, Intent, Navigator};
use termbook_epub::BookProvider;
use termbook_tty::{
    format_status, write_status_line, EventMapper, InputMode, ReaderLayout, TextRenderer, UiEvent,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::{Config, CONFIG_FILE};
use crate::library::{find_books, LibraryWindow};

const READER_HELP_BACK: &str = "[ n/Right Next | p/Left Prev | g/G First/Last | q Back ]";
const READER_HELP_QUIT: &str = "[ n/Right Next | p/Left Prev | g/G First/Last | q Quit ]";
const LIBRARY_HELP: &str = "[ Up/Down Move | Enter Open | q Quit ]";

#[derive(Debug, Parser)]
#[command(name = "termbook", version, about = "Paginated EPUB and text reader for the terminal")]
struct Args {
    /// Starting chapter (1-based) when opening a single book
    #[arg(short = 'c', long = "chapter")]
    chapter: Option<usize>,

    /// Alternate configuration file
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Book to open, or a directory to browse
    #[arg(default_value = ".")]
    path: PathBuf,
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "termbook", "termbook")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| project_dirs.config_dir().join(CONFIG_FILE));
    let config = Config::load(&config_path)?;
    let _log_guard = init_logging(&project_dirs, config.log_filter.as_deref())?;

    let (columns, rows) = terminal::size().context("failed to query terminal size")?;
    let layout = ReaderLayout::new(columns, rows, config.layout());
    let provider = BookProvider;

    let mut app = if args.path.is_dir() {
        let books = find_books(&args.path)?;
        info!(dir = %args.path.display(), books = books.len(), "opened library");
        App::new(config, layout, Some(LibraryWindow::new(books)), None)
    } else {
        let mut navigator = open_book(&provider, &args.path, &config, layout).await?;
        if let Some(chapter) = args.chapter {
            navigator.jump_to_chapter(chapter.saturating_sub(1));
        }
        App::new(config, layout, None, Some(navigator))
    };

    let _raw = RawModeGuard::new()?;
    let mut renderer = TextRenderer::new(io::stdout());
    let mut event_mapper = EventMapper::new();
    let mut dirty = true;

    loop {
        event_mapper.set_mode(app.input_mode());

        if dirty {
            let pending = event_mapper.pending_input();
            app.redraw(&mut renderer, pending.as_deref())?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(100))? {
            let ev = event::read()?;
            let ui_event = event_mapper.map_event(ev);
            if let Some(status) = app.status(event_mapper.pending_input().as_deref()) {
                draw_status_line(&mut renderer, &app.layout, &status)?;
            }
            match app.handle_event(ui_event, &provider).await? {
                LoopAction::ContinueRedraw => dirty = true,
                LoopAction::Continue => {}
                LoopAction::Quit => break,
            }
        }
    }

    {
        let writer = renderer.writer();
        crossterm::execute!(writer, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum LoopAction {
    Continue,
    ContinueRedraw,
    Quit,
}

/// The reader shows when a book is open; otherwise the library does.
struct App {
    config: Config,
    layout: ReaderLayout,
    library: Option<LibraryWindow>,
    reader: Option<Navigator>,
    message: Option<String>,
}

impl App {
    fn new(
        config: Config,
        layout: ReaderLayout,
        library: Option<LibraryWindow>,
        reader: Option<Navigator>,
    ) -> Self {
        Self {
            config,
            layout,
            library,
            reader,
            message: None,
        }
    }

    fn input_mode(&self) -> InputMode {
        if self.reader.is_some() {
            InputMode::Reader
        } else {
            InputMode::Library
        }
    }

    async fn handle_event(
        &mut self,
        event: UiEvent,
        provider: &dyn ContainerProvider,
    ) -> Result<LoopAction> {
        match event {
            UiEvent::Navigate { intent, count } => {
                let Some(navigator) = self.reader.as_mut() else {
                    return Ok(LoopAction::Continue);
                };
                let mut changed = false;
                for _ in 0..count {
                    if !navigator.apply(intent) {
                        break;
                    }
                    changed = true;
                }
                Ok(if changed {
                    LoopAction::ContinueRedraw
                } else {
                    LoopAction::Continue
                })
            }
            UiEvent::Resize { columns, rows } => {
                self.layout = ReaderLayout::new(columns, rows, self.config.layout());
                if let Some(navigator) = self.reader.as_mut() {
                    navigator.apply(Intent::Resize(self.layout.text));
                }
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::LibraryMoveSelection { delta } => {
                let moved = self
                    .library
                    .as_mut()
                    .is_some_and(|library| library.move_selection(delta));
                Ok(if moved {
                    LoopAction::ContinueRedraw
                } else {
                    LoopAction::Continue
                })
            }
            UiEvent::LibraryOpenSelection => {
                let Some(path) = self
                    .library
                    .as_ref()
                    .and_then(|library| library.selected_book())
                    .map(Path::to_path_buf)
                else {
                    return Ok(LoopAction::Continue);
                };
                match open_book(provider, &path, &self.config, self.layout).await {
                    Ok(navigator) => {
                        self.reader = Some(navigator);
                        self.message = None;
                    }
                    Err(err) => {
                        warn!(path = %path.display(), "failed to open book: {err:#}");
                        self.message = Some(format!("{err:#}"));
                    }
                }
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::Close => {
                if self.library.is_some() {
                    self.reader = None;
                    Ok(LoopAction::ContinueRedraw)
                } else {
                    Ok(LoopAction::Quit)
                }
            }
            UiEvent::Quit => Ok(LoopAction::Quit),
            UiEvent::None => Ok(LoopAction::Continue),
        }
    }

    fn status(&self, pending_input: Option<&str>) -> Option<String> {
        let navigator = self.reader.as_ref()?;
        let title = document_label(navigator);
        Some(format_status(
            Some(&title),
            &navigator.current_page(),
            pending_input,
        ))
    }

    fn redraw(
        &mut self,
        renderer: &mut TextRenderer<Stdout>,
        pending_input: Option<&str>,
    ) -> Result<()> {
        renderer.begin_sync_update()?;
        if let Some(navigator) = &self.reader {
            let status = self.status(pending_input).unwrap_or_default();
            let help = if self.library.is_some() {
                READER_HELP_BACK
            } else {
                READER_HELP_QUIT
            };
            renderer.draw_page(&navigator.current_page(), &self.layout, &status, help)?;
        } else if let Some(library) = self.library.as_mut() {
            library.ensure_visible(self.layout.library_rows());
            renderer.draw_library(
                library.labels(),
                library.selected(),
                library.scroll_offset(),
                &self.layout,
                self.message.as_deref().unwrap_or_default(),
                LIBRARY_HELP,
            )?;
        }
        renderer.end_sync_update()?;
        Ok(())
    }
}

async fn open_book(
    provider: &dyn ContainerProvider,
    path: &Path,
    config: &Config,
    layout: ReaderLayout,
) -> Result<Navigator> {
    let reader = provider
        .open(path)
        .await
        .with_context(|| format!("failed to open {:?}", path))?;
    Navigator::new(reader, layout.text, config.navigator())
}

fn document_label(navigator: &Navigator) -> String {
    let info = navigator.info();
    let name = info.display_name();
    match info.metadata.author.as_deref().filter(|a| !a.trim().is_empty()) {
        Some(author) => format!("{name} by {author}"),
        None => name,
    }
}

fn draw_status_line(
    renderer: &mut TextRenderer<Stdout>,
    layout: &ReaderLayout,
    status: &str,
) -> Result<()> {
    let writer = renderer.writer();
    crossterm::execute!(
        writer,
        cursor::MoveTo(0, layout.status_row),
        Clear(ClearType::CurrentLine)
    )?;
    let start = usize::from(layout.columns).saturating_sub(status.chars().count()) / 2;
    crossterm::execute!(writer, cursor::MoveTo(start as u16, layout.status_row))?;
    write_status_line(writer, status)?;
    Ok(())
}

fn init_logging(project_dirs: &ProjectDirs, fallback_filter: Option<&str>) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {:?}", log_dir))?;

    let file_appender = tracing_appender::rolling::never(log_dir, "termbook.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback_filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
