mod app;
mod config;
mod diff;
mod document;
mod load;
mod logging;
mod nav;
mod server;
mod session;
mod ui;

use anyhow::{Context, Result};
use app::{App, AppContext, DiffPage, Focus};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use diff::{load_comment_blocks, parse_patch, CommentBlock, DiffFile};
use load::{LoadEvent, LoadWorker, RetryPolicy};
use ratatui::prelude::*;
use server::{FragmentEndpoint, HttpFragmentSource};
use session::{ConfigSession, SessionStore};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Terminal viewer for review-request diffs
#[derive(Parser)]
#[command(name = "rbd", version, about)]
struct Cli {
    /// View a local unified diff instead of a server diff
    #[arg(long, conflicts_with_all = ["server", "review_request"])]
    patch: Option<PathBuf>,

    /// Review server base URL (overrides server.url)
    #[arg(long)]
    server: Option<String>,

    /// Review request id
    #[arg(long)]
    review_request: Option<u64>,

    /// Diff revision to show
    #[arg(long, default_value_t = 1)]
    revision: u32,

    /// Show the interdiff between --revision and this revision
    #[arg(long)]
    interdiff: Option<u32>,

    /// JSON file of comment blocks keyed by filediff id
    #[arg(long)]
    comments: Option<PathBuf>,

    /// Anchor to jump to once it loads (file index, chunk like 2.3, or fileNlineM)
    #[arg(long)]
    anchor: Option<String>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level) {
        eprintln!("warning: logging disabled: {:#}", e);
    }

    let cwd = std::env::current_dir().context("Cannot read current directory")?;
    let config = config::load_config(&cwd);
    let comments = match &cli.comments {
        Some(path) => load_comment_blocks(path)?,
        None => HashMap::new(),
    };

    let session: Arc<dyn SessionStore> = Arc::new(ConfigSession::new(config::global_config_path()));
    let ctx = AppContext {
        config: config.clone(),
        session,
    };

    let (events_tx, events_rx) = mpsc::channel::<LoadEvent>();
    let (mut page, title) = build_page(&cli, &ctx, comments, events_tx)?;
    page.set_start_anchor(cli.anchor.clone());
    page.init();

    let mut app = App::new(page, config, title);

    // Load syntax highlighting (once, reused for all files)
    let mut highlighter = ui::highlight::Highlighter::new();

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app, &mut highlighter, events_rx);

    // Cleanup
    app.page.dispose();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        log::error!("event loop failed: {:?}", err);
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

/// Build the page from a local patch or from the review server's file list
fn build_page(
    cli: &Cli,
    ctx: &AppContext,
    comments: HashMap<u64, Vec<CommentBlock>>,
    events: mpsc::Sender<LoadEvent>,
) -> Result<(DiffPage, String)> {
    if let Some(path) = &cli.patch {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let patches = parse_patch(&raw);
        if patches.is_empty() {
            anyhow::bail!("No file diffs found in {}", path.display());
        }
        let files = DiffFile::from_local_patches(&patches);
        let mut page = DiffPage::new(ctx, files, comments, None);
        for (container, patch) in patches.iter().enumerate() {
            page.prerender(container, patch);
        }
        return Ok((page, path.display().to_string()));
    }

    let server_url = cli
        .server
        .clone()
        .or_else(|| ctx.config.server.url.clone())
        .context("No review server: pass --server, set server.url, or open a local --patch")?;
    let review_request = cli
        .review_request
        .context("--review-request is required when viewing a server diff")?;

    let client = server::build_client(&ctx.config.server)?;
    let files = server::list_files(&client, &server_url, review_request, cli.revision, cli.interdiff)?;
    log::info!("review request {} has {} files", review_request, files.len());

    let mut endpoint = FragmentEndpoint::new(&server_url, review_request);
    endpoint.context_lines = ctx.config.display.context_lines;
    endpoint.show_deleted = ctx.config.display.show_deleted;
    endpoint.serial = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();

    let policy = RetryPolicy {
        retries: ctx.config.server.fetch_retries,
        ..RetryPolicy::default()
    };
    let source = Arc::new(HttpFragmentSource::new(client, endpoint));
    let worker = LoadWorker::spawn(source, policy, events);

    let title = match cli.interdiff {
        Some(interdiff) => format!("r/{} · diff {}-{}", review_request, cli.revision, interdiff),
        None => format!("r/{} · diff {}", review_request, cli.revision),
    };
    Ok((DiffPage::new(ctx, files, comments, Some(worker)), title))
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    hl: &mut ui::highlight::Highlighter,
    events: mpsc::Receiver<LoadEvent>,
) -> Result<()> {
    loop {
        let size = terminal.size()?;
        app.diff_height = ui::diff_height(app, size.width, size.height);

        // Draw
        terminal.draw(|f| ui::draw(f, app, hl))?;

        // Poll for keys with a timeout so load results keep flowing
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key);
                }
            }
        }

        // Apply finished loads (non-blocking); each one advances the queue
        while let Ok(load_event) = events.try_recv() {
            app.page.handle_event(load_event);
        }

        // Tick: page notices and notification auto-clear
        app.tick();

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if app.show_help {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.show_help = false;
        }
        return;
    }

    // ── Global keys ──
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('q') => app.quit(),
            KeyCode::Char('r') => app.reload(),
            KeyCode::Char('u') => app.half_page_up(),
            KeyCode::Char('d') => app.half_page_down(),
            _ => {}
        }
        return;
    }

    match app.focus {
        Focus::Index => handle_index_key(app, key),
        Focus::Diff => handle_diff_key(app, key),
    }
}

fn handle_index_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.index_next(),
        KeyCode::Char('k') | KeyCode::Up => app.index_prev(),
        KeyCode::Enter => app.index_jump(),
        KeyCode::Tab | KeyCode::Esc => app.toggle_index_focus(),
        KeyCode::Char('q') => app.quit(),
        _ => {}
    }
}

fn handle_diff_key(app: &mut App, key: KeyEvent) {
    match key.code {
        // Anchor navigation
        KeyCode::Char('a' | 'A' | 'K' | 'P' | '<' | 'm') => app.navigate(DiffPage::select_previous_file),
        KeyCode::Char('f' | 'F' | 'J' | 'N' | '>' | '/') => app.navigate(DiffPage::select_next_file),
        KeyCode::Char('s' | 'S' | 'k' | 'p' | ',') => app.navigate(DiffPage::select_previous_diff),
        KeyCode::Char('d' | 'D' | 'j' | 'n' | '.') => app.navigate(DiffPage::select_next_diff),
        KeyCode::Char('[' | 'x') => app.navigate(DiffPage::select_previous_comment),
        KeyCode::Char(']' | 'c') => app.navigate(DiffPage::select_next_comment),
        KeyCode::Char('r') => app.navigate(DiffPage::recenter_selected),

        // Display
        KeyCode::Char('e') => app.expand_in_view(),
        KeyCode::Char('w') => app.toggle_whitespace_only_chunks(),
        KeyCode::Char('W') => app.toggle_extra_whitespace(),

        // Loading
        KeyCode::Char('R') => app.retry_failed(),

        // Scrolling
        KeyCode::Down => app.page.scroll_down(1),
        KeyCode::Up => app.page.scroll_up(1),
        KeyCode::PageDown => app.page_down(),
        KeyCode::PageUp => app.page_up(),
        KeyCode::Home => app.page.scroll_to_top(),
        KeyCode::End => {
            let height = app.diff_height;
            app.page.scroll_to_bottom(height);
        }

        KeyCode::Tab => app.toggle_index_focus(),
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Char('q') => app.quit(),
        _ => {}
    }
}
