use crate::core::config::UI_POLL_INTERVAL;
use crate::core::endpoint::Endpoint;
use crate::core::session::RemoteSession;
use crate::core::transfer::controller::{
    PaneSide, SelectedEntry, TransferController, TransferEvent, TransferRequest,
};
use crate::core::transfer::job::Direction;
use crate::ui;
use crate::ui::helpers::formatters::format_file_size;
use crate::utils::log_buffer::LogBuffer;
use crate::utils::sos::SignalOfStop;
use crate::workers::app::{App, DirPane, Mode};
use crate::workers::args::Args;
use anyhow::Context as _;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use tokio::sync::mpsc;

pub async fn run(args: Args, sos: SignalOfStop, log_buffer: LogBuffer) -> anyhow::Result<()> {
    let host = args
        .host
        .clone()
        .context("no host configured (--host or the config file)")?;
    let user = args.user.clone().context("no user configured")?;
    let password = args.password.clone().context("no password configured")?;

    let session =
        RemoteSession::establish(&host, args.port, &user, &password, &args.performance).await?;

    let local_root = match &args.local_root {
        Some(p) => p.to_string_lossy().into_owned(),
        None => std::env::current_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| ".".to_string()),
    };
    let remote_root = match &args.remote_root {
        Some(r) => r.clone(),
        None => session.home_dir().await?,
    };

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<TransferEvent>();
    let controller = TransferController::new(args.performance, event_tx, sos.clone());

    let mut app = App::new(
        DirPane::new(PaneSide::Local, Endpoint::Local, local_root),
        DirPane::new(
            PaneSide::Remote,
            Endpoint::Remote(session.sftp()),
            remote_root,
        ),
        controller,
    );
    app.local.refresh().await?;
    app.remote.refresh().await?;

    let params = session.params();
    app.set_status(format!(
        "Connected to {host}: {} packets, {} requests in flight",
        format_file_size(params.packet_bytes as u64),
        params.inflight
    ));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Drain any queued events
    while event::poll(std::time::Duration::from_millis(0))? {
        let _ = event::read()?;
    }

    loop {
        // Render
        terminal.draw(|f| ui::render(f, &app, &log_buffer))?;

        // Poll crossterm events with 50ms timeout
        if event::poll(UI_POLL_INTERVAL)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if handle_key(&mut app, &log_buffer, key).await {
                break;
            }
        }

        // Drain transfer tick/done messages
        while let Ok(ev) = event_rx.try_recv() {
            let done = matches!(ev, TransferEvent::Done(_));
            if let Some(side) = app.controller.handle_event(ev)
                && let Err(e) = app.pane_mut(side).refresh().await
            {
                app.set_status(format!("Refresh failed: {e:#}"));
            }
            if done {
                match app.controller.view().and_then(|v| v.terminal_error.clone()) {
                    Some(err) => app.set_status(format!("Transfer failed: {err}")),
                    None => app.set_status("Transfer complete"),
                }
            }
        }

        if sos.cancelled() {
            break;
        }
    }

    // Cleanup terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    sos.cancel();
    let _ = session.close().await;

    Ok(())
}

/// Handle keyboard input. Returns true if the app should quit.
async fn handle_key(app: &mut App, log_buffer: &LogBuffer, key: KeyEvent) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    match app.mode {
        Mode::Browse => match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Tab => {
                app.toggle_focus();
            }
            KeyCode::Up => app.focused_mut().select_prev(),
            KeyCode::Down => app.focused_mut().select_next(),
            KeyCode::Enter => {
                if let Err(e) = app.focused_mut().enter().await {
                    app.set_status(format!("{e:#}"));
                }
            }
            KeyCode::Backspace => {
                if let Err(e) = app.focused_mut().ascend().await {
                    app.set_status(format!("{e:#}"));
                }
            }
            KeyCode::Char('p') => start_transfer(app, Direction::Upload).await,
            KeyCode::Char('g') => start_transfer(app, Direction::Download).await,
            KeyCode::Char('L') | KeyCode::Char('l') => {
                app.mode = Mode::Logs;
                app.status.clear();
            }
            _ => {}
        },
        Mode::Logs => match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Esc | KeyCode::Char('L') | KeyCode::Char('l') => {
                app.mode = Mode::Browse;
                app.log_scroll = 0;
                app.status.clear();
            }
            KeyCode::Up => {
                app.log_scroll = app.log_scroll.saturating_sub(1);
            }
            KeyCode::Down => {
                app.log_scroll += 1;
            }
            KeyCode::Char('d') | KeyCode::Char('D') => {
                log_buffer.clear();
                app.log_scroll = 0;
                app.set_status("Logs cleared");
            }
            _ => {}
        },
    }

    false
}

/// Upload moves the local selection into the remote directory, download
/// the other way around. Rejections land in the status line.
async fn start_transfer(app: &mut App, direction: Direction) {
    let (source_side, dest_side) = match direction {
        Direction::Upload => (PaneSide::Local, PaneSide::Remote),
        Direction::Download => (PaneSide::Remote, PaneSide::Local),
    };

    let source_pane = app.pane(source_side);
    let Some(entry) = source_pane.selected_entry() else {
        app.set_status("Nothing selected");
        return;
    };

    let request = TransferRequest {
        direction,
        entry: SelectedEntry {
            name: entry.name.clone(),
            path: source_pane.endpoint.join(&source_pane.path, &entry.name),
            size: entry.size,
            is_dir: entry.is_dir,
        },
        source: source_pane.endpoint.clone(),
        dest: app.pane(dest_side).endpoint.clone(),
        dest_dir: app.pane(dest_side).path.clone(),
        refresh: dest_side,
    };

    let filename = request.entry.name.clone();
    match app.controller.start(request).await {
        Ok(()) => app.set_status(format!("Started {direction}: {filename}")),
        Err(e) => app.set_status(e.to_string()),
    }
}
