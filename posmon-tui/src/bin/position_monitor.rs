/// OKX Position Monitor
///
/// Streams positions & balances from OKX and renders them as cards. Without valid API
/// credentials the client runs a demo book repriced by live public tickers.
use std::{
    error::Error,
    fs::File,
    io,
    sync::Mutex,
    time::Duration,
};

use chrono::{Local, Utc};
use crossterm::{
    event::{self, DisableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use posmon_data::{ClientConfig, ClientReceivers, Credentials, MarketClient, Position};
use posmon_tui::{
    Action, MonitorState, MonitorStatus, Scroll, Theme, action_for,
    shared::theme::{
        CARD_HEIGHT, CARD_SLOT, CARD_WIDTH, cards_per_row, format_price, format_signed,
    },
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Names the file receiving `tracing` output. Logging stays off when unset.
const ENV_LOG_FILE: &str = "POSMON_LOG_FILE";

/// Starts with the diagnostic pane enabled when set to anything but `0` or `false`.
const ENV_DEBUG: &str = "POSMON_DEBUG";

const TICK_RATE: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Required by tokio-tungstenite for wss:// endpoints
    let _ = rustls::crypto::ring::default_provider().install_default();

    init_logging()?;
    let debug = debug_requested();

    let config = ClientConfig::from_env()?;
    let (client, receivers) = MarketClient::new(config, Credentials::from_env());
    let exit_rx = spawn_client(client);

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, receivers, exit_rx, MonitorState::new(debug)).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

/// Install a file subscriber when [`ENV_LOG_FILE`] is set, so that log lines never reach
/// the alternate screen.
fn init_logging() -> Result<(), Box<dyn Error>> {
    let Some(path) = std::env::var_os(ENV_LOG_FILE) else {
        return Ok(());
    };

    let file = File::create(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();

    Ok(())
}

fn debug_requested() -> bool {
    let flag = std::env::args()
        .skip(1)
        .any(|arg| arg == "-d" || arg == "--debug");

    let env = std::env::var(ENV_DEBUG)
        .map(|value| !matches!(value.trim(), "" | "0" | "false"))
        .unwrap_or(false);

    flag || env
}

/// Run the client on the runtime, reporting how it ended on the returned channel.
fn spawn_client(mut client: MarketClient) -> mpsc::Receiver<String> {
    let (exit_tx, exit_rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let outcome = match client.connect().await {
            Ok(()) => client.start_listening().await,
            Err(error) => Err(error),
        };

        if let Err(error) = outcome {
            error!(%error, "market client stopped");
            let _ = exit_tx.send(error.to_string()).await;
        } else {
            info!("market client stopped");
        }
    });

    exit_rx
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut receivers: ClientReceivers,
    mut exit_rx: mpsc::Receiver<String>,
    mut state: MonitorState,
) -> Result<(), Box<dyn Error>> {
    let theme = Theme::default();
    let mut scroll = Scroll::default();

    loop {
        drain(&mut receivers, &mut exit_rx, &mut state);

        terminal.draw(|f| render_ui(f, &state, &mut scroll, &theme))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                match action_for(key) {
                    Some(Action::Quit) => break,
                    Some(Action::ToggleDebug) => state.toggle_debug(),
                    Some(action) => scroll.apply(action),
                    None => {}
                }
            }
        }

        // Yield so the feed tasks make progress between frames
        tokio::task::yield_now().await;
    }

    Ok(())
}

/// Apply everything currently queued without waiting for more.
fn drain(
    receivers: &mut ClientReceivers,
    exit_rx: &mut mpsc::Receiver<String>,
    state: &mut MonitorState,
) {
    while let Ok(update) = receivers.positions.try_recv() {
        state.apply_position(update, Utc::now());
    }
    while let Ok(balance) = receivers.balances.try_recv() {
        state.apply_balance(balance, Utc::now());
    }
    while let Ok(fault) = receivers.faults.try_recv() {
        state.apply_fault(&fault, Utc::now());
    }
    while let Ok(fault) = exit_rx.try_recv() {
        state.apply_fault(&fault, Utc::now());
    }
}

fn render_ui(f: &mut Frame, state: &MonitorState, scroll: &mut Scroll, theme: &Theme) {
    let mut constraints = vec![Constraint::Length(4), Constraint::Min(CARD_HEIGHT)];
    if state.debug_enabled() {
        constraints.push(Constraint::Length(posmon_tui::MAX_DEBUG_MESSAGES as u16 + 2));
    }
    if state.error().is_some() {
        constraints.push(Constraint::Length(1));
    }
    constraints.push(Constraint::Length(1));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(f.area());

    render_header(f, state, theme, chunks[0]);
    render_positions(f, state, scroll, theme, chunks[1]);

    let mut next = 2;
    if state.debug_enabled() {
        render_debug(f, state, theme, chunks[next]);
        next += 1;
    }
    if let Some(message) = state.error() {
        let line = Line::from(Span::styled(format!("Error: {message}"), theme.error));
        f.render_widget(Paragraph::new(line), chunks[next]);
        next += 1;
    }
    render_footer(f, state, scroll, theme, chunks[next]);
}

fn render_header(f: &mut Frame, state: &MonitorState, theme: &Theme, area: Rect) {
    let balance = match state.display_currency() {
        Some(currency) => Span::styled(
            format!("{:.2} {currency}", state.total_equity()),
            theme.trend_style(state.balance_trend()),
        ),
        None => Span::styled("--", theme.muted),
    };

    let last_update = state
        .last_update()
        .map(|time| time.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());

    let lines = vec![
        Line::from(Span::styled("OKX Position Monitor", theme.title)),
        Line::from(vec![Span::styled("Total Balance: ", theme.label), balance]),
        Line::from(vec![
            Span::styled("Time: ", theme.label),
            Span::styled(Local::now().format("%H:%M:%S").to_string(), theme.value),
            Span::styled("  Last update: ", theme.label),
            Span::styled(last_update, theme.value),
        ]),
    ];

    f.render_widget(Paragraph::new(lines), area);
}

fn render_positions(
    f: &mut Frame,
    state: &MonitorState,
    scroll: &mut Scroll,
    theme: &Theme,
    area: Rect,
) {
    let message = match state.status() {
        MonitorStatus::Initializing => Some("Initializing..."),
        MonitorStatus::NoPositions => Some("Connected - No Positions"),
        MonitorStatus::Tracking(_) => None,
    };
    if let Some(message) = message {
        scroll.set_max(0);
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(message, theme.warning))),
            area,
        );
        return;
    }

    let per_row = usize::from(cards_per_row(area.width));
    let positions = state.positions().collect::<Vec<_>>();
    let total_rows = positions.len().div_ceil(per_row);
    let visible_rows = usize::from((area.height / CARD_HEIGHT).max(1));
    scroll.set_max(total_rows.saturating_sub(visible_rows));

    let rows = positions
        .chunks(per_row)
        .skip(scroll.offset())
        .take(visible_rows);

    for (row, cards) in rows.enumerate() {
        let y = area.y + row as u16 * CARD_HEIGHT;
        for (column, position) in cards.iter().enumerate() {
            let x = area.x + column as u16 * CARD_SLOT;
            if x >= area.right() || y >= area.bottom() {
                continue;
            }
            let card = Rect::new(
                x,
                y,
                CARD_WIDTH.min(area.right() - x),
                CARD_HEIGHT.min(area.bottom() - y),
            );
            render_card(f, position, theme, card);
        }
    }
}

fn render_card(f: &mut Frame, position: &Position, theme: &Theme, area: Rect) {
    let block = Block::default()
        .title(Span::styled(
            format!(" ▶ {} ◀ ", position.instrument_id),
            theme.instrument,
        ))
        .borders(Borders::ALL)
        .border_style(theme.card_border);

    let pnl_style = theme.pnl_style(position.unrealized_pnl);
    let field = |label: &'static str, value: String, style| {
        Line::from(vec![
            Span::styled(format!("{label:<9}"), theme.label),
            Span::styled(value, style),
        ])
    };

    let lines = vec![
        field(
            "Side:",
            position.side.as_str().to_uppercase(),
            theme.side_style(position.side.is_long()),
        ),
        field("Size:", format!("{:.4}", position.size), theme.value),
        field("Entry:", format_price(position.average_price), theme.value),
        field("Current:", format_price(position.current_price), theme.value),
        field("PnL:", format_signed(position.unrealized_pnl, 2), pnl_style),
        field(
            "PnL %:",
            format!("{}%", format_signed(position.unrealized_pnl_ratio, 2)),
            pnl_style,
        ),
        field("Leverage:", format!("{:.0}x", position.leverage), theme.value),
    ];

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_debug(f: &mut Frame, state: &MonitorState, theme: &Theme, area: Rect) {
    let block = Block::default()
        .title(" Debug Output ")
        .borders(Borders::ALL)
        .border_style(theme.debug_border);

    let lines = state
        .debug_messages()
        .map(|message| Line::from(Span::styled(message.to_string(), theme.muted)))
        .collect::<Vec<_>>();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_footer(f: &mut Frame, state: &MonitorState, scroll: &Scroll, theme: &Theme, area: Rect) {
    let mut help = String::from(
        "Press q or Ctrl+C to quit | d to toggle debug | ↑↓ or j/k to scroll | PgUp/PgDn | Home/End",
    );
    if scroll.max() > 0 {
        help.push_str(&format!(" | Scroll: {}/{}", scroll.offset(), scroll.max()));
    }
    help.push_str(if state.debug_enabled() {
        " | Debug: ON"
    } else {
        " | Debug: OFF"
    });

    f.render_widget(Paragraph::new(Line::from(Span::styled(help, theme.muted))), area);
}
