use std::fs::{self, File};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use relay_chat::app::App;
use relay_chat::config::{Config, BACKEND_URL_ENV};
use relay_chat::tui::{self, EventHandler, Tui};
use relay_chat::{handler, ui, HttpTransport, Session, SessionEvent};

const DEFAULT_LOG_FILTER: &str = "relay_chat=info";

#[derive(Parser)]
#[command(name = "relay-chat")]
#[command(about = "Chat with a remote inference backend from the terminal")]
#[command(version)]
struct Cli {
    /// Backend base URL (overrides RELAY_CHAT_BACKEND_URL and the config file)
    #[arg(short, long)]
    backend_url: Option<String>,

    /// Send a single prompt, print the reply and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Request timeout in seconds (0 uses the default)
    #[arg(short, long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let one_shot = cli.prompt.is_some();
    init_logging(one_shot);

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable config file");
        Config::default()
    });
    let env_url = std::env::var(BACKEND_URL_ENV).ok();
    let backend_url = config.resolve_backend_url(cli.backend_url.as_deref(), env_url.as_deref());
    let transport = HttpTransport::new(&backend_url, config.request_timeout(cli.timeout))?;
    tracing::info!(backend = %backend_url, "starting");

    match cli.prompt {
        Some(prompt) => run_once(transport, &prompt).await,
        None => run_tui(transport, backend_url).await,
    }
}

/// The TUI owns the terminal, so its logs go to a file. One-shot mode logs
/// to stderr.
fn init_logging(to_stderr: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    if to_stderr {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return;
    }

    let Some(log_dir) = dirs::cache_dir().map(|d| d.join("relay-chat")) else {
        return;
    };
    if fs::create_dir_all(&log_dir).is_err() {
        return;
    }
    if let Ok(file) = File::create(log_dir.join("relay-chat.log")) {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
}

async fn run_once(transport: HttpTransport, prompt: &str) -> Result<()> {
    let (mut session, mut events) = Session::new(transport);
    let id = session
        .submit(prompt)
        .ok_or_else(|| anyhow!("prompt is empty"))?;

    while let Some(event) = events.recv().await {
        let ours = matches!(&event, SessionEvent::Settled { id: settled, .. } if *settled == id);
        if let Some(reply) = session.apply(event) {
            if ours {
                println!("{}", reply.text);
                return Ok(());
            }
        }
    }
    Err(anyhow!("session closed before the reply arrived"))
}

async fn run_tui(transport: HttpTransport, backend_url: String) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let (session, session_events) = Session::new(transport);
    let mut app = App::new(session, backend_url);
    let mut events = EventHandler::new(session_events);

    let result = event_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn event_loop(
    terminal: &mut Tui,
    app: &mut App<HttpTransport>,
    events: &mut EventHandler,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}
