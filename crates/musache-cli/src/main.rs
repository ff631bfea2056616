//! musache - chat with a document from the terminal

mod commands;
mod config;
mod utils;

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use musache_api::{ApiClient, DocumentFile, HistoryEntry};
use musache_session::{
    ConnectionState, HealthMonitor, Session, SessionEvent, SystemClock, Turn, UploadState,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::{StreamExt, wrappers::LinesStream};
use tracing_subscriber::EnvFilter;

/// Server history entries shown when interactive mode starts
const STARTUP_HISTORY_LIMIT: u32 = 5;

/// musache - ask questions about a document
#[derive(Parser, Debug)]
#[command(name = "musache")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// API root (default: https://rag-musache.onrender.com/api/v1)
    #[arg(long)]
    base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Upload this document (.pdf or .txt, max 10 MB) before asking anything
    #[arg(short, long)]
    upload: Option<PathBuf>,

    /// Ask a single question and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Print server-side question history and exit
    #[arg(long)]
    history: bool,

    /// Print server status and exit
    #[arg(long)]
    status: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose || std::env::var_os("RUST_LOG").is_some() {
        let filter = if args.verbose {
            EnvFilter::new("musache=debug,musache_api=debug,musache_session=debug")
        } else {
            EnvFilter::from_default_env()
        };
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();

    // Merge config with CLI args (CLI takes precedence)
    let base_url = args
        .base_url
        .or(cfg.base_url.clone())
        .unwrap_or_else(|| musache_api::DEFAULT_BASE_URL.to_string());
    let timeout = args
        .timeout_secs
        .or(cfg.timeout_secs)
        .map(Duration::from_secs)
        .unwrap_or(musache_api::DEFAULT_TIMEOUT);

    let client = ApiClient::new(base_url.as_str())?.with_timeout(timeout);
    tracing::debug!(base_url = client.base_url(), ?timeout, "client configured");

    let session = Session::new(
        Arc::new(client),
        Arc::new(SystemClock),
        cfg.session_config(),
    );

    if args.status {
        return print_status(&session).await;
    }

    if args.history {
        return print_history(&session, cfg.history_limit()).await;
    }

    let printer = spawn_event_printer(session.subscribe());

    if let Some(ref path) = args.upload {
        if let Err(e) = upload(&session, path).await {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    // Non-interactive mode
    if let Some(question) = args.command {
        let result = ask(&session, &question).await;
        printer.abort();
        return result;
    }

    run_interactive(session, printer, &base_url, &cfg).await
}

/// Print progress events to stderr while operations run
fn spawn_event_printer(mut receiver: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
    let is_tty = io::stderr().is_terminal();
    tokio::spawn(async move {
        let mut last_connection = None;
        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event printer lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match event {
                SessionEvent::UploadProgress { percent } => {
                    if is_tty {
                        eprint!("\rUploading... {:>3.0}%", percent);
                        if percent >= 100.0 {
                            eprintln!();
                        }
                    }
                }
                SessionEvent::ReadinessCheck {
                    attempt,
                    max_attempts,
                    state,
                } => {
                    let state = state.map(|s| s.as_str()).unwrap_or("unreachable");
                    eprintln!(
                        "Processing document... ({}, check {}/{})",
                        state, attempt, max_attempts
                    );
                }
                SessionEvent::DocumentReady {
                    file_name,
                    total_chunks,
                } => {
                    eprintln!(
                        "Document ready: {} ({} chunks). Ask away!",
                        file_name, total_chunks
                    );
                }
                SessionEvent::SystemStatus { connection, .. } => {
                    if last_connection.is_some_and(|last| last != connection) {
                        eprintln!("[connection: {}]", connection_label(connection));
                    }
                    last_connection = Some(connection);
                }
                // Errors are reported by the caller that received them
                SessionEvent::Error { origin, message } => {
                    tracing::debug!(?origin, %message, "session error");
                }
                SessionEvent::UploadStateChanged { .. }
                | SessionEvent::QuestionSent { .. }
                | SessionEvent::AnswerReceived { .. }
                | SessionEvent::TranscriptCleared => {}
            }
        }
    })
}

fn connection_label(connection: ConnectionState) -> &'static str {
    match connection {
        ConnectionState::Ready => "ready",
        ConnectionState::Connected => "connected, no document",
        ConnectionState::Error => "offline",
    }
}

/// A session that can take the next upload. A session whose document is
/// already ready is replaced by a fresh one; the flag reports the swap.
fn session_for_upload(session: Session) -> (Session, bool) {
    if session.upload().state() == UploadState::Ready {
        (session.fresh(), true)
    } else {
        (session, false)
    }
}

async fn upload(session: &Session, path: &Path) -> anyhow::Result<()> {
    let file = DocumentFile::from_path(path)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
    eprintln!(
        "Uploading {} ({})",
        file.name,
        musache_api::format_file_size(file.size())
    );
    session.upload().submit(file).await?;
    Ok(())
}

async fn ask(session: &Session, question: &str) -> anyhow::Result<()> {
    let turn = session.conversation().send(question).await?;
    print_turn(&turn);
    Ok(())
}

fn print_turn(turn: &Turn) {
    println!("{}", turn.answer);
    println!(
        "\n[{:.2}s, {} context chunk{}]",
        turn.response_time_seconds,
        turn.context_chunks.len(),
        if turn.context_chunks.len() == 1 { "" } else { "s" }
    );
}

async fn print_status(session: &Session) -> anyhow::Result<()> {
    let snapshot = session.check_system().await?;
    println!(
        "Server: {}\nDocument chunks: {}",
        connection_label(snapshot.connection),
        snapshot.status.total_chunks
    );
    Ok(())
}

async fn print_health(session: &Session) -> anyhow::Result<()> {
    let snapshot = session.check_system().await?;
    println!("{}", serde_json::to_string_pretty(&snapshot.health)?);
    Ok(())
}

async fn print_history(session: &Session, limit: u32) -> anyhow::Result<()> {
    let entries = session.conversation().history(limit).await?;
    println!("{}", format_history(&entries));
    Ok(())
}

/// Earlier exchanges framed as the start of a new session, or `None` when
/// there is nothing to show
fn format_startup_history(entries: &[HistoryEntry]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    Some(format!(
        "--- Previous conversations ---\n{}\n--- New session ---",
        format_history(entries)
    ))
}

/// The last few server-side exchanges, ready to print when interactive mode starts
async fn startup_history(session: &Session) -> Option<String> {
    match session.conversation().history(STARTUP_HISTORY_LIMIT).await {
        Ok(entries) => format_startup_history(&entries),
        // Often just a sleeping server
        Err(e) => {
            tracing::debug!(error = %e, "could not load history");
            None
        }
    }
}

/// Server history arrives most recent first; show it oldest first
fn format_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No previous questions.".to_string();
    }

    let mut output = String::from("Previous questions:\n");
    for entry in entries.iter().rev() {
        let when = entry.timestamp.as_deref().unwrap_or("");
        output.push_str(&format!(
            "\n{}Q: {}\nA: {}\n",
            if when.is_empty() { String::new() } else { format!("[{}] ", when) },
            entry.question,
            utils::truncate_chars(&entry.answer, 300)
        ));
    }
    output
}

async fn run_interactive(
    mut session: Session,
    mut printer: JoinHandle<()>,
    base_url: &str,
    cfg: &config::Config,
) -> anyhow::Result<()> {
    let history_limit = cfg.history_limit();

    if io::stderr().is_terminal() {
        eprintln!("musache ({})", base_url);
        match session.check_system().await {
            Ok(snapshot) => eprintln!("Server {}.", connection_label(snapshot.connection)),
            Err(e) => eprintln!("Server unreachable ({}). It may be waking up.", e),
        }
        if session.upload().document().is_none() {
            eprintln!("Upload a document with /upload <path>. Type /help for commands.");
        }
        eprintln!();
    }

    if let Some(text) = startup_history(&session).await {
        println!("{}\n", text);
    }

    let mut monitor: HealthMonitor = session.start_health_monitor();

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next().await else {
            // EOF
            break;
        };
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        // Handle slash commands
        if let Some(result) =
            commands::execute_command(input, session.conversation(), history_limit)
        {
            let outcome: anyhow::Result<()> = match result {
                commands::CommandResult::Exit => break,
                commands::CommandResult::Message(msg) => {
                    println!("{}", msg);
                    Ok(())
                }
                commands::CommandResult::Clear => {
                    session.conversation().reset();
                    println!("Cleared conversation.");
                    Ok(())
                }
                commands::CommandResult::Upload(path) => {
                    let (next, replaced) = session_for_upload(session);
                    session = next;
                    if replaced {
                        // The old bus is gone with the old session
                        printer.abort();
                        printer = spawn_event_printer(session.subscribe());
                        monitor = session.start_health_monitor();
                        println!("Starting a new session for the next document.");
                    }
                    upload(&session, &path).await
                }
                commands::CommandResult::Status => print_status(&session).await,
                commands::CommandResult::Health => print_health(&session).await,
                commands::CommandResult::History(limit) => print_history(&session, limit).await,
                commands::CommandResult::Debug => match session.debug_info().await {
                    Ok(info) => serde_json::to_string_pretty(&info)
                        .map(|s| println!("{}", s))
                        .map_err(Into::into),
                    Err(e) => Err(e.into()),
                },
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                    Ok(())
                }
            };
            if let Err(e) = outcome {
                eprintln!("Error: {}", e);
            }
            println!();
            continue;
        }

        if session.upload().document().is_none() {
            eprintln!("Note: no document uploaded in this session yet.");
        }

        println!();
        if let Err(e) = ask(&session, input).await {
            eprintln!("Error: {}", e);
        }
        println!();
    }

    monitor.stop();
    printer.abort();
    Ok(())
}
