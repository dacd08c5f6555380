//! Gemini Chat - terminal chat client for Google Gemini
//!
//! Keeps conversations in a local SQLite key-value store and runs one
//! completion request at a time.

mod clipboard;
mod commands;
mod config;
mod db;
mod llm;
mod render;
mod session;
mod state_machine;
mod storage;
mod store;

use commands::{resolve_target, Command, HELP};
use config::ChatConfig;
use crossterm::tty::IsTty;
use db::Database;
use llm::{GeminiService, LlmService, LoggingService};
use render::{render_conversation_list, Renderer, Theme};
use session::{ChatSession, SendOutcome, SendTasks};
use state_machine::TransitionError;
use std::sync::Arc;
use store::{ConversationStore, StoreError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they don't interleave with the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gemini_chat=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ChatConfig::from_env();

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Arc::new(Database::open(&config.db_path)?);

    let api_key = config.api_key.clone().unwrap_or_else(|| {
        tracing::warn!("GEMINI_API_KEY is not set; requests will be rejected by the API");
        String::new()
    });
    let gemini = GeminiService::new(
        api_key,
        &config.model,
        &config.api_base,
        config.request_timeout,
    )?;
    tracing::info!(model = %gemini.model_id(), endpoint = %gemini.endpoint(), "Gemini client ready");
    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(gemini)));

    let store = ConversationStore::open(db.clone());
    let session = Arc::new(ChatSession::new(store, llm));

    // Escape sequences only when a terminal is listening
    let styled = std::io::stdout().is_tty();
    let (theme_tx, theme_rx) = watch::channel(Theme::load(db.as_ref()));
    let renderer = tokio::spawn(Renderer::new(styled).run(session.subscribe(), theme_rx));
    session.restore();
    println!("Type /help for commands.");

    let mut sends = SendTasks::default();
    match repl(&session, &db, &theme_tx, styled, &mut sends).await? {
        Exit::EndOfInput => sends.finish().await,
        Exit::Quit => {
            if session.is_busy() {
                tracing::info!("Quitting with a reply still pending");
            }
            sends.abort().await;
        }
    }

    // Dropping the last session handle closes the event stream, so the
    // renderer prints what is left and stops
    drop(session);
    if let Err(e) = renderer.await {
        tracing::warn!(error = %e, "Renderer task failed");
    }
    Ok(())
}

/// Why the REPL stopped reading
enum Exit {
    /// stdin closed; outstanding replies are still wanted
    EndOfInput,
    Quit,
}

/// Read commands from stdin until EOF or `/quit`
async fn repl(
    session: &Arc<ChatSession>,
    db: &Database,
    theme_tx: &watch::Sender<Theme>,
    styled: bool,
    sends: &mut SendTasks,
) -> std::io::Result<Exit> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = commands::parse(&line) else {
            continue;
        };
        match command {
            Command::Send(text) => {
                if session.rate_limit_banner_active() {
                    println!("Still rate limited; the request may be rejected again.");
                }
                let session = Arc::clone(session);
                sends.spawn(async move {
                    match session.send(&text).await {
                        SendOutcome::Settled { conversation_id } => {
                            tracing::debug!(conv_id = %conversation_id, "Reply settled");
                        }
                        // The line is already consumed, so tell the user it went nowhere
                        SendOutcome::Ignored(TransitionError::Busy) => {
                            println!("Still waiting for the previous reply; message not sent.");
                        }
                        SendOutcome::Ignored(_) => {}
                    }
                });
            }
            Command::New => {
                session.new_conversation();
            }
            Command::List => {
                let palette = theme_tx.borrow().palette();
                print!(
                    "{}",
                    render_conversation_list(&session.conversations(), styled.then_some(&palette))
                );
            }
            Command::Open(arg) => match resolve_target(&arg, &session.conversations()) {
                Some(id) => {
                    session.select_conversation(&id);
                }
                None => println!("No conversation matches '{arg}'. Try /list."),
            },
            Command::Delete(arg) => match resolve_target(&arg, &session.conversations()) {
                Some(id) => match session.delete_conversation(&id) {
                    // Announced through an alert
                    Ok(()) | Err(StoreError::LastConversation) => {}
                    Err(e) => println!("{e}"),
                },
                None => println!("No conversation matches '{arg}'. Try /list."),
            },
            Command::Copy => match session.last_reply() {
                Some(reply) => match clipboard::copy(&reply).await {
                    Ok(_) => println!("Copied the last reply to the clipboard."),
                    Err(e) => println!("Could not copy: {e}"),
                },
                None => println!("Nothing to copy yet."),
            },
            Command::Theme => {
                let theme = theme_tx.borrow().toggled();
                if let Err(e) = theme.save(db) {
                    tracing::warn!(error = %e, "Failed to save theme preference");
                }
                theme_tx.send_replace(theme);
                // Redraw in the new colors
                let conversation = session.active_conversation();
                session.select_conversation(&conversation.id);
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(Exit::Quit),
            Command::Unknown(input) => println!("Unknown command: {input}. Type /help."),
        }
    }
    Ok(Exit::EndOfInput)
}
