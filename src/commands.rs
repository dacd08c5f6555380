//! REPL input parsing

use crate::session::ConversationSummary;

pub const HELP: &str = "\
Type a message and press Enter to send it.
  /new            start a new conversation
  /list           list conversations
  /open <n|id>    switch to a conversation
  /delete <n|id>  delete a conversation
  /copy           copy the last reply to the clipboard
  /theme          toggle light/dark theme
  /help           show this help
  /quit           exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    New,
    List,
    Open(String),
    Delete(String),
    Copy,
    Theme,
    Help,
    Quit,
    Unknown(String),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Some(Command::Send(trimmed.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match (name, arg) {
        ("new", _) => Command::New,
        ("list" | "ls", _) => Command::List,
        ("open", arg) if !arg.is_empty() => Command::Open(arg.to_string()),
        ("delete" | "rm", arg) if !arg.is_empty() => Command::Delete(arg.to_string()),
        ("copy", _) => Command::Copy,
        ("theme", _) => Command::Theme,
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit" | "q", _) => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    };
    Some(command)
}

/// Resolve a `/open` or `/delete` argument: a 1-based position in the
/// listing, or a conversation id.
pub fn resolve_target(arg: &str, conversations: &[ConversationSummary]) -> Option<String> {
    if let Ok(n) = arg.parse::<usize>() {
        if (1..=conversations.len()).contains(&n) {
            return Some(conversations[n - 1].id.clone());
        }
    }
    conversations
        .iter()
        .find(|c| c.id == arg)
        .map(|c| c.id.clone())
}
