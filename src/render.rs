//! Terminal rendering
//!
//! Subscribes to session notifications and prints them. Assistant replies
//! are markdown and get rendered to ANSI-styled text; user input is shown
//! verbatim.

use crate::session::{Alert, AlertKind, ChatEvent, ConversationSummary};
use crate::storage::{KeyValueStore, StorageResult};
use crate::store::{Conversation, Message, Role, ERROR_REPLY_PREFIX};
use crossterm::cursor::MoveTo;
use crossterm::style::{style, Color, Stylize};
use crossterm::terminal::{Clear, ClearType, SetTitle};
use pulldown_cmark::{Event as MdEvent, Parser, Tag, TagEnd};
use std::io::{self, Write};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

pub const THEME_KEY: &str = "theme";
pub const APP_NAME: &str = "Gemini Chat";
pub const THINKING: &str = "Thinking...";
const EMPTY_STATE_TITLE: &str = "Gemini Assistant";
const EMPTY_STATE_BODY: &str = "Ask me anything!";
const RULE: &str = "────────────────────";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    /// Stored preference, dark when absent or unreadable
    pub fn load(storage: &dyn KeyValueStore) -> Self {
        match storage.get(THEME_KEY) {
            Ok(Some(value)) => Self::parse(&value).unwrap_or_else(|| {
                tracing::warn!(%value, "Ignoring unknown theme preference");
                Self::default()
            }),
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read theme preference");
                Self::default()
            }
        }
    }

    pub fn save(self, storage: &dyn KeyValueStore) -> StorageResult<()> {
        storage.set(THEME_KEY, self.as_str())
    }

    pub fn palette(self) -> Palette {
        match self {
            Theme::Dark => Palette {
                user: Color::Cyan,
                assistant: Color::Green,
                heading: Color::Magenta,
                code: Color::Yellow,
                muted: Color::DarkGrey,
                warning: Color::Yellow,
                error: Color::Red,
            },
            Theme::Light => Palette {
                user: Color::Blue,
                assistant: Color::DarkGreen,
                heading: Color::DarkMagenta,
                code: Color::DarkRed,
                muted: Color::Grey,
                warning: Color::DarkYellow,
                error: Color::DarkRed,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub user: Color,
    pub assistant: Color,
    pub heading: Color,
    pub code: Color,
    pub muted: Color,
    pub warning: Color,
    pub error: Color,
}

#[derive(Debug, Clone, Copy, Default)]
struct Style {
    color: Option<Color>,
    bold: bool,
    italic: bool,
}

impl Style {
    fn color(color: Option<Color>) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }
}

/// Apply `look` to `text`; plain passthrough without a palette.
fn paint(text: &str, look: Style, palette: Option<&Palette>) -> String {
    if palette.is_none() {
        return text.to_string();
    }
    let mut content = style(text);
    if let Some(color) = look.color {
        content = content.with(color);
    }
    if look.bold {
        content = content.bold();
    }
    if look.italic {
        content = content.italic();
    }
    content.to_string()
}

fn end_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Render markdown to terminal text. Without a palette the output carries
/// no escape sequences.
pub fn render_markdown(input: &str, palette: Option<&Palette>) -> String {
    let mut out = String::new();
    let mut strong = 0usize;
    let mut emphasis = 0usize;
    let mut heading = false;
    let mut code_block = false;
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut links: Vec<String> = Vec::new();
    let code = Style::color(palette.map(|p| p.code));
    let muted = Style::color(palette.map(|p| p.muted));

    for event in Parser::new(input) {
        match event {
            MdEvent::Start(tag) => match tag {
                Tag::Heading { .. } => heading = true,
                Tag::Strong => strong += 1,
                Tag::Emphasis => emphasis += 1,
                Tag::CodeBlock(_) => {
                    end_line(&mut out);
                    code_block = true;
                }
                Tag::List(start) => {
                    end_line(&mut out);
                    lists.push(start);
                }
                Tag::Item => {
                    out.push_str(&"  ".repeat(lists.len().saturating_sub(1)));
                    match lists.last_mut() {
                        Some(Some(n)) => {
                            out.push_str(&format!("{n}. "));
                            *n += 1;
                        }
                        _ => out.push_str("• "),
                    }
                }
                Tag::Link { dest_url, .. } => links.push(dest_url.into_string()),
                _ => {}
            },
            MdEvent::End(tag) => match tag {
                TagEnd::Heading(_) => {
                    heading = false;
                    out.push_str("\n\n");
                }
                TagEnd::Paragraph => out.push_str(if lists.is_empty() { "\n\n" } else { "\n" }),
                TagEnd::Strong => strong = strong.saturating_sub(1),
                TagEnd::Emphasis => emphasis = emphasis.saturating_sub(1),
                TagEnd::CodeBlock => {
                    code_block = false;
                    out.push('\n');
                }
                TagEnd::Item => end_line(&mut out),
                TagEnd::List(_) => {
                    lists.pop();
                    if lists.is_empty() {
                        out.push('\n');
                    }
                }
                TagEnd::Link => {
                    if let Some(url) = links.pop() {
                        out.push_str(&paint(&format!(" ({url})"), muted, palette));
                    }
                }
                _ => {}
            },
            MdEvent::Text(text) if code_block => {
                for line in text.lines() {
                    out.push_str("    ");
                    out.push_str(&paint(line, code, palette));
                    out.push('\n');
                }
            }
            MdEvent::Text(text) => {
                let look = Style {
                    color: if heading { palette.map(|p| p.heading) } else { None },
                    bold: heading || strong > 0,
                    italic: emphasis > 0,
                };
                out.push_str(&paint(&text, look, palette));
            }
            MdEvent::Code(inline) => out.push_str(&paint(&format!("`{inline}`"), code, palette)),
            MdEvent::SoftBreak | MdEvent::HardBreak => out.push('\n'),
            MdEvent::Rule => {
                out.push_str(&paint(RULE, muted, palette));
                out.push_str("\n\n");
            }
            MdEvent::Html(html) | MdEvent::InlineHtml(html) => out.push_str(&html),
            _ => {}
        }
    }

    out.trim_end().to_string()
}

pub fn window_title(conversation: &Conversation) -> String {
    format!("{} | {APP_NAME}", conversation.display_title())
}

pub fn render_message(message: &Message, palette: Option<&Palette>) -> String {
    match message.role {
        Role::User => {
            let label = paint(
                "You",
                Style {
                    color: palette.map(|p| p.user),
                    bold: true,
                    italic: false,
                },
                palette,
            );
            format!("{label}\n{}\n", message.content)
        }
        Role::Assistant => {
            let label = paint(
                "Gemini",
                Style {
                    color: palette.map(|p| p.assistant),
                    bold: true,
                    italic: false,
                },
                palette,
            );
            let body = if message.is_placeholder() {
                paint(
                    THINKING,
                    Style {
                        color: palette.map(|p| p.muted),
                        bold: false,
                        italic: true,
                    },
                    palette,
                )
            } else if message.content.starts_with(ERROR_REPLY_PREFIX) {
                paint(
                    &message.content,
                    Style::color(palette.map(|p| p.error)),
                    palette,
                )
            } else {
                render_markdown(&message.content, palette)
            };
            format!("{label}\n{body}\n")
        }
    }
}

pub fn render_conversation(conversation: &Conversation, palette: Option<&Palette>) -> String {
    let heading = Style {
        color: palette.map(|p| p.heading),
        bold: true,
        italic: false,
    };
    let mut out = paint(&conversation.display_title(), heading, palette);
    out.push_str("\n\n");

    if conversation.messages.is_empty() {
        out.push_str(&paint(EMPTY_STATE_TITLE, heading, palette));
        out.push('\n');
        out.push_str(&paint(
            EMPTY_STATE_BODY,
            Style::color(palette.map(|p| p.muted)),
            palette,
        ));
        out.push('\n');
        return out;
    }

    for message in &conversation.messages {
        out.push_str(&render_message(message, palette));
        out.push('\n');
    }
    out
}

pub fn render_alert(alert: &Alert, palette: Option<&Palette>) -> String {
    let (prefix, color) = match alert.kind {
        AlertKind::RateLimited => ("⚠ Rate limited: ", palette.map(|p| p.warning)),
        AlertKind::LastConversation => ("⚠ ", palette.map(|p| p.warning)),
        AlertKind::Storage => ("✖ Storage: ", palette.map(|p| p.error)),
    };
    let mut text = format!("{prefix}{}", alert.message);
    if let Some(duration) = alert.expires_after {
        text.push_str(&format!(" (wait {}s)", duration.as_secs()));
    }
    paint(
        &text,
        Style {
            color,
            bold: true,
            italic: false,
        },
        palette,
    )
}

/// Numbered listing for `/list`; the numbers are what `/open` accepts.
pub fn render_conversation_list(
    conversations: &[ConversationSummary],
    palette: Option<&Palette>,
) -> String {
    let mut out = String::new();
    for (n, summary) in conversations.iter().enumerate() {
        let marker = if summary.active { "*" } else { " " };
        let line = format!(
            "{marker} {:>2}. {} ({} messages)",
            n + 1,
            summary.title,
            summary.message_count
        );
        let look = if summary.active {
            Style {
                color: palette.map(|p| p.user),
                bold: true,
                italic: false,
            }
        } else {
            Style::default()
        };
        out.push_str(&paint(&line, look, palette));
        out.push('\n');
    }
    out
}

/// One terminal update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Wipe the screen before printing
    pub clear: bool,
    pub window_title: Option<String>,
    pub text: String,
}

impl Frame {
    fn text(text: String) -> Self {
        Self {
            clear: false,
            window_title: None,
            text,
        }
    }

    fn present(&self, out: &mut impl Write) -> io::Result<()> {
        if self.clear {
            crossterm::queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        if let Some(title) = &self.window_title {
            crossterm::queue!(out, SetTitle(title))?;
        }
        writeln!(out, "{}", self.text)?;
        out.flush()
    }
}

/// Turns session events into frames, tracking which conversation is on
/// screen so replies for other conversations stay hidden. Unstyled
/// renderers emit plain text only: no colors, screen clears or titles.
pub struct Renderer {
    styled: bool,
    on_screen: Option<String>,
}

impl Renderer {
    pub fn new(styled: bool) -> Self {
        Self {
            styled,
            on_screen: None,
        }
    }

    pub fn frame(&mut self, event: &ChatEvent, theme: Theme) -> Option<Frame> {
        let palette = theme.palette();
        let palette = self.styled.then_some(&palette);

        match event {
            ChatEvent::ConversationCreated { conversation }
            | ChatEvent::ConversationSelected { conversation } => {
                self.on_screen = Some(conversation.id.clone());
                Some(Frame {
                    clear: self.styled,
                    window_title: self.styled.then(|| window_title(conversation)),
                    text: render_conversation(conversation, palette),
                })
            }
            ChatEvent::ConversationDeleted { conversation_id } => {
                if self.on_screen.as_deref() == Some(conversation_id.as_str()) {
                    self.on_screen = None;
                }
                Some(Frame::text(paint(
                    &format!("Deleted conversation {conversation_id}"),
                    Style::color(palette.map(|p| p.muted)),
                    palette,
                )))
            }
            ChatEvent::MessageAppended {
                conversation_id,
                message,
                ..
            }
            | ChatEvent::MessageUpdated {
                conversation_id,
                message,
                ..
            } => {
                if self.on_screen.as_deref() != Some(conversation_id.as_str()) {
                    return None;
                }
                Some(Frame::text(render_message(message, palette)))
            }
            ChatEvent::Alert(alert) => Some(Frame::text(render_alert(alert, palette))),
        }
    }

    /// Print events until the session is dropped
    pub async fn run(
        mut self,
        events: broadcast::Receiver<ChatEvent>,
        theme: watch::Receiver<Theme>,
    ) {
        let mut stream = BroadcastStream::new(events);
        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Renderer fell behind session events");
                    continue;
                }
            };
            let current = *theme.borrow();
            if let Some(frame) = self.frame(&event, current) {
                if let Err(e) = frame.present(&mut io::stdout().lock()) {
                    tracing::warn!(error = %e, "Failed to write to terminal");
                }
            }
        }
        tracing::debug!("Renderer stopped");
    }
}
