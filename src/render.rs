//! Outbound render construction: message text, HTML formatting, keyboards.
//!
//! The engine returns exactly one [`Render`] per inbound turn; the transport
//! decides how to deliver it (send, edit in place, or blocking alert).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dispatch::token::ActionToken;
use crate::journal::types::{Entry, Outcome, Record};

/// Main-menu button labels. The reply keyboard echoes these back as plain
/// message text, so the engine matches on them.
pub const BTN_RECORD: &str = "✍️ Record";
pub const BTN_BROWSE: &str = "📖 Browse";
pub const BTN_CANCEL: &str = "Cancel";

/// A single inline button carrying one action token.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Button {
    pub label: String,
    pub token: String,
}

impl Button {
    pub fn new(label: impl Into<String>, token: ActionToken) -> Self {
        Self {
            label: label.into(),
            token: token.encode(),
        }
    }
}

/// Keyboard attached to an outbound message.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum Markup {
    None,
    /// Inline buttons; each carries an action token.
    Inline(Vec<Vec<Button>>),
    /// Reply keyboard; buttons send their label as message text.
    Reply(Vec<Vec<String>>),
}

/// The single outbound render produced for one inbound turn.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum Render {
    /// Send a new message.
    Message { text: String, markup: Markup },
    /// Replace the previously rendered block (inline-keyboard navigation).
    Edit { text: String, markup: Markup },
    /// Blocking notice shown without touching the rendered list.
    Alert { text: String },
}

impl Render {
    pub fn message(text: impl Into<String>, markup: Markup) -> Self {
        Self::Message { text: text.into(), markup }
    }

    pub fn edit(text: impl Into<String>, markup: Markup) -> Self {
        Self::Edit { text: text.into(), markup }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self::Alert { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Message { text, .. } | Self::Edit { text, .. } | Self::Alert { text } => text,
        }
    }

    pub fn markup(&self) -> Option<&Markup> {
        match self {
            Self::Message { markup, .. } | Self::Edit { markup, .. } => Some(markup),
            Self::Alert { .. } => None,
        }
    }
}

/// Escape user-entered text for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ── Keyboards ─────────────────────────────────────────────────────────────────

pub fn main_keyboard() -> Markup {
    Markup::Reply(vec![vec![BTN_RECORD.into(), BTN_BROWSE.into()]])
}

pub fn category_keyboard() -> Markup {
    let mut rows: Vec<Vec<String>> = crate::journal::types::Category::ALL
        .iter()
        .map(|c| vec![c.label().to_string()])
        .collect();
    rows.push(vec![BTN_CANCEL.into()]);
    Markup::Reply(rows)
}

/// One list row label: `Dream — Flight — 30.08.2026`.
fn entry_row_label(entry: &Entry) -> String {
    format!(
        "{} — {} — {}",
        entry.category.label(),
        entry.title,
        entry.created_at.format("%d.%m.%Y"),
    )
}

/// Inline keyboard for the aggregated list: one row per entry plus search and
/// main-menu rows.
pub fn list_keyboard(user_id: i64, entries: &[Entry]) -> Markup {
    let mut rows: Vec<Vec<Button>> = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            vec![Button::new(entry_row_label(entry), ActionToken::View { user_id, index })]
        })
        .collect();
    rows.push(vec![Button::new("🔍 Search", ActionToken::Search)]);
    rows.push(vec![Button::new("🏠 Main menu", ActionToken::MainMenu)]);
    Markup::Inline(rows)
}

/// Inline keyboard for a single entry: navigation, delete, date move, outcome
/// actions, and back-to-list.
pub fn detail_keyboard(user_id: i64, index: usize, total: usize, has_outcome: bool) -> Markup {
    let mut rows: Vec<Vec<Button>> = Vec::new();

    let mut nav = Vec::new();
    if index > 0 {
        nav.push(Button::new("◀️ Previous", ActionToken::View { user_id, index: index - 1 }));
    }
    if index + 1 < total {
        nav.push(Button::new("Next ▶️", ActionToken::View { user_id, index: index + 1 }));
    }
    if !nav.is_empty() {
        rows.push(nav);
    }

    rows.push(vec![
        Button::new("❌ Delete", ActionToken::Delete { user_id, index }),
        Button::new("📆 Move date", ActionToken::MoveDate { user_id, index }),
    ]);

    if has_outcome {
        rows.push(vec![
            Button::new("📄 View outcome", ActionToken::ViewOutcome { user_id, index }),
            Button::new("✏️ Rewrite outcome", ActionToken::AddOutcome { user_id, index }),
        ]);
    } else {
        rows.push(vec![Button::new("➕ Add outcome", ActionToken::AddOutcome { user_id, index })]);
    }

    rows.push(vec![Button::new("⬅️ Back to list", ActionToken::BackToList { user_id })]);
    Markup::Inline(rows)
}

// ── Text blocks ───────────────────────────────────────────────────────────────

fn format_date(ts: DateTime<Utc>) -> String {
    ts.format("%d.%m.%Y %H:%M").to_string()
}

/// Full detail text for one record, driven by the category's field schema.
pub fn format_record(record: &Record) -> String {
    let mut text = format!(
        "📌 <b>{}</b>\n🗓 Date: {}\n",
        escape_html(record.title()),
        format_date(record.created_at),
    );
    for (spec, value) in record.category.fields().iter().zip(&record.values).skip(1) {
        text.push_str(&format!("{} {}: {}\n", spec.marker, spec.label, escape_html(value)));
    }
    text
}

pub fn format_outcome(outcome: &Outcome) -> String {
    format!("<b>Outcome:</b>\n{}", escape_html(&outcome.text))
}
