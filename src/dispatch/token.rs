//! Compact action tokens carried in inline keyboard buttons.
//!
//! A token encodes an action, its target user, and an addressing reference,
//! and is round-tripped through the client as an opaque string. One tagged
//! union with a single canonical encoding; the `Legacy*` variants decode the
//! category-addressed format of previously issued buttons and exist only for
//! backward compatibility.

use crate::journal::types::Category;

/// A decoded action token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionToken {
    /// Render the entry at `index` of the user's current list.
    View { user_id: i64, index: usize },
    /// Delete the entry at `index` (store delete + context index removal).
    Delete { user_id: i64, index: usize },
    /// Start the timestamp-edit flow for the entry at `index`.
    MoveDate { user_id: i64, index: usize },
    /// Start the outcome-entry flow for the entry at `index`.
    AddOutcome { user_id: i64, index: usize },
    /// Show the latest outcome of the entry at `index`.
    ViewOutcome { user_id: i64, index: usize },
    /// Re-render the user's current list.
    BackToList { user_id: i64 },
    /// Back to the main menu.
    MainMenu,
    /// Start the global search flow.
    Search,
    /// Legacy category-addressed view (`view_{category}_{id}_{index}`).
    LegacyView { category: Category, record_id: i64 },
    /// Legacy category-addressed delete.
    LegacyDelete { category: Category, record_id: i64 },
    /// Legacy category-addressed date move.
    LegacyMoveDate { category: Category, record_id: i64 },
}

impl ActionToken {
    /// Canonical string encoding, inverse of [`ActionToken::parse`].
    pub fn encode(&self) -> String {
        match self {
            Self::View { user_id, index } => format!("view_ctx_{user_id}_{index}"),
            Self::Delete { user_id, index } => format!("del_ctx_{user_id}_{index}"),
            Self::MoveDate { user_id, index } => format!("date_ctx_{user_id}_{index}"),
            Self::AddOutcome { user_id, index } => format!("note_ctx_{user_id}_{index}"),
            Self::ViewOutcome { user_id, index } => format!("shownote_ctx_{user_id}_{index}"),
            Self::BackToList { user_id } => format!("list_ctx_{user_id}"),
            Self::MainMenu => "menu".into(),
            Self::Search => "search".into(),
            Self::LegacyView { category, record_id } => {
                format!("view_{}_{record_id}_0", category.tag())
            }
            Self::LegacyDelete { category, record_id } => {
                format!("del_{}_{record_id}_0", category.tag())
            }
            Self::LegacyMoveDate { category, record_id } => {
                format!("date_{}_{record_id}_0", category.tag())
            }
        }
    }

    /// Decode a token, or `None` for anything malformed. One exhaustive match
    /// over the split form; no state is touched here.
    pub fn parse(data: &str) -> Option<Self> {
        let parts: Vec<&str> = data.split('_').collect();
        match parts.as_slice() {
            ["menu"] => Some(Self::MainMenu),
            ["search"] => Some(Self::Search),
            ["list", "ctx", user] => Some(Self::BackToList {
                user_id: user.parse().ok()?,
            }),
            ["view", "ctx", user, index] => Some(Self::View {
                user_id: user.parse().ok()?,
                index: index.parse().ok()?,
            }),
            ["del", "ctx", user, index] => Some(Self::Delete {
                user_id: user.parse().ok()?,
                index: index.parse().ok()?,
            }),
            ["date", "ctx", user, index] => Some(Self::MoveDate {
                user_id: user.parse().ok()?,
                index: index.parse().ok()?,
            }),
            ["note", "ctx", user, index] => Some(Self::AddOutcome {
                user_id: user.parse().ok()?,
                index: index.parse().ok()?,
            }),
            ["shownote", "ctx", user, index] => Some(Self::ViewOutcome {
                user_id: user.parse().ok()?,
                index: index.parse().ok()?,
            }),
            // Legacy category-addressed forms. The trailing index is ignored:
            // it referred to a list that no longer exists.
            ["view", tag, id, _index] => Some(Self::LegacyView {
                category: tag.parse().ok()?,
                record_id: id.parse().ok()?,
            }),
            ["del", tag, id, _index] => Some(Self::LegacyDelete {
                category: tag.parse().ok()?,
                record_id: id.parse().ok()?,
            }),
            ["date", tag, id, _index] => Some(Self::LegacyMoveDate {
                category: tag.parse().ok()?,
                record_id: id.parse().ok()?,
            }),
            _ => None,
        }
    }

    /// The user id embedded in the token, if the format carries one. Legacy
    /// tokens return `None`; their ownership is checked against the record.
    pub fn owner(&self) -> Option<i64> {
        match self {
            Self::View { user_id, .. }
            | Self::Delete { user_id, .. }
            | Self::MoveDate { user_id, .. }
            | Self::AddOutcome { user_id, .. }
            | Self::ViewOutcome { user_id, .. }
            | Self::BackToList { user_id } => Some(*user_id),
            Self::MainMenu
            | Self::Search
            | Self::LegacyView { .. }
            | Self::LegacyDelete { .. }
            | Self::LegacyMoveDate { .. } => None,
        }
    }
}
