//! Core journal type definitions.
//!
//! Defines [`Category`] (the four entry categories, each carrying its field
//! schema), [`Record`] (a persisted entry), [`Outcome`] (a follow-up note),
//! and [`Entry`] (the ephemeral aggregated view used for browsing).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four journal categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A divination spread: question, cards drawn, and their interpretation.
    Spread,
    /// A dream and its interpretation.
    Dream,
    /// A premonition and its interpretation.
    Premonition,
    /// A ritual: purpose, tools, actions performed, and feelings afterwards.
    Ritual,
}

/// One field of a category's input schema, in collection order.
pub struct FieldSpec {
    /// SQL column name in the category's table.
    pub column: &'static str,
    /// Human label used when rendering a record.
    pub label: &'static str,
    /// Emoji marker shown before the label in a rendered record.
    pub marker: &'static str,
    /// Prompt sent when the conversation reaches this field.
    pub prompt: &'static str,
}

const SPREAD_FIELDS: &[FieldSpec] = &[
    FieldSpec { column: "title", label: "Title", marker: "📌", prompt: "Enter a title for the spread:" },
    FieldSpec { column: "question", label: "Question", marker: "❓", prompt: "Enter the question you asked:" },
    FieldSpec { column: "cards", label: "Cards", marker: "🃏", prompt: "Enter the cards separated by + (e.g. The Moon+The Fool+Four of Wands):" },
    FieldSpec { column: "interpretation", label: "Interpretation", marker: "📝", prompt: "Enter your interpretation of the spread:" },
];

const DREAM_FIELDS: &[FieldSpec] = &[
    FieldSpec { column: "title", label: "Title", marker: "📌", prompt: "Enter a title for the dream:" },
    FieldSpec { column: "dream_text", label: "Dream", marker: "💤", prompt: "Describe the dream:" },
    FieldSpec { column: "interpretation", label: "Interpretation", marker: "📝", prompt: "Enter your interpretation of the dream:" },
];

const PREMONITION_FIELDS: &[FieldSpec] = &[
    FieldSpec { column: "title", label: "Title", marker: "📌", prompt: "Enter a title for the premonition:" },
    FieldSpec { column: "premonition_text", label: "Premonition", marker: "🔮", prompt: "Describe the premonition:" },
    FieldSpec { column: "interpretation", label: "Interpretation", marker: "📝", prompt: "Enter your interpretation of the premonition:" },
];

const RITUAL_FIELDS: &[FieldSpec] = &[
    FieldSpec { column: "title", label: "Title", marker: "📌", prompt: "Enter a title for the ritual:" },
    FieldSpec { column: "purpose", label: "Purpose", marker: "🎯", prompt: "Enter the purpose of the ritual:" },
    FieldSpec { column: "tools", label: "Tools", marker: "🛠", prompt: "Enter the tools used:" },
    FieldSpec { column: "action", label: "Actions", marker: "⚡", prompt: "Describe the actions performed:" },
    FieldSpec { column: "feelings", label: "Feelings", marker: "💫", prompt: "Describe your feelings after the ritual:" },
];

impl Category {
    /// All categories, in display order.
    pub const ALL: [Category; 4] = [
        Category::Spread,
        Category::Dream,
        Category::Premonition,
        Category::Ritual,
    ];

    /// Compact tag used in action tokens and the outcomes table.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Spread => "spread",
            Self::Dream => "dream",
            Self::Premonition => "premonition",
            Self::Ritual => "ritual",
        }
    }

    /// Table name in the database.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Spread => "spreads",
            Self::Dream => "dreams",
            Self::Premonition => "premonitions",
            Self::Ritual => "rituals",
        }
    }

    /// Display label shown on keyboards and in list rows.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Spread => "Spread",
            Self::Dream => "Dream",
            Self::Premonition => "Premonition",
            Self::Ritual => "Ritual",
        }
    }

    /// The input schema for this category, in collection order. The first
    /// field is always the title.
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            Self::Spread => SPREAD_FIELDS,
            Self::Dream => DREAM_FIELDS,
            Self::Premonition => PREMONITION_FIELDS,
            Self::Ritual => RITUAL_FIELDS,
        }
    }

    /// Parse a keyboard selection (the display label) into a category.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.label() == label.trim())
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spread" => Ok(Self::Spread),
            "dream" => Ok(Self::Dream),
            "premonition" => Ok(Self::Premonition),
            "ritual" => Ok(Self::Ritual),
            _ => Err(format!("unknown category: {s}")),
        }
    }
}

/// A persisted journal entry.
///
/// `values` is parallel to `category.fields()`, in collection order. Identity
/// is unique only within the category's table; the (category, id) pair is the
/// full key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub user_id: i64,
    pub category: Category,
    /// Creation timestamp. Mutable: the owner can move an entry to a
    /// different date after the fact.
    pub created_at: DateTime<Utc>,
    /// True once at least one outcome note has been attached.
    pub has_outcome: bool,
    pub values: Vec<String>,
}

impl Record {
    /// The first collected field is always the title.
    pub fn title(&self) -> &str {
        self.values.first().map(String::as_str).unwrap_or("")
    }

    /// Case-folded substring match across all textual fields.
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.values
            .iter()
            .any(|v| v.to_lowercase().contains(needle_lower))
    }
}

/// A follow-up note attached to one record. Append-only; only the most recent
/// outcome per record is surfaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub id: i64,
    pub user_id: i64,
    pub category: Category,
    /// Id of the referenced record within its category table.
    pub reference_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Ephemeral cross-category view of one record, produced fresh by each
/// aggregation run and held in the session context for index addressing.
/// Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub category: Category,
    pub record_id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub has_outcome: bool,
    pub values: Vec<String>,
}

impl From<Record> for Entry {
    fn from(record: Record) -> Self {
        Self {
            title: record.title().to_string(),
            category: record.category,
            record_id: record.id,
            created_at: record.created_at,
            has_outcome: record.has_outcome,
            values: record.values,
        }
    }
}
