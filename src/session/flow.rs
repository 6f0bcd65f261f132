//! The multi-turn conversation state machine.
//!
//! One [`Flow`] per user, created on the first input of a flow and destroyed
//! on completion or cancellation. [`advance`] is a pure transition function:
//! it consumes the current flow plus one text turn and says what to do next.
//! All persistence happens in the dispatcher after a [`FlowAction`] comes
//! back, so no partial record is ever written before the terminal step.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::journal::types::Category;

/// Input format for the date-move flow.
pub const MOVE_DATE_FORMAT: &str = "%d.%m.%Y %H:%M";
/// Human-readable form of [`MOVE_DATE_FORMAT`], used in prompts.
pub const MOVE_DATE_HINT: &str = "DD.MM.YYYY HH:MM";

/// Reference to the entry a single-input flow is operating on. Captured at
/// the moment the flow starts so the target survives context replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef {
    pub user_id: i64,
    pub category: Category,
    pub record_id: i64,
}

/// Where a user currently is in a multi-turn flow.
#[derive(Debug, Clone)]
pub enum Flow {
    /// "Record" was pressed; waiting for a category choice.
    SelectingCategory,
    /// Collecting the category's fields in schema order. `collected` holds
    /// the values entered so far.
    Collecting {
        category: Category,
        collected: Vec<String>,
    },
    /// Waiting for a global search term.
    AwaitingSearchTerm,
    /// Waiting for the replacement timestamp of `target`.
    AwaitingTimestamp { target: EntryRef },
    /// Waiting for the outcome text to attach to `target`.
    AwaitingOutcomeText { target: EntryRef },
}

/// What the dispatcher should do after feeding one turn into a flow.
#[derive(Debug)]
pub enum Advance {
    /// Store the updated flow and send the next prompt.
    Next { flow: Flow, prompt: String },
    /// Input rejected; keep the flow unchanged and re-prompt.
    Reprompt { flow: Flow, prompt: String },
    /// Terminal step reached; perform the action and drop the flow.
    Complete(FlowAction),
    /// Category selection failed; drop the flow and surface an error.
    InvalidCategory,
}

/// A terminal action produced by a completed flow.
#[derive(Debug)]
pub enum FlowAction {
    SaveRecord {
        category: Category,
        values: Vec<String>,
    },
    Search {
        term: String,
    },
    MoveDate {
        target: EntryRef,
        when: DateTime<Utc>,
    },
    SaveOutcome {
        target: EntryRef,
        text: String,
    },
}

/// Feed one text turn into a flow.
pub fn advance(flow: Flow, input: &str) -> Advance {
    let input = input.trim();

    match flow {
        Flow::SelectingCategory => match Category::from_label(input) {
            Some(category) => Advance::Next {
                prompt: category.fields()[0].prompt.to_string(),
                flow: Flow::Collecting {
                    category,
                    collected: Vec::new(),
                },
            },
            None => Advance::InvalidCategory,
        },

        Flow::Collecting {
            category,
            mut collected,
        } => {
            let step = &category.fields()[collected.len()];
            if input.is_empty() {
                return Advance::Reprompt {
                    flow: Flow::Collecting { category, collected },
                    prompt: format!("This field cannot be empty. {}", step.prompt),
                };
            }
            collected.push(input.to_string());
            if collected.len() == category.fields().len() {
                Advance::Complete(FlowAction::SaveRecord {
                    category,
                    values: collected,
                })
            } else {
                Advance::Next {
                    prompt: category.fields()[collected.len()].prompt.to_string(),
                    flow: Flow::Collecting { category, collected },
                }
            }
        }

        Flow::AwaitingSearchTerm => {
            if input.is_empty() {
                Advance::Reprompt {
                    flow: Flow::AwaitingSearchTerm,
                    prompt: "Enter a word to search for:".into(),
                }
            } else {
                Advance::Complete(FlowAction::Search {
                    term: input.to_string(),
                })
            }
        }

        Flow::AwaitingTimestamp { target } => match parse_move_date(input) {
            Some(when) => Advance::Complete(FlowAction::MoveDate { target, when }),
            None => Advance::Reprompt {
                flow: Flow::AwaitingTimestamp { target },
                prompt: format!("Invalid date format. Try again ({MOVE_DATE_HINT}):"),
            },
        },

        Flow::AwaitingOutcomeText { target } => {
            if input.is_empty() {
                Advance::Reprompt {
                    flow: Flow::AwaitingOutcomeText { target },
                    prompt: "The outcome text cannot be empty. Try again:".into(),
                }
            } else {
                Advance::Complete(FlowAction::SaveOutcome {
                    target,
                    text: input.to_string(),
                })
            }
        }
    }
}

/// Parse the strict `DD.MM.YYYY HH:MM` input format. Anything else, including
/// ISO dates, is rejected.
pub fn parse_move_date(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text.trim(), MOVE_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Process-wide map from user id to their in-flight flow.
#[derive(Default)]
pub struct FlowStore {
    inner: Mutex<HashMap<i64, Flow>>,
}

impl FlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user_id: i64, flow: Flow) {
        self.lock().insert(user_id, flow);
    }

    /// Remove and return the user's flow; the caller decides whether to put
    /// an updated flow back.
    pub fn take(&self, user_id: i64) -> Option<Flow> {
        self.lock().remove(&user_id)
    }

    /// Abandon any in-flight flow (explicit cancellation).
    pub fn clear(&self, user_id: i64) {
        self.lock().remove(&user_id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Flow>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> EntryRef {
        EntryRef {
            user_id: 7,
            category: Category::Dream,
            record_id: 3,
        }
    }

    #[test]
    fn category_selection_starts_collection() {
        match advance(Flow::SelectingCategory, "Dream") {
            Advance::Next { flow, prompt } => {
                assert!(matches!(
                    flow,
                    Flow::Collecting { category: Category::Dream, ref collected } if collected.is_empty()
                ));
                assert_eq!(prompt, "Enter a title for the dream:");
            }
            other => panic!("unexpected advance: {other:?}"),
        }
    }

    #[test]
    fn invalid_category_returns_to_idle() {
        assert!(matches!(
            advance(Flow::SelectingCategory, "Tea leaves"),
            Advance::InvalidCategory
        ));
    }

    #[test]
    fn full_dream_collection_completes_in_order() {
        let mut flow = Flow::Collecting {
            category: Category::Dream,
            collected: Vec::new(),
        };
        for input in ["Flight", "I was flying over a city"] {
            match advance(flow, input) {
                Advance::Next { flow: next, .. } => flow = next,
                other => panic!("unexpected advance: {other:?}"),
            }
        }
        match advance(flow, "freedom") {
            Advance::Complete(FlowAction::SaveRecord { category, values }) => {
                assert_eq!(category, Category::Dream);
                assert_eq!(values, vec!["Flight", "I was flying over a city", "freedom"]);
            }
            other => panic!("unexpected advance: {other:?}"),
        }
    }

    #[test]
    fn empty_field_reprompts_without_consuming() {
        let flow = Flow::Collecting {
            category: Category::Ritual,
            collected: vec!["Full moon".into()],
        };
        match advance(flow, "   ") {
            Advance::Reprompt { flow, prompt } => {
                assert!(matches!(
                    flow,
                    Flow::Collecting { ref collected, .. } if collected.len() == 1
                ));
                assert!(prompt.contains("cannot be empty"));
            }
            other => panic!("unexpected advance: {other:?}"),
        }
    }

    #[test]
    fn timestamp_accepts_only_the_fixed_format() {
        match advance(Flow::AwaitingTimestamp { target: target() }, "01.01.2030 10:00") {
            Advance::Complete(FlowAction::MoveDate { when, .. }) => {
                assert_eq!(when.to_rfc3339(), "2030-01-01T10:00:00+00:00");
            }
            other => panic!("unexpected advance: {other:?}"),
        }

        match advance(Flow::AwaitingTimestamp { target: target() }, "2030-01-01") {
            Advance::Reprompt { prompt, .. } => assert!(prompt.contains("DD.MM.YYYY")),
            other => panic!("unexpected advance: {other:?}"),
        }
    }

    #[test]
    fn outcome_text_rejects_empty() {
        match advance(Flow::AwaitingOutcomeText { target: target() }, "") {
            Advance::Reprompt { .. } => {}
            other => panic!("unexpected advance: {other:?}"),
        }
        match advance(Flow::AwaitingOutcomeText { target: target() }, "it came true") {
            Advance::Complete(FlowAction::SaveOutcome { text, .. }) => {
                assert_eq!(text, "it came true");
            }
            other => panic!("unexpected advance: {other:?}"),
        }
    }

    #[test]
    fn search_term_is_trimmed() {
        match advance(Flow::AwaitingSearchTerm, "  flying  ") {
            Advance::Complete(FlowAction::Search { term }) => assert_eq!(term, "flying"),
            other => panic!("unexpected advance: {other:?}"),
        }
    }

    #[test]
    fn flow_store_take_removes() {
        let store = FlowStore::new();
        store.set(7, Flow::SelectingCategory);
        assert!(store.take(7).is_some());
        assert!(store.take(7).is_none());
    }
}
