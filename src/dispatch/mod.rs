//! The turn engine: message routing, token dispatch, and error recovery.
//!
//! [`Engine`] holds all shared state (connection pool, session contexts,
//! in-flight flows, allow-list) and exposes two entry points to the
//! transport: [`Engine::handle_message`] for text turns and
//! [`Engine::handle_callback`] for token-carrying button taps. Every call
//! returns exactly one [`Render`]; all errors are recovered here at the turn
//! boundary.

pub mod token;

use std::sync::Arc;
use thiserror::Error;

use crate::db::{Pool, StoreError};
use crate::journal::aggregate::aggregate;
use crate::journal::store;
use crate::journal::types::{Category, Entry};
use crate::render::{
    category_keyboard, detail_keyboard, format_outcome, format_record, list_keyboard,
    main_keyboard, Markup, Render, BTN_BROWSE, BTN_CANCEL, BTN_RECORD,
};
use crate::session::context::ContextStore;
use crate::session::flow::{
    advance, Advance, EntryRef, Flow, FlowAction, FlowStore, MOVE_DATE_HINT,
};
use self::token::ActionToken;

/// Everything that can go wrong while dispatching a callback turn.
///
/// Validation failures never surface here: the state machine re-prompts and
/// keeps its accumulator instead.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("invalid action token")]
    InvalidToken,
    #[error("action token belongs to another user")]
    AccessDenied,
    #[error("entry is not in the current list")]
    StaleReference,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The conversational core. One instance serves all users; per-user state
/// lives in the keyed context and flow stores.
pub struct Engine {
    pool: Arc<Pool>,
    contexts: ContextStore,
    flows: FlowStore,
    allowed_users: Vec<i64>,
}

impl Engine {
    pub fn new(pool: Arc<Pool>, allowed_users: Vec<i64>) -> Self {
        Self {
            pool,
            contexts: ContextStore::new(),
            flows: FlowStore::new(),
            allowed_users,
        }
    }

    /// Session context accessor, used by integration tests.
    pub fn contexts(&self) -> &ContextStore {
        &self.contexts
    }

    fn allowed(&self, user_id: i64) -> bool {
        self.allowed_users.contains(&user_id)
    }

    // ── Text turns ────────────────────────────────────────────────────────────

    /// Handle one inbound text turn.
    pub fn handle_message(&self, user_id: i64, first_name: &str, text: &str) -> Render {
        if !self.allowed(user_id) {
            tracing::warn!(user_id, "message from user outside the allow-list");
            return Render::message(format!("Access denied ❌ {first_name}"), Markup::None);
        }

        let trimmed = text.trim();
        match trimmed {
            "/start" => {
                self.flows.clear(user_id);
                Render::message(
                    format!("Hello, {first_name}! ❤️ What shall we do?"),
                    main_keyboard(),
                )
            }
            "/cancel" | BTN_CANCEL => {
                self.flows.clear(user_id);
                Render::message("Cancelled.", main_keyboard())
            }
            BTN_RECORD => {
                self.flows.set(user_id, Flow::SelectingCategory);
                Render::message("Pick a category to record:", category_keyboard())
            }
            BTN_BROWSE => self.browse(user_id),
            _ => match self.flows.take(user_id) {
                Some(flow) => self.drive_flow(user_id, first_name, flow, trimmed),
                None => Render::message(
                    "Use the menu: record a new entry or browse the journal.",
                    main_keyboard(),
                ),
            },
        }
    }

    /// Aggregate everything for the user and render the entry list.
    fn browse(&self, user_id: i64) -> Render {
        let entries = match aggregate(&self.pool, user_id, None) {
            Ok(entries) => entries,
            Err(err) => return self.store_failure_message(user_id, None, err),
        };
        self.contexts.replace(user_id, entries.clone());

        if entries.is_empty() {
            Render::message("No entries to read yet.", main_keyboard())
        } else {
            Render::message("Pick an entry:", list_keyboard(user_id, &entries))
        }
    }

    /// Feed one turn into the user's in-flight flow. The flow has already
    /// been taken out of the store; every branch either puts it back or ends
    /// the flow.
    fn drive_flow(&self, user_id: i64, first_name: &str, flow: Flow, text: &str) -> Render {
        // Kept aside so a store failure can restore the pre-turn state.
        let checkpoint = flow.clone();

        match advance(flow, text) {
            Advance::Next { flow, prompt } | Advance::Reprompt { flow, prompt } => {
                self.flows.set(user_id, flow);
                Render::message(prompt, Markup::None)
            }
            Advance::InvalidCategory => {
                Render::message("Pick a valid category.", main_keyboard())
            }
            Advance::Complete(action) => self.perform(user_id, first_name, checkpoint, action),
        }
    }

    /// Execute a completed flow's terminal action.
    fn perform(
        &self,
        user_id: i64,
        first_name: &str,
        checkpoint: Flow,
        action: FlowAction,
    ) -> Render {
        match action {
            FlowAction::SaveRecord { category, values } => {
                match store::create_record(&self.pool, user_id, category, &values) {
                    Ok(id) => {
                        tracing::info!(user_id, category = %category, id, "record saved");
                        Render::message(
                            format!("{} saved ✅, {first_name}", category.label()),
                            main_keyboard(),
                        )
                    }
                    Err(err) => self.store_failure_message(user_id, Some(checkpoint), err),
                }
            }

            FlowAction::Search { term } => match aggregate(&self.pool, user_id, Some(&term)) {
                Ok(entries) => {
                    self.contexts.replace(user_id, entries.clone());
                    tracing::info!(user_id, term = %term, hits = entries.len(), "search ran");
                    if entries.is_empty() {
                        Render::message("Nothing found.", main_keyboard())
                    } else {
                        Render::message(
                            format!("Found {} entries:", entries.len()),
                            list_keyboard(user_id, &entries),
                        )
                    }
                }
                Err(err) => self.store_failure_message(user_id, Some(checkpoint), err),
            },

            FlowAction::MoveDate { target, when } => {
                if target.user_id != user_id {
                    tracing::warn!(user_id, target = target.user_id, "date move for another user's entry");
                    return Render::message("You cannot move another user's entry.", main_keyboard());
                }
                match store::update_created_at(&self.pool, target.category, target.record_id, when)
                {
                    Ok(()) => {
                        tracing::info!(user_id, category = %target.category, id = target.record_id, "date moved");
                        self.rebuilt_list_message(user_id, "Date updated ✅.", checkpoint)
                    }
                    Err(err) => self.store_failure_message(user_id, Some(checkpoint), err),
                }
            }

            FlowAction::SaveOutcome { target, text } => {
                if target.user_id != user_id {
                    tracing::warn!(user_id, target = target.user_id, "outcome for another user's entry");
                    return Render::message("You cannot annotate another user's entry.", main_keyboard());
                }
                match store::add_outcome(&self.pool, user_id, target.category, target.record_id, &text)
                {
                    Ok(_) => {
                        tracing::info!(user_id, category = %target.category, id = target.record_id, "outcome saved");
                        Render::message("Outcome saved ✅", main_keyboard())
                    }
                    Err(err) => self.store_failure_message(user_id, Some(checkpoint), err),
                }
            }
        }
    }

    /// After a date move, rebuild the aggregated context so the list reflects
    /// the new ordering.
    fn rebuilt_list_message(&self, user_id: i64, prefix: &str, checkpoint: Flow) -> Render {
        match aggregate(&self.pool, user_id, None) {
            Ok(entries) => {
                self.contexts.replace(user_id, entries.clone());
                if entries.is_empty() {
                    Render::message(format!("{prefix} No entries to read."), main_keyboard())
                } else {
                    Render::message(
                        format!("{prefix} Pick an entry:"),
                        list_keyboard(user_id, &entries),
                    )
                }
            }
            Err(err) => self.store_failure_message(user_id, Some(checkpoint), err),
        }
    }

    /// Store failure during a message turn: restore the pre-turn flow (if
    /// any) so the user can retry the same input, and report generically.
    fn store_failure_message(&self, user_id: i64, checkpoint: Option<Flow>, err: StoreError) -> Render {
        tracing::error!(user_id, error = %err, "store failure during message turn");
        if let Some(flow) = checkpoint {
            self.flows.set(user_id, flow);
        }
        Render::message(
            "Storage is unavailable right now. Please try again.",
            Markup::None,
        )
    }

    // ── Callback turns ────────────────────────────────────────────────────────

    /// Handle one token-carrying callback turn.
    pub fn handle_callback(&self, user_id: i64, data: &str) -> Render {
        if !self.allowed(user_id) {
            tracing::warn!(user_id, "callback from user outside the allow-list");
            return Render::alert("Access denied ❌");
        }

        match self.dispatch(user_id, data) {
            Ok(render) => render,
            Err(TurnError::InvalidToken) => Render::alert("Invalid action."),
            Err(TurnError::AccessDenied) => {
                Render::alert("This list belongs to another user.")
            }
            Err(TurnError::StaleReference) => self.stale_render(user_id),
            Err(TurnError::Store(err)) => {
                tracing::error!(user_id, error = %err, "store failure during callback turn");
                Render::alert("Storage is unavailable right now. Please try again.")
            }
        }
    }

    fn dispatch(&self, user_id: i64, data: &str) -> Result<Render, TurnError> {
        let token = ActionToken::parse(data).ok_or(TurnError::InvalidToken)?;
        tracing::debug!(user_id, token = ?token, "action token decoded");

        // The sole access-control boundary for record mutation: the token's
        // embedded owner must be the caller.
        if let Some(owner) = token.owner() {
            if owner != user_id {
                tracing::warn!(user_id, owner, "cross-user action token rejected");
                return Err(TurnError::AccessDenied);
            }
        }

        match token {
            ActionToken::MainMenu => Ok(Render::message("Main menu:", main_keyboard())),
            ActionToken::Search => {
                self.flows.set(user_id, Flow::AwaitingSearchTerm);
                Ok(Render::message(
                    "Enter a word to search for (searches every field of every entry):",
                    Markup::None,
                ))
            }
            ActionToken::BackToList { .. } => self.list_render(user_id, "Pick an entry:"),
            ActionToken::View { index, .. } => self.view_entry(user_id, index),
            ActionToken::Delete { index, .. } => self.delete_entry(user_id, index),
            ActionToken::MoveDate { index, .. } => self.begin_move_date(user_id, index),
            ActionToken::AddOutcome { index, .. } => self.begin_outcome(user_id, index),
            ActionToken::ViewOutcome { index, .. } => self.view_outcome(user_id, index),
            ActionToken::LegacyView { category, record_id } => {
                self.legacy(user_id, category, record_id, LegacyKind::View)
            }
            ActionToken::LegacyDelete { category, record_id } => {
                self.legacy(user_id, category, record_id, LegacyKind::Delete)
            }
            ActionToken::LegacyMoveDate { category, record_id } => {
                self.legacy(user_id, category, record_id, LegacyKind::MoveDate)
            }
        }
    }

    /// Resolve a context index, failing closed on anything stale.
    fn resolve(&self, user_id: i64, index: usize) -> Result<Entry, TurnError> {
        self.contexts
            .entry_at(user_id, index)
            .ok_or(TurnError::StaleReference)
    }

    fn view_entry(&self, user_id: i64, index: usize) -> Result<Render, TurnError> {
        let entry = self.resolve(user_id, index)?;

        // Always re-fetch: the context holds a snapshot and the record may
        // have been deleted or changed since.
        match store::fetch_record(&self.pool, entry.category, entry.record_id)? {
            Some(record) => {
                let total = self.contexts.len(user_id);
                Ok(Render::edit(
                    format_record(&record),
                    detail_keyboard(user_id, index, total, record.has_outcome),
                ))
            }
            None => {
                let entries = aggregate(&self.pool, user_id, None)?;
                self.contexts.replace(user_id, entries);
                Err(TurnError::StaleReference)
            }
        }
    }

    fn delete_entry(&self, user_id: i64, index: usize) -> Result<Render, TurnError> {
        let entry = self.resolve(user_id, index)?;
        store::delete_record(&self.pool, entry.category, entry.record_id)?;
        self.contexts.remove_at(user_id, index);
        tracing::info!(user_id, category = %entry.category, id = entry.record_id, "record deleted");

        let remaining = self.contexts.get(user_id);
        if remaining.is_empty() {
            Ok(Render::edit("Entry deleted ✅. No entries left.", Markup::None))
        } else {
            Ok(Render::edit(
                "Entry deleted ✅. Pick an entry:",
                list_keyboard(user_id, &remaining),
            ))
        }
    }

    fn begin_move_date(&self, user_id: i64, index: usize) -> Result<Render, TurnError> {
        let entry = self.resolve(user_id, index)?;
        self.flows.set(
            user_id,
            Flow::AwaitingTimestamp {
                target: EntryRef {
                    user_id,
                    category: entry.category,
                    record_id: entry.record_id,
                },
            },
        );
        Ok(Render::message(
            format!("Enter the new date as {MOVE_DATE_HINT}"),
            Markup::None,
        ))
    }

    fn begin_outcome(&self, user_id: i64, index: usize) -> Result<Render, TurnError> {
        let entry = self.resolve(user_id, index)?;
        self.flows.set(
            user_id,
            Flow::AwaitingOutcomeText {
                target: EntryRef {
                    user_id,
                    category: entry.category,
                    record_id: entry.record_id,
                },
            },
        );
        Ok(Render::message("Enter the outcome text:", Markup::None))
    }

    fn view_outcome(&self, user_id: i64, index: usize) -> Result<Render, TurnError> {
        let entry = self.resolve(user_id, index)?;
        match store::latest_outcome_for_user(
            &self.pool,
            user_id,
            entry.record_id,
            Some(entry.category),
        )? {
            Some(outcome) => Ok(Render::message(format_outcome(&outcome), Markup::None)),
            None => Ok(Render::message("No outcome recorded yet.", Markup::None)),
        }
    }

    /// Legacy category-addressed tokens: verify ownership against the record
    /// itself (the token embeds no user id), rebuild the context, and rejoin
    /// the canonical index-addressed path.
    fn legacy(
        &self,
        user_id: i64,
        category: Category,
        record_id: i64,
        kind: LegacyKind,
    ) -> Result<Render, TurnError> {
        let record = store::fetch_record(&self.pool, category, record_id)?
            .ok_or(TurnError::StaleReference)?;
        if record.user_id != user_id {
            tracing::warn!(user_id, owner = record.user_id, "legacy token for another user's record");
            return Err(TurnError::AccessDenied);
        }

        let entries = aggregate(&self.pool, user_id, None)?;
        self.contexts.replace(user_id, entries);
        let index = self
            .contexts
            .get(user_id)
            .iter()
            .position(|e| e.category == category && e.record_id == record_id)
            .ok_or(TurnError::StaleReference)?;

        match kind {
            LegacyKind::View => self.view_entry(user_id, index),
            LegacyKind::Delete => self.delete_entry(user_id, index),
            LegacyKind::MoveDate => self.begin_move_date(user_id, index),
        }
    }

    /// Render the user's current list, re-aggregating if the context is gone
    /// (e.g. after a restart).
    fn list_render(&self, user_id: i64, header: &str) -> Result<Render, TurnError> {
        let mut entries = self.contexts.get(user_id);
        if entries.is_empty() {
            entries = aggregate(&self.pool, user_id, None)?;
            self.contexts.replace(user_id, entries.clone());
        }

        if entries.is_empty() {
            Ok(Render::edit("No entries to read yet.", Markup::None))
        } else {
            Ok(Render::edit(header, list_keyboard(user_id, &entries)))
        }
    }

    /// A stale reference re-renders the current aggregated list with a
    /// "not found" header rather than failing the turn.
    fn stale_render(&self, user_id: i64) -> Render {
        match self.list_render(user_id, "Entry not found in the current list. Pick an entry:") {
            Ok(render) => render,
            Err(_) => Render::alert("Entry not found in the current list."),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum LegacyKind {
    View,
    Delete,
    MoveDate,
}
