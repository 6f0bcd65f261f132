//! Personal divination journal, served as a Telegram assistant.
//!
//! Grimoire lets a small allow-listed set of users keep a structured journal in
//! four categories, collected over multi-turn conversations:
//!
//! | Category | Fields |
//! |----------|--------|
//! | **Spread** | title, question, cards, interpretation |
//! | **Dream** | title, dream text, interpretation |
//! | **Premonition** | title, premonition text, interpretation |
//! | **Ritual** | title, purpose, tools, action, feelings |
//!
//! Entries can be browsed in one aggregated, searchable list, annotated with
//! follow-up outcome notes, moved to a different date, and deleted. Navigation
//! is driven by compact action tokens round-tripped through inline keyboard
//! buttons.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL) behind a small bounded connection pool with a
//!   single transparent retry on transient failures
//! - **Engine**: a synchronous, transport-agnostic core; every inbound turn
//!   produces exactly one [`render::Render`]
//! - **Transport**: Telegram Bot API over long polling
//!
//! # Modules
//!
//! - [`cli`] — Offline maintenance commands (doctor, export)
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — Connection pool, schema, migrations, and health checks
//! - [`journal`] — Record types, the store adapter, and cross-category aggregation
//! - [`session`] — Per-user session context and the conversation state machine
//! - [`dispatch`] — Action token decoding and the turn engine
//! - [`render`] — Outbound message text and keyboard construction
//! - [`telegram`] — Bot API client and the update loop

pub mod cli;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod journal;
pub mod render;
pub mod session;
pub mod telegram;
