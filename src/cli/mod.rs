//! Offline commands that run against the journal database directly, without
//! starting the bot.

pub mod doctor;
pub mod export;
