#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use grimoire::db::Pool;
use grimoire::dispatch::Engine;
use grimoire::journal::store;
use grimoire::journal::types::Category;
use grimoire::render::{Button, Markup, Render};

/// A fresh engine over a temp-dir database. The `TempDir` must stay alive for
/// the duration of the test.
pub struct TestBot {
    pub dir: TempDir,
    pub pool: Arc<Pool>,
    pub engine: Engine,
}

/// Open a fresh file-backed database with schema and migrations applied.
pub fn test_pool() -> (TempDir, Arc<Pool>) {
    let dir = TempDir::new().unwrap();
    let pool = Pool::open(dir.path().join("journal.db"), 2).unwrap();
    (dir, Arc::new(pool))
}

/// Build an engine with the given allow-list over a fresh database.
pub fn test_bot(allowed_users: &[i64]) -> TestBot {
    let (dir, pool) = test_pool();
    let engine = Engine::new(Arc::clone(&pool), allowed_users.to_vec());
    TestBot { dir, pool, engine }
}

/// Insert a dream directly via the store. Returns the record id.
pub fn insert_dream(pool: &Pool, user_id: i64, title: &str, text: &str, interp: &str) -> i64 {
    store::create_record(
        pool,
        user_id,
        Category::Dream,
        &[title.to_string(), text.to_string(), interp.to_string()],
    )
    .unwrap()
}

/// Insert a spread directly via the store. Returns the record id.
pub fn insert_spread(
    pool: &Pool,
    user_id: i64,
    title: &str,
    question: &str,
    cards: &str,
    interp: &str,
) -> i64 {
    store::create_record(
        pool,
        user_id,
        Category::Spread,
        &[
            title.to_string(),
            question.to_string(),
            cards.to_string(),
            interp.to_string(),
        ],
    )
    .unwrap()
}

/// Drive a full recording conversation through the engine. Returns the final
/// render (the save confirmation).
pub fn record_entry(bot: &TestBot, user_id: i64, category: Category, values: &[&str]) -> Render {
    bot.engine.handle_message(user_id, "Mara", "✍️ Record");
    let mut render = bot.engine.handle_message(user_id, "Mara", category.label());
    for value in values {
        render = bot.engine.handle_message(user_id, "Mara", value);
    }
    render
}

/// Flatten the render's inline keyboard into its buttons, row order.
pub fn inline_buttons(render: &Render) -> Vec<Button> {
    match render.markup() {
        Some(Markup::Inline(rows)) => rows.iter().flatten().cloned().collect(),
        _ => Vec::new(),
    }
}

/// The encoded tokens on the render's inline keyboard.
pub fn inline_tokens(render: &Render) -> Vec<String> {
    inline_buttons(render).into_iter().map(|b| b.token).collect()
}
