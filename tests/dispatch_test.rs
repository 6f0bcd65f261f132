mod helpers;

use helpers::{inline_tokens, insert_dream, insert_spread, test_bot};

use grimoire::journal::store;
use grimoire::journal::types::Category;
use grimoire::render::Render;

#[test]
fn browse_then_view_renders_the_record_detail() {
    let bot = test_bot(&[7]);
    insert_dream(&bot.pool, 7, "Flight", "I was flying over a city", "freedom");

    let list = bot.engine.handle_message(7, "Mara", "📖 Browse");
    assert_eq!(list.text(), "Pick an entry:");

    let detail = bot.engine.handle_callback(7, "view_ctx_7_0");
    assert!(matches!(detail, Render::Edit { .. }));
    assert!(detail.text().contains("<b>Flight</b>"));
    assert!(detail.text().contains("I was flying over a city"));
}

#[test]
fn browse_with_empty_journal() {
    let bot = test_bot(&[7]);
    let render = bot.engine.handle_message(7, "Mara", "📖 Browse");
    assert_eq!(render.text(), "No entries to read yet.");
}

#[test]
fn cross_user_token_is_rejected_with_an_alert() {
    let bot = test_bot(&[111, 222]);
    insert_dream(&bot.pool, 111, "Flight", "flying", "freedom");
    bot.engine.handle_message(111, "Mara", "📖 Browse");

    // User 222 replays a token minted for user 111.
    let render = bot.engine.handle_callback(222, "view_ctx_111_0");
    assert!(matches!(render, Render::Alert { .. }));
    assert_eq!(render.text(), "This list belongs to another user.");
}

#[test]
fn unlisted_user_callbacks_are_rejected() {
    let bot = test_bot(&[111]);
    let render = bot.engine.handle_callback(999, "menu");
    assert!(matches!(render, Render::Alert { .. }));
}

#[test]
fn malformed_tokens_alert_instead_of_crashing() {
    let bot = test_bot(&[7]);
    for data in ["", "view_ctx", "view_ctx_x_0", "view_ctx_7_banana", "bogus_1_2_3_4"] {
        let render = bot.engine.handle_callback(7, data);
        assert_eq!(render.text(), "Invalid action.", "token {data:?}");
    }
}

#[test]
fn delete_removes_the_record_and_compacts_the_list() {
    let bot = test_bot(&[7]);
    insert_dream(&bot.pool, 7, "First", "one", "a");
    insert_dream(&bot.pool, 7, "Second", "two", "b");
    bot.engine.handle_message(7, "Mara", "📖 Browse");

    // Index 0 is the newest entry ("Second").
    let render = bot.engine.handle_callback(7, "del_ctx_7_0");
    assert!(render.text().starts_with("Entry deleted ✅"));
    assert_eq!(bot.engine.contexts().len(7), 1);

    let remaining = store::list_records(&bot.pool, Category::Dream, 7).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title(), "First");
}

#[test]
fn stale_index_after_delete_rerenders_the_list() {
    let bot = test_bot(&[7]);
    insert_dream(&bot.pool, 7, "First", "one", "a");
    insert_dream(&bot.pool, 7, "Second", "two", "b");
    bot.engine.handle_message(7, "Mara", "📖 Browse");
    bot.engine.handle_callback(7, "del_ctx_7_0");

    // The old keyboard still carries index 1, which no longer exists.
    let render = bot.engine.handle_callback(7, "view_ctx_7_1");
    assert!(render.text().starts_with("Entry not found"));
    assert!(matches!(render, Render::Edit { .. }));
}

#[test]
fn aggregated_list_is_newest_first_across_categories() {
    let bot = test_bot(&[7]);
    let dream_id = insert_dream(&bot.pool, 7, "Older dream", "text", "interp");
    insert_spread(&bot.pool, 7, "Newer spread", "q", "cards", "i");

    // Push the dream into the past.
    store::update_created_at(
        &bot.pool,
        Category::Dream,
        dream_id,
        "2020-01-01T10:00:00Z".parse().unwrap(),
    )
    .unwrap();

    bot.engine.handle_message(7, "Mara", "📖 Browse");
    let detail = bot.engine.handle_callback(7, "view_ctx_7_0");
    assert!(detail.text().contains("Newer spread"));
}

#[test]
fn detail_keyboard_navigates_between_entries() {
    let bot = test_bot(&[7]);
    insert_dream(&bot.pool, 7, "First", "one", "a");
    insert_dream(&bot.pool, 7, "Second", "two", "b");
    bot.engine.handle_message(7, "Mara", "📖 Browse");

    let detail = bot.engine.handle_callback(7, "view_ctx_7_0");
    let tokens = inline_tokens(&detail);
    // Only forward navigation at the top of the list.
    assert!(tokens.contains(&"view_ctx_7_1".to_string()));
    assert!(!tokens.contains(&"view_ctx_7_-1".to_string()));
    assert!(tokens.contains(&"list_ctx_7".to_string()));
}

#[test]
fn legacy_category_addressed_tokens_still_resolve() {
    let bot = test_bot(&[7]);
    let id = insert_dream(&bot.pool, 7, "Flight", "flying", "freedom");

    // No browse first: legacy tokens rebuild the context themselves.
    let render = bot.engine.handle_callback(7, &format!("view_dream_{id}_0"));
    assert!(matches!(render, Render::Edit { .. }));
    assert!(render.text().contains("<b>Flight</b>"));
}

#[test]
fn legacy_token_for_another_users_record_is_denied() {
    let bot = test_bot(&[7, 8]);
    let id = insert_dream(&bot.pool, 8, "Secret", "hidden", "private");

    let render = bot.engine.handle_callback(7, &format!("view_dream_{id}_0"));
    assert!(matches!(render, Render::Alert { .. }));
    assert_eq!(render.text(), "This list belongs to another user.");
}

#[test]
fn back_to_list_rebuilds_a_lost_context() {
    let bot = test_bot(&[7]);
    insert_dream(&bot.pool, 7, "Flight", "flying", "freedom");

    // Simulates a restart: no context yet, but the old keyboard survives.
    let render = bot.engine.handle_callback(7, "list_ctx_7");
    assert_eq!(render.text(), "Pick an entry:");
    assert_eq!(bot.engine.contexts().len(7), 1);
}
