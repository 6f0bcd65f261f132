mod helpers;

use chrono::{Datelike, Timelike};

use helpers::{insert_dream, test_bot};

use grimoire::journal::store;
use grimoire::journal::types::Category;

#[test]
fn move_date_flow_updates_the_timestamp() {
    let bot = test_bot(&[7]);
    let id = insert_dream(&bot.pool, 7, "Flight", "flying", "freedom");
    bot.engine.handle_message(7, "Mara", "📖 Browse");

    let prompt = bot.engine.handle_callback(7, "date_ctx_7_0");
    assert_eq!(prompt.text(), "Enter the new date as DD.MM.YYYY HH:MM");

    let done = bot.engine.handle_message(7, "Mara", "01.01.2030 10:00");
    assert!(done.text().starts_with("Date updated ✅"));

    let record = store::fetch_record(&bot.pool, Category::Dream, id).unwrap().unwrap();
    assert_eq!(record.created_at.year(), 2030);
    assert_eq!(record.created_at.month(), 1);
    assert_eq!(record.created_at.hour(), 10);
}

#[test]
fn iso_date_input_is_rejected_and_reprompted() {
    let bot = test_bot(&[7]);
    insert_dream(&bot.pool, 7, "Flight", "flying", "freedom");
    bot.engine.handle_message(7, "Mara", "📖 Browse");
    bot.engine.handle_callback(7, "date_ctx_7_0");

    let render = bot.engine.handle_message(7, "Mara", "2030-01-01 10:00");
    assert!(render.text().starts_with("Invalid date format."));

    // The flow survives the rejection; a valid input still completes it.
    let done = bot.engine.handle_message(7, "Mara", "01.01.2030 10:00");
    assert!(done.text().starts_with("Date updated ✅"));
}

#[test]
fn nonsense_calendar_dates_are_rejected() {
    let bot = test_bot(&[7]);
    insert_dream(&bot.pool, 7, "Flight", "flying", "freedom");
    bot.engine.handle_message(7, "Mara", "📖 Browse");
    bot.engine.handle_callback(7, "date_ctx_7_0");

    for input in ["32.01.2030 10:00", "01.13.2030 10:00", "01.01.2030 25:00", "yesterday"] {
        let render = bot.engine.handle_message(7, "Mara", input);
        assert!(render.text().starts_with("Invalid date format."), "input {input:?}");
    }
}

#[test]
fn moving_a_date_reorders_the_aggregated_list() {
    let bot = test_bot(&[7]);
    insert_dream(&bot.pool, 7, "First", "one", "a");
    insert_dream(&bot.pool, 7, "Second", "two", "b");
    bot.engine.handle_message(7, "Mara", "📖 Browse");

    // Move the newest entry ("Second") far into the past.
    bot.engine.handle_callback(7, "date_ctx_7_0");
    bot.engine.handle_message(7, "Mara", "01.01.2020 10:00");

    // "First" is now at index 0 of the rebuilt context.
    let detail = bot.engine.handle_callback(7, "view_ctx_7_0");
    assert!(detail.text().contains("<b>First</b>"));
}

#[test]
fn move_date_target_survives_context_replacement() {
    let bot = test_bot(&[7]);
    let flight = insert_dream(&bot.pool, 7, "Flight", "flying", "freedom");
    insert_dream(&bot.pool, 7, "Falling", "falling", "fear");

    bot.engine.handle_message(7, "Mara", "📖 Browse");
    // Start moving the entry at index 1 ("Flight", the older one)...
    bot.engine.handle_callback(7, "date_ctx_7_1");
    // ...browse again, which rebuilds the context and every index...
    bot.engine.handle_message(7, "Mara", "📖 Browse");

    // ...and finish the move. The target was captured by id, so "Flight"
    // moves even though index 1 no longer points at it.
    bot.engine.handle_message(7, "Mara", "01.01.2020 10:00");
    let record = store::fetch_record(&bot.pool, Category::Dream, flight).unwrap().unwrap();
    assert_eq!(record.created_at.year(), 2020);
}
