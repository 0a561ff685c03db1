//! End-to-end command and sweep flows over the in-memory platform.

use crate::helpers::{VENUE, clock_at, message, platform, services, write_table};
use cakeday::birthday::BirthdayStore;
use cakeday::commands::{NO_BIRTHDAYS, NO_UPCOMING, NOT_A_DATE, OUT_OF_RANGE, USAGE_SET};
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn setbirthday_persists_and_schedules_the_next_celebration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("birthdays.json");
    let store = Arc::new(BirthdayStore::open(path.clone()).unwrap());
    let platform = platform();
    let services = services(Arc::clone(&store), Arc::clone(&platform), clock_at(2024, 6, 1));

    let reply = services
        .handle_message(&message("42", "ana", "!setbirthday 15 6"))
        .await
        .unwrap();
    assert!(reply.ends_with("🎂 Your birthday has been set to 6/15"), "{reply}");

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw[VENUE]["members"]["42"]["date"], "06-15");
    assert_eq!(raw[VENUE]["members"]["42"]["username"], "ana");

    let entries = platform.entries(VENUE);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "Happy Birthday ana");
    assert_eq!(
        entries[0].start.date_naive(),
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    );

    let reopened = BirthdayStore::open(path).unwrap();
    assert_eq!(reopened.list_for(VENUE).unwrap().len(), 1);
}

#[tokio::test]
async fn command_names_ignore_case() {
    let store = Arc::new(BirthdayStore::in_memory());
    let services = services(Arc::clone(&store), platform(), clock_at(2024, 6, 1));

    services
        .handle_message(&message("42", "ana", "!SetBirthday 3 9"))
        .await
        .unwrap();
    assert_eq!(store.member_count(), 1);
}

#[tokio::test]
async fn bad_setbirthday_arguments_store_nothing() {
    let store = Arc::new(BirthdayStore::in_memory());
    let services = services(Arc::clone(&store), platform(), clock_at(2024, 6, 1));

    for (text, expected) in [
        ("!setbirthday 31 2", NOT_A_DATE),
        ("!setbirthday 0 5", OUT_OF_RANGE),
        ("!setbirthday 12 13", OUT_OF_RANGE),
        ("!setbirthday 12", USAGE_SET),
        ("!setbirthday twelve may", USAGE_SET),
    ] {
        let reply = services
            .handle_message(&message("42", "ana", text))
            .await
            .unwrap();
        assert_eq!(reply, expected, "for {text}");
    }
    assert_eq!(store.member_count(), 0);
}

#[tokio::test]
async fn checkbirthdays_celebrates_once_per_day() {
    let store = Arc::new(BirthdayStore::in_memory());
    store.set(VENUE, "42", 6, 15, "ana").unwrap();
    store.set(VENUE, "43", 7, 1, "bo").unwrap();
    let platform = platform();
    let services = services(store, Arc::clone(&platform), clock_at(2024, 6, 15));

    let first = services
        .handle_message(&message("1", "mod", "!checkbirthdays"))
        .await
        .unwrap();
    assert_eq!(
        first,
        "Birthday check complete: checked 2 birthdays, 1 due today: 1 celebrated, 0 already done, 0 failed."
    );

    let second = services
        .handle_message(&message("1", "mod", "!checkbirthdays"))
        .await
        .unwrap();
    assert_eq!(
        second,
        "Birthday check complete: checked 2 birthdays, 1 due today: 0 celebrated, 1 already done, 0 failed."
    );

    assert_eq!(platform.entries(VENUE).len(), 1);
    let sent = platform.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("<@42>"));
}

#[tokio::test]
async fn members_with_the_same_name_are_each_celebrated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("birthdays.json");
    write_table(
        &path,
        &json!({
            VENUE: {"members": {
                "1": {"date": "06-15", "username": "ana", "discriminator": "0001"},
                "2": {"date": "06-15", "username": "ana", "discriminator": "0002"}
            }}
        }),
    );
    let store = Arc::new(BirthdayStore::open(path).unwrap());
    let platform = platform();
    let services = services(store, Arc::clone(&platform), clock_at(2024, 6, 15));

    let reply = services
        .handle_message(&message("9", "mod", "!checkbirthdays"))
        .await
        .unwrap();

    assert!(reply.contains("2 due today: 2 celebrated, 0 already done"), "{reply}");
    assert_eq!(platform.entries(VENUE).len(), 2);
    assert_eq!(platform.sent().len(), 2);
}

#[tokio::test]
async fn leap_day_birthday_is_celebrated_on_feb_28_in_common_years() {
    let store = Arc::new(BirthdayStore::in_memory());
    let platform = platform();
    let services = services(Arc::clone(&store), Arc::clone(&platform), clock_at(2025, 2, 28));

    services
        .handle_message(&message("42", "ana", "!setbirthday 29 2"))
        .await
        .unwrap();
    let reply = services
        .handle_message(&message("42", "ana", "!checkbirthdays"))
        .await
        .unwrap();

    assert!(reply.contains("1 due today: 1 celebrated"), "{reply}");
    assert_eq!(platform.entries(VENUE).len(), 1);
}

#[tokio::test]
async fn mixed_format_table_is_listed_soonest_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("birthdays.json");
    write_table(
        &path,
        &json!({
            VENUE: {"members": {
                "1": {"date": "1990-06-20", "username": "ana"},
                "2": {"date": "06-16", "username": "bo", "discriminator": "1234"},
                "3": {"date": "13-45", "username": "broken"},
                "4": {"date": "06-15", "username": "cy"}
            }}
        }),
    );
    let store = Arc::new(BirthdayStore::open(path.clone()).unwrap());
    let services = services(Arc::clone(&store), platform(), clock_at(2024, 6, 15));

    let reply = services
        .handle_message(&message("9", "mod", "!listbirthdays"))
        .await
        .unwrap();
    assert_eq!(
        reply,
        "cy: birthday is today! 🎂\nbo#1234: 1 day until birthday\nana: 5 days until birthday"
    );

    // Writing another record keeps the unreadable one and the ISO form on disk.
    store.set(VENUE, "5", 1, 1, "dee").unwrap();
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw[VENUE]["members"]["3"]["date"], "13-45");
    assert_eq!(raw[VENUE]["members"]["1"]["date"], "1990-06-20");
}

#[tokio::test]
async fn listbirthdays_distinguishes_empty_from_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("birthdays.json");
    write_table(
        &path,
        &json!({ "other-guild": {"members": {"1": {"date": "nonsense", "username": "x"}}} }),
    );
    let store = Arc::new(BirthdayStore::open(path).unwrap());

    let in_empty_venue = services(Arc::clone(&store), platform(), clock_at(2024, 6, 15));
    let reply = in_empty_venue
        .handle_message(&message("9", "mod", "!listbirthdays"))
        .await
        .unwrap();
    assert_eq!(reply, NO_BIRTHDAYS);

    let mut in_broken_venue = services(store, platform(), clock_at(2024, 6, 15));
    in_broken_venue.prefix = "?".to_owned();
    let mut msg = message("9", "mod", "?listbirthdays");
    msg.venue_id = Some("other-guild".to_owned());
    let reply = in_broken_venue.handle_message(&msg).await.unwrap();
    assert_eq!(reply, NO_UPCOMING);
}

#[tokio::test]
async fn venues_never_see_each_others_birthdays() {
    let store = Arc::new(BirthdayStore::in_memory());
    store.set("elsewhere", "42", 6, 15, "ana").unwrap();
    let services = services(store, platform(), clock_at(2024, 6, 15));

    let reply = services
        .handle_message(&message("9", "mod", "!listbirthdays"))
        .await
        .unwrap();
    assert_eq!(reply, NO_BIRTHDAYS);
}

#[tokio::test]
async fn plain_chat_is_not_a_command() {
    let services = services(
        Arc::new(BirthdayStore::in_memory()),
        platform(),
        clock_at(2024, 6, 15),
    );
    assert!(
        services
            .handle_message(&message("9", "mod", "happy birthday!"))
            .await
            .is_none()
    );
}
