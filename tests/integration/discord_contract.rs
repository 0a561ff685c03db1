//! Discord REST contract tests.
//!
//! Verify the request shapes the adapter sends and how it maps Discord
//! responses and error statuses.

use cakeday::CakedayError;
use cakeday::birthday::BirthdayStore;
use cakeday::celebration::{CelebrationNotifier, EntryOutcome};
use cakeday::channels::discord::DiscordAdapter;
use cakeday::channels::traits::{ChatPlatform, NewCelebration};
use cakeday::config::{CelebrationConfig, DiscordConfig};
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GUILD: &str = "900";

fn adapter(server: &MockServer) -> DiscordAdapter {
    let config = DiscordConfig {
        api_base: server.uri(),
        ..DiscordConfig::default()
    };
    DiscordAdapter::new("test-token", &config)
}

fn event_json(id: &str, name: &str, start: &str) -> serde_json::Value {
    json!({
        "id": id,
        "guild_id": GUILD,
        "name": name,
        "scheduled_start_time": start,
        "scheduled_end_time": null,
        "privacy_level": 2,
        "entity_type": 3
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Messages
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_message_posts_content_with_bot_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/channels/55/messages"))
        .and(header("Authorization", "Bot test-token"))
        .and(body_partial_json(json!({"content": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
        .expect(1)
        .mount(&server)
        .await;

    adapter(&server).send_message("55", "hello").await.unwrap();
}

#[tokio::test]
async fn missing_permission_maps_to_forbidden() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/channels/55/messages"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"message": "Missing Permissions", "code": 50013})),
        )
        .mount(&server)
        .await;

    let err = adapter(&server).send_message("55", "hello").await.unwrap_err();
    assert!(matches!(err, CakedayError::PlatformForbidden(_)), "{err}");
}

#[tokio::test]
async fn server_errors_map_to_platform_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/guilds/{GUILD}/channels")))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .announcement_channels(GUILD)
        .await
        .unwrap_err();
    assert!(matches!(err, CakedayError::Platform(_)), "{err}");
}

// ────────────────────────────────────────────────────────────────────────────
// Scheduled events
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_event_sends_external_guild_only_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/guilds/{GUILD}/scheduled-events")))
        .and(body_partial_json(json!({
            "name": "Happy Birthday ana",
            "scheduled_start_time": "2024-06-15T00:00:00Z",
            "scheduled_end_time": "2024-06-15T23:59:59Z",
            "privacy_level": 2,
            "entity_type": 3,
            "entity_metadata": {"location": "Discord"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(event_json(
            "77",
            "Happy Birthday ana",
            "2024-06-15T00:00:00+00:00",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let request = NewCelebration {
        name: "Happy Birthday ana".to_owned(),
        description: "Join us in celebrating ana's birthday!".to_owned(),
        start: Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2024, 6, 15, 23, 59, 59).unwrap(),
        location: "Discord".to_owned(),
    };
    let entry = adapter(&server)
        .create_scheduled_celebration(GUILD, &request)
        .await
        .unwrap();
    assert_eq!(entry.id, "77");
    assert_eq!(entry.start, request.start);
}

#[tokio::test]
async fn list_events_parses_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/guilds/{GUILD}/scheduled-events")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            event_json("1", "Happy Birthday ana", "2024-06-15T00:00:00+00:00"),
            event_json("2", "Game night", "2024-06-20T19:00:00.000000+00:00"),
        ])))
        .mount(&server)
        .await;

    let entries = adapter(&server)
        .list_scheduled_celebrations(GUILD)
        .await
        .unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Happy Birthday ana", "Game night"]);
}

#[tokio::test]
async fn announcement_channels_are_text_channels_in_position_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/guilds/{GUILD}/channels")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "10", "name": "lounge", "type": 2, "position": 0},
            {"id": "11", "name": "general", "type": 0, "position": 3},
            {"id": "12", "name": "rules", "type": 0, "position": 1}
        ])))
        .mount(&server)
        .await;

    let channels = adapter(&server).announcement_channels(GUILD).await.unwrap();
    let ids: Vec<&str> = channels.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["12", "11"]);
}

// ────────────────────────────────────────────────────────────────────────────
// Celebration over Discord
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn celebration_skips_channels_without_permission() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/guilds/{GUILD}/scheduled-events")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/guilds/{GUILD}/scheduled-events")))
        .respond_with(ResponseTemplate::new(200).set_body_json(event_json(
            "77",
            "Happy Birthday ana",
            "2024-06-15T09:01:00+00:00",
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/guilds/{GUILD}/channels")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "12", "name": "rules", "type": 0, "position": 0},
            {"id": "11", "name": "general", "type": 0, "position": 1}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/channels/12/messages"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/channels/11/messages"))
        .and(body_partial_json(json!({
            "content": "🎉 Happy birthday <@42>! Check out the celebration event to join in the fun!"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "5"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = BirthdayStore::in_memory();
    let record = store.set(GUILD, "42", 6, 15, "ana").unwrap();
    let notifier = CelebrationNotifier::new(Arc::new(adapter(&server)), CelebrationConfig::default());

    let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();
    let outcome = notifier.celebrate(GUILD, &record, today, now).await.unwrap();

    assert!(matches!(outcome.entry, EntryOutcome::Created(_)));
    assert_eq!(outcome.announced_in.as_deref(), Some("11"));
}
