//! Shared fixtures for integration tests.

use cakeday::birthday::BirthdayStore;
use cakeday::celebration::CelebrationNotifier;
use cakeday::channels::memory::MemoryPlatform;
use cakeday::channels::traits::ChannelInboundMessage;
use cakeday::commands::CommandServices;
use cakeday::config::{CelebrationConfig, SweepConfig};
use cakeday::scheduler::{BirthdaySweeper, Clock};
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;

pub const VENUE: &str = "guild-1";

/// Clock pinned to `year-month-day 09:00 UTC`.
pub fn clock_at(year: i32, month: u32, day: u32) -> Clock {
    let now = NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
        .and_utc();
    Arc::new(move || now)
}

/// A platform with one writable channel in [`VENUE`].
pub fn platform() -> Arc<MemoryPlatform> {
    let platform = Arc::new(MemoryPlatform::new());
    platform.add_channel(VENUE, "general", "general");
    platform
}

/// Command services over `store` and `platform` at `clock`.
pub fn services(
    store: Arc<BirthdayStore>,
    platform: Arc<MemoryPlatform>,
    clock: Clock,
) -> CommandServices {
    let notifier = CelebrationNotifier::new(platform, CelebrationConfig::default());
    let sweeper = Arc::new(
        BirthdaySweeper::new(Arc::clone(&store), notifier.clone(), &SweepConfig::default())
            .with_clock(Arc::clone(&clock)),
    );
    CommandServices {
        store,
        notifier,
        sweeper,
        clock,
        prefix: "!".to_owned(),
    }
}

/// A guild message from `author_id`.
pub fn message(author_id: &str, author_name: &str, text: &str) -> ChannelInboundMessage {
    ChannelInboundMessage {
        venue_id: Some(VENUE.to_owned()),
        reply_target: "general".to_owned(),
        author_id: author_id.to_owned(),
        author_name: author_name.to_owned(),
        text: text.to_owned(),
        ..ChannelInboundMessage::default()
    }
}

/// Write a raw birthday table.
pub fn write_table(path: &Path, json: &serde_json::Value) {
    std::fs::write(path, serde_json::to_vec_pretty(json).unwrap()).unwrap();
}
