//! Celebration notifier: turns a due birthday into a scheduled celebration
//! entry and an announcement message.
//!
//! Entries are keyed by a deterministic name per member. Before creating one
//! the notifier scans the venue's existing entries for that name, so running
//! twice for the same member never creates a duplicate.

use crate::birthday::BirthdayRecord;
use crate::channels::traits::{CelebrationEntry, ChatPlatform, NewCelebration};
use crate::config::CelebrationConfig;
use crate::error::{CakedayError, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lead time before a same-day entry starts. Platforms reject start times
/// in the past.
const START_LEAD: Duration = Duration::minutes(1);

/// Whether [`CelebrationNotifier::ensure_entry`] created a new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Created(CelebrationEntry),
    AlreadyScheduled,
}

/// Result of celebrating one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CelebrationOutcome {
    pub entry: EntryOutcome,
    /// Channel that accepted the announcement, if one was posted.
    pub announced_in: Option<String>,
}

/// Name of the celebration entry for `record`. Built from the member label
/// so members sharing a display name still get distinct entries.
pub fn celebration_name(record: &BirthdayRecord) -> String {
    format!("Happy Birthday {}", record.label())
}

/// Start and end of the entry for a birthday falling on `day`.
///
/// The entry spans the UTC day. When that start has already passed, the
/// entry starts shortly after `now` instead.
pub fn entry_window(day: NaiveDate, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let day_start = day.and_time(chrono::NaiveTime::MIN).and_utc();
    let day_end = day_start + Duration::days(1) - Duration::seconds(1);
    let start = day_start.max(now + START_LEAD);
    let end = if start >= day_end {
        start + Duration::hours(1)
    } else {
        day_end
    };
    (start, end)
}

/// Creates celebration entries and posts announcements through a platform.
#[derive(Clone)]
pub struct CelebrationNotifier {
    platform: Arc<dyn ChatPlatform>,
    settings: CelebrationConfig,
}

impl CelebrationNotifier {
    pub fn new(platform: Arc<dyn ChatPlatform>, settings: CelebrationConfig) -> Self {
        Self { platform, settings }
    }

    pub fn platform(&self) -> &Arc<dyn ChatPlatform> {
        &self.platform
    }

    pub fn settings(&self) -> &CelebrationConfig {
        &self.settings
    }

    /// Create the celebration entry for `record` on `day` unless one with the
    /// same name already exists in `venue`.
    ///
    /// # Errors
    /// Propagates platform failures from listing or creating entries.
    pub async fn ensure_entry(
        &self,
        venue: &str,
        record: &BirthdayRecord,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<EntryOutcome> {
        let name = celebration_name(record);
        let existing = self.platform.list_scheduled_celebrations(venue).await?;
        if existing.iter().any(|entry| entry.name == name) {
            debug!(venue, user = %record.user_id, "celebration entry already scheduled");
            return Ok(EntryOutcome::AlreadyScheduled);
        }

        let (start, end) = entry_window(day, now);
        let request = NewCelebration {
            description: format!("Join us in celebrating {}'s birthday!", record.display_name),
            name,
            start,
            end,
            location: self.settings.location.clone(),
        };
        let entry = self
            .platform
            .create_scheduled_celebration(venue, &request)
            .await?;
        info!(venue, user = %record.user_id, entry = %entry.id, "celebration entry created");
        Ok(EntryOutcome::Created(entry))
    }

    /// Post the announcement for `record` into the first channel of `venue`
    /// that accepts it. Channels that refuse for lack of permission are
    /// skipped.
    ///
    /// Returns the channel id used, or `None` when no channel accepted.
    ///
    /// # Errors
    /// Propagates non-permission platform failures.
    pub async fn announce(&self, venue: &str, record: &BirthdayRecord) -> Result<Option<String>> {
        let text = self.announcement_text(record);
        let channels = self.platform.announcement_channels(venue).await?;
        for channel in channels {
            match self.platform.send_message(&channel.id, &text).await {
                Ok(()) => {
                    info!(venue, channel = %channel.name, user = %record.user_id, "birthday announced");
                    return Ok(Some(channel.id));
                }
                Err(CakedayError::PlatformForbidden(reason)) => {
                    debug!(venue, channel = %channel.name, "cannot post here: {reason}");
                }
                Err(e) => return Err(e),
            }
        }
        warn!(venue, user = %record.user_id, "no channel accepted the birthday announcement");
        Ok(None)
    }

    /// Celebrate one member whose birthday is `today`: ensure the entry
    /// exists, then announce when enabled.
    ///
    /// # Errors
    /// Propagates the first platform failure.
    pub async fn celebrate(
        &self,
        venue: &str,
        record: &BirthdayRecord,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<CelebrationOutcome> {
        let entry = self.ensure_entry(venue, record, today, now).await?;
        let announced_in = if self.settings.announce {
            self.announce(venue, record).await?
        } else {
            None
        };
        Ok(CelebrationOutcome {
            entry,
            announced_in,
        })
    }

    fn announcement_text(&self, record: &BirthdayRecord) -> String {
        self.settings
            .announcement_template
            .replace("{name}", &record.display_name)
            .replace("{mention}", &format!("<@{}>", record.user_id))
    }
}
