//! Command surface: `setbirthday`, `listbirthdays`, `ping`, `checkbirthdays`.
//!
//! Commands are looked up in [`COMMANDS`] by name (case-insensitive) and
//! handled by plain functions over [`CommandServices`]. Every handler turns
//! its outcome, including failures, into the reply text.

use crate::birthday::{BirthdayRecord, BirthdayStore, due};
use crate::celebration::{CelebrationNotifier, EntryOutcome};
use crate::channels::traits::ChannelInboundMessage;
use crate::error::CakedayError;
use crate::scheduler::{BirthdaySweeper, Clock};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const USAGE_SET: &str = "Usage: setbirthday <day> <month>";
pub const OUT_OF_RANGE: &str = "Invalid date! Please use DD MM format.";
pub const NOT_A_DATE: &str = "Invalid date! Please check the month and day.";
pub const SAVE_FAILED: &str = "Sorry, I couldn't save your birthday. Please try again later.";
pub const VENUE_ONLY: &str = "Birthdays can only be managed inside a server.";
pub const NO_BIRTHDAYS: &str = "No birthdays recorded yet!";
pub const NO_UPCOMING: &str = "No upcoming birthdays!";
pub const ENTRY_CREATED: &str =
    "🎉 An event for your birthday has been created! Check it out above.";

/// Known commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    SetBirthday,
    ListBirthdays,
    Ping,
    CheckBirthdays,
}

/// Command name → handler.
pub const COMMANDS: &[(&str, CommandKind)] = &[
    ("setbirthday", CommandKind::SetBirthday),
    ("listbirthdays", CommandKind::ListBirthdays),
    ("ping", CommandKind::Ping),
    ("checkbirthdays", CommandKind::CheckBirthdays),
];

/// A command found in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub kind: CommandKind,
    pub args: Vec<&'a str>,
}

/// Find a command in `text`. Returns `None` for anything that does not start
/// with `prefix` followed by a known command name.
pub fn parse<'a>(prefix: &str, text: &'a str) -> Option<ParsedCommand<'a>> {
    let rest = text.trim().strip_prefix(prefix)?;
    let mut words = rest.split_whitespace();
    let name = words.next()?;
    let kind = COMMANDS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, kind)| *kind)?;
    Some(ParsedCommand {
        kind,
        args: words.collect(),
    })
}

/// Who issued a command and where.
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    pub venue_id: Option<String>,
    pub user_id: String,
    pub display_name: String,
    /// Discriminator reported by the platform; `None` when it sent none.
    pub discriminator: Option<String>,
}

impl From<&ChannelInboundMessage> for CommandContext {
    fn from(message: &ChannelInboundMessage) -> Self {
        let discriminator = message.author_discriminator.trim();
        Self {
            venue_id: message.venue_id.clone(),
            user_id: message.author_id.clone(),
            display_name: message.author_name.clone(),
            discriminator: (!discriminator.is_empty()).then(|| discriminator.to_owned()),
        }
    }
}

/// Everything the handlers operate on.
#[derive(Clone)]
pub struct CommandServices {
    pub store: Arc<BirthdayStore>,
    pub notifier: CelebrationNotifier,
    pub sweeper: Arc<BirthdaySweeper>,
    pub clock: Clock,
    pub prefix: String,
}

impl CommandServices {
    /// Parse and handle one inbound message. Returns the reply, or `None`
    /// when the message is not a command.
    pub async fn handle_message(&self, message: &ChannelInboundMessage) -> Option<String> {
        let command = parse(&self.prefix, &message.text)?;
        let ctx = CommandContext::from(message);
        info!(user = %ctx.user_id, command = ?command.kind, "command received");
        Some(self.dispatch(&ctx, &command).await)
    }

    /// Run a parsed command.
    pub async fn dispatch(&self, ctx: &CommandContext, command: &ParsedCommand<'_>) -> String {
        match command.kind {
            CommandKind::SetBirthday => self.set_birthday(ctx, &command.args).await,
            CommandKind::ListBirthdays => match ctx.venue_id.as_deref() {
                Some(venue) => {
                    let today = (self.clock)().date_naive();
                    list_birthdays(&self.store, venue, today)
                }
                None => VENUE_ONLY.to_owned(),
            },
            CommandKind::Ping => ping(self.notifier.platform().latency()),
            CommandKind::CheckBirthdays => check_birthdays(&self.sweeper).await,
        }
    }

    async fn set_birthday(&self, ctx: &CommandContext, args: &[&str]) -> String {
        let Some(venue) = ctx.venue_id.as_deref() else {
            return VENUE_ONLY.to_owned();
        };
        let (day, month) = match args {
            [day, month] => match (day.parse::<u32>(), month.parse::<u32>()) {
                (Ok(day), Ok(month)) => (day, month),
                _ => return USAGE_SET.to_owned(),
            },
            _ => return USAGE_SET.to_owned(),
        };
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return OUT_OF_RANGE.to_owned();
        }

        let record = match self.save_birthday(venue, ctx, month, day).await {
            Ok(record) => record,
            Err(CakedayError::InvalidDate(_)) => return NOT_A_DATE.to_owned(),
            Err(e) => {
                error!(venue, user = %ctx.user_id, "cannot save birthday: {e}");
                return SAVE_FAILED.to_owned();
            }
        };

        let mut lines = Vec::new();
        if self.notifier.settings().create_on_set
            && let Some(line) = self.schedule_entry(venue, &record).await
        {
            lines.push(line);
        }
        lines.push(format!("🎂 Your birthday has been set to {}", record.date));
        lines.join("\n")
    }

    /// Store the birthday on the blocking pool; the flush does file I/O.
    async fn save_birthday(
        &self,
        venue: &str,
        ctx: &CommandContext,
        month: u32,
        day: u32,
    ) -> crate::Result<BirthdayRecord> {
        let store = Arc::clone(&self.store);
        let venue = venue.to_owned();
        let ctx = ctx.clone();
        tokio::task::spawn_blocking(move || {
            store.set_member(
                &venue,
                &ctx.user_id,
                month,
                day,
                &ctx.display_name,
                ctx.discriminator.as_deref(),
            )
        })
        .await
        .map_err(|e| CakedayError::Persistence(format!("save task failed: {e}")))?
    }

    async fn schedule_entry(&self, venue: &str, record: &BirthdayRecord) -> Option<String> {
        let now = (self.clock)();
        let day = due::next_occurrence(now.date_naive(), record.date);
        match self.notifier.ensure_entry(venue, record, day, now).await {
            Ok(EntryOutcome::Created(_)) => Some(ENTRY_CREATED.to_owned()),
            Ok(EntryOutcome::AlreadyScheduled) => None,
            Err(CakedayError::PlatformForbidden(reason)) => {
                warn!(venue, "cannot create celebration entry: {reason}");
                Some("(I don't have permission to create events here, so no event was scheduled.)".to_owned())
            }
            Err(e) => {
                warn!(venue, "cannot create celebration entry: {e}");
                Some("(Creating the celebration event failed; it will be retried on the day.)".to_owned())
            }
        }
    }
}

/// Upcoming birthdays in `venue`, soonest first.
pub fn list_birthdays(store: &BirthdayStore, venue: &str, today: NaiveDate) -> String {
    let records = match store.list_for(venue) {
        Ok(records) => records,
        Err(e) => {
            error!(venue, "cannot list birthdays: {e}");
            return "Sorry, I couldn't read the birthday list right now.".to_owned();
        }
    };
    // Nothing stored at all, as opposed to only unreadable entries.
    if records.is_empty() && store.raw_member_count(venue) == 0 {
        return NO_BIRTHDAYS.to_owned();
    }

    let mut upcoming: Vec<(u32, String)> = records
        .iter()
        .map(|record| (due::days_until(today, record.date), record.label()))
        .collect();
    if upcoming.is_empty() {
        return NO_UPCOMING.to_owned();
    }
    upcoming.sort();

    upcoming
        .into_iter()
        .map(|(days, label)| match days {
            0 => format!("{label}: birthday is today! 🎂"),
            1 => format!("{label}: 1 day until birthday"),
            n => format!("{label}: {n} days until birthday"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn ping(latency: Option<std::time::Duration>) -> String {
    match latency {
        Some(latency) => format!(
            "Pong! The bot's latency is {:.2}ms",
            latency.as_secs_f64() * 1000.0
        ),
        None => "Pong!".to_owned(),
    }
}

pub async fn check_birthdays(sweeper: &BirthdaySweeper) -> String {
    match sweeper.trigger_now().await {
        Ok(report) => format!("Birthday check complete: {}.", report.summary()),
        Err(e) => {
            error!("manual birthday check failed: {e}");
            "Birthday check failed. Please try again later.".to_owned()
        }
    }
}
