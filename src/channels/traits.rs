use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;

/// Inbound message received from a chat platform.
#[derive(Debug, Clone, Default)]
pub struct ChannelInboundMessage {
    /// Venue (guild) the message was posted in. `None` for direct messages.
    pub venue_id: Option<String>,
    /// Channel to reply into.
    pub reply_target: String,
    pub author_id: String,
    pub author_name: String,
    /// Legacy `#1234` suffix; empty or `"0"` on migrated accounts.
    pub author_discriminator: String,
    pub text: String,
}

/// A scheduled celebration entry as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CelebrationEntry {
    pub id: String,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

/// Request to create a scheduled celebration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCelebration {
    pub name: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: String,
}

/// A text channel that may accept announcements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementChannel {
    pub id: String,
    pub name: String,
}

/// Outbound capabilities the birthday core needs from a chat platform.
///
/// Failures map to [`crate::CakedayError::PlatformForbidden`] when the bot
/// lacks permission, and [`crate::CakedayError::Platform`] otherwise.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Stable platform identifier (e.g. `discord`).
    fn id(&self) -> &'static str;

    /// Post `text` into `destination`.
    async fn send_message(&self, destination: &str, text: &str) -> Result<()>;

    /// Create a scheduled celebration entry in `venue`.
    async fn create_scheduled_celebration(
        &self,
        venue: &str,
        celebration: &NewCelebration,
    ) -> Result<CelebrationEntry>;

    /// Scheduled celebration entries currently known in `venue`.
    async fn list_scheduled_celebrations(&self, venue: &str) -> Result<Vec<CelebrationEntry>>;

    /// Text channels of `venue` in display order.
    async fn announcement_channels(&self, venue: &str) -> Result<Vec<AnnouncementChannel>>;

    /// Most recent round-trip latency to the platform, if measured.
    fn latency(&self) -> Option<Duration> {
        None
    }
}

/// A platform that also delivers inbound messages.
#[async_trait]
pub trait ChannelAdapter: ChatPlatform {
    /// Start receiving inbound messages and forwarding them to `inbound_tx`.
    /// Returns when the connection drops.
    async fn run(&self, inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()>;

    /// Best-effort health check.
    async fn health_check(&self) -> anyhow::Result<bool>;
}
