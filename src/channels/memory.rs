//! In-process platform that records everything instead of talking to a
//! network service. Backs `--dry-run` and the test suites.

use crate::channels::traits::{
    AnnouncementChannel, CelebrationEntry, ChatPlatform, NewCelebration,
};
use crate::error::{CakedayError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// A message accepted by [`MemoryPlatform::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub destination: String,
    pub text: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    channels: HashMap<String, Vec<AnnouncementChannel>>,
    entries: HashMap<String, Vec<CelebrationEntry>>,
    sent: Vec<SentMessage>,
    forbidden_channels: HashSet<String>,
    forbidden_venues: HashSet<String>,
    failing_venues: HashSet<String>,
    next_entry_id: u64,
}

/// Recording [`ChatPlatform`].
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    state: Mutex<MemoryState>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text channel to `venue`. Channels are offered in insertion order.
    pub fn add_channel(&self, venue: &str, id: &str, name: &str) {
        if let Ok(mut state) = self.lock() {
            state
                .channels
                .entry(venue.to_owned())
                .or_default()
                .push(AnnouncementChannel {
                    id: id.to_owned(),
                    name: name.to_owned(),
                });
        }
    }

    /// Refuse messages to `channel` with a permission error.
    pub fn forbid_channel(&self, channel: &str) {
        if let Ok(mut state) = self.lock() {
            state.forbidden_channels.insert(channel.to_owned());
        }
    }

    /// Refuse celebration entry creation in `venue` with a permission error.
    pub fn forbid_entries(&self, venue: &str) {
        if let Ok(mut state) = self.lock() {
            state.forbidden_venues.insert(venue.to_owned());
        }
    }

    /// Fail every request touching `venue` with a generic platform error.
    pub fn fail_venue(&self, venue: &str) {
        if let Ok(mut state) = self.lock() {
            state.failing_venues.insert(venue.to_owned());
        }
    }

    /// Entries created in `venue`.
    pub fn entries(&self, venue: &str) -> Vec<CelebrationEntry> {
        self.lock()
            .ok()
            .and_then(|state| state.entries.get(venue).cloned())
            .unwrap_or_default()
    }

    /// Every message accepted so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.lock().map(|state| state.sent.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| CakedayError::Platform("memory platform lock poisoned".into()))
    }

    fn check_venue(state: &MemoryState, venue: &str) -> Result<()> {
        if state.failing_venues.contains(venue) {
            return Err(CakedayError::Platform(format!("venue {venue} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for MemoryPlatform {
    fn id(&self) -> &'static str {
        "memory"
    }

    async fn send_message(&self, destination: &str, text: &str) -> Result<()> {
        let mut state = self.lock()?;
        if state.forbidden_channels.contains(destination) {
            return Err(CakedayError::PlatformForbidden(format!(
                "cannot send messages in {destination}"
            )));
        }
        state.sent.push(SentMessage {
            destination: destination.to_owned(),
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn create_scheduled_celebration(
        &self,
        venue: &str,
        celebration: &NewCelebration,
    ) -> Result<CelebrationEntry> {
        let mut state = self.lock()?;
        Self::check_venue(&state, venue)?;
        if state.forbidden_venues.contains(venue) {
            return Err(CakedayError::PlatformForbidden(format!(
                "cannot manage events in {venue}"
            )));
        }
        state.next_entry_id += 1;
        let entry = CelebrationEntry {
            id: state.next_entry_id.to_string(),
            name: celebration.name.clone(),
            start: celebration.start,
            end: Some(celebration.end),
        };
        state
            .entries
            .entry(venue.to_owned())
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    async fn list_scheduled_celebrations(&self, venue: &str) -> Result<Vec<CelebrationEntry>> {
        let state = self.lock()?;
        Self::check_venue(&state, venue)?;
        Ok(state.entries.get(venue).cloned().unwrap_or_default())
    }

    async fn announcement_channels(&self, venue: &str) -> Result<Vec<AnnouncementChannel>> {
        let state = self.lock()?;
        Self::check_venue(&state, venue)?;
        Ok(state.channels.get(venue).cloned().unwrap_or_default())
    }
}
