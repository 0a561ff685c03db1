//! Birthday data model, validation, due-date math, and the persisted store.

pub mod date;
pub mod due;
pub mod store;

pub use date::{BirthDate, StoredDate};
pub use store::{BirthdayStore, VenueBirthdays};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One member's birthday as handed to the calculator, sweep, and commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthdayRecord {
    /// Owning user identifier.
    pub user_id: String,
    /// Display name captured when the birthday was set.
    pub display_name: String,
    /// Validated month/day.
    pub date: BirthDate,
    /// Year from legacy ISO-form storage. Cosmetic.
    pub reference_year: Option<i32>,
    /// Legacy identity suffix; empty when absent.
    pub discriminator: String,
}

impl BirthdayRecord {
    /// Name shown in listings: `name#1234` when a legacy discriminator is
    /// present, otherwise just the display name. Records without a name fall
    /// back to the user id.
    pub fn label(&self) -> String {
        let name = match self.display_name.trim() {
            "" => self.user_id.as_str(),
            name => name,
        };
        match self.discriminator.as_str() {
            "" | "0" => name.to_owned(),
            disc => format!("{name}#{disc}"),
        }
    }
}

/// On-disk shape of one member entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMember {
    /// `YYYY-MM-DD` or `MM-DD`.
    pub date: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub discriminator: String,
}

impl StoredMember {
    /// Parse into a [`BirthdayRecord`].
    ///
    /// # Errors
    /// Returns [`crate::CakedayError::MalformedStoredRecord`] when the stored
    /// date parses under neither supported format.
    pub fn to_record(&self, user_id: &str) -> crate::Result<BirthdayRecord> {
        let stored = BirthDate::parse_stored(&self.date).ok_or_else(|| {
            crate::CakedayError::MalformedStoredRecord {
                user: user_id.to_owned(),
                value: self.date.clone(),
            }
        })?;
        Ok(BirthdayRecord {
            user_id: user_id.to_owned(),
            display_name: self.username.clone(),
            date: stored.date,
            reference_year: stored.reference_year,
            discriminator: self.discriminator.clone(),
        })
    }
}

/// On-disk shape of one venue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueMembers {
    #[serde(default)]
    pub members: BTreeMap<String, StoredMember>,
}

/// The whole persisted document: venue id → members.
pub type VenueTable = BTreeMap<String, VenueMembers>;
