//! Persisted birthday table.
//!
//! The table lives in memory behind an [`RwLock`] and is mirrored to a JSON
//! file. Every mutation is flushed before the caller sees success:
//! the new table is written to a temp sibling, synced, and renamed over the
//! target, then swapped into memory. A failed flush leaves memory untouched.

use crate::birthday::{BirthDate, BirthdayRecord, StoredMember, VenueTable};
use crate::error::{CakedayError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// All parsed records for one venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueBirthdays {
    pub venue_id: String,
    pub records: Vec<BirthdayRecord>,
}

/// Birthday repository: a guarded in-memory table plus its backing file.
pub struct BirthdayStore {
    /// Backing file. `None` keeps the table in memory only.
    path: Option<PathBuf>,
    table: RwLock<VenueTable>,
}

impl BirthdayStore {
    /// Create an empty store backed by `path`. Call [`load`](Self::load) to
    /// read existing data.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            table: RwLock::new(VenueTable::new()),
        }
    }

    /// Create a store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            table: RwLock::new(VenueTable::new()),
        }
    }

    /// Create a store backed by `path` and load it.
    ///
    /// # Errors
    /// Returns [`CakedayError::Persistence`] when the file exists but cannot
    /// be read or parsed.
    pub fn open(path: PathBuf) -> Result<Self> {
        let store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    /// Backing file path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace the in-memory table with the file contents. A missing file
    /// loads as an empty table.
    ///
    /// # Errors
    /// Returns [`CakedayError::Persistence`] on read or parse failure.
    pub fn load(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let loaded = read_table(path)?;
        let mut table = self.write_guard()?;
        *table = loaded;
        debug!(
            path = %path.display(),
            venues = table.len(),
            "loaded birthday table"
        );
        Ok(())
    }

    /// Write the whole in-memory table to the backing file.
    ///
    /// # Errors
    /// Returns [`CakedayError::Persistence`] on serialize or write failure.
    pub fn flush(&self) -> Result<()> {
        // Write lock keeps other writers out for the duration of the flush.
        let table = self.write_guard()?;
        write_table(self.path.as_deref(), &table)
    }

    /// Record (or replace) a member's birthday and persist the table. A
    /// discriminator already stored for the member is kept.
    ///
    /// # Errors
    /// - [`CakedayError::InvalidDate`] when month/day is not a calendar date.
    /// - [`CakedayError::Persistence`] when the flush fails; the in-memory
    ///   table is left as it was.
    pub fn set(
        &self,
        venue: &str,
        user: &str,
        month: u32,
        day: u32,
        display_name: &str,
    ) -> Result<BirthdayRecord> {
        self.set_member(venue, user, month, day, display_name, None)
    }

    /// Like [`set`](Self::set), also recording the member's discriminator as
    /// reported by the platform. `None` keeps the stored one.
    ///
    /// # Errors
    /// Same as [`set`](Self::set).
    pub fn set_member(
        &self,
        venue: &str,
        user: &str,
        month: u32,
        day: u32,
        display_name: &str,
        discriminator: Option<&str>,
    ) -> Result<BirthdayRecord> {
        let date = BirthDate::new(month, day)?;

        let mut table = self.write_guard()?;
        let mut next = table.clone();
        let members = &mut next.entry(venue.to_owned()).or_default().members;
        let discriminator = match discriminator {
            Some(disc) => disc.trim().to_owned(),
            None => members
                .get(user)
                .map(|existing| existing.discriminator.clone())
                .unwrap_or_default(),
        };
        members.insert(
            user.to_owned(),
            StoredMember {
                date: date.to_short(),
                username: display_name.to_owned(),
                discriminator: discriminator.clone(),
            },
        );
        write_table(self.path.as_deref(), &next)?;
        *table = next;

        info!(venue, user, date = %date, "birthday recorded");
        Ok(BirthdayRecord {
            user_id: user.to_owned(),
            display_name: display_name.to_owned(),
            date,
            reference_year: None,
            discriminator,
        })
    }

    /// Parsed records for one venue. Unknown venues yield an empty list;
    /// malformed stored dates are logged and skipped.
    ///
    /// # Errors
    /// Returns [`CakedayError::Persistence`] if the table lock is poisoned.
    pub fn list_for(&self, venue: &str) -> Result<Vec<BirthdayRecord>> {
        let table = self.read_guard()?;
        let Some(entry) = table.get(venue) else {
            return Ok(Vec::new());
        };
        Ok(parse_members(venue, entry.members.iter()))
    }

    /// Parsed records for every venue, for the sweep.
    ///
    /// # Errors
    /// Returns [`CakedayError::Persistence`] if the table lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<VenueBirthdays>> {
        let table = self.read_guard()?;
        Ok(table
            .iter()
            .map(|(venue_id, entry)| VenueBirthdays {
                venue_id: venue_id.clone(),
                records: parse_members(venue_id, entry.members.iter()),
            })
            .collect())
    }

    /// Number of venues with at least one stored entry.
    pub fn venue_count(&self) -> usize {
        self.read_guard().map(|t| t.len()).unwrap_or(0)
    }

    /// Total stored entries across all venues, including malformed ones.
    pub fn member_count(&self) -> usize {
        self.read_guard()
            .map(|t| t.values().map(|v| v.members.len()).sum())
            .unwrap_or(0)
    }

    /// Stored entries for one venue, including malformed ones.
    pub fn raw_member_count(&self, venue: &str) -> usize {
        self.read_guard()
            .ok()
            .and_then(|t| t.get(venue).map(|v| v.members.len()))
            .unwrap_or(0)
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, VenueTable>> {
        self.table
            .read()
            .map_err(|_| CakedayError::Persistence("birthday table lock poisoned".into()))
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, VenueTable>> {
        self.table
            .write()
            .map_err(|_| CakedayError::Persistence("birthday table lock poisoned".into()))
    }
}

fn parse_members<'a>(
    venue: &str,
    members: impl Iterator<Item = (&'a String, &'a StoredMember)>,
) -> Vec<BirthdayRecord> {
    members
        .filter_map(|(user_id, member)| match member.to_record(user_id) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(venue, username = %member.username, "skipping stored birthday: {e}");
                None
            }
        })
        .collect()
}

fn read_table(path: &Path) -> Result<VenueTable> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(VenueTable::new());
        }
        Err(e) => {
            return Err(CakedayError::Persistence(format!(
                "cannot read '{}': {e}",
                path.display()
            )));
        }
    };

    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        CakedayError::Persistence(format!("cannot parse '{}': {e}", path.display()))
    })
}

fn write_table(path: Option<&Path>, table: &VenueTable) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            CakedayError::Persistence(format!(
                "cannot create '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let file = File::create(&tmp_path).map_err(|e| {
        CakedayError::Persistence(format!(
            "cannot create temp file '{}': {e}",
            tmp_path.display()
        ))
    })?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, table)
        .map_err(|e| CakedayError::Persistence(format!("cannot serialize table: {e}")))?;
    writer
        .flush()
        .map_err(|e| CakedayError::Persistence(format!("cannot write temp file: {e}")))?;
    let file = writer
        .into_inner()
        .map_err(|e| CakedayError::Persistence(format!("cannot write temp file: {e}")))?;
    file.sync_all()
        .map_err(|e| CakedayError::Persistence(format!("cannot sync temp file: {e}")))?;

    std::fs::rename(&tmp_path, path).map_err(|e| {
        CakedayError::Persistence(format!(
            "cannot rename '{}' to '{}': {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}
