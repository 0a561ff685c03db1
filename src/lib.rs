//! Cakeday: a chat bot that remembers community birthdays.
//!
//! Members register their birthday with a chat command. The bot keeps one
//! birthday table per venue (a Discord guild), persists it as JSON after
//! every change, and once a day sweeps the table to celebrate whoever's
//! birthday it is: a scheduled celebration entry on the platform plus an
//! announcement message.
//!
//! # Architecture
//!
//! - **Birthdays** ([`birthday`]): validated dates, due-date arithmetic and
//!   the persisted store
//! - **Celebration** ([`celebration`]): idempotent entry creation and
//!   announcements through a [`channels::traits::ChatPlatform`]
//! - **Scheduler** ([`scheduler`]): the periodic sweep with a same-day
//!   dedupe ledger
//! - **Commands** ([`commands`]): `setbirthday`, `listbirthdays`, `ping`,
//!   `checkbirthdays`
//! - **Channels** ([`channels`]): the Discord adapter and the inbound
//!   command runtime

pub mod birthday;
pub mod cakeday_dirs;
pub mod celebration;
pub mod channels;
pub mod commands;
pub mod config;
pub mod error;
pub mod scheduler;

pub use birthday::{BirthDate, BirthdayRecord, BirthdayStore};
pub use celebration::CelebrationNotifier;
pub use commands::CommandServices;
pub use config::CakedayConfig;
pub use error::{CakedayError, Result};
pub use scheduler::{BirthdaySweeper, SweepReport};
