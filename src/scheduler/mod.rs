//! Birthday sweep scheduling.
//!
//! [`run_sweep`] scans the table once; [`BirthdaySweeper`] drives it from a
//! periodic timer and from the manual `checkbirthdays` command.

pub mod runner;
pub mod sweep;

pub use runner::{BirthdaySweeper, Clock, SweepState};
pub use sweep::{RunLedger, SweepReport, run_sweep};
