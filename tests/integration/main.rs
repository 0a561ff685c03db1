//! Integration test binary: all integration tests share one binary.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod helpers;

mod birthday_flow;
mod discord_contract;
