//! gaffer: a caching and sync layer in front of the Fantasy Premier League
//! API.
//!
//! Reads go through a cache-aside loader over Redis with TTLs matched to
//! data volatility. A deadline scheduler invalidates gameweek data shortly
//! after each real-world deadline passes, and a cron-driven sync refreshes
//! the full cache atomically before upserting canonical entities into
//! Postgres in idempotent batches.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
