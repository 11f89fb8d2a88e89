//! Application layer: read accessors, sync orchestration, cron jobs, and
//! the ports they depend on.

pub mod error;
pub mod jobs;
pub mod repos;
pub mod service;
pub mod source;
pub mod sync;
