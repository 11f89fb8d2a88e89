//! Infrastructure adapters: Redis store, Postgres repositories, the
//! upstream HTTP client, telemetry, and the HTTP surface.

pub mod db;
pub mod error;
pub mod http;
pub mod redis;
pub mod telemetry;
pub mod upstream;
