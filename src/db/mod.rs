//! Relational store: schema and per-entity queries
//!
//! The SQLite database is the system of record for services, venues,
//! taxonomy nodes and review outcomes. The search index and the remote
//! inventory service only ever hold best-effort projections of what is
//! committed here.

pub mod init;
pub mod matches;
pub mod profiles;
pub mod services;
pub mod sessions;
pub mod taxonomy;
pub mod venues;

pub use init::{connect, create_schema};
