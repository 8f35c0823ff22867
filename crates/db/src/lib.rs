//! SQLite storage for the build pipeline.
//!
//! # Architecture
//! Three tables, each owned by the one above it:
//! - **packages**: one row per source repository URL. Only the analysis
//!   status and timestamps change after ingestion.
//! - **versions**: the reconciled tags of a package. Replaced wholesale on
//!   every reconciliation, then updated in place with manifest data.
//! - **builds**: at most one row per (version, platform, toolchain version),
//!   the key the build matrix uses to find missing coverage.
//!
//! Deleting a package cascades to its versions, and a version to its builds.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::repo::Repository;
