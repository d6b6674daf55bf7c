//! # Tabvault Architecture
//!
//! Tabvault keeps the last few uploaded tabular files (spreadsheets, CSVs) and
//! their parsed rows on disk, and serves them back by id or by recency. It is
//! a library first; the `tabvault` binary is one client of it.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (main.rs, args.rs, cli/)                               │
//! │  - Parses arguments, prints results, owns exit codes        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API (api.rs)                                               │
//! │  - Thin facade: string ids → RecordId, defaults applied     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Commands (commands/*.rs)                                   │
//! │  - One module per operation, returns CmdResult              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage (store/)                                           │
//! │  - MetadataStore over PayloadStore, BackupIndex and a       │
//! │    PrimaryIndex (redb, in-memory, or none)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Model
//!
//! The primary index is allowed to disappear. Writes still succeed against
//! the backup index and reads fall back to it; `doctor` brings the two back in
//! line afterwards. Local filesystem errors, on the other hand, fail the
//! operation in progress and surface as [`error::TabvaultError::Io`].
//!
//! ## Logging
//!
//! Library code logs through `tracing` only and never prints. The binary
//! installs the subscriber.
//!
//! ## Module Overview
//!
//! - [`api`]: The facade, entry point for all operations
//! - [`commands`]: Business logic for each operation
//! - [`store`]: Payload files, the two indexes and the orchestrator
//! - [`model`]: Core data types (`RecordId`, `RecordSummary`, `Record`)
//! - [`validation`]: Upload limits and their error messages
//! - [`config`]: Configuration management
//! - [`error`]: Error types

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_utils;
