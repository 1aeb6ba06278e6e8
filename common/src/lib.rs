//! # fleetr common
//!
//! Shared building blocks for the `fleetr` workspace.
//!
//! * **[`identity`]**: typed device and account identifiers, and the records built from them.
//! * **[`merge_set`]**: the identity-merging collection that deduplicates partial records.
//! * **[`attachment`]**: the device to IPv4 binding exchanged with the assignment store.
//! * **[`network`]**: MAC and IPv4 parsing helpers.
//! * **[`config`]**: runtime configuration shared by the CLI and the core.

pub mod attachment;
pub mod config;
pub mod identity;
pub mod log;
pub mod merge_set;
pub mod network;
