//! # lineage-store
//!
//! The metadata access object (MAO) for the lineage metadata store. It maps
//! the domain model of `lineage-core` onto a relational store, enforces the
//! catalog invariants, and carries the store through schema evolution.
//!
//! ## Layering
//!
//! - [`MetadataSource`]: the query-executor seam. The access object issues
//!   parameterized SQL through it and manages transactions with
//!   `begin` / `commit` / `rollback`. [`SqliteMetadataSource`] is the
//!   shipped implementation.
//! - [`registry`]: the static schema bundle of per-version DDL, upgrade and
//!   downgrade scripts, and migration verification queries.
//! - [`MetadataAccessObject`]: the facade exposing the full operation set:
//!   type / artifact / execution / context CRUD, events with paths,
//!   attributions and associations with reverse lookups, and the schema
//!   migration protocol.
//!
//! ## Transactions
//!
//! Every public operation joins an ambient transaction when the source
//! reports one open; otherwise it wraps itself in `begin` / `commit` with a
//! rollback on failure. On engines that doom the whole transaction after
//! any failed statement, a caller holding an ambient transaction must issue
//! `rollback(); begin()` before continuing past a failure.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod access;
pub mod registry;
mod source;
mod sqlite;

pub use access::MetadataAccessObject;
pub use source::{Bind, MetadataSource, RecordSet};
pub use sqlite::SqliteMetadataSource;
