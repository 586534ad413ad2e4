//! # lineage-core
//!
//! Domain model for the lineage metadata store: a transactional catalog of
//! the artifacts produced by ML pipelines, the executions that produced
//! them, the contexts that group them, and the edges that connect them.
//!
//! This crate is deliberately free of I/O. It defines:
//!
//! - **Property bags**: typed key/value properties declared by a type, plus
//!   untyped per-instance custom properties
//! - **Types**: user-declared schemas in one of three kinds (artifact,
//!   execution, context)
//! - **Instances**: [`Artifact`], [`Execution`] and [`Context`] records
//! - **Edges**: [`Event`] (artifact ↔ execution, with optional paths),
//!   [`Attribution`] (artifact ↔ context) and [`Association`]
//!   (execution ↔ context)
//! - **Errors**: the status taxonomy every store operation reports through
//!
//! Persistence lives in the companion `lineage-store` crate.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod edges;
pub mod error;
pub mod instances;
pub mod property;
pub mod types;

pub use edges::{Association, Attribution, Event, EventType, PathStep};
pub use error::{ErrorKind, MetadataError, Result};
pub use instances::{Artifact, Context, Execution};
pub use property::{PropertyType, PropertyValue};
pub use types::{TypeDescriptor, TypeKind};
