//! Edges between stored instances.
//!
//! - [`Event`]: a typed edge between an artifact and an execution, with an
//!   optional structured path into the execution's I/O signature
//! - [`Attribution`]: an artifact belongs to a context
//! - [`Association`]: an execution belongs to a context
//!
//! Attribution and association pairs are unique; events are not.

use serde::{Deserialize, Serialize};

/// The role an artifact played in an execution.
///
/// The integer codes are stable and persisted in the `Event.type` column;
/// do not renumber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// Sentinel for an unset event type. Never storable.
    #[default]
    Unknown,
    /// An output declared by the execution's signature.
    DeclaredOutput,
    /// An input declared by the execution's signature.
    DeclaredInput,
    /// An artifact read by the execution.
    Input,
    /// An artifact produced by the execution.
    Output,
}

impl EventType {
    /// Stable integer code used in persisted rows.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::DeclaredOutput => 1,
            Self::DeclaredInput => 2,
            Self::Input => 3,
            Self::Output => 4,
        }
    }

    /// Decodes a persisted integer code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::DeclaredOutput),
            2 => Some(Self::DeclaredInput),
            3 => Some(Self::Input),
            4 => Some(Self::Output),
            _ => None,
        }
    }
}

/// One step of an event path: either a positional index into a repeated
/// field of the signature, or a key into a named field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathStep {
    /// Positional step.
    Index(i64),
    /// Named step.
    Key(String),
}

/// A typed edge recording that an execution consumed or produced an
/// artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Store-assigned identifier; `None` until created.
    pub id: Option<i64>,
    /// Identifier of the artifact endpoint. Required on create.
    pub artifact_id: Option<i64>,
    /// Identifier of the execution endpoint. Required on create.
    pub execution_id: Option<i64>,
    /// The role of the artifact in the execution. Required on create;
    /// [`EventType::Unknown`] counts as missing.
    pub event_type: EventType,
    /// Optional structured path, preserved in order.
    pub path: Vec<PathStep>,
    /// Wall-clock time of the event. Assigned by the store on create when
    /// absent, and retained on read-back.
    pub milliseconds_since_epoch: Option<i64>,
}

/// An edge recording that an artifact belongs to a context. Unique per
/// `(artifact_id, context_id)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    /// Identifier of the artifact endpoint. Required on create.
    pub artifact_id: Option<i64>,
    /// Identifier of the context endpoint. Required on create.
    pub context_id: Option<i64>,
}

/// An edge recording that an execution belongs to a context. Unique per
/// `(execution_id, context_id)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// Identifier of the execution endpoint. Required on create.
    pub execution_id: Option<i64>,
    /// Identifier of the context endpoint. Required on create.
    pub context_id: Option<i64>,
}
