//! User-declared type schemas.
//!
//! Clients register a [`TypeDescriptor`] per kind of instance they intend to
//! store, then create instances against it. Type names are unique within a
//! kind, so an artifact type and an execution type may share a name without
//! conflict.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::property::PropertyType;

/// The kind of instance a type describes.
///
/// The integer codes are stable and persisted in the `Type.type_kind`
/// column; do not renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    /// A pipeline step: a trainer run, an evaluation, a data ingestion.
    Execution,
    /// A produced or consumed object addressed by URI: a model, a dataset.
    Artifact,
    /// A grouping of instances: a run, an experiment, a project.
    Context,
}

impl TypeKind {
    /// Stable integer code used in persisted rows.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Execution => 0,
            Self::Artifact => 1,
            Self::Context => 2,
        }
    }

    /// Decodes a persisted integer code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Execution),
            1 => Some(Self::Artifact),
            2 => Some(Self::Context),
            _ => None,
        }
    }

    /// Human-readable label used in error messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Execution => "execution type",
            Self::Artifact => "artifact type",
            Self::Context => "context type",
        }
    }
}

/// A user-declared schema for one kind of instance.
///
/// `properties` maps property names to their declared data types. The
/// [`PropertyType::Unknown`] sentinel is rejected on create and update.
///
/// Execution-kind types may additionally carry `input_signature` and
/// `output_signature`: serialized descriptions of the step's I/O contract.
/// The store treats them as opaque blobs and returns them byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Store-assigned identifier; `None` until created.
    pub id: Option<i64>,
    /// Non-empty name, unique within `kind`.
    pub name: String,
    /// Which kind of instance this type describes.
    pub kind: TypeKind,
    /// Declared property schema.
    pub properties: BTreeMap<String, PropertyType>,
    /// Opaque serialized input signature (execution kinds only).
    pub input_signature: Option<String>,
    /// Opaque serialized output signature (execution kinds only).
    pub output_signature: Option<String>,
}

impl TypeDescriptor {
    /// Creates an empty descriptor with the given name and kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind,
            properties: BTreeMap::new(),
            input_signature: None,
            output_signature: None,
        }
    }

    /// Adds a declared property, builder-style.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, data_type: PropertyType) -> Self {
        self.properties.insert(name.into(), data_type);
        self
    }
}
