//! Stored instances: artifacts, executions and contexts.
//!
//! All three share the same property-bag shape: `properties` must match the
//! declared schema of the instance's type by name and kind, while
//! `custom_properties` are free-form per-instance values the schema never
//! constrains. A custom property may even change its value kind on update.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::property::PropertyValue;

/// A produced or consumed object, addressed by a free-form URI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Store-assigned identifier; `None` until created.
    pub id: Option<i64>,
    /// Identifier of an artifact-kind type. Required on create.
    pub type_id: Option<i64>,
    /// Location of the artifact contents. Opaque to the store.
    pub uri: Option<String>,
    /// Typed properties, validated against the type schema.
    pub properties: BTreeMap<String, PropertyValue>,
    /// Untyped per-instance properties, never validated.
    pub custom_properties: BTreeMap<String, PropertyValue>,
}

/// A pipeline step that consumed and produced artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Store-assigned identifier; `None` until created.
    pub id: Option<i64>,
    /// Identifier of an execution-kind type. Required on create.
    pub type_id: Option<i64>,
    /// Typed properties, validated against the type schema.
    pub properties: BTreeMap<String, PropertyValue>,
    /// Untyped per-instance properties, never validated.
    pub custom_properties: BTreeMap<String, PropertyValue>,
}

/// A grouping of artifacts and executions: a run, an experiment, a project.
///
/// Context names are unique within their type: creating a second context
/// with the same `(type_id, name)` pair is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Store-assigned identifier; `None` until created.
    pub id: Option<i64>,
    /// Identifier of a context-kind type. Required on create.
    pub type_id: Option<i64>,
    /// Non-empty name, unique within `type_id`. Required on create.
    pub name: Option<String>,
    /// Typed properties, validated against the type schema.
    pub properties: BTreeMap<String, PropertyValue>,
    /// Untyped per-instance properties, never validated.
    pub custom_properties: BTreeMap<String, PropertyValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyType;

    #[test]
    fn default_instances_are_empty() {
        let artifact = Artifact::default();
        assert!(artifact.id.is_none());
        assert!(artifact.properties.is_empty());
        assert!(artifact.custom_properties.is_empty());
    }

    #[test]
    fn property_bags_compare_structurally() {
        let mut a = Execution::default();
        let mut b = Execution::default();
        a.properties.insert("steps".into(), 100_i64.into());
        a.properties.insert("rate".into(), 0.1.into());
        // Insertion order does not affect equality.
        b.properties.insert("rate".into(), 0.1.into());
        b.properties.insert("steps".into(), 100_i64.into());
        assert_eq!(a, b);
        assert_eq!(a.properties["steps"].kind(), PropertyType::Int);
    }

    #[test]
    fn records_round_trip_through_serde() {
        let artifact = Artifact {
            id: Some(7),
            type_id: Some(1),
            uri: Some("s3://models/run-1".into()),
            properties: BTreeMap::from([("steps".to_string(), PropertyValue::Int(100))]),
            custom_properties: BTreeMap::from([(
                "stage".to_string(),
                PropertyValue::String("prod".into()),
            )]),
        };
        let json = serde_json::to_string(&artifact).unwrap();
        let decoded: Artifact = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, artifact);
    }
}
