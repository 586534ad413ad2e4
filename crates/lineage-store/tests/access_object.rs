//! End-to-end tests for the metadata access object over a real SQLite
//! source: type registration and evolution, instance lifecycles, events
//! with paths, and context membership edges.

use std::collections::BTreeMap;

use lineage_core::{
    Artifact, Association, Attribution, Context, ErrorKind, Event, EventType, Execution,
    PathStep, PropertyType, PropertyValue, TypeDescriptor, TypeKind,
};
use lineage_store::{MetadataAccessObject, MetadataSource, SqliteMetadataSource};

fn open_store() -> MetadataAccessObject<SqliteMetadataSource> {
    let source = SqliteMetadataSource::new_in_memory().unwrap();
    let mao = MetadataAccessObject::new(source);
    mao.init_metadata_source_if_not_exists(false).unwrap();
    mao
}

fn props(entries: &[(&str, PropertyValue)]) -> BTreeMap<String, PropertyValue> {
    entries
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}

#[test]
fn init_reports_library_version() {
    let mao = open_store();
    assert_eq!(mao.schema_version().unwrap(), mao.library_version());
}

#[test]
fn init_is_idempotent_and_preserves_records() {
    let mao = open_store();
    let type_id = mao
        .create_type(&TypeDescriptor::new("dataset", TypeKind::Artifact))
        .unwrap();

    mao.init_metadata_source_if_not_exists(false).unwrap();
    let found = mao.find_type_by_id(type_id, TypeKind::Artifact).unwrap();
    assert_eq!(found.name, "dataset");
}

// -- types ------------------------------------------------------------------

#[test]
fn type_names_are_scoped_to_kind() {
    let mao = open_store();
    let artifact_id = mao
        .create_type(&TypeDescriptor::new("trainer", TypeKind::Artifact))
        .unwrap();
    let execution_id = mao
        .create_type(&TypeDescriptor::new("trainer", TypeKind::Execution))
        .unwrap();
    let context_id = mao
        .create_type(&TypeDescriptor::new("trainer", TypeKind::Context))
        .unwrap();

    assert_ne!(artifact_id, execution_id);
    assert_ne!(artifact_id, context_id);
    assert_ne!(execution_id, context_id);

    // A type id exists in exactly one kind.
    let err = mao
        .find_type_by_id(artifact_id, TypeKind::Execution)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = mao
        .find_type_by_id(execution_id, TypeKind::Context)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn create_type_round_trips_through_both_lookups() {
    let mao = open_store();
    let mut want = TypeDescriptor::new("model", TypeKind::Artifact)
        .with_property("training_steps", PropertyType::Int)
        .with_property("learning_rate", PropertyType::Double)
        .with_property("optimizer", PropertyType::String);
    let type_id = mao.create_type(&want).unwrap();
    want.id = Some(type_id);

    assert_eq!(mao.find_type_by_id(type_id, TypeKind::Artifact).unwrap(), want);
    assert_eq!(
        mao.find_type_by_name("model", TypeKind::Artifact).unwrap(),
        want
    );

    let mut context_type = TypeDescriptor::new("experiment", TypeKind::Context)
        .with_property("objective", PropertyType::String);
    let context_type_id = mao.create_type(&context_type).unwrap();
    context_type.id = Some(context_type_id);
    assert_eq!(
        mao.find_type_by_id(context_type_id, TypeKind::Context).unwrap(),
        context_type
    );
}

#[test]
fn execution_type_keeps_signature_blobs() {
    let mao = open_store();
    let mut want = TypeDescriptor::new("trainer", TypeKind::Execution)
        .with_property("epochs", PropertyType::Int);
    want.input_signature = Some(serde_json::json!({ "any": {} }).to_string());
    want.output_signature = Some(serde_json::json!({ "none": {} }).to_string());
    let type_id = mao.create_type(&want).unwrap();
    want.id = Some(type_id);

    let found = mao.find_type_by_id(type_id, TypeKind::Execution).unwrap();
    assert_eq!(found, want);

    // Signatures are optional.
    let mut bare = TypeDescriptor::new("evaluator", TypeKind::Execution);
    let bare_id = mao.create_type(&bare).unwrap();
    bare.id = Some(bare_id);
    assert_eq!(mao.find_type_by_id(bare_id, TypeKind::Execution).unwrap(), bare);
}

#[test]
fn create_type_rejects_bad_input() {
    let mao = open_store();
    let err = mao
        .create_type(&TypeDescriptor::new("", TypeKind::Artifact))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = mao
        .create_type(
            &TypeDescriptor::new("model", TypeKind::Artifact)
                .with_property("training_steps", PropertyType::Unknown),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn create_type_rejects_duplicate_name_within_kind() {
    let mao = open_store();
    mao.create_type(&TypeDescriptor::new("model", TypeKind::Artifact))
        .unwrap();
    let err = mao
        .create_type(&TypeDescriptor::new("model", TypeKind::Artifact))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[test]
fn update_type_is_additive_over_properties() {
    let mao = open_store();
    let type_id = mao
        .create_type(
            &TypeDescriptor::new("model", TypeKind::Artifact)
                .with_property("stored_property", PropertyType::String),
        )
        .unwrap();

    // The update omits the stored property and only brings a new one.
    mao.update_type(
        &TypeDescriptor::new("model", TypeKind::Artifact)
            .with_property("new_property", PropertyType::Int),
    )
    .unwrap();

    let found = mao.find_type_by_name("model", TypeKind::Artifact).unwrap();
    assert_eq!(found.id, Some(type_id));
    assert_eq!(found.properties.len(), 2);
    assert_eq!(found.properties["stored_property"], PropertyType::String);
    assert_eq!(found.properties["new_property"], PropertyType::Int);

    // Applying the same update again changes nothing.
    mao.update_type(
        &TypeDescriptor::new("model", TypeKind::Artifact)
            .with_property("new_property", PropertyType::Int),
    )
    .unwrap();
    assert_eq!(mao.find_type_by_name("model", TypeKind::Artifact).unwrap(), found);
}

#[test]
fn update_type_rejects_conflicts() {
    let mao = open_store();
    let type_id = mao
        .create_type(
            &TypeDescriptor::new("model", TypeKind::Artifact)
                .with_property("stored_property", PropertyType::String),
        )
        .unwrap();

    // Missing name.
    let err = mao
        .update_type(&TypeDescriptor::new("", TypeKind::Artifact))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Id disagreeing with the stored type.
    let mut wrong_id = TypeDescriptor::new("model", TypeKind::Artifact);
    wrong_id.id = Some(type_id + 1);
    let err = mao.update_type(&wrong_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Retyping a stored property.
    let mut retyped = TypeDescriptor::new("model", TypeKind::Artifact)
        .with_property("stored_property", PropertyType::Int);
    retyped.id = Some(type_id);
    let err = mao.update_type(&retyped).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    // Declaring a property without a data type.
    let err = mao
        .update_type(
            &TypeDescriptor::new("model", TypeKind::Artifact)
                .with_property("new_property", PropertyType::Unknown),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn find_types_returns_only_the_requested_kind() {
    let mao = open_store();
    let mut model = TypeDescriptor::new("model", TypeKind::Artifact)
        .with_property("training_steps", PropertyType::Int);
    model.id = Some(mao.create_type(&model).unwrap());
    let mut dataset = TypeDescriptor::new("dataset", TypeKind::Artifact);
    dataset.id = Some(mao.create_type(&dataset).unwrap());
    mao.create_type(&TypeDescriptor::new("trainer", TypeKind::Execution))
        .unwrap();

    let got = mao.find_types(TypeKind::Artifact).unwrap();
    assert_eq!(got, vec![model, dataset]);
    assert_eq!(mao.find_types(TypeKind::Context).unwrap(), vec![]);
}

#[test]
fn unicode_round_trips() {
    let mao = open_store();
    let mut want = TypeDescriptor::new("пример_типа", TypeKind::Execution)
        .with_property("привет", PropertyType::Int);
    want.input_signature = Some(serde_json::json!({ "пример": { "any": {} } }).to_string());
    let type_id = mao.create_type(&want).unwrap();
    want.id = Some(type_id);

    assert_eq!(mao.find_type_by_id(type_id, TypeKind::Execution).unwrap(), want);
    assert_eq!(
        mao.find_type_by_name("пример_типа", TypeKind::Execution).unwrap(),
        want
    );
}

// -- artifacts --------------------------------------------------------------

#[test]
fn artifact_ids_are_assigned_from_one() {
    let mao = open_store();
    let type_id = mao
        .create_type(&TypeDescriptor::new("model", TypeKind::Artifact))
        .unwrap();
    let artifact = Artifact {
        type_id: Some(type_id),
        uri: Some("s3://models/run".to_string()),
        custom_properties: props(&[
            ("accuracy", PropertyValue::Double(0.91)),
            ("labeled", PropertyValue::Int(1)),
            ("stage", PropertyValue::String("eval".to_string())),
        ]),
        ..Artifact::default()
    };

    assert_eq!(mao.create_artifact(&artifact).unwrap(), 1);
    assert_eq!(mao.create_artifact(&artifact).unwrap(), 2);
}

#[test]
fn artifact_round_trips_with_typed_and_custom_properties() {
    let mao = open_store();
    let type_id = mao
        .create_type(
            &TypeDescriptor::new("model", TypeKind::Artifact)
                .with_property("training_steps", PropertyType::Int)
                .with_property("learning_rate", PropertyType::Double)
                .with_property("optimizer", PropertyType::String),
        )
        .unwrap();

    let mut want = Artifact {
        type_id: Some(type_id),
        uri: Some("s3://models/run-1".to_string()),
        properties: props(&[
            ("training_steps", PropertyValue::Int(100)),
            ("learning_rate", PropertyValue::Double(0.01)),
            ("optimizer", PropertyValue::String("sgd".to_string())),
        ]),
        custom_properties: props(&[("accuracy", PropertyValue::String("0.9".to_string()))]),
        ..Artifact::default()
    };
    let id = mao.create_artifact(&want).unwrap();
    want.id = Some(id);

    assert_eq!(mao.find_artifact_by_id(id).unwrap(), want);
}

#[test]
fn create_artifact_rejects_bad_input() {
    let mao = open_store();

    // No type_id.
    let err = mao.create_artifact(&Artifact::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Nonexistent type.
    let orphan = Artifact {
        type_id: Some(1),
        ..Artifact::default()
    };
    let err = mao.create_artifact(&orphan).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let type_id = mao
        .create_type(
            &TypeDescriptor::new("model", TypeKind::Artifact)
                .with_property("training_steps", PropertyType::Int),
        )
        .unwrap();

    // Value kind disagreeing with the declaration.
    let mismatched = Artifact {
        type_id: Some(type_id),
        properties: props(&[("training_steps", PropertyValue::String("3".to_string()))]),
        ..Artifact::default()
    };
    let err = mao.create_artifact(&mismatched).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Undeclared property name.
    let undeclared = Artifact {
        type_id: Some(type_id),
        properties: props(&[("epochs", PropertyValue::Int(3))]),
        ..Artifact::default()
    };
    let err = mao.create_artifact(&undeclared).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn artifact_update_replaces_the_property_set() {
    let mao = open_store();
    let type_id = mao
        .create_type(
            &TypeDescriptor::new("model", TypeKind::Artifact)
                .with_property("training_steps", PropertyType::Int)
                .with_property("learning_rate", PropertyType::Double)
                .with_property("optimizer", PropertyType::String),
        )
        .unwrap();

    let stored = Artifact {
        type_id: Some(type_id),
        uri: Some("s3://models/run-1".to_string()),
        properties: props(&[
            ("training_steps", PropertyValue::Int(100)),
            ("optimizer", PropertyValue::String("sgd".to_string())),
        ]),
        custom_properties: props(&[("epoch", PropertyValue::String("5".to_string()))]),
        ..Artifact::default()
    };
    let id = mao.create_artifact(&stored).unwrap();

    // Update a property, add one, drop one, and change the custom
    // property's value kind.
    let want = Artifact {
        id: Some(id),
        type_id: Some(type_id),
        uri: Some("s3://models/run-1-updated".to_string()),
        properties: props(&[
            ("training_steps", PropertyValue::Int(200)),
            ("learning_rate", PropertyValue::Double(0.001)),
        ]),
        custom_properties: props(&[("epoch", PropertyValue::Int(5))]),
        ..Artifact::default()
    };
    mao.update_artifact(&want).unwrap();

    assert_eq!(mao.find_artifact_by_id(id).unwrap(), want);

    let by_uri = mao
        .find_artifacts_by_uri("s3://models/run-1-updated")
        .unwrap();
    assert_eq!(by_uri, vec![want]);
    assert_eq!(mao.find_artifacts_by_uri("s3://models/run-1").unwrap(), vec![]);
}

#[test]
fn artifact_update_rejects_bad_input() {
    let mao = open_store();
    let type_id = mao
        .create_type(
            &TypeDescriptor::new("model", TypeKind::Artifact)
                .with_property("training_steps", PropertyType::Int),
        )
        .unwrap();
    let id = mao
        .create_artifact(&Artifact {
            type_id: Some(type_id),
            ..Artifact::default()
        })
        .unwrap();

    // No id.
    let err = mao.update_artifact(&Artifact::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Unknown id reports a malformed request, not a failed lookup.
    let unknown = Artifact {
        id: Some(id + 1),
        ..Artifact::default()
    };
    let err = mao.update_artifact(&unknown).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // type_id disagreeing with the stored row.
    let retyped = Artifact {
        id: Some(id),
        type_id: Some(type_id + 1),
        ..Artifact::default()
    };
    let err = mao.update_artifact(&retyped).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Undeclared property.
    let undeclared = Artifact {
        id: Some(id),
        properties: props(&[("epochs", PropertyValue::Int(1))]),
        ..Artifact::default()
    };
    let err = mao.update_artifact(&undeclared).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn artifacts_are_listed_by_type_and_in_creation_order() {
    let mao = open_store();
    let type_id = mao
        .create_type(&TypeDescriptor::new("model", TypeKind::Artifact))
        .unwrap();
    let other_type_id = mao
        .create_type(&TypeDescriptor::new("dataset", TypeKind::Artifact))
        .unwrap();

    let mut first = Artifact {
        type_id: Some(type_id),
        uri: Some("s3://models/a".to_string()),
        ..Artifact::default()
    };
    first.id = Some(mao.create_artifact(&first).unwrap());
    let mut second = Artifact {
        type_id: Some(type_id),
        uri: Some("s3://models/b".to_string()),
        ..Artifact::default()
    };
    second.id = Some(mao.create_artifact(&second).unwrap());
    let mut dataset = Artifact {
        type_id: Some(other_type_id),
        ..Artifact::default()
    };
    dataset.id = Some(mao.create_artifact(&dataset).unwrap());

    assert_eq!(
        mao.find_artifacts().unwrap(),
        vec![first.clone(), second.clone(), dataset]
    );
    assert_eq!(
        mao.find_artifacts_by_type_id(type_id).unwrap(),
        vec![first, second]
    );
}

// -- executions -------------------------------------------------------------

#[test]
fn execution_round_trips_and_lists_by_type() {
    let mao = open_store();
    let type_id = mao
        .create_type(
            &TypeDescriptor::new("trainer", TypeKind::Execution)
                .with_property("training_steps", PropertyType::Int)
                .with_property("optimizer", PropertyType::String),
        )
        .unwrap();
    let bare_type_id = mao
        .create_type(&TypeDescriptor::new("evaluator", TypeKind::Execution))
        .unwrap();

    let mut first = Execution {
        type_id: Some(type_id),
        properties: props(&[
            ("training_steps", PropertyValue::Int(100)),
            ("optimizer", PropertyValue::String("adam".to_string())),
        ]),
        custom_properties: props(&[("attempt", PropertyValue::Int(3))]),
        ..Execution::default()
    };
    first.id = Some(mao.create_execution(&first).unwrap());

    let mut second = Execution {
        type_id: Some(bare_type_id),
        ..Execution::default()
    };
    second.id = Some(mao.create_execution(&second).unwrap());
    assert_ne!(first.id, second.id);

    assert_eq!(mao.find_execution_by_id(first.id.unwrap()).unwrap(), first);
    assert_eq!(mao.find_execution_by_id(second.id.unwrap()).unwrap(), second);
    assert_eq!(mao.find_executions().unwrap(), vec![first.clone(), second]);
    assert_eq!(mao.find_executions_by_type_id(type_id).unwrap(), vec![first]);
}

#[test]
fn execution_update_replaces_the_property_set() {
    let mao = open_store();
    let type_id = mao
        .create_type(
            &TypeDescriptor::new("trainer", TypeKind::Execution)
                .with_property("training_steps", PropertyType::Int)
                .with_property("optimizer", PropertyType::String),
        )
        .unwrap();

    let stored = Execution {
        type_id: Some(type_id),
        properties: props(&[("optimizer", PropertyValue::String("sgd".to_string()))]),
        custom_properties: props(&[("attempt", PropertyValue::String("5".to_string()))]),
        ..Execution::default()
    };
    let id = mao.create_execution(&stored).unwrap();

    let want = Execution {
        id: Some(id),
        type_id: Some(type_id),
        properties: props(&[
            ("training_steps", PropertyValue::Int(500)),
            ("optimizer", PropertyValue::String("adam".to_string())),
        ]),
        ..Execution::default()
    };
    mao.update_execution(&want).unwrap();
    assert_eq!(mao.find_execution_by_id(id).unwrap(), want);
}

// -- contexts ---------------------------------------------------------------

#[test]
fn context_round_trips_and_finds_by_type_and_name() {
    let mao = open_store();
    let type_id = mao
        .create_type(
            &TypeDescriptor::new("experiment", TypeKind::Context)
                .with_property("objective", PropertyType::String),
        )
        .unwrap();
    let bare_type_id = mao
        .create_type(&TypeDescriptor::new("project", TypeKind::Context))
        .unwrap();

    let mut first = Context {
        type_id: Some(type_id),
        name: Some("tune-lr".to_string()),
        properties: props(&[("objective", PropertyValue::String("loss".to_string()))]),
        custom_properties: props(&[("owner", PropertyValue::String("mlops".to_string()))]),
        ..Context::default()
    };
    first.id = Some(mao.create_context(&first).unwrap());

    let mut second = Context {
        type_id: Some(bare_type_id),
        name: Some("vision".to_string()),
        ..Context::default()
    };
    second.id = Some(mao.create_context(&second).unwrap());
    assert_ne!(first.id, second.id);

    assert_eq!(mao.find_context_by_id(first.id.unwrap()).unwrap(), first);
    assert_eq!(mao.find_contexts().unwrap(), vec![first.clone(), second.clone()]);
    assert_eq!(
        mao.find_contexts_by_type_id(bare_type_id).unwrap(),
        vec![second.clone()]
    );
    assert_eq!(
        mao.find_context_by_type_id_and_name(type_id, "tune-lr").unwrap(),
        first
    );
    assert_eq!(
        mao.find_context_by_type_id_and_name(bare_type_id, "vision").unwrap(),
        second
    );

    // The name lookup is scoped to the type.
    let err = mao
        .find_context_by_type_id_and_name(type_id, "vision")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn create_context_rejects_bad_input() {
    let mao = open_store();

    let err = mao.create_context(&Context::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let orphan = Context {
        type_id: Some(1),
        name: Some("run".to_string()),
        ..Context::default()
    };
    let err = mao.create_context(&orphan).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let type_id = mao
        .create_type(
            &TypeDescriptor::new("experiment", TypeKind::Context)
                .with_property("objective", PropertyType::Int),
        )
        .unwrap();

    // Value kind disagreeing with the declaration.
    let mismatched = Context {
        type_id: Some(type_id),
        name: Some("run".to_string()),
        properties: props(&[("objective", PropertyValue::String("3".to_string()))]),
        ..Context::default()
    };
    let err = mao.create_context(&mismatched).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Missing name.
    let unnamed = Context {
        type_id: Some(type_id),
        properties: props(&[("objective", PropertyValue::Int(3))]),
        ..Context::default()
    };
    let err = mao.create_context(&unnamed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn duplicate_context_name_requires_rollback_then_begin() {
    let mao = open_store();

    // The caller owns an ambient transaction, as a host serving multiple
    // operations per transaction would.
    mao.source().begin().unwrap();
    let type_id = mao
        .create_type(&TypeDescriptor::new("experiment", TypeKind::Context))
        .unwrap();
    let context = Context {
        type_id: Some(type_id),
        name: Some("tune-lr".to_string()),
        ..Context::default()
    };
    mao.create_context(&context).unwrap();

    let err = mao.create_context(&context).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    // After the failure the transaction is doomed; the caller resumes with
    // an explicit rollback-begin pair, losing the uncommitted work.
    mao.source().rollback().unwrap();
    mao.source().begin().unwrap();

    let type_id = mao
        .create_type(&TypeDescriptor::new("experiment", TypeKind::Context))
        .unwrap();
    let context = Context {
        type_id: Some(type_id),
        name: Some("tune-lr".to_string()),
        ..Context::default()
    };
    mao.create_context(&context).unwrap();
    mao.source().commit().unwrap();
}

#[test]
fn context_update_can_rename_and_rewrite_properties() {
    let mao = open_store();
    let type_id = mao
        .create_type(
            &TypeDescriptor::new("experiment", TypeKind::Context)
                .with_property("objective", PropertyType::Int)
                .with_property("notes", PropertyType::String),
        )
        .unwrap();

    let stored = Context {
        type_id: Some(type_id),
        name: Some("before-rename".to_string()),
        properties: props(&[("objective", PropertyValue::Int(2))]),
        custom_properties: props(&[("owner", PropertyValue::String("mlops".to_string()))]),
        ..Context::default()
    };
    let id = mao.create_context(&stored).unwrap();

    let want = Context {
        id: Some(id),
        type_id: Some(type_id),
        name: Some("after-rename".to_string()),
        properties: props(&[
            ("objective", PropertyValue::Int(5)),
            ("notes", PropertyValue::String("second sweep".to_string())),
        ]),
        ..Context::default()
    };
    mao.update_context(&want).unwrap();
    assert_eq!(mao.find_context_by_id(id).unwrap(), want);
}

#[test]
fn update_context_rejects_empty_name() {
    let mao = open_store();
    let type_id = mao
        .create_type(&TypeDescriptor::new("experiment", TypeKind::Context))
        .unwrap();
    let id = mao
        .create_context(&Context {
            type_id: Some(type_id),
            name: Some("tune-lr".to_string()),
            ..Context::default()
        })
        .unwrap();

    // Updates replace the name wholesale, so omitting it is a malformed
    // request, not a request to keep the stored one.
    let unnamed = Context {
        id: Some(id),
        type_id: Some(type_id),
        ..Context::default()
    };
    let err = mao.update_context(&unnamed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let blank = Context {
        id: Some(id),
        type_id: Some(type_id),
        name: Some(String::new()),
        ..Context::default()
    };
    let err = mao.update_context(&blank).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // The stored context is untouched.
    let stored = mao.find_context_by_id(id).unwrap();
    assert_eq!(stored.name.as_deref(), Some("tune-lr"));
}

// -- events -----------------------------------------------------------------

struct EventFixture {
    input_artifact_id: i64,
    output_artifact_id: i64,
    execution_id: i64,
}

fn event_fixture(mao: &MetadataAccessObject<SqliteMetadataSource>) -> EventFixture {
    let artifact_type_id = mao
        .create_type(&TypeDescriptor::new("model", TypeKind::Artifact))
        .unwrap();
    let execution_type_id = mao
        .create_type(&TypeDescriptor::new("trainer", TypeKind::Execution))
        .unwrap();
    let input_artifact_id = mao
        .create_artifact(&Artifact {
            type_id: Some(artifact_type_id),
            ..Artifact::default()
        })
        .unwrap();
    let output_artifact_id = mao
        .create_artifact(&Artifact {
            type_id: Some(artifact_type_id),
            ..Artifact::default()
        })
        .unwrap();
    let execution_id = mao
        .create_execution(&Execution {
            type_id: Some(execution_type_id),
            ..Execution::default()
        })
        .unwrap();
    EventFixture {
        input_artifact_id,
        output_artifact_id,
        execution_id,
    }
}

#[test]
fn event_round_trips_with_its_path() {
    let mao = open_store();
    let fixture = event_fixture(&mao);

    let mut want = Event {
        artifact_id: Some(fixture.input_artifact_id),
        execution_id: Some(fixture.execution_id),
        event_type: EventType::Input,
        path: vec![PathStep::Index(1), PathStep::Key("key".to_string())],
        milliseconds_since_epoch: Some(12345),
        ..Event::default()
    };
    let event_id = mao.create_event(&want).unwrap();
    want.id = Some(event_id);

    let got = mao
        .find_events_by_artifact(fixture.input_artifact_id)
        .unwrap();
    assert_eq!(got, vec![want]);
}

#[test]
fn event_without_timestamp_gets_one_and_keeps_it() {
    let mao = open_store();
    let fixture = event_fixture(&mao);

    let event = Event {
        artifact_id: Some(fixture.output_artifact_id),
        execution_id: Some(fixture.execution_id),
        event_type: EventType::Output,
        ..Event::default()
    };
    mao.create_event(&event).unwrap();

    let got = mao
        .find_events_by_artifact(fixture.output_artifact_id)
        .unwrap();
    assert_eq!(got.len(), 1);
    let assigned = got[0].milliseconds_since_epoch.unwrap();
    assert!(assigned > 0);

    // The assigned timestamp is stable across reads.
    let again = mao
        .find_events_by_artifact(fixture.output_artifact_id)
        .unwrap();
    assert_eq!(again[0].milliseconds_since_epoch, Some(assigned));
}

#[test]
fn events_are_queryable_from_both_endpoints() {
    let mao = open_store();
    let fixture = event_fixture(&mao);

    let mut input_event = Event {
        artifact_id: Some(fixture.input_artifact_id),
        execution_id: Some(fixture.execution_id),
        event_type: EventType::Input,
        path: vec![PathStep::Index(1), PathStep::Key("key".to_string())],
        milliseconds_since_epoch: Some(12345),
        ..Event::default()
    };
    input_event.id = Some(mao.create_event(&input_event).unwrap());

    let mut output_event = Event {
        artifact_id: Some(fixture.output_artifact_id),
        execution_id: Some(fixture.execution_id),
        event_type: EventType::Output,
        path: vec![PathStep::Index(2), PathStep::Key("output_key".to_string())],
        milliseconds_since_epoch: Some(23456),
        ..Event::default()
    };
    output_event.id = Some(mao.create_event(&output_event).unwrap());
    assert_ne!(input_event.id, output_event.id);

    assert_eq!(
        mao.find_events_by_artifact(fixture.input_artifact_id).unwrap(),
        vec![input_event.clone()]
    );
    assert_eq!(
        mao.find_events_by_artifact(fixture.output_artifact_id).unwrap(),
        vec![output_event.clone()]
    );
    assert_eq!(
        mao.find_events_by_execution(fixture.execution_id).unwrap(),
        vec![input_event, output_event]
    );
}

#[test]
fn create_event_rejects_bad_input() {
    let mao = open_store();

    // No artifact id.
    let err = mao.create_event(&Event::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // No execution id.
    let event = Event {
        artifact_id: Some(1),
        ..Event::default()
    };
    let err = mao.create_event(&event).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // No event type.
    let event = Event {
        artifact_id: Some(1),
        execution_id: Some(1),
        ..Event::default()
    };
    let err = mao.create_event(&event).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Nonexistent execution endpoint.
    let fixture = event_fixture(&mao);
    let event = Event {
        artifact_id: Some(fixture.input_artifact_id),
        execution_id: Some(12345),
        event_type: EventType::Input,
        ..Event::default()
    };
    let err = mao.create_event(&event).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

// -- attributions and associations ------------------------------------------

#[test]
fn association_links_executions_and_contexts() {
    let mao = open_store();
    let execution_type_id = mao
        .create_type(&TypeDescriptor::new("trainer", TypeKind::Execution))
        .unwrap();
    let context_type_id = mao
        .create_type(&TypeDescriptor::new("experiment", TypeKind::Context))
        .unwrap();

    let mut execution = Execution {
        type_id: Some(execution_type_id),
        custom_properties: props(&[("attempt", PropertyValue::Int(3))]),
        ..Execution::default()
    };
    execution.id = Some(mao.create_execution(&execution).unwrap());
    let mut context = Context {
        type_id: Some(context_type_id),
        name: Some("tune-lr".to_string()),
        ..Context::default()
    };
    context.id = Some(mao.create_context(&context).unwrap());

    mao.create_association(&Association {
        execution_id: execution.id,
        context_id: context.id,
    })
    .unwrap();

    assert_eq!(
        mao.find_contexts_by_execution(execution.id.unwrap()).unwrap(),
        vec![context.clone()]
    );
    assert_eq!(
        mao.find_executions_by_context(context.id.unwrap()).unwrap(),
        vec![execution]
    );
    // No artifacts were attributed to this context.
    assert_eq!(
        mao.find_artifacts_by_context(context.id.unwrap()).unwrap(),
        vec![]
    );
}

#[test]
fn create_association_rejects_bad_input() {
    let mao = open_store();

    // No context id.
    let err = mao.create_association(&Association::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // No execution id.
    let association = Association {
        context_id: Some(100),
        ..Association::default()
    };
    let err = mao.create_association(&association).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Neither endpoint exists.
    let association = Association {
        context_id: Some(100),
        execution_id: Some(100),
    };
    let err = mao.create_association(&association).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn duplicate_association_requires_rollback_then_begin() {
    let mao = open_store();

    mao.source().begin().unwrap();
    let execution_type_id = mao
        .create_type(&TypeDescriptor::new("trainer", TypeKind::Execution))
        .unwrap();
    let context_type_id = mao
        .create_type(&TypeDescriptor::new("experiment", TypeKind::Context))
        .unwrap();
    let execution_id = mao
        .create_execution(&Execution {
            type_id: Some(execution_type_id),
            ..Execution::default()
        })
        .unwrap();
    let context_id = mao
        .create_context(&Context {
            type_id: Some(context_type_id),
            name: Some("tune-lr".to_string()),
            ..Context::default()
        })
        .unwrap();

    let association = Association {
        execution_id: Some(execution_id),
        context_id: Some(context_id),
    };
    mao.create_association(&association).unwrap();
    let err = mao.create_association(&association).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    mao.source().rollback().unwrap();
    mao.source().begin().unwrap();
    mao.source().commit().unwrap();
}

#[test]
fn attribution_links_artifacts_and_contexts() {
    let mao = open_store();
    let artifact_type_id = mao
        .create_type(&TypeDescriptor::new("model", TypeKind::Artifact))
        .unwrap();
    let context_type_id = mao
        .create_type(&TypeDescriptor::new("experiment", TypeKind::Context))
        .unwrap();

    let mut artifact = Artifact {
        type_id: Some(artifact_type_id),
        uri: Some("s3://models/run-1".to_string()),
        custom_properties: props(&[("stage", PropertyValue::String("prod".to_string()))]),
        ..Artifact::default()
    };
    artifact.id = Some(mao.create_artifact(&artifact).unwrap());
    let mut context = Context {
        type_id: Some(context_type_id),
        name: Some("tune-lr".to_string()),
        ..Context::default()
    };
    context.id = Some(mao.create_context(&context).unwrap());

    mao.create_attribution(&Attribution {
        artifact_id: artifact.id,
        context_id: context.id,
    })
    .unwrap();

    // Duplicate pairs are rejected.
    let err = mao
        .create_attribution(&Attribution {
            artifact_id: artifact.id,
            context_id: context.id,
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    assert_eq!(
        mao.find_contexts_by_artifact(artifact.id.unwrap()).unwrap(),
        vec![context.clone()]
    );
    assert_eq!(
        mao.find_artifacts_by_context(context.id.unwrap()).unwrap(),
        vec![artifact]
    );
    // No executions were associated with this context.
    assert_eq!(
        mao.find_executions_by_context(context.id.unwrap()).unwrap(),
        vec![]
    );
}
