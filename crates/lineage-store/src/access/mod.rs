//! The metadata access object: managers plus the public facade.

mod edges;
mod migration;
mod nodes;
mod types;

use lineage_core::{
    Artifact, Association, Attribution, Context, Event, Execution, MetadataError, Result,
    TypeDescriptor, TypeKind,
};

use crate::registry;
use crate::source::MetadataSource;

/// Runs `op` inside a transaction on `source`.
///
/// When the source already has a transaction open, `op` joins it and the
/// ambient transaction's owner keeps control of commit and rollback; a
/// failure inside it is surfaced without rolling back, and on engines that
/// doom the transaction the owner must issue `rollback(); begin()` before
/// continuing. Otherwise this opens one, commits on success and rolls back
/// on failure.
pub(crate) fn run_in_transaction<S, T>(
    source: &S,
    op: impl FnOnce(&S) -> Result<T>,
) -> Result<T>
where
    S: MetadataSource,
{
    if source.in_transaction() {
        return op(source);
    }
    source.begin()?;
    match op(source) {
        Ok(value) => {
            source.commit()?;
            Ok(value)
        },
        Err(err) => {
            let _ = source.rollback();
            Err(err)
        },
    }
}

pub(crate) fn cell_i64(cell: &Option<String>) -> Result<i64> {
    let text = cell
        .as_deref()
        .ok_or_else(|| MetadataError::Internal("unexpected NULL column".to_string()))?;
    text.parse()
        .map_err(|e| MetadataError::Internal(format!("malformed integer column '{text}': {e}")))
}

pub(crate) fn cell_opt_i64(cell: &Option<String>) -> Result<Option<i64>> {
    cell.as_deref()
        .map(|text| {
            text.parse().map_err(|e| {
                MetadataError::Internal(format!("malformed integer column '{text}': {e}"))
            })
        })
        .transpose()
}

pub(crate) fn cell_f64(cell: &Option<String>) -> Result<f64> {
    let text = cell
        .as_deref()
        .ok_or_else(|| MetadataError::Internal("unexpected NULL column".to_string()))?;
    text.parse()
        .map_err(|e| MetadataError::Internal(format!("malformed float column '{text}': {e}")))
}

pub(crate) fn cell_text(cell: &Option<String>) -> Result<String> {
    cell.clone()
        .ok_or_else(|| MetadataError::Internal("unexpected NULL column".to_string()))
}

/// The metadata access object.
///
/// Composes the type, node and edge managers with the migration engine over
/// one [`MetadataSource`], and owns the transaction boundary of every
/// public operation: each call joins an ambient transaction when one is
/// open, otherwise it runs as its own short transaction.
pub struct MetadataAccessObject<S: MetadataSource> {
    source: S,
}

impl<S: MetadataSource> MetadataAccessObject<S> {
    /// Wraps a source. Call [`Self::init_metadata_source_if_not_exists`]
    /// before issuing catalog operations.
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// The underlying source, for ambient transaction control and for test
    /// harnesses that inspect the store out-of-band.
    pub const fn source(&self) -> &S {
        &self.source
    }

    fn transact<T>(&self, op: impl FnOnce(&S) -> Result<T>) -> Result<T> {
        run_in_transaction(&self.source, op)
    }

    // -- schema lifecycle ---------------------------------------------------

    /// Connects to the store, creating or migrating the schema as needed.
    ///
    /// On an empty database this creates the library-version schema. On a
    /// database at the library version it verifies the expected tables
    /// exist. An older database is upgraded step by step only when
    /// `enable_upgrade_migration` is set; a newer database is accepted only
    /// within the registry's compatibility window.
    ///
    /// # Errors
    ///
    /// `FailedPrecondition` on version incompatibility, `Aborted` on a
    /// corrupt store (missing tables or missing environment row).
    pub fn init_metadata_source_if_not_exists(
        &self,
        enable_upgrade_migration: bool,
    ) -> Result<()> {
        migration::init_if_not_exists(&self.source, enable_upgrade_migration)
    }

    /// Re-runs the library-version DDL over the existing store, recreating
    /// any dropped tables and resetting the stored schema version.
    ///
    /// # Errors
    ///
    /// `Aborted` when the stored version is one this registry cannot
    /// express.
    pub fn init_metadata_source(&self) -> Result<()> {
        migration::init_forced(&self.source)
    }

    /// Downgrades the store one version at a time until it reaches
    /// `to_schema_version`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the target is out of range, above the current
    /// version, or the store is uninitialized.
    pub fn downgrade_metadata_source(&self, to_schema_version: i64) -> Result<()> {
        migration::downgrade(&self.source, to_schema_version)
    }

    /// The schema version currently stored in the database. A recognizable
    /// store without an environment table reports version 0.
    ///
    /// # Errors
    ///
    /// `NotFound` on an empty database, `Aborted` when the environment
    /// table exists but holds no version row.
    pub fn schema_version(&self) -> Result<i64> {
        migration::stored_schema_version(&self.source)?
            .ok_or_else(|| MetadataError::NotFound("the database has no schema".to_string()))
    }

    /// The highest schema version this library materializes.
    #[must_use]
    pub const fn library_version(&self) -> i64 {
        registry::LIBRARY_SCHEMA_VERSION
    }

    // -- migration verification (test support) ------------------------------

    /// Runs the registry's setup queries materializing the pre-upgrade
    /// state for the migration arriving at `version`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the registry declares no verification for `version`.
    pub fn setup_previous_version_for_upgrade(&self, version: i64) -> Result<()> {
        migration::setup_previous_version_for_upgrade(&self.source, version)
    }

    /// Runs the registry's setup queries materializing the pre-downgrade
    /// state for the migration arriving at `target_version`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the registry declares no verification for
    /// `target_version`.
    pub fn setup_previous_version_for_downgrade(&self, target_version: i64) -> Result<()> {
        migration::setup_previous_version_for_downgrade(&self.source, target_version)
    }

    /// Checks the post-upgrade state for the migration that arrived at
    /// `version`.
    ///
    /// # Errors
    ///
    /// `Internal` when a verification query returns the wrong shape or a
    /// false value.
    pub fn verify_upgrade_migration(&self, version: i64) -> Result<()> {
        migration::verify_upgrade_migration(&self.source, version)
    }

    /// Checks the post-downgrade state for the migration that arrived at
    /// `target_version`.
    ///
    /// # Errors
    ///
    /// `Internal` when a verification query returns the wrong shape or a
    /// false value.
    pub fn verify_downgrade_migration(&self, target_version: i64) -> Result<()> {
        migration::verify_downgrade_migration(&self.source, target_version)
    }

    // -- types --------------------------------------------------------------

    /// Registers a type and returns its assigned id.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on an empty name or an `Unknown` property data
    /// type; `AlreadyExists` when the name is taken within the kind.
    pub fn create_type(&self, descriptor: &TypeDescriptor) -> Result<i64> {
        self.transact(|s| types::create_type(s, descriptor))
    }

    /// Looks up a type by id within a kind.
    ///
    /// # Errors
    ///
    /// `NotFound` when no type of `kind` has this id; a type exists in
    /// exactly one kind.
    pub fn find_type_by_id(&self, id: i64, kind: TypeKind) -> Result<TypeDescriptor> {
        self.transact(|s| types::find_type_by_id(s, id, kind))
    }

    /// Looks up a type by name within a kind.
    ///
    /// # Errors
    ///
    /// `NotFound` when no type of `kind` has this name.
    pub fn find_type_by_name(&self, name: &str, kind: TypeKind) -> Result<TypeDescriptor> {
        self.transact(|s| types::find_type_by_name(s, name, kind))
    }

    /// Returns all types of a kind, in id order.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn find_types(&self, kind: TypeKind) -> Result<Vec<TypeDescriptor>> {
        self.transact(|s| types::find_types(s, kind))
    }

    /// Updates a stored type, resolved by name within its kind. The update
    /// is additive: the union of stored and supplied properties becomes the
    /// new schema.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a missing name, a mismatched id, or an
    /// `Unknown` property data type; `AlreadyExists` when a supplied
    /// property conflicts with the stored declaration.
    pub fn update_type(&self, descriptor: &TypeDescriptor) -> Result<()> {
        self.transact(|s| types::update_type(s, descriptor))
    }

    // -- artifacts -----------------------------------------------------------

    /// Stores an artifact and returns its assigned id.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a missing `type_id` or a property violating the
    /// type schema; `NotFound` when the type does not exist.
    pub fn create_artifact(&self, artifact: &Artifact) -> Result<i64> {
        self.transact(|s| nodes::create_node(s, artifact))
    }

    /// Reconstructs an artifact with all its properties.
    ///
    /// # Errors
    ///
    /// `NotFound` when the id matches nothing.
    pub fn find_artifact_by_id(&self, id: i64) -> Result<Artifact> {
        self.transact(|s| nodes::find_node_by_id(s, id))
    }

    /// Returns all artifacts, in id order.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn find_artifacts(&self) -> Result<Vec<Artifact>> {
        self.transact(|s| nodes::find_nodes(s))
    }

    /// Returns the artifacts of one type, in id order.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn find_artifacts_by_type_id(&self, type_id: i64) -> Result<Vec<Artifact>> {
        self.transact(|s| nodes::find_nodes_by_type_id(s, type_id))
    }

    /// Returns the artifacts stored under `uri`, in id order.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn find_artifacts_by_uri(&self, uri: &str) -> Result<Vec<Artifact>> {
        self.transact(|s| nodes::find_artifacts_by_uri(s, uri))
    }

    /// Rewrites a stored artifact: extra columns and both property sets are
    /// replaced by the supplied record.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a missing or unknown id, a `type_id` differing
    /// from the stored one, or a property violating the type schema.
    pub fn update_artifact(&self, artifact: &Artifact) -> Result<()> {
        self.transact(|s| nodes::update_node(s, artifact))
    }

    // -- executions ----------------------------------------------------------

    /// Stores an execution and returns its assigned id.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a missing `type_id` or a property violating the
    /// type schema; `NotFound` when the type does not exist.
    pub fn create_execution(&self, execution: &Execution) -> Result<i64> {
        self.transact(|s| nodes::create_node(s, execution))
    }

    /// Reconstructs an execution with all its properties.
    ///
    /// # Errors
    ///
    /// `NotFound` when the id matches nothing.
    pub fn find_execution_by_id(&self, id: i64) -> Result<Execution> {
        self.transact(|s| nodes::find_node_by_id(s, id))
    }

    /// Returns all executions, in id order.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn find_executions(&self) -> Result<Vec<Execution>> {
        self.transact(|s| nodes::find_nodes(s))
    }

    /// Returns the executions of one type, in id order.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn find_executions_by_type_id(&self, type_id: i64) -> Result<Vec<Execution>> {
        self.transact(|s| nodes::find_nodes_by_type_id(s, type_id))
    }

    /// Rewrites a stored execution; same contract as
    /// [`Self::update_artifact`].
    ///
    /// # Errors
    ///
    /// See [`Self::update_artifact`].
    pub fn update_execution(&self, execution: &Execution) -> Result<()> {
        self.transact(|s| nodes::update_node(s, execution))
    }

    // -- contexts ------------------------------------------------------------

    /// Stores a context and returns its assigned id.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a missing `type_id`, an empty name, or a
    /// property violating the type schema; `NotFound` when the type does
    /// not exist; `AlreadyExists` when the `(type_id, name)` pair is taken.
    pub fn create_context(&self, context: &Context) -> Result<i64> {
        self.transact(|s| nodes::create_node(s, context))
    }

    /// Reconstructs a context with all its properties.
    ///
    /// # Errors
    ///
    /// `NotFound` when the id matches nothing.
    pub fn find_context_by_id(&self, id: i64) -> Result<Context> {
        self.transact(|s| nodes::find_node_by_id(s, id))
    }

    /// Returns all contexts, in id order.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn find_contexts(&self) -> Result<Vec<Context>> {
        self.transact(|s| nodes::find_nodes(s))
    }

    /// Returns the contexts of one type, in id order.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn find_contexts_by_type_id(&self, type_id: i64) -> Result<Vec<Context>> {
        self.transact(|s| nodes::find_nodes_by_type_id(s, type_id))
    }

    /// Looks up the context named `name` under `type_id`.
    ///
    /// # Errors
    ///
    /// `NotFound` when no such context exists.
    pub fn find_context_by_type_id_and_name(&self, type_id: i64, name: &str) -> Result<Context> {
        self.transact(|s| nodes::find_context_by_type_id_and_name(s, type_id, name))
    }

    /// Rewrites a stored context; same contract as
    /// [`Self::update_artifact`], and renaming into a taken
    /// `(type_id, name)` pair is `AlreadyExists`.
    ///
    /// # Errors
    ///
    /// See [`Self::update_artifact`].
    pub fn update_context(&self, context: &Context) -> Result<()> {
        self.transact(|s| nodes::update_node(s, context))
    }

    // -- events --------------------------------------------------------------

    /// Records an event and returns its assigned id. When the event carries
    /// no timestamp the current wall-clock time in milliseconds is
    /// assigned.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a missing endpoint id, a missing event type, or
    /// a nonexistent endpoint.
    pub fn create_event(&self, event: &Event) -> Result<i64> {
        self.transact(|s| edges::create_event(s, event))
    }

    /// Returns the events touching an artifact, paths reconstructed in
    /// order.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn find_events_by_artifact(&self, artifact_id: i64) -> Result<Vec<Event>> {
        self.transact(|s| edges::find_events_by_artifact(s, artifact_id))
    }

    /// Returns the events touching an execution, paths reconstructed in
    /// order.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn find_events_by_execution(&self, execution_id: i64) -> Result<Vec<Event>> {
        self.transact(|s| edges::find_events_by_execution(s, execution_id))
    }

    // -- attributions and associations --------------------------------------

    /// Records that an artifact belongs to a context.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a missing or nonexistent endpoint;
    /// `AlreadyExists` on a duplicate pair.
    pub fn create_attribution(&self, attribution: &Attribution) -> Result<i64> {
        self.transact(|s| edges::create_attribution(s, attribution))
    }

    /// Records that an execution belongs to a context.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a missing or nonexistent endpoint;
    /// `AlreadyExists` on a duplicate pair.
    pub fn create_association(&self, association: &Association) -> Result<i64> {
        self.transact(|s| edges::create_association(s, association))
    }

    /// Returns the contexts an artifact is attributed to.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn find_contexts_by_artifact(&self, artifact_id: i64) -> Result<Vec<Context>> {
        self.transact(|s| edges::find_contexts_by_artifact(s, artifact_id))
    }

    /// Returns the artifacts attributed to a context.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn find_artifacts_by_context(&self, context_id: i64) -> Result<Vec<Artifact>> {
        self.transact(|s| edges::find_artifacts_by_context(s, context_id))
    }

    /// Returns the contexts an execution is associated with.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn find_contexts_by_execution(&self, execution_id: i64) -> Result<Vec<Context>> {
        self.transact(|s| edges::find_contexts_by_execution(s, execution_id))
    }

    /// Returns the executions associated with a context.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn find_executions_by_context(&self, context_id: i64) -> Result<Vec<Execution>> {
        self.transact(|s| edges::find_executions_by_context(s, context_id))
    }
}
