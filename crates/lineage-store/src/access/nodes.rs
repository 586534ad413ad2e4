//! Node manager: CRUD for artifacts, executions and contexts.
//!
//! The three kinds share one implementation through the [`Node`] capability
//! trait: each kind contributes its table names, its extra columns beyond
//! `id` and `type_id`, and its create-time checks, while the property
//! validation, persistence and diff logic is written once.

use std::collections::BTreeMap;

use lineage_core::{
    Artifact, Context, Execution, MetadataError, PropertyValue, Result, TypeDescriptor, TypeKind,
};

use super::{cell_f64, cell_i64, cell_text, types};
use crate::source::{Bind, MetadataSource};

/// Per-kind capabilities the shared node logic is parameterized over.
pub(crate) trait Node: Clone + Default {
    const KIND: TypeKind;
    const TABLE: &'static str;
    const PROPERTY_TABLE: &'static str;
    const OWNER_COLUMN: &'static str;
    /// Columns beyond `id` and `type_id`, in persisted order.
    const EXTRA_COLUMNS: &'static [&'static str];
    const LABEL: &'static str;

    fn id(&self) -> Option<i64>;
    fn set_id(&mut self, id: i64);
    fn type_id(&self) -> Option<i64>;
    fn set_type_id(&mut self, type_id: i64);
    fn properties(&self) -> &BTreeMap<String, PropertyValue>;
    fn properties_mut(&mut self) -> &mut BTreeMap<String, PropertyValue>;
    fn custom_properties(&self) -> &BTreeMap<String, PropertyValue>;
    fn custom_properties_mut(&mut self) -> &mut BTreeMap<String, PropertyValue>;
    /// Values for [`Self::EXTRA_COLUMNS`], in the same order.
    fn extra_binds(&self) -> Vec<Bind>;
    /// Applies the [`Self::EXTRA_COLUMNS`] cells of a result row.
    fn apply_extras(&mut self, cells: &[Option<String>]);
    /// Kind-specific create-time validation.
    fn check_create(&self) -> Result<()> {
        Ok(())
    }
    /// Kind-specific update-time validation against the stored row. Updates
    /// replace the extra columns wholesale, so required extras must be
    /// supplied again.
    fn check_update(&self, _stored: &Self) -> Result<()> {
        Ok(())
    }
}

impl Node for Artifact {
    const KIND: TypeKind = TypeKind::Artifact;
    const TABLE: &'static str = "Artifact";
    const PROPERTY_TABLE: &'static str = "ArtifactProperty";
    const OWNER_COLUMN: &'static str = "artifact_id";
    const EXTRA_COLUMNS: &'static [&'static str] = &["uri"];
    const LABEL: &'static str = "artifact";

    fn id(&self) -> Option<i64> {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
    fn type_id(&self) -> Option<i64> {
        self.type_id
    }
    fn set_type_id(&mut self, type_id: i64) {
        self.type_id = Some(type_id);
    }
    fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }
    fn properties_mut(&mut self) -> &mut BTreeMap<String, PropertyValue> {
        &mut self.properties
    }
    fn custom_properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.custom_properties
    }
    fn custom_properties_mut(&mut self) -> &mut BTreeMap<String, PropertyValue> {
        &mut self.custom_properties
    }
    fn extra_binds(&self) -> Vec<Bind> {
        vec![Bind::from(self.uri.clone())]
    }
    fn apply_extras(&mut self, cells: &[Option<String>]) {
        self.uri = cells.first().cloned().flatten();
    }
}

impl Node for Execution {
    const KIND: TypeKind = TypeKind::Execution;
    const TABLE: &'static str = "Execution";
    const PROPERTY_TABLE: &'static str = "ExecutionProperty";
    const OWNER_COLUMN: &'static str = "execution_id";
    const EXTRA_COLUMNS: &'static [&'static str] = &[];
    const LABEL: &'static str = "execution";

    fn id(&self) -> Option<i64> {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
    fn type_id(&self) -> Option<i64> {
        self.type_id
    }
    fn set_type_id(&mut self, type_id: i64) {
        self.type_id = Some(type_id);
    }
    fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }
    fn properties_mut(&mut self) -> &mut BTreeMap<String, PropertyValue> {
        &mut self.properties
    }
    fn custom_properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.custom_properties
    }
    fn custom_properties_mut(&mut self) -> &mut BTreeMap<String, PropertyValue> {
        &mut self.custom_properties
    }
    fn extra_binds(&self) -> Vec<Bind> {
        Vec::new()
    }
    fn apply_extras(&mut self, _cells: &[Option<String>]) {}
}

impl Node for Context {
    const KIND: TypeKind = TypeKind::Context;
    const TABLE: &'static str = "Context";
    const PROPERTY_TABLE: &'static str = "ContextProperty";
    const OWNER_COLUMN: &'static str = "context_id";
    const EXTRA_COLUMNS: &'static [&'static str] = &["name"];
    const LABEL: &'static str = "context";

    fn id(&self) -> Option<i64> {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
    fn type_id(&self) -> Option<i64> {
        self.type_id
    }
    fn set_type_id(&mut self, type_id: i64) {
        self.type_id = Some(type_id);
    }
    fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }
    fn properties_mut(&mut self) -> &mut BTreeMap<String, PropertyValue> {
        &mut self.properties
    }
    fn custom_properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.custom_properties
    }
    fn custom_properties_mut(&mut self) -> &mut BTreeMap<String, PropertyValue> {
        &mut self.custom_properties
    }
    fn extra_binds(&self) -> Vec<Bind> {
        vec![Bind::from(self.name.clone())]
    }
    fn apply_extras(&mut self, cells: &[Option<String>]) {
        self.name = cells.first().cloned().flatten();
    }
    fn check_create(&self) -> Result<()> {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => Ok(()),
            _ => Err(MetadataError::InvalidArgument(
                "context name must not be empty".to_string(),
            )),
        }
    }
    fn check_update(&self, _stored: &Self) -> Result<()> {
        self.check_create()
    }
}

// -- operations -------------------------------------------------------------

pub(crate) fn create_node<N: Node, S: MetadataSource>(source: &S, node: &N) -> Result<i64> {
    let type_id = node.type_id().ok_or_else(|| {
        MetadataError::InvalidArgument(format!("{} has no type_id", N::LABEL))
    })?;
    let descriptor = types::find_type_by_id(source, type_id, N::KIND)?;
    node.check_create()?;
    validate_against_schema::<N>(node.properties(), &descriptor)?;

    let mut columns = vec!["`type_id`".to_string()];
    columns.extend(N::EXTRA_COLUMNS.iter().map(|c| format!("`{c}`")));
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let query = format!(
        "INSERT INTO `{}` ({}) VALUES ({});",
        N::TABLE,
        columns.join(", "),
        placeholders.join(", ")
    );
    let mut bindings = vec![Bind::Int(type_id)];
    bindings.extend(node.extra_binds());
    source.execute_query(&query, &bindings)?;
    let id = source.last_insert_id()?;

    for (name, value) in node.properties() {
        insert_property::<N, S>(source, id, name, value, false)?;
    }
    for (name, value) in node.custom_properties() {
        insert_property::<N, S>(source, id, name, value, true)?;
    }
    Ok(id)
}

pub(crate) fn find_node_by_id<N: Node, S: MetadataSource>(source: &S, id: i64) -> Result<N> {
    find_nodes_filtered(source, Some("`id` = ?1"), &[Bind::Int(id)])?
        .into_iter()
        .next()
        .ok_or_else(|| MetadataError::NotFound(format!("no {} with id {id}", N::LABEL)))
}

pub(crate) fn find_nodes<N: Node, S: MetadataSource>(source: &S) -> Result<Vec<N>> {
    find_nodes_filtered(source, None, &[])
}

pub(crate) fn find_nodes_by_type_id<N: Node, S: MetadataSource>(
    source: &S,
    type_id: i64,
) -> Result<Vec<N>> {
    find_nodes_filtered(source, Some("`type_id` = ?1"), &[Bind::Int(type_id)])
}

pub(crate) fn find_artifacts_by_uri<S: MetadataSource>(
    source: &S,
    uri: &str,
) -> Result<Vec<Artifact>> {
    find_nodes_filtered(source, Some("`uri` = ?1"), &[Bind::from(uri)])
}

pub(crate) fn find_context_by_type_id_and_name<S: MetadataSource>(
    source: &S,
    type_id: i64,
    name: &str,
) -> Result<Context> {
    find_nodes_filtered(
        source,
        Some("`type_id` = ?1 AND `name` = ?2"),
        &[Bind::Int(type_id), Bind::from(name)],
    )?
    .into_iter()
    .next()
    .ok_or_else(|| {
        MetadataError::NotFound(format!("no context named '{name}' under type {type_id}"))
    })
}

/// Rewrites a stored node: extra columns and both property sets are
/// replaced by the supplied record. The property diff deletes rows absent
/// from the update, updates rows whose value changed (including a custom
/// property changing its value kind), and inserts new rows.
pub(crate) fn update_node<N: Node, S: MetadataSource>(source: &S, node: &N) -> Result<()> {
    let id = node.id().ok_or_else(|| {
        MetadataError::InvalidArgument(format!("{} id is required for update", N::LABEL))
    })?;
    // An unknown id on update is a malformed request, not a failed lookup.
    let stored: N = find_nodes_filtered(source, Some("`id` = ?1"), &[Bind::Int(id)])?
        .into_iter()
        .next()
        .ok_or_else(|| {
            MetadataError::InvalidArgument(format!("unknown {} id {id}", N::LABEL))
        })?;

    if let Some(type_id) = node.type_id() {
        if stored.type_id() != Some(type_id) {
            return Err(MetadataError::InvalidArgument(format!(
                "type_id {type_id} does not match the stored {}",
                N::LABEL
            )));
        }
    }
    node.check_update(&stored)?;
    let type_id = stored
        .type_id()
        .ok_or_else(|| MetadataError::Internal(format!("stored {} has no type", N::LABEL)))?;
    let descriptor = types::find_type_by_id(source, type_id, N::KIND)?;
    validate_against_schema::<N>(node.properties(), &descriptor)?;

    if !N::EXTRA_COLUMNS.is_empty() {
        let assignments: Vec<String> = N::EXTRA_COLUMNS
            .iter()
            .enumerate()
            .map(|(i, column)| format!("`{column}` = ?{}", i + 1))
            .collect();
        let query = format!(
            "UPDATE `{}` SET {} WHERE `id` = ?{};",
            N::TABLE,
            assignments.join(", "),
            N::EXTRA_COLUMNS.len() + 1
        );
        let mut bindings = node.extra_binds();
        bindings.push(Bind::Int(id));
        source.execute_query(&query, &bindings)?;
    }

    apply_property_diff::<N, S>(source, id, stored.properties(), node.properties(), false)?;
    apply_property_diff::<N, S>(
        source,
        id,
        stored.custom_properties(),
        node.custom_properties(),
        true,
    )?;
    Ok(())
}

// -- shared internals -------------------------------------------------------

fn validate_against_schema<N: Node>(
    properties: &BTreeMap<String, PropertyValue>,
    descriptor: &TypeDescriptor,
) -> Result<()> {
    for (name, value) in properties {
        match descriptor.properties.get(name) {
            None => {
                return Err(MetadataError::InvalidArgument(format!(
                    "property '{name}' is not declared by {} '{}'",
                    N::KIND.label(),
                    descriptor.name
                )));
            },
            Some(declared) if *declared != value.kind() => {
                return Err(MetadataError::InvalidArgument(format!(
                    "property '{name}' is declared as {declared:?} but the value is {:?}",
                    value.kind()
                )));
            },
            Some(_) => {},
        }
    }
    Ok(())
}

fn value_binds(value: &PropertyValue) -> (Bind, Bind, Bind) {
    match value {
        PropertyValue::Int(v) => (Bind::Int(*v), Bind::Null, Bind::Null),
        PropertyValue::Double(v) => (Bind::Null, Bind::Double(*v), Bind::Null),
        PropertyValue::String(v) => (Bind::Null, Bind::Null, Bind::Text(v.clone())),
    }
}

fn insert_property<N: Node, S: MetadataSource>(
    source: &S,
    owner_id: i64,
    name: &str,
    value: &PropertyValue,
    is_custom: bool,
) -> Result<()> {
    let (int_value, double_value, string_value) = value_binds(value);
    let query = format!(
        "INSERT INTO `{}` (`{}`, `name`, `is_custom_property`, \
         `int_value`, `double_value`, `string_value`) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        N::PROPERTY_TABLE,
        N::OWNER_COLUMN
    );
    source.execute_query(
        &query,
        &[
            Bind::Int(owner_id),
            Bind::from(name),
            Bind::Int(i64::from(is_custom)),
            int_value,
            double_value,
            string_value,
        ],
    )?;
    Ok(())
}

fn update_property<N: Node, S: MetadataSource>(
    source: &S,
    owner_id: i64,
    name: &str,
    value: &PropertyValue,
    is_custom: bool,
) -> Result<()> {
    let (int_value, double_value, string_value) = value_binds(value);
    let query = format!(
        "UPDATE `{}` SET `int_value` = ?1, `double_value` = ?2, `string_value` = ?3 \
         WHERE `{}` = ?4 AND `name` = ?5 AND `is_custom_property` = ?6;",
        N::PROPERTY_TABLE,
        N::OWNER_COLUMN
    );
    source.execute_query(
        &query,
        &[
            int_value,
            double_value,
            string_value,
            Bind::Int(owner_id),
            Bind::from(name),
            Bind::Int(i64::from(is_custom)),
        ],
    )?;
    Ok(())
}

fn delete_property<N: Node, S: MetadataSource>(
    source: &S,
    owner_id: i64,
    name: &str,
    is_custom: bool,
) -> Result<()> {
    let query = format!(
        "DELETE FROM `{}` WHERE `{}` = ?1 AND `name` = ?2 AND `is_custom_property` = ?3;",
        N::PROPERTY_TABLE,
        N::OWNER_COLUMN
    );
    source.execute_query(
        &query,
        &[
            Bind::Int(owner_id),
            Bind::from(name),
            Bind::Int(i64::from(is_custom)),
        ],
    )?;
    Ok(())
}

fn apply_property_diff<N: Node, S: MetadataSource>(
    source: &S,
    owner_id: i64,
    stored: &BTreeMap<String, PropertyValue>,
    updated: &BTreeMap<String, PropertyValue>,
    is_custom: bool,
) -> Result<()> {
    for (name, value) in updated {
        match stored.get(name) {
            None => insert_property::<N, S>(source, owner_id, name, value, is_custom)?,
            Some(stored_value) if stored_value != value => {
                update_property::<N, S>(source, owner_id, name, value, is_custom)?;
            },
            Some(_) => {},
        }
    }
    for name in stored.keys() {
        if !updated.contains_key(name) {
            delete_property::<N, S>(source, owner_id, name, is_custom)?;
        }
    }
    Ok(())
}

fn find_nodes_filtered<N: Node, S: MetadataSource>(
    source: &S,
    clause: Option<&str>,
    bindings: &[Bind],
) -> Result<Vec<N>> {
    let mut columns = vec!["`id`".to_string(), "`type_id`".to_string()];
    columns.extend(N::EXTRA_COLUMNS.iter().map(|c| format!("`{c}`")));
    let mut query = format!("SELECT {} FROM `{}`", columns.join(", "), N::TABLE);
    if let Some(clause) = clause {
        query.push_str(" WHERE ");
        query.push_str(clause);
    }
    query.push_str(" ORDER BY `id`;");

    let record_set = source.execute_query(&query, bindings)?;
    let mut nodes = Vec::with_capacity(record_set.records.len());
    for row in &record_set.records {
        let mut node = N::default();
        node.set_id(cell_i64(&row[0])?);
        node.set_type_id(cell_i64(&row[1])?);
        node.apply_extras(&row[2..]);
        load_node_properties(source, &mut node)?;
        nodes.push(node);
    }
    Ok(nodes)
}

fn load_node_properties<N: Node, S: MetadataSource>(source: &S, node: &mut N) -> Result<()> {
    let id = node
        .id()
        .ok_or_else(|| MetadataError::Internal("loading properties of an unsaved node".into()))?;
    let query = format!(
        "SELECT `name`, `is_custom_property`, `int_value`, `double_value`, `string_value` \
         FROM `{}` WHERE `{}` = ?1;",
        N::PROPERTY_TABLE,
        N::OWNER_COLUMN
    );
    let record_set = source.execute_query(&query, &[Bind::Int(id)])?;
    for row in &record_set.records {
        let name = cell_text(&row[0])?;
        let is_custom = cell_i64(&row[1])? != 0;
        let value = decode_property_value(&row[2], &row[3], &row[4])?;
        if is_custom {
            node.custom_properties_mut().insert(name, value);
        } else {
            node.properties_mut().insert(name, value);
        }
    }
    Ok(())
}

fn decode_property_value(
    int_cell: &Option<String>,
    double_cell: &Option<String>,
    string_cell: &Option<String>,
) -> Result<PropertyValue> {
    match (int_cell, double_cell, string_cell) {
        (Some(_), None, None) => Ok(PropertyValue::Int(cell_i64(int_cell)?)),
        (None, Some(_), None) => Ok(PropertyValue::Double(cell_f64(double_cell)?)),
        (None, None, Some(_)) => Ok(PropertyValue::String(cell_text(string_cell)?)),
        _ => Err(MetadataError::Internal(
            "property row does not hold exactly one value".to_string(),
        )),
    }
}

// Referenced by the edge manager to confirm endpoints exist.
pub(crate) fn node_exists<N: Node, S: MetadataSource>(source: &S, id: i64) -> Result<bool> {
    let query = format!("SELECT count(*) > 0 FROM `{}` WHERE `id` = ?1;", N::TABLE);
    let record_set = source.execute_query(&query, &[Bind::Int(id)])?;
    record_set
        .single_cell()
        .map(|cell| cell.as_deref() == Some("1"))
        .ok_or_else(|| MetadataError::Internal("malformed existence probe result".to_string()))
}
