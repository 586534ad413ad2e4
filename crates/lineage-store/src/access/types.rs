//! Type manager: CRUD for user-declared schemas.
//!
//! Type names are unique within a kind (engine-enforced through the
//! `idx_type_name_kind` index), and a type id exists in exactly one kind.
//! Updates are additive over properties: stored declarations are never
//! removed or retyped.

use lineage_core::{MetadataError, PropertyType, Result, TypeDescriptor, TypeKind};

use super::{cell_i64, cell_text};
use crate::source::{Bind, MetadataSource};

pub(crate) fn create_type<S: MetadataSource>(
    source: &S,
    descriptor: &TypeDescriptor,
) -> Result<i64> {
    if descriptor.name.is_empty() {
        return Err(MetadataError::InvalidArgument(
            "type name must not be empty".to_string(),
        ));
    }
    if let Some((name, _)) = descriptor
        .properties
        .iter()
        .find(|(_, data_type)| **data_type == PropertyType::Unknown)
    {
        return Err(MetadataError::InvalidArgument(format!(
            "property '{name}' has no data type"
        )));
    }
    if descriptor.kind != TypeKind::Execution
        && (descriptor.input_signature.is_some() || descriptor.output_signature.is_some())
    {
        return Err(MetadataError::InvalidArgument(format!(
            "I/O signatures are only valid on execution types, not on {}s",
            descriptor.kind.label()
        )));
    }

    source.execute_query(
        "INSERT INTO `Type` (`name`, `type_kind`, `input_type`, `output_type`) \
         VALUES (?1, ?2, ?3, ?4);",
        &[
            Bind::from(descriptor.name.clone()),
            Bind::Int(descriptor.kind.code()),
            Bind::from(descriptor.input_signature.clone()),
            Bind::from(descriptor.output_signature.clone()),
        ],
    )?;
    let type_id = source.last_insert_id()?;

    for (name, data_type) in &descriptor.properties {
        insert_property(source, type_id, name, *data_type)?;
    }
    Ok(type_id)
}

pub(crate) fn find_type_by_id<S: MetadataSource>(
    source: &S,
    id: i64,
    kind: TypeKind,
) -> Result<TypeDescriptor> {
    load_types_where(
        source,
        "`id` = ?1 AND `type_kind` = ?2",
        &[Bind::Int(id), Bind::Int(kind.code())],
    )?
    .into_iter()
    .next()
    .ok_or_else(|| MetadataError::NotFound(format!("no {} with id {id}", kind.label())))
}

pub(crate) fn find_type_by_name<S: MetadataSource>(
    source: &S,
    name: &str,
    kind: TypeKind,
) -> Result<TypeDescriptor> {
    load_types_where(
        source,
        "`name` = ?1 AND `type_kind` = ?2",
        &[Bind::from(name), Bind::Int(kind.code())],
    )?
    .into_iter()
    .next()
    .ok_or_else(|| MetadataError::NotFound(format!("no {} named '{name}'", kind.label())))
}

pub(crate) fn find_types<S: MetadataSource>(
    source: &S,
    kind: TypeKind,
) -> Result<Vec<TypeDescriptor>> {
    load_types_where(source, "`type_kind` = ?1", &[Bind::Int(kind.code())])
}

/// Additive-union update. The stored type is resolved by name within the
/// descriptor's kind; supplied properties that are new are declared,
/// supplied properties that match the stored declaration are no-ops, and a
/// supplied property whose data type differs from the stored one is a
/// conflict.
pub(crate) fn update_type<S: MetadataSource>(
    source: &S,
    descriptor: &TypeDescriptor,
) -> Result<()> {
    if descriptor.name.is_empty() {
        return Err(MetadataError::InvalidArgument(
            "type name is required for update".to_string(),
        ));
    }
    let stored = find_type_by_name(source, &descriptor.name, descriptor.kind)?;
    let stored_id = stored
        .id
        .ok_or_else(|| MetadataError::Internal("stored type has no id".to_string()))?;
    if let Some(id) = descriptor.id {
        if id != stored_id {
            return Err(MetadataError::InvalidArgument(format!(
                "type id {id} does not match the stored type '{}' (id {stored_id})",
                descriptor.name
            )));
        }
    }

    for (name, data_type) in &descriptor.properties {
        if *data_type == PropertyType::Unknown {
            return Err(MetadataError::InvalidArgument(format!(
                "property '{name}' has no data type"
            )));
        }
        match stored.properties.get(name) {
            Some(stored_type) if stored_type != data_type => {
                return Err(MetadataError::AlreadyExists(format!(
                    "property '{name}' is already declared with a different data type"
                )));
            },
            Some(_) => {},
            None => insert_property(source, stored_id, name, *data_type)?,
        }
    }
    Ok(())
}

fn insert_property<S: MetadataSource>(
    source: &S,
    type_id: i64,
    name: &str,
    data_type: PropertyType,
) -> Result<()> {
    source.execute_query(
        "INSERT INTO `TypeProperty` (`type_id`, `name`, `data_type`) VALUES (?1, ?2, ?3);",
        &[
            Bind::Int(type_id),
            Bind::from(name),
            Bind::Int(data_type.code()),
        ],
    )?;
    Ok(())
}

fn load_types_where<S: MetadataSource>(
    source: &S,
    clause: &str,
    bindings: &[Bind],
) -> Result<Vec<TypeDescriptor>> {
    let query = format!(
        "SELECT `id`, `name`, `type_kind`, `input_type`, `output_type` \
         FROM `Type` WHERE {clause} ORDER BY `id`;"
    );
    let record_set = source.execute_query(&query, bindings)?;

    let mut descriptors = Vec::with_capacity(record_set.records.len());
    for row in &record_set.records {
        let id = cell_i64(&row[0])?;
        let kind_code = cell_i64(&row[2])?;
        let kind = TypeKind::from_code(kind_code).ok_or_else(|| {
            MetadataError::Internal(format!("unknown type kind code {kind_code}"))
        })?;
        let mut descriptor = TypeDescriptor::new(cell_text(&row[1])?, kind);
        descriptor.id = Some(id);
        descriptor.input_signature = row[3].clone();
        descriptor.output_signature = row[4].clone();
        load_properties(source, &mut descriptor, id)?;
        descriptors.push(descriptor);
    }
    Ok(descriptors)
}

fn load_properties<S: MetadataSource>(
    source: &S,
    descriptor: &mut TypeDescriptor,
    type_id: i64,
) -> Result<()> {
    let record_set = source.execute_query(
        "SELECT `name`, `data_type` FROM `TypeProperty` WHERE `type_id` = ?1;",
        &[Bind::Int(type_id)],
    )?;
    for row in &record_set.records {
        let name = cell_text(&row[0])?;
        let code = cell_i64(&row[1])?;
        let data_type = PropertyType::from_code(code).ok_or_else(|| {
            MetadataError::Internal(format!("unknown property data type code {code}"))
        })?;
        descriptor.properties.insert(name, data_type);
    }
    Ok(())
}
