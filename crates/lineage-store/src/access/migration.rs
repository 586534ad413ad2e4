//! Migration engine: schema creation, version checks, upgrades and
//! downgrades.
//!
//! The stored schema version lives in the single-row environment table.
//! Three states are distinguished at connect time:
//!
//! - no environment table and no recognizable tables: a fresh database
//! - no environment table but the `Type` table exists: the historical
//!   version-0 shape
//! - an environment table without a version row: corruption
//!
//! Each migration step runs in its own transaction and rewrites the
//! version marker before committing, so an interrupted migration leaves
//! the store at a well-defined version.

use lineage_core::{ErrorKind, MetadataError, Result};
use tracing::{debug, info};

use super::{cell_i64, run_in_transaction};
use crate::registry;
use crate::source::{Bind, MetadataSource};

pub(crate) fn table_exists<S: MetadataSource>(source: &S, table: &str) -> Result<bool> {
    let record_set = source.execute_query(registry::TABLE_EXISTS_QUERY, &[Bind::from(table)])?;
    record_set
        .single_cell()
        .map(|cell| cell.as_deref() == Some("1"))
        .ok_or_else(|| MetadataError::Internal("malformed table existence probe".to_string()))
}

/// Reads the stored schema version. `Ok(None)` means the database is
/// empty; a recognizable store without an environment table reports
/// version 0.
pub(crate) fn stored_schema_version<S: MetadataSource>(source: &S) -> Result<Option<i64>> {
    if !table_exists(source, registry::ENV_TABLE)? {
        if table_exists(source, "Type")? {
            debug!("no environment table over recognizable tables; treating as version 0");
            return Ok(Some(0));
        }
        return Ok(None);
    }
    let record_set = source.execute_query(
        "SELECT `schema_version` FROM `MLMDEnv`;",
        &[],
    )?;
    match record_set.records.as_slice() {
        [] => Err(MetadataError::Aborted(
            "environment table exists but holds no schema version row".to_string(),
        )),
        [row] => cell_i64(&row[0]).map(Some),
        _ => Err(MetadataError::Aborted(
            "environment table holds more than one schema version row".to_string(),
        )),
    }
}

pub(crate) fn init_if_not_exists<S: MetadataSource>(
    source: &S,
    enable_upgrade_migration: bool,
) -> Result<()> {
    let library = registry::LIBRARY_SCHEMA_VERSION;
    match stored_schema_version(source)? {
        None => run_in_transaction(source, |s| {
            info!(version = library, "creating schema on empty database");
            run_queries(s, library_ddl()?)?;
            write_schema_version(s, library)
        }),
        Some(stored) if stored == library => verify_head_tables(source),
        Some(stored) if stored > library => {
            if stored - library > registry::COMPATIBLE_VERSION_WINDOW {
                return Err(MetadataError::FailedPrecondition(format!(
                    "database schema version {stored} is newer than this library ({library}); \
                     upgrade the library"
                )));
            }
            debug!(stored, library, "accepting newer database within the compatibility window");
            verify_head_tables(source)
        },
        Some(stored) => {
            if !enable_upgrade_migration {
                return Err(MetadataError::FailedPrecondition(format!(
                    "database schema version {stored} is older than this library ({library}); \
                     rerun with upgrade migration enabled"
                )));
            }
            upgrade_to_library(source, stored)
        },
    }
}

/// Re-runs the library DDL over the existing store, recreating any dropped
/// tables and resetting the version marker.
pub(crate) fn init_forced<S: MetadataSource>(source: &S) -> Result<()> {
    match stored_schema_version(source) {
        Ok(Some(stored)) if stored > registry::LIBRARY_SCHEMA_VERSION => {
            return Err(MetadataError::Aborted(format!(
                "refusing to reset a database at schema version {stored}, \
                 which this library cannot express"
            )));
        },
        // A missing version row is exactly what a reset repairs.
        Ok(_) => {},
        Err(err) if err.kind() == ErrorKind::Aborted => {},
        Err(err) => return Err(err),
    }
    run_in_transaction(source, |s| {
        info!(version = registry::LIBRARY_SCHEMA_VERSION, "resetting schema");
        run_queries(s, library_ddl()?)?;
        write_schema_version(s, registry::LIBRARY_SCHEMA_VERSION)
    })
}

pub(crate) fn downgrade<S: MetadataSource>(source: &S, to_version: i64) -> Result<()> {
    let library = registry::LIBRARY_SCHEMA_VERSION;
    if to_version < registry::EARLIEST_SCHEMA_VERSION || to_version > library {
        return Err(MetadataError::InvalidArgument(format!(
            "downgrade target {to_version} is outside [{}, {library}]",
            registry::EARLIEST_SCHEMA_VERSION
        )));
    }
    let Some(current) = stored_schema_version(source)? else {
        return Err(MetadataError::InvalidArgument(
            "cannot downgrade an uninitialized database".to_string(),
        ));
    };
    if current > library {
        return Err(MetadataError::FailedPrecondition(format!(
            "database schema version {current} is newer than this library ({library})"
        )));
    }
    if to_version > current {
        return Err(MetadataError::InvalidArgument(format!(
            "cannot downgrade to {to_version}: database is at {current}"
        )));
    }

    let mut version = current;
    while version > to_version {
        let queries = registry::downgrade_queries(version).ok_or_else(|| {
            MetadataError::Internal(format!("registry has no downgrade from version {version}"))
        })?;
        run_in_transaction(source, |s| {
            run_queries(s, queries)?;
            // Stepping to version 0 drops the environment table itself.
            if version - 1 > 0 {
                write_schema_version(s, version - 1)?;
            }
            Ok(())
        })?;
        info!(from = version, to = version - 1, "applied downgrade migration");
        version -= 1;
    }
    Ok(())
}

// -- verification support ---------------------------------------------------

pub(crate) fn setup_previous_version_for_upgrade<S: MetadataSource>(
    source: &S,
    version: i64,
) -> Result<()> {
    let scheme = registry::upgrade_verification(version).ok_or_else(|| {
        MetadataError::NotFound(format!("no upgrade verification for version {version}"))
    })?;
    run_queries(source, scheme.previous_version_setup_queries)
}

pub(crate) fn setup_previous_version_for_downgrade<S: MetadataSource>(
    source: &S,
    target_version: i64,
) -> Result<()> {
    let scheme = registry::downgrade_verification(target_version).ok_or_else(|| {
        MetadataError::NotFound(format!(
            "no downgrade verification for target version {target_version}"
        ))
    })?;
    run_queries(source, scheme.previous_version_setup_queries)
}

pub(crate) fn verify_upgrade_migration<S: MetadataSource>(source: &S, version: i64) -> Result<()> {
    let scheme = registry::upgrade_verification(version).ok_or_else(|| {
        MetadataError::NotFound(format!("no upgrade verification for version {version}"))
    })?;
    run_verification(source, scheme.post_migration_verification_queries)
}

pub(crate) fn verify_downgrade_migration<S: MetadataSource>(
    source: &S,
    target_version: i64,
) -> Result<()> {
    let scheme = registry::downgrade_verification(target_version).ok_or_else(|| {
        MetadataError::NotFound(format!(
            "no downgrade verification for target version {target_version}"
        ))
    })?;
    run_verification(source, scheme.post_migration_verification_queries)
}

// -- internals --------------------------------------------------------------

fn library_ddl() -> Result<&'static [&'static str]> {
    registry::ddl(registry::LIBRARY_SCHEMA_VERSION)
        .ok_or_else(|| MetadataError::Internal("registry has no library-version ddl".to_string()))
}

fn run_queries<S: MetadataSource>(source: &S, queries: &[&str]) -> Result<()> {
    for query in queries {
        source.execute_query(query, &[])?;
    }
    Ok(())
}

fn write_schema_version<S: MetadataSource>(source: &S, version: i64) -> Result<()> {
    source.execute_query("DELETE FROM `MLMDEnv`;", &[])?;
    source.execute_query(
        "INSERT INTO `MLMDEnv` (`schema_version`) VALUES (?1);",
        &[Bind::Int(version)],
    )?;
    Ok(())
}

fn upgrade_to_library<S: MetadataSource>(source: &S, stored: i64) -> Result<()> {
    for version in (stored + 1)..=registry::LIBRARY_SCHEMA_VERSION {
        let queries = registry::upgrade_queries(version).ok_or_else(|| {
            MetadataError::Internal(format!("registry has no upgrade to version {version}"))
        })?;
        run_in_transaction(source, |s| {
            run_queries(s, queries)?;
            write_schema_version(s, version)
        })?;
        info!(version, "applied upgrade migration");
    }
    Ok(())
}

fn verify_head_tables<S: MetadataSource>(source: &S) -> Result<()> {
    for table in registry::HEAD_TABLES {
        if !table_exists(source, table)? {
            return Err(MetadataError::Aborted(format!(
                "required table '{table}' is missing"
            )));
        }
    }
    Ok(())
}

fn run_verification<S: MetadataSource>(source: &S, queries: &[&str]) -> Result<()> {
    for query in queries {
        let record_set = source.execute_query(query, &[])?;
        let cell = record_set.single_cell().ok_or_else(|| {
            MetadataError::Internal(format!(
                "verification query did not return a single cell: {query}"
            ))
        })?;
        match cell.as_deref() {
            Some("1" | "true") => {},
            Some("0" | "false") => {
                return Err(MetadataError::Internal(format!(
                    "verification query returned false: {query}"
                )));
            },
            _ => {
                return Err(MetadataError::Internal(format!(
                    "verification query returned a non-boolean value: {query}"
                )));
            },
        }
    }
    Ok(())
}
