//! Edge manager: events, attributions and associations.
//!
//! Edges refer to existing endpoint rows; a missing endpoint is a malformed
//! request rather than a failed lookup. Pair uniqueness for attributions
//! and associations is enforced by the engine's unique indexes and surfaces
//! as `AlreadyExists`.

use chrono::Utc;
use lineage_core::{
    Artifact, Association, Attribution, Context, Event, EventType, Execution, MetadataError,
    PathStep, Result,
};

use super::{cell_i64, cell_opt_i64, cell_text, nodes};
use crate::source::{Bind, MetadataSource};

pub(crate) fn create_event<S: MetadataSource>(source: &S, event: &Event) -> Result<i64> {
    let artifact_id = event
        .artifact_id
        .ok_or_else(|| MetadataError::InvalidArgument("event has no artifact_id".to_string()))?;
    let execution_id = event
        .execution_id
        .ok_or_else(|| MetadataError::InvalidArgument("event has no execution_id".to_string()))?;
    if event.event_type == EventType::Unknown {
        return Err(MetadataError::InvalidArgument(
            "event type is required".to_string(),
        ));
    }
    ensure_endpoint::<Artifact, S>(source, artifact_id)?;
    ensure_endpoint::<Execution, S>(source, execution_id)?;

    let milliseconds = event
        .milliseconds_since_epoch
        .unwrap_or_else(|| Utc::now().timestamp_millis());

    source.execute_query(
        "INSERT INTO `Event` (`artifact_id`, `execution_id`, `type`, `milliseconds_since_epoch`) \
         VALUES (?1, ?2, ?3, ?4);",
        &[
            Bind::Int(artifact_id),
            Bind::Int(execution_id),
            Bind::Int(event.event_type.code()),
            Bind::Int(milliseconds),
        ],
    )?;
    let event_id = source.last_insert_id()?;

    for (position, step) in event.path.iter().enumerate() {
        let (is_index_step, value) = match step {
            PathStep::Index(index) => (1_i64, index.to_string()),
            PathStep::Key(key) => (0_i64, key.clone()),
        };
        source.execute_query(
            "INSERT INTO `EventPath` (`event_id`, `step_position`, `is_index_step`, `step_value`) \
             VALUES (?1, ?2, ?3, ?4);",
            &[
                Bind::Int(event_id),
                Bind::Int(position as i64),
                Bind::Int(is_index_step),
                Bind::Text(value),
            ],
        )?;
    }
    Ok(event_id)
}

pub(crate) fn find_events_by_artifact<S: MetadataSource>(
    source: &S,
    artifact_id: i64,
) -> Result<Vec<Event>> {
    find_events_where(source, "artifact_id", artifact_id)
}

pub(crate) fn find_events_by_execution<S: MetadataSource>(
    source: &S,
    execution_id: i64,
) -> Result<Vec<Event>> {
    find_events_where(source, "execution_id", execution_id)
}

pub(crate) fn create_attribution<S: MetadataSource>(
    source: &S,
    attribution: &Attribution,
) -> Result<i64> {
    let context_id = attribution.context_id.ok_or_else(|| {
        MetadataError::InvalidArgument("attribution has no context_id".to_string())
    })?;
    let artifact_id = attribution.artifact_id.ok_or_else(|| {
        MetadataError::InvalidArgument("attribution has no artifact_id".to_string())
    })?;
    ensure_endpoint::<Context, S>(source, context_id)?;
    ensure_endpoint::<Artifact, S>(source, artifact_id)?;

    source.execute_query(
        "INSERT INTO `Attribution` (`context_id`, `artifact_id`) VALUES (?1, ?2);",
        &[Bind::Int(context_id), Bind::Int(artifact_id)],
    )?;
    source.last_insert_id()
}

pub(crate) fn create_association<S: MetadataSource>(
    source: &S,
    association: &Association,
) -> Result<i64> {
    let context_id = association.context_id.ok_or_else(|| {
        MetadataError::InvalidArgument("association has no context_id".to_string())
    })?;
    let execution_id = association.execution_id.ok_or_else(|| {
        MetadataError::InvalidArgument("association has no execution_id".to_string())
    })?;
    ensure_endpoint::<Context, S>(source, context_id)?;
    ensure_endpoint::<Execution, S>(source, execution_id)?;

    source.execute_query(
        "INSERT INTO `Association` (`context_id`, `execution_id`) VALUES (?1, ?2);",
        &[Bind::Int(context_id), Bind::Int(execution_id)],
    )?;
    source.last_insert_id()
}

pub(crate) fn find_contexts_by_artifact<S: MetadataSource>(
    source: &S,
    artifact_id: i64,
) -> Result<Vec<Context>> {
    collect_endpoints(
        source,
        "SELECT `context_id` FROM `Attribution` WHERE `artifact_id` = ?1 ORDER BY `context_id`;",
        artifact_id,
    )
}

pub(crate) fn find_artifacts_by_context<S: MetadataSource>(
    source: &S,
    context_id: i64,
) -> Result<Vec<Artifact>> {
    collect_endpoints(
        source,
        "SELECT `artifact_id` FROM `Attribution` WHERE `context_id` = ?1 ORDER BY `artifact_id`;",
        context_id,
    )
}

pub(crate) fn find_contexts_by_execution<S: MetadataSource>(
    source: &S,
    execution_id: i64,
) -> Result<Vec<Context>> {
    collect_endpoints(
        source,
        "SELECT `context_id` FROM `Association` WHERE `execution_id` = ?1 ORDER BY `context_id`;",
        execution_id,
    )
}

pub(crate) fn find_executions_by_context<S: MetadataSource>(
    source: &S,
    context_id: i64,
) -> Result<Vec<Execution>> {
    collect_endpoints(
        source,
        "SELECT `execution_id` FROM `Association` WHERE `context_id` = ?1 ORDER BY `execution_id`;",
        context_id,
    )
}

// -- internals --------------------------------------------------------------

fn ensure_endpoint<N: nodes::Node, S: MetadataSource>(source: &S, id: i64) -> Result<()> {
    if nodes::node_exists::<N, S>(source, id)? {
        Ok(())
    } else {
        Err(MetadataError::InvalidArgument(format!(
            "{} {id} does not exist",
            N::LABEL
        )))
    }
}

fn find_events_where<S: MetadataSource>(
    source: &S,
    column: &str,
    id: i64,
) -> Result<Vec<Event>> {
    let query = format!(
        "SELECT `id`, `artifact_id`, `execution_id`, `type`, `milliseconds_since_epoch` \
         FROM `Event` WHERE `{column}` = ?1 ORDER BY `id`;"
    );
    let record_set = source.execute_query(&query, &[Bind::Int(id)])?;

    let mut events = Vec::with_capacity(record_set.records.len());
    for row in &record_set.records {
        let code = cell_i64(&row[3])?;
        let event_type = EventType::from_code(code)
            .ok_or_else(|| MetadataError::Internal(format!("unknown event type code {code}")))?;
        let event_id = cell_i64(&row[0])?;
        events.push(Event {
            id: Some(event_id),
            artifact_id: Some(cell_i64(&row[1])?),
            execution_id: Some(cell_i64(&row[2])?),
            event_type,
            path: load_path(source, event_id)?,
            milliseconds_since_epoch: cell_opt_i64(&row[4])?,
        });
    }
    Ok(events)
}

fn load_path<S: MetadataSource>(source: &S, event_id: i64) -> Result<Vec<PathStep>> {
    let record_set = source.execute_query(
        "SELECT `is_index_step`, `step_value` FROM `EventPath` \
         WHERE `event_id` = ?1 ORDER BY `step_position`;",
        &[Bind::Int(event_id)],
    )?;
    let mut path = Vec::with_capacity(record_set.records.len());
    for row in &record_set.records {
        let value = cell_text(&row[1])?;
        let step = if cell_i64(&row[0])? != 0 {
            PathStep::Index(value.parse().map_err(|e| {
                MetadataError::Internal(format!("malformed path index '{value}': {e}"))
            })?)
        } else {
            PathStep::Key(value)
        };
        path.push(step);
    }
    Ok(path)
}

fn collect_endpoints<N: nodes::Node, S: MetadataSource>(
    source: &S,
    query: &str,
    id: i64,
) -> Result<Vec<N>> {
    let record_set = source.execute_query(query, &[Bind::Int(id)])?;
    let mut endpoints = Vec::with_capacity(record_set.records.len());
    for row in &record_set.records {
        endpoints.push(nodes::find_node_by_id(source, cell_i64(&row[0])?)?);
    }
    Ok(endpoints)
}
