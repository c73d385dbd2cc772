//! Shared fixtures: an event-log-style entity (one parent row per event,
//! one physical row per metadata pair) over the scripted executor.
#![allow(dead_code)]

use telarc_core::{
    config::FetchConfig,
    decode,
    error::FetchError,
    exec::{
        CompositeKey, FlattenRowMapper, KeyPart, RowMapper, RowStream, ScriptedExecutor,
        ScriptedRow,
    },
    fetch::FetchSession,
    identity::{ResolvedIdentity, Venue},
    query::{Filter, Predicate, UnionBranch, UnionQuery},
    schema::ArchiveSchema,
    value::SqlValue,
};

pub fn schema() -> ArchiveSchema {
    ArchiveSchema::new([
        ("Session".to_string(), "s".to_string()),
        ("Event".to_string(), "e".to_string()),
        ("EventMetadata".to_string(), "em".to_string()),
    ])
}

pub fn session(executor: ScriptedExecutor) -> FetchSession<ScriptedExecutor> {
    FetchSession::new(executor, schema(), FetchConfig::default())
        .expect("default session should construct")
}

pub fn session_row(host_id: i64, session_id: u64, host: &str, venue: &str) -> ScriptedRow {
    ScriptedRow::new()
        .with("hostId", host_id)
        .with("sessionId", session_id)
        .with("host", host)
        .with("venueType", venue)
        .with("spacecraftId", 76_i64)
        .with("dssId", 14_i64)
}

pub fn event_row(
    host_id: i64,
    session_id: u64,
    event_id: i64,
    name: &str,
    metadata: Option<(&str, &str)>,
) -> ScriptedRow {
    let row = ScriptedRow::new()
        .with("hostId", host_id)
        .with("sessionId", session_id)
        .with("eventId", event_id)
        .with("name", name);

    match metadata {
        Some((keyword, value)) => row.with("keyword", keyword).with("value", value),
        None => row
            .with("keyword", SqlValue::Null)
            .with("value", SqlValue::Null),
    }
}

/// One-branch query over the Event table with the given predicate.
pub fn event_query(predicate: Predicate) -> UnionQuery {
    let table = schema().table("Event").expect("Event table is configured");

    UnionQuery::new().branch(
        UnionBranch::new(
            table.clone(),
            [
                table.col("hostId"),
                table.col("sessionId"),
                table.col("eventId"),
                table.col("name"),
            ],
        )
        .with_predicate(predicate),
    )
}

/// A predicate that always survives branch suppression.
pub fn live_predicate() -> Predicate {
    let table = schema().table("Event").expect("Event table is configured");
    Predicate::new().with(Filter::equals(&table, "isRealtime", 1_i64))
}

///
/// EventRecord
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EventRecord {
    pub event_id: i64,
    pub name: String,
    pub host: String,
    pub venue: Venue,
    pub metadata: Vec<(String, String)>,
}

///
/// EventMapper
///
/// Plain one-row-per-record mapper.
///

pub struct EventMapper;

impl RowMapper for EventMapper {
    type Record = EventRecord;

    fn map_row(
        &self,
        row: &dyn RowStream,
        identity: &ResolvedIdentity,
    ) -> Result<Self::Record, FetchError> {
        Ok(EventRecord {
            event_id: decode::require_long(row, "eventId")?,
            name: decode::require_text(row, "name")?,
            host: identity.host_name.clone(),
            venue: identity.venue,
            metadata: Vec::new(),
        })
    }
}

///
/// EventFlattenMapper
///
/// Flattening mapper: parent key is (hostId, sessionId, eventId); each
/// physical row contributes at most one metadata pair.
///

pub struct EventFlattenMapper;

impl EventFlattenMapper {
    fn metadata_pair(row: &dyn RowStream) -> Result<Option<(String, String)>, FetchError> {
        let keyword = decode::opt_text(row, "keyword")?;
        let value = decode::opt_text(row, "value")?;

        match (keyword, value) {
            (Some(keyword), Some(value)) => Ok(Some((keyword, value))),
            _ => Ok(None),
        }
    }
}

impl FlattenRowMapper for EventFlattenMapper {
    type Aggregate = EventRecord;

    fn key(&self, row: &dyn RowStream) -> Result<CompositeKey, FetchError> {
        Ok(CompositeKey::new([
            KeyPart::Long(decode::require_long(row, "hostId")?),
            KeyPart::Ulong(decode::require_ulong(row, "sessionId")?),
            KeyPart::Long(decode::require_long(row, "eventId")?),
        ]))
    }

    fn start(
        &self,
        row: &dyn RowStream,
        identity: &ResolvedIdentity,
    ) -> Result<Self::Aggregate, FetchError> {
        let mut record = EventRecord {
            event_id: decode::require_long(row, "eventId")?,
            name: decode::require_text(row, "name")?,
            host: identity.host_name.clone(),
            venue: identity.venue,
            metadata: Vec::new(),
        };

        if let Some(pair) = Self::metadata_pair(row)? {
            record.metadata.push(pair);
        }

        Ok(record)
    }

    fn merge(
        &self,
        aggregate: &mut Self::Aggregate,
        row: &dyn RowStream,
    ) -> Result<(), FetchError> {
        if let Some(pair) = Self::metadata_pair(row)? {
            aggregate.metadata.push(pair);
        }

        Ok(())
    }
}
