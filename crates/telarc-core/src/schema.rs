use crate::error::{ErrorOrigin, FetchError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// TimeFormat
///
/// Archive schema generation for fine-time columns. The legacy schema
/// stores short fine ticks that must be scaled by 10^6 to reach nanosecond
/// resolution; the extended schema is already nanosecond-scale. The engine
/// only threads this flag through to predicates and row mappers; instant
/// conversion itself lives outside the engine.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    LegacyShortFine,
    #[default]
    Extended,
}

impl TimeFormat {
    /// Multiplier taking a stored fine tick to nanosecond resolution.
    #[must_use]
    pub const fn fine_scale(self) -> u64 {
        match self {
            Self::LegacyShortFine => 1_000_000,
            Self::Extended => 1,
        }
    }
}

///
/// TableRef
///
/// One archive table plus the abbreviation every generated clause qualifies
/// its columns with. Cheap to clone; carries no database resources.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableRef {
    name: String,
    abbrev: String,
}

impl TableRef {
    #[must_use]
    pub fn new(name: impl Into<String>, abbrev: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            abbrev: abbrev.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn abbrev(&self) -> &str {
        &self.abbrev
    }

    /// Render one abbreviation-qualified column reference.
    #[must_use]
    pub fn col(&self, column: &str) -> String {
        format!("{}.{column}", self.abbrev)
    }

    /// Render the FROM-clause reference, `name AS abbrev`.
    #[must_use]
    pub fn from_clause(&self) -> String {
        format!("{} AS {}", self.name, self.abbrev)
    }
}

///
/// ArchiveSchema
///
/// Immutable schema metadata shared by every fetch: table-name-to-
/// abbreviation lookups, the partition/local-id column pair embedded in
/// every identity-scoped clause, and the fine-time format. Constructed
/// once and injected into each component; never global state.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ArchiveSchema {
    tables: BTreeMap<String, String>,

    #[serde(default = "default_partition_column")]
    partition_column: String,

    #[serde(default = "default_local_id_column")]
    local_id_column: String,

    #[serde(default)]
    time_format: TimeFormat,
}

fn default_partition_column() -> String {
    "hostId".to_string()
}

fn default_local_id_column() -> String {
    "sessionId".to_string()
}

impl ArchiveSchema {
    #[must_use]
    pub fn new(tables: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            tables: tables.into_iter().collect(),
            partition_column: default_partition_column(),
            local_id_column: default_local_id_column(),
            time_format: TimeFormat::default(),
        }
    }

    #[must_use]
    pub fn with_time_format(mut self, time_format: TimeFormat) -> Self {
        self.time_format = time_format;
        self
    }

    #[must_use]
    pub fn with_identity_columns(
        mut self,
        partition_column: impl Into<String>,
        local_id_column: impl Into<String>,
    ) -> Self {
        self.partition_column = partition_column.into();
        self.local_id_column = local_id_column.into();
        self
    }

    /// Look up one table reference by archive table name.
    pub fn table(&self, name: &str) -> Result<TableRef, FetchError> {
        let Some(abbrev) = self.tables.get(name) else {
            return Err(FetchError::configuration(
                ErrorOrigin::Config,
                format!("unknown archive table: '{name}'"),
            ));
        };

        Ok(TableRef::new(name, abbrev))
    }

    #[must_use]
    pub fn partition_column(&self) -> &str {
        &self.partition_column
    }

    #[must_use]
    pub fn local_id_column(&self) -> &str {
        &self.local_id_column
    }

    #[must_use]
    pub const fn time_format(&self) -> TimeFormat {
        self.time_format
    }
}
