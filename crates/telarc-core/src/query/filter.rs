use crate::{schema::TableRef, value::SqlValue};
use std::fmt;

///
/// Filter
///
/// One optional, named predicate fragment: a rendered clause plus the bind
/// values it consumes, in placeholder order. Immutable once constructed.
///
/// An empty filter is the absent-criteria case and disappears when appended
/// to a predicate. That is the correct default for plain column filters;
/// identity key sets must instead fail closed through
/// [`crate::query::keyset::PartitionedIdSet::encode`].
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    clause: String,
    binds: Vec<SqlValue>,
}

impl Filter {
    /// The absent filter; appending it is a no-op.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            clause: String::new(),
            binds: Vec::new(),
        }
    }

    /// A raw pre-rendered fragment. The clause must be a complete boolean
    /// expression with one `?` per bind value.
    #[must_use]
    pub const fn raw(clause: String, binds: Vec<SqlValue>) -> Self {
        Self { clause, binds }
    }

    /// `(t.col = ?)`
    #[must_use]
    pub fn equals(table: &TableRef, column: &str, value: impl Into<SqlValue>) -> Self {
        Self {
            clause: format!("({} = ?)", table.col(column)),
            binds: vec![value.into()],
        }
    }

    /// `(t.col IN (?,...))`, collapsed to equality for a single member and
    /// absent for an empty member list.
    #[must_use]
    pub fn in_set<V: Into<SqlValue>>(
        table: &TableRef,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let binds: Vec<SqlValue> = values.into_iter().map(Into::into).collect();

        match binds.len() {
            0 => Self::none(),
            1 => Self {
                clause: format!("({} = ?)", table.col(column)),
                binds,
            },
            n => {
                let marks = vec!["?"; n].join(",");
                Self {
                    clause: format!("({} IN ({marks}))", table.col(column)),
                    binds,
                }
            }
        }
    }

    /// `(t.col BETWEEN ? AND ?)`
    #[must_use]
    pub fn between(
        table: &TableRef,
        column: &str,
        lo: impl Into<SqlValue>,
        hi: impl Into<SqlValue>,
    ) -> Self {
        Self {
            clause: format!("({} BETWEEN ? AND ?)", table.col(column)),
            binds: vec![lo.into(), hi.into()],
        }
    }

    /// `(t.col LIKE ?)`
    #[must_use]
    pub fn like(table: &TableRef, column: &str, pattern: impl Into<String>) -> Self {
        Self {
            clause: format!("({} LIKE ?)", table.col(column)),
            binds: vec![SqlValue::Text(pattern.into())],
        }
    }

    /// `(t.col IS NULL)`
    #[must_use]
    pub fn is_null(table: &TableRef, column: &str) -> Self {
        Self {
            clause: format!("({} IS NULL)", table.col(column)),
            binds: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clause.trim().is_empty()
    }

    #[must_use]
    pub fn clause(&self) -> &str {
        &self.clause
    }

    #[must_use]
    pub fn binds(&self) -> &[SqlValue] {
        &self.binds
    }
}

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

///
/// OrderBy
///
/// Final result ordering. Rendered once, after all union branches; never
/// inside a branch.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OrderBy {
    columns: Vec<(String, OrderDirection)>,
}

impl OrderBy {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn column(mut self, column: impl Into<String>, direction: OrderDirection) -> Self {
        self.columns.push((column.into(), direction));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Render `" ORDER BY a ASC, b DESC"`, or the empty string.
    #[must_use]
    pub fn render(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }

        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|(col, dir)| format!("{col} {dir}"))
            .collect();

        format!(" ORDER BY {}", cols.join(", "))
    }
}
