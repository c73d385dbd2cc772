use crate::{
    error::{ErrorOrigin, FetchError},
    query::{filter::OrderBy, predicate::Predicate},
    schema::TableRef,
    value::SqlValue,
};

/// Ordering-suppression suffix for grouped branches. MySQL-family
/// optimizers impose an implicit per-branch sort for GROUP BY unless an
/// explicit no-op ordering is both named (`ORDER BY NULL`) and forced into
/// acceptance by an unconditional max-rows limit. This is an
/// engine-specific tuning detail, not a portable contract; a different
/// storage engine needs its own equivalent hint.
const GROUP_ORDER_SUPPRESS: &str = " ORDER BY NULL LIMIT 18446744073709551615";

///
/// UnionBranch
///
/// One structurally parallel sub-query: projection, source table, its own
/// predicate, optional GROUP BY and index hint. A branch whose predicate
/// is empty has been filtered to nothing and is omitted from the
/// composition entirely, since it must not contribute planner noise.
///

#[derive(Clone, Debug)]
pub struct UnionBranch {
    table: TableRef,
    projection: Vec<String>,
    predicate: Predicate,
    group_by: Option<String>,
    index_hint: Option<String>,
}

impl UnionBranch {
    #[must_use]
    pub fn new(table: TableRef, projection: impl IntoIterator<Item = String>) -> Self {
        Self {
            table,
            projection: projection.into_iter().collect(),
            predicate: Predicate::new(),
            group_by: None,
            index_hint: None,
        }
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    #[must_use]
    pub fn with_group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by = Some(column.into());
        self
    }

    #[must_use]
    pub fn with_index_hint(mut self, index: impl Into<String>) -> Self {
        self.index_hint = Some(index.into());
        self
    }

    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.predicate.is_empty()
    }

    // Render this branch without outer parentheses.
    fn render(&self, suppress_group_ordering: bool) -> String {
        let mut out = String::with_capacity(256);

        out.push_str("SELECT ");
        out.push_str(&self.projection.join(","));
        out.push_str(" FROM ");
        out.push_str(&self.table.from_clause());

        if let Some(index) = &self.index_hint {
            out.push_str(" FORCE INDEX (");
            out.push_str(index);
            out.push(')');
        }

        out.push_str(&self.predicate.render());

        if let Some(group_by) = &self.group_by {
            out.push_str(" GROUP BY ");
            out.push_str(group_by);

            if suppress_group_ordering {
                out.push_str(GROUP_ORDER_SUPPRESS);
            }
        }

        out
    }
}

///
/// ComposedQuery
///
/// A fully rendered query: SQL text plus bind values in placeholder order.
/// This is the only artifact the cursor layer accepts.
///

#[derive(Clone, Debug)]
pub struct ComposedQuery {
    pub sql: String,
    pub binds: Vec<SqlValue>,
}

///
/// UnionQuery
///
/// N-branch `UNION ALL` composer. Suppressed branches are dropped, the
/// survivors parenthesized when more than one remains, and the final
/// ordering (if any) appended once after all branches, never inside a
/// branch unless it is the only one.
///

#[derive(Clone, Debug, Default)]
pub struct UnionQuery {
    branches: Vec<UnionBranch>,
    order_by: OrderBy,
}

impl UnionQuery {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            branches: Vec::new(),
            order_by: OrderBy::none(),
        }
    }

    #[must_use]
    pub fn branch(mut self, branch: UnionBranch) -> Self {
        self.branches.push(branch);
        self
    }

    #[must_use]
    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    /// Compose the final query text and bind list.
    pub fn compose(&self) -> Result<ComposedQuery, FetchError> {
        let Some(first) = self.branches.first() else {
            return Err(FetchError::configuration(
                ErrorOrigin::Union,
                "union composition requires at least one branch",
            ));
        };

        let live: Vec<&UnionBranch> = self
            .branches
            .iter()
            .filter(|branch| !branch.is_suppressed())
            .collect();

        // Every branch filtered to nothing: fall back to the canonical
        // no-rows query rather than an empty statement.
        if live.is_empty() {
            return Ok(ComposedQuery {
                sql: format!("SELECT 1 FROM {} WHERE (0=1)", first.table.name()),
                binds: Vec::new(),
            });
        }

        let unioned = live.len() > 1;
        let has_final_order = !self.order_by.is_empty();

        let mut sql = String::with_capacity(512);
        let mut binds: Vec<SqlValue> = Vec::new();

        for (i, branch) in live.iter().enumerate() {
            if i > 0 {
                sql.push_str(" UNION ALL ");
            }

            let suppress = unioned || !has_final_order;

            if unioned {
                sql.push('(');
            }
            sql.push_str(&branch.render(suppress));
            if unioned {
                sql.push(')');
            }

            binds.extend(branch.predicate.binds());
        }

        sql.push_str(&self.order_by.render());

        Ok(ComposedQuery { sql, binds })
    }
}
