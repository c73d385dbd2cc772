use crate::{query::filter::Filter, value::SqlValue};

///
/// Predicate
///
/// Incremental boolean-expression assembly. Fragments render in append
/// order: callers sequence filters from most to least selective so the
/// generated clause lines up with index selectivity, and the engine never
/// reorders them. An empty predicate renders to the empty string, never a
/// dangling `WHERE` or `AND`.
///

#[derive(Clone, Debug, Default)]
pub struct Predicate {
    fragments: Vec<Filter>,
}

impl Predicate {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fragments: Vec::new(),
        }
    }

    /// Append one fragment. Absent fragments leave the predicate unchanged.
    pub fn append(&mut self, fragment: Filter) -> &mut Self {
        if !fragment.is_empty() {
            self.fragments.push(fragment);
        }
        self
    }

    /// Builder-style [`Self::append`].
    #[must_use]
    pub fn with(mut self, fragment: Filter) -> Self {
        self.append(fragment);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Render `" WHERE f1 AND f2 ..."`, or the empty string.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();

        for fragment in &self.fragments {
            if out.is_empty() {
                out.push_str(" WHERE ");
            } else {
                out.push_str(" AND ");
            }
            out.push_str(fragment.clause());
        }

        out
    }

    /// Bind values in placeholder order across all fragments.
    #[must_use]
    pub fn binds(&self) -> Vec<SqlValue> {
        self.fragments
            .iter()
            .flat_map(|fragment| fragment.binds().iter().cloned())
            .collect()
    }
}
