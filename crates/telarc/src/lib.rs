//! Public surface for the telarc query engine.
//!
//! ## Crate layout
//! - `core`: query construction, identity resolution, streaming cursors,
//!   join flattening, and the executor seams.
//!
//! The `prelude` module mirrors the surface an entity fetch client uses.

pub use telarc_core as core;

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use telarc_core::error::FetchError;

///
/// Fetch-client prelude
///

pub mod prelude {
    pub use telarc_core::{
        DEFAULT_BATCH_SIZE,
        config::FetchConfig,
        error::FetchError,
        exec::{
            BatchCursor, CompositeKey, FlattenRowMapper, JoinFlattener, KeyPart, RowMapper,
        },
        fetch::FetchSession,
        identity::{IdentityContext, IdentityResolver, ResolvedIdentity, Venue},
        query::{
            Filter, OrderBy, OrderDirection, PartitionedIdSet, Predicate, TimeBound, TimeKind,
            TimeRange, UnionBranch, UnionQuery,
        },
        schema::{ArchiveSchema, TableRef, TimeFormat},
        value::SqlValue,
    };
}
