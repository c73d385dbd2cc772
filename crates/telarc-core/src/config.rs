use crate::{
    DEFAULT_BATCH_SIZE,
    error::{ErrorOrigin, FetchError},
};
use serde::{Deserialize, Serialize};

///
/// FetchConfig
///
/// Per-process fetch tuning, loaded once and injected alongside
/// [`crate::schema::ArchiveSchema`]. Dry-run replaces execution with SQL
/// capture on the executor seam; nothing in the engine branches on it.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub dry_run: bool,
}

const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
        }
    }
}

impl FetchConfig {
    /// Validate tuning values before any query is built.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.batch_size == 0 {
            return Err(FetchError::configuration(
                ErrorOrigin::Config,
                "batch size must be at least 1",
            ));
        }

        Ok(())
    }
}
