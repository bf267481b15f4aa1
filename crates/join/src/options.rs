use anyhow::{Context, Result};
use fromenv::FromEnv;
use serde::Deserialize;

/// Join behaviour configured per owning module (typically one per DAO).
///
/// Loaded from the environment with [`JoinOptions::load`] or deserialized from an
/// application config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, FromEnv)]
#[serde(default)]
pub struct JoinOptions {
    /// Accept owner keys that are `NULL` or the type's default value instead of
    /// failing key extraction with [`crate::JoinError::NullKey`].
    #[env(from = "JOIN_ALLOW_NULL_KEY", default = "false")]
    pub allow_null_join_key: bool,

    /// The database cascades deletes from referenced rows to intermediate rows, so the
    /// separate intermediate-table delete of a two-hop relation may be skipped.
    #[env(from = "JOIN_CASCADE_DELETE_IN_DB", default = "false")]
    pub cascade_delete_in_db: bool,
}

impl JoinOptions {
    /// Load options from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value that isn't a boolean.
    pub fn load() -> Result<Self> {
        Self::from_env().finalize().context("issue loading join options")
    }

    /// Set [`JoinOptions::allow_null_join_key`].
    #[must_use]
    pub const fn allow_null_join_key(mut self, allow: bool) -> Self {
        self.allow_null_join_key = allow;
        self
    }

    /// Set [`JoinOptions::cascade_delete_in_db`].
    #[must_use]
    pub const fn cascade_delete_in_db(mut self, cascade: bool) -> Self {
        self.cascade_delete_in_db = cascade;
        self
    }
}
