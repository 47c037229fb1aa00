use crate::error::Result;
use crate::mem_impl::MemDatabase;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TRY_LOCK_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SHOW_HIDDEN_COLUMNS: bool = false;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    // Maximum wait of DDL operations on the table lock.
    // Operation fails with DDL error once exceeded.
    pub try_lock_timeout_ms: u64,
    // Whether metadata resolution returns hidden and shadow columns.
    pub show_hidden_columns: bool,
}

impl CatalogConfig {
    /// Parse config from TOML. Missing keys take default values.
    #[inline]
    pub fn from_toml(s: &str) -> Result<Self> {
        let config = toml::from_str(s)?;
        Ok(config)
    }

    #[inline]
    pub fn try_lock_timeout_ms(mut self, try_lock_timeout_ms: u64) -> Self {
        self.try_lock_timeout_ms = try_lock_timeout_ms;
        self
    }

    #[inline]
    pub fn show_hidden_columns(mut self, show_hidden_columns: bool) -> Self {
        self.show_hidden_columns = show_hidden_columns;
        self
    }

    #[inline]
    pub fn try_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.try_lock_timeout_ms)
    }

    #[inline]
    pub fn build(self) -> MemDatabase {
        MemDatabase::new(self)
    }
}

impl Default for CatalogConfig {
    #[inline]
    fn default() -> Self {
        CatalogConfig {
            try_lock_timeout_ms: DEFAULT_TRY_LOCK_TIMEOUT_MS,
            show_hidden_columns: DEFAULT_SHOW_HIDDEN_COLUMNS,
        }
    }
}
