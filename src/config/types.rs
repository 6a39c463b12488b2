use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct GalleryConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite database file, created on first open
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Maximum pooled connections
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// How long to wait for a free pooled connection
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// How long a writer waits on a locked database before failing
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("puzzlegallery.db")
}
fn default_pool_size() -> u32 {
    4
}
fn default_connection_timeout() -> u64 {
    30
}
fn default_busy_timeout() -> u64 {
    5000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_size: default_pool_size(),
            connection_timeout_secs: default_connection_timeout(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaginationConfig {
    /// Images per gallery page (default: 20)
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

pub(crate) fn default_page_size() -> u64 {
    20
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Deadline applied to requests that carry none (absent = no deadline)
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Warn every this many lost id-allocation races
    #[serde(default = "default_contention_warn_after")]
    pub contention_warn_after: u32,

    /// Give up allocating an id after this many attempts (absent = never)
    #[serde(default)]
    pub max_allocation_attempts: Option<u32>,
}

fn default_contention_warn_after() -> u32 {
    8
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: None,
            contention_warn_after: default_contention_warn_after(),
            max_allocation_attempts: None,
        }
    }
}
