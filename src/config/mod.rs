mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<GalleryConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: GalleryConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<GalleryConfig> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./puzzlegallery.toml", "./config.toml"];

    for path_str in default_paths {
        let path = Path::new(path_str);
        if path.exists() {
            return load_config(path);
        }
    }

    let mut config = GalleryConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config)?;
    Ok(config)
}

/// Apply `PAGE_SIZE` and `GALLERY_DB_PATH` from the environment.
///
/// `lookup` stands in for `std::env::var` so tests need not touch the
/// process environment. A `PAGE_SIZE` of 0 means the default page size;
/// one that does not parse is ignored with a warning.
pub fn apply_env_overrides<F>(config: &mut GalleryConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup("PAGE_SIZE") {
        match raw.trim().parse::<u64>() {
            Ok(0) => config.pagination.page_size = default_page_size(),
            Ok(size) => config.pagination.page_size = size,
            Err(_) => tracing::warn!("Ignoring non-numeric PAGE_SIZE: {:?}", raw),
        }
    }

    if let Some(path) = lookup("GALLERY_DB_PATH").filter(|p| !p.is_empty()) {
        config.database.path = PathBuf::from(path);
    }
}

/// Validate configuration
pub fn validate_config(config: &GalleryConfig) -> Result<()> {
    if config.database.pool_size == 0 {
        anyhow::bail!("Database pool size cannot be 0");
    }

    if config.database.path.as_os_str().is_empty() {
        anyhow::bail!("Database path cannot be empty");
    }

    if config.pagination.page_size == 0 {
        anyhow::bail!("Page size cannot be 0");
    }

    if config.store.max_allocation_attempts == Some(0) {
        anyhow::bail!("max_allocation_attempts must be at least 1 when set");
    }

    if let Some(secs) = config.store.request_timeout_secs {
        if Instant::now().checked_add(Duration::from_secs(secs)).is_none() {
            anyhow::bail!("request_timeout_secs is too large: {}", secs);
        }
        if secs == 0 {
            tracing::warn!("request_timeout_secs = 0 fails every request immediately");
        }
    }

    Ok(())
}
