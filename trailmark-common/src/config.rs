//! Configuration loading and root folder resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "trailmark.db";

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Create the root folder if missing and return the database path
pub fn ensure_root_folder(root: &PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(root)?;
    Ok(root.join(DATABASE_FILE))
}

/// Locate the platform configuration file
fn locate_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/trailmark/config.toml first, then /etc/trailmark/config.toml
        if let Some(path) = dirs::config_dir().map(|d| d.join("trailmark").join("config.toml")) {
            if path.exists() {
                return Ok(path);
            }
        }
        let system_config = PathBuf::from("/etc/trailmark/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    }

    let path = dirs::config_dir()
        .map(|d| d.join("trailmark").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("trailmark"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/trailmark"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("trailmark"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/trailmark"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("trailmark"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\trailmark"))
    } else {
        PathBuf::from("./trailmark_data")
    }
}

/// Engine tunables loaded from the settings table at startup
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Minimum fingerprint confidence (0-100) required to attempt recognition
    pub fingerprint_confidence_threshold: i64,
    /// Session lifetime from issuance, in hours
    pub session_ttl_hours: i64,
    /// Sessions inactive longer than this are swept, in hours
    pub session_sweep_cutoff_hours: i64,
    /// How often the sweeper task runs, in seconds
    pub session_sweep_interval_secs: i64,
    /// Access token lifetime, in days
    pub access_token_ttl_days: i64,
    /// Secret for access token signing (random, non-empty)
    pub access_token_secret: String,
}

impl EngineSettings {
    /// Load engine settings from the settings table.
    ///
    /// All keys are guaranteed to exist after `init_database` has run;
    /// missing or unparseable values fall back to the compiled defaults.
    pub async fn load(pool: &sqlx::SqlitePool) -> Result<Self> {
        Ok(Self {
            fingerprint_confidence_threshold: load_i64(
                pool,
                "fingerprint_confidence_threshold",
                60,
            )
            .await?,
            session_ttl_hours: load_i64(pool, "session_ttl_hours", 24).await?,
            session_sweep_cutoff_hours: load_i64(pool, "session_sweep_cutoff_hours", 48).await?,
            session_sweep_interval_secs: load_i64(pool, "session_sweep_interval_secs", 3600)
                .await?,
            access_token_ttl_days: load_i64(pool, "access_token_ttl_days", 7).await?,
            access_token_secret: load_string(pool, "access_token_secret").await?,
        })
    }
}

async fn load_i64(pool: &sqlx::SqlitePool, key: &str, default: i64) -> Result<i64> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(value
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default))
}

async fn load_string(pool: &sqlx::SqlitePool, key: &str) -> Result<String> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    value.ok_or_else(|| Error::Config(format!("Setting '{}' not initialized", key)))
}
