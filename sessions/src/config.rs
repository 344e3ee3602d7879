use crate::errors::{SessionError, SessionResult};
use crate::session::SessionOptions;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub http_addr: String,
    /// Cookie name of the session used by the built-in routes
    pub session_name: String,
    /// Seconds between sweeps of expired sessions, 0 disables the sweep
    pub cleanup_interval_secs: u64,
    /// Options applied to newly created sessions
    pub cookie: SessionOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            http_addr: "127.0.0.1:8080".to_string(),
            session_name: "session".to_string(),
            cleanup_interval_secs: 300,
            cookie: SessionOptions::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> SessionResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            SessionError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            SessionError::Config(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Checks values the server relies on: a usable cookie name and a
    /// `max_age` that still yields an expiry date.
    pub fn validate(&self) -> SessionResult<()> {
        if !crate::session::is_cookie_name_valid(&self.session_name) {
            return Err(SessionError::Config(format!(
                "Invalid session name: {}",
                self.session_name
            )));
        }

        self.cookie
            .expires_at(Utc::now())
            .map_err(|e| SessionError::Config(format!("Invalid cookie options: {}", e)))?;

        Ok(())
    }

    /// Loads configuration from the default location
    pub fn load_from_default() -> SessionResult<Self> {
        Self::load_from_file(&get_default_config_file()?)
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> SessionResult<()> {
        let content = toml::to_string(self).map_err(|e| {
            SessionError::Config(format!("Failed to serialize config: {}", e))
        })?;

        // Ensure the directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SessionError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content).map_err(|e| {
            SessionError::Config(format!("Failed to write config file: {}", e))
        })
    }
}

/// Helper function to get default config file path
pub fn get_default_config_file() -> SessionResult<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        SessionError::Config("Could not determine config directory".to_string())
    })?;

    Ok(config_dir.join("gemini-sessions").join("config.toml"))
}
