//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "BEATARENA_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "beatarena.db";

/// Directory inside the root folder holding submission excerpts
pub const UPLOADS_DIR: &str = "uploads";

/// Service configuration
///
/// Every field has a default so an empty (or missing) TOML file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Root folder from the config file (lower priority than CLI and env)
    pub root_folder: Option<PathBuf>,
    /// Votes each user may cast per contest
    pub votes_per_contest: u32,
    /// Maximum excerpt length in seconds
    pub max_excerpt_seconds: f64,
    /// Longest uploaded track accepted, in seconds of decoded audio
    pub max_track_seconds: f64,
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
    /// Session lifetime in hours
    pub session_ttl_hours: i64,
    /// Mark cookies `Secure` (turn off only for plain-HTTP development)
    pub secure_cookies: bool,
    /// Emails that receive the admin role on registration
    pub admin_emails: Vec<String>,
    /// Google OAuth client (login via Google disabled when absent)
    pub google: Option<GoogleConfig>,
}

/// Google OAuth client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5780".to_string(),
            root_folder: None,
            votes_per_contest: 10,
            max_excerpt_seconds: 60.0,
            max_track_seconds: 900.0,
            max_upload_bytes: 10 * 1024 * 1024,
            session_ttl_hours: 168,
            secure_cookies: true,
            admin_emails: Vec::new(),
            google: None,
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit path, the default location, or defaults
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// config file is not.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => default_config_file().filter(|p| p.exists()),
        };

        match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let content = std::fs::read_to_string(&path)?;
                Self::from_toml_str(&content)
            }
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.votes_per_contest == 0 {
            return Err(Error::Config("votes_per_contest must be at least 1".to_string()));
        }
        if !(self.max_excerpt_seconds.is_finite() && self.max_excerpt_seconds > 0.0) {
            return Err(Error::Config("max_excerpt_seconds must be positive".to_string()));
        }
        if !(self.max_track_seconds.is_finite() && self.max_track_seconds > 0.0) {
            return Err(Error::Config("max_track_seconds must be positive".to_string()));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be positive".to_string()));
        }
        if self.session_ttl_hours <= 0 {
            return Err(Error::Config("session_ttl_hours must be positive".to_string()));
        }
        Ok(())
    }

    /// True when `email` is listed in `admin_emails` (case-insensitive)
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email.trim()))
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. `root_folder` from the config file
/// 4. OS-dependent default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &Config,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Paths derived from the root folder
#[derive(Debug, Clone)]
pub struct RootFolder {
    root: PathBuf,
}

impl RootFolder {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root and uploads directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.uploads_path())?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }
}

fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("beatarena").join("config.toml"))
}

fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("beatarena"))
        .unwrap_or_else(|| PathBuf::from("./beatarena_data"))
}
