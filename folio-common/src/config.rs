//! Configuration loading and root folder resolution
//!
//! Two layers:
//! 1. **TOML bootstrap** (`TomlConfig`): root folder, port, storage key,
//!    logging, analytics forwarding, CORS origin
//! 2. **Compiled defaults** (`CompiledDefaults`): used for anything the TOML
//!    file and command line leave unset
//!
//! A missing or broken config file never stops startup: it is logged and the
//! defaults are used.
//!
//! # Root folder priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `FOLIO_ROOT_FOLDER`, then `FOLIO_ROOT` environment variable
//! 3. TOML `root_folder`
//! 4. OS-dependent compiled default (fallback)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FOLIO_CONFIG";

/// Primary root folder environment variable
pub const ROOT_FOLDER_ENV_VAR: &str = "FOLIO_ROOT_FOLDER";

/// Alternative root folder environment variable
pub const ROOT_ENV_VAR: &str = "FOLIO_ROOT";

/// Default HTTP port for the consent service
pub const DEFAULT_PORT: u16 = 5780;

/// Fixed key the consent record is stored under
pub const DEFAULT_STORAGE_KEY: &str = "cookie-consent";

/// Default analytics forwarding queue depth
pub const DEFAULT_ANALYTICS_QUEUE: usize = 256;

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Data folder holding the consent store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Key the consent record is persisted under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Analytics forwarding (optional)
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// HTTP server options (optional)
    #[serde(default)]
    pub server: ServerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Where tracked interactions are forwarded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Collector URL receiving one JSON POST per tracked click
    ///
    /// When unset, tracked interactions are only logged and published on the
    /// event bus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Bounded queue between the click handler and the forwarder task
    #[serde(default = "default_analytics_queue")]
    pub queue_capacity: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            queue_capacity: default_analytics_queue(),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Site origin allowed to call the API from a browser (CORS)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_origin: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_analytics_queue() -> usize {
    DEFAULT_ANALYTICS_QUEUE
}

/// Built-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub port: u16,
    pub storage_key: String,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            port: DEFAULT_PORT,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/folio (or /var/lib/folio for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("folio"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/folio"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/folio
        dirs::data_dir()
            .map(|d| d.join("folio"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/folio"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\folio
        dirs::data_local_dir()
            .map(|d| d.join("folio"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\folio"))
    } else {
        PathBuf::from("./folio_data")
    }
}

/// Locate the config file
///
/// `FOLIO_CONFIG` wins when set (even if the file does not exist, so the
/// caller can report it). Otherwise the per-user file, then the system file
/// on Linux.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("folio").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/folio/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

/// Load the config file if one can be found, falling back to defaults
///
/// Missing or unparsable files produce a warning, never an error.
pub fn load_toml_config_or_default(path: Option<&Path>) -> TomlConfig {
    let Some(path) = path else {
        info!("No config file found, using compiled defaults");
        return TomlConfig::default();
    };

    match load_toml_config(path) {
        Ok(config) => {
            info!("Loaded config file {}", path.display());
            config
        }
        Err(e) => {
            warn!(
                "Could not load config file {} ({}), using compiled defaults",
                path.display(),
                e
            );
            TomlConfig::default()
        }
    }
}

/// Write a TOML config file atomically
///
/// Writes `<path>.tmp` first and renames it over the target so readers never
/// observe a half-written file. On Unix the file is restricted to 0600.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = tmp_path_for(path);
    std::fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(Error::Io(e));
    }

    debug!("Wrote config file {}", path.display());
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Resolves the data root folder in priority order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    /// Root folder given on the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Root folder from the TOML config
    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            debug!("{}: root folder from command line", self.module_name);
            return path.clone();
        }

        // Priority 2: Environment variables
        for var in [ROOT_FOLDER_ENV_VAR, ROOT_ENV_VAR] {
            if let Ok(path) = std::env::var(var) {
                if !path.is_empty() {
                    debug!("{}: root folder from {}", self.module_name, var);
                    return PathBuf::from(path);
                }
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.toml_root {
            debug!("{}: root folder from config file", self.module_name);
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout on first start
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Directory the file-backed consent store writes into
    pub fn store_path(&self) -> PathBuf {
        self.root_folder.join("store")
    }

    /// Create the root folder and store directory if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!("Creating root folder {}", self.root_folder.display());
        }
        std::fs::create_dir_all(self.store_path()).map_err(|e| {
            Error::Config(format!(
                "cannot create root folder {}: {}",
                self.root_folder.display(),
                e
            ))
        })
    }
}

/// Final settings for the consent service after all sources are merged
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub port: u16,
    pub storage_key: String,
    pub logging: LoggingConfig,
    pub analytics: AnalyticsConfig,
    pub server: ServerConfig,
}

impl ServiceConfig {
    /// Merge command-line values, the TOML file and compiled defaults
    pub fn resolve(
        module_name: &str,
        toml: TomlConfig,
        cli_port: Option<u16>,
        cli_root_folder: Option<PathBuf>,
    ) -> Self {
        let defaults = CompiledDefaults::for_current_platform();

        let root_folder = RootFolderResolver::new(module_name)
            .with_cli_arg(cli_root_folder)
            .with_toml(&toml)
            .resolve();

        let storage_key = toml
            .storage_key
            .filter(|k| !k.trim().is_empty())
            .unwrap_or(defaults.storage_key);

        Self {
            root_folder,
            port: cli_port.or(toml.port).unwrap_or(defaults.port),
            storage_key,
            logging: toml.logging,
            analytics: toml.analytics,
            server: toml.server,
        }
    }

    /// Bootstrap file that resolves back to these settings
    ///
    /// Every value is written out explicitly, so the file no longer depends
    /// on compiled defaults or the environment.
    pub fn to_toml(&self) -> TomlConfig {
        TomlConfig {
            root_folder: Some(self.root_folder.clone()),
            port: Some(self.port),
            storage_key: Some(self.storage_key.clone()),
            logging: self.logging.clone(),
            analytics: self.analytics.clone(),
            server: self.server.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.analytics.queue_capacity, DEFAULT_ANALYTICS_QUEUE);
    }

    #[test]
    fn test_full_toml() {
        let config: TomlConfig = toml::from_str(
            r#"
            root_folder = "/srv/folio"
            port = 6000
            storage_key = "consent-v2"

            [logging]
            level = "debug"

            [analytics]
            endpoint = "https://collect.example.com/events"
            queue_capacity = 32

            [server]
            allowed_origin = "https://example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/folio")));
        assert_eq!(config.port, Some(6000));
        assert_eq!(config.storage_key.as_deref(), Some("consent-v2"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.analytics.endpoint.as_deref(),
            Some("https://collect.example.com/events")
        );
        assert_eq!(config.analytics.queue_capacity, 32);
        assert_eq!(
            config.server.allowed_origin.as_deref(),
            Some("https://example.com")
        );
    }

    #[test]
    fn test_tmp_path_for() {
        assert_eq!(
            tmp_path_for(Path::new("/etc/folio/config.toml")),
            PathBuf::from("/etc/folio/config.toml.tmp")
        );
    }
}
