//! Configuration management for css-reload.
//!
//! Parses `cr.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.host`
//! - `watch.base_dir`
//! - `agent.script`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override watched base directory.
    pub base_dir: Option<PathBuf>,
    /// Override agent debug mode.
    pub debug: Option<bool>,
}

/// Configuration filename to search for.
pub const CONFIG_FILENAME: &str = "cr.toml";

/// Default watch pattern.
const DEFAULT_PATTERN: &str = "**/*.css";

/// Largest accepted debounce window.
const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Watch configuration (paths are relative strings from TOML).
    watch: WatchConfigRaw,
    /// Agent configuration (paths are relative strings from TOML).
    agent: AgentConfigRaw,

    /// Resolved watch configuration (set after loading).
    #[serde(skip)]
    pub watch_resolved: WatchConfig,
    /// Resolved agent configuration (set after loading).
    #[serde(skip)]
    pub agent_resolved: AgentConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 7980,
        }
    }
}

/// Raw watch configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WatchConfigRaw {
    base_dir: Option<String>,
    patterns: Option<Vec<String>>,
    debounce_ms: Option<u64>,
}

/// Resolved watch configuration with absolute paths.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Directory whose files are served under `/`.
    pub base_dir: PathBuf,
    /// Glob patterns of files to watch, relative to `base_dir`.
    pub patterns: Vec<String>,
    /// Window for coalescing filesystem events.
    pub debounce_ms: u64,
}

impl WatchConfig {
    /// Debounce window as a [`Duration`].
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            patterns: vec![DEFAULT_PATTERN.to_owned()],
            debounce_ms: 100,
        }
    }
}

/// Raw agent configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct AgentConfigRaw {
    script: Option<String>,
    debug: Option<bool>,
}

/// Resolved agent configuration.
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    /// Agent script served at `/cr/css-reload.js`.
    pub script: PathBuf,
    /// Reload connected pages when the agent script changes.
    pub debug: bool,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`server.host`").
        field: String,
        /// Error message (e.g., "${`CR_HOST`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `cr.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(base_dir) = &settings.base_dir {
            self.watch_resolved.base_dir.clone_from(base_dir);
        }
        if let Some(debug) = settings.debug {
            self.agent_resolved.debug = debug;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            watch: WatchConfigRaw::default(),
            agent: AgentConfigRaw::default(),
            watch_resolved: WatchConfig {
                base_dir: base.to_path_buf(),
                ..WatchConfig::default()
            },
            agent_resolved: AgentConfig {
                script: base.join("client").join("css-reload.js"),
                debug: false,
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file and after CLI settings
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_watch()?;
        Ok(())
    }

    /// Validate server configuration.
    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        Ok(())
    }

    /// Validate watch configuration.
    fn validate_watch(&self) -> Result<(), ConfigError> {
        let watch = &self.watch_resolved;

        if watch.patterns.is_empty() {
            return Err(ConfigError::Validation(
                "watch.patterns must contain at least one pattern".to_owned(),
            ));
        }
        for pattern in &watch.patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("watch.patterns: invalid pattern {pattern:?}: {e}"))
            })?;
        }

        if watch.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Validation(format!(
                "watch.debounce_ms cannot exceed {MAX_DEBOUNCE_MS}"
            )));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;

        if let Some(ref base_dir) = self.watch.base_dir {
            self.watch.base_dir = Some(expand::expand_env(base_dir, "watch.base_dir")?);
        }
        if let Some(ref script) = self.agent.script {
            self.agent.script = Some(expand::expand_env(script, "agent.script")?);
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.watch_resolved = WatchConfig {
            base_dir: resolve(self.watch.base_dir.as_deref(), "."),
            patterns: self
                .watch
                .patterns
                .clone()
                .unwrap_or_else(|| vec![DEFAULT_PATTERN.to_owned()]),
            debounce_ms: self.watch.debounce_ms.unwrap_or(100),
        };

        self.agent_resolved = AgentConfig {
            script: resolve(self.agent.script.as_deref(), "client/css-reload.js"),
            debug: self.agent.debug.unwrap_or(false),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 7980);
        assert_eq!(config.watch_resolved.base_dir, PathBuf::from("/test"));
        assert_eq!(config.watch_resolved.patterns, vec!["**/*.css"]);
        assert_eq!(config.watch_resolved.debounce(), Duration::from_millis(100));
        assert_eq!(
            config.agent_resolved.script,
            PathBuf::from("/test/client/css-reload.js")
        );
        assert!(!config.agent_resolved.debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 7980);
    }

    #[test]
    fn test_parse_server_config() {
        let toml = r#"
[server]
host = "0.0.0.0"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[watch]
base_dir = "public"
patterns = ["**/*.css", "**/*.scss"]
debounce_ms = 250

[agent]
script = "dist/agent.js"
debug = true
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(
            config.watch_resolved.base_dir,
            PathBuf::from("/project/public")
        );
        assert_eq!(config.watch_resolved.patterns, vec!["**/*.css", "**/*.scss"]);
        assert_eq!(config.watch_resolved.debounce_ms, 250);
        assert_eq!(
            config.agent_resolved.script,
            PathBuf::from("/project/dist/agent.js")
        );
        assert!(config.agent_resolved.debug);
    }

    #[test]
    fn test_resolve_paths_defaults() {
        let mut config: Config = toml::from_str("").unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.watch_resolved.base_dir, PathBuf::from("/project/."));
        assert_eq!(config.watch_resolved.patterns, vec!["**/*.css"]);
        assert_eq!(
            config.agent_resolved.script,
            PathBuf::from("/project/client/css-reload.js")
        );
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            host: Some("0.0.0.0".to_owned()),
            base_dir: Some(PathBuf::from("/srv/site")),
            debug: Some(true),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 7980); // Unchanged
        assert_eq!(config.watch_resolved.base_dir, PathBuf::from("/srv/site"));
        assert!(config.agent_resolved.debug);
    }

    #[test]
    fn test_apply_cli_settings_port() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            port: Some(9000),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1"); // Unchanged
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.server.host = String::new();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.host"));
    }

    #[test]
    fn test_validate_rejects_port_zero() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.server.port = 0;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_validate_rejects_no_patterns() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.watch_resolved.patterns.clear();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("watch.patterns"));
    }

    #[test]
    fn test_validate_rejects_invalid_pattern() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.watch_resolved.patterns = vec!["[".to_owned()];

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("invalid pattern"));
    }

    #[test]
    fn test_validate_rejects_long_debounce() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.watch_resolved.debounce_ms = 60_000;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("watch.debounce_ms"));
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/cr.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
[server]
port = 8123

[watch]
base_dir = "static"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.server.port, 8123);
        assert_eq!(config.watch_resolved.base_dir, dir.path().join("static"));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_applies_cli_settings_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[server]\nport = 8123\n").unwrap();
        let settings = CliSettings {
            port: Some(9999),
            ..Default::default()
        };

        let config = Config::load(Some(&path), Some(&settings)).unwrap();
        assert_eq!(config.server.port, 9999);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[watch]\npatterns = []\n").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_expand_env_vars_default() {
        let mut config: Config = toml::from_str(
            r#"
[server]
host = "${CR_TEST_UNSET_HOST_VAR:-0.0.0.0}"
"#,
        )
        .unwrap();

        config.expand_env_vars().unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
