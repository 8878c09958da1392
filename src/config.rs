//! Configuration system for the task runner
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (TASKRUNNER_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{parse_base_url, HttpClientConfig};
use crate::error::{Error, Result};
use crate::worker::{RetryPolicy, RunnerOptions, WorkerSettings};

/// Main runner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Worker identity and polling defaults
    pub worker: WorkerSection,

    /// Orchestration server connection
    pub server: ServerSection,

    /// Result submission retry
    pub retry: RetrySection,

    /// Logging configuration
    pub logging: LoggingSettings,

    /// Task types started by `taskrunner run`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskEntry>,
}

/// Worker identity and polling defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    /// Identity reported to the server (host name if not set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Idle time between polls when no work is returned, in milliseconds
    pub poll_interval_ms: u64,

    /// Long-poll timeout passed to the server, in milliseconds
    pub poll_timeout_ms: u64,

    /// Largest number of tasks requested in one poll
    pub max_poll_batch: usize,

    /// Largest capacity allowed for one task type
    pub max_capacity: usize,
}

/// Orchestration server connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Base URL of the server API
    pub url: String,

    /// Access token sent as X-Authorization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Timeout for a single request, in milliseconds
    pub request_timeout_ms: u64,
}

/// Result submission retry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Attempts per result, including the first
    pub update_attempts: u32,

    /// Delay after the first failed attempt, doubled each time, in milliseconds
    pub update_base_delay_ms: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

/// One `[[tasks]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEntry {
    /// Task type to poll
    pub task_type: String,

    /// Built-in handler name
    pub handler: String,

    /// Concurrent executions
    #[serde(default = "default_task_capacity")]
    pub capacity: usize,

    /// Overrides `worker.poll_interval_ms`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    /// Overrides `worker.poll_timeout_ms`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_timeout_ms: Option<u64>,

    /// Routing domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Start paused
    #[serde(default)]
    pub paused: bool,
}

fn default_task_capacity() -> usize {
    1
}

// Default implementations

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            id: None,
            poll_interval_ms: 100,
            poll_timeout_ms: 100,
            max_poll_batch: 100,
            max_capacity: 1000,
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/api".to_string(),
            auth_token: None,
            request_timeout_ms: 30_000,
        }
    }
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            update_attempts: 3,
            update_base_delay_ms: 1000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path)?;
            config = Self::from_toml(&content)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document without touching the environment
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            PathBuf::from("taskrunner.toml"),
            dirs::config_dir()
                .map(|p| p.join("taskrunner").join("config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".taskrunner").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/taskrunner/config.toml"),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Worker settings
        if let Ok(val) = std::env::var("TASKRUNNER_WORKER_ID") {
            self.worker.id = Some(val);
        }
        if let Some(n) = env_parse("TASKRUNNER_POLL_INTERVAL_MS") {
            self.worker.poll_interval_ms = n;
        }
        if let Some(n) = env_parse("TASKRUNNER_POLL_TIMEOUT_MS") {
            self.worker.poll_timeout_ms = n;
        }
        if let Some(n) = env_parse("TASKRUNNER_MAX_POLL_BATCH") {
            self.worker.max_poll_batch = n;
        }
        if let Some(n) = env_parse("TASKRUNNER_MAX_CAPACITY") {
            self.worker.max_capacity = n;
        }

        // Server settings
        if let Ok(val) = std::env::var("TASKRUNNER_SERVER_URL") {
            self.server.url = val;
        }
        if let Ok(val) = std::env::var("TASKRUNNER_AUTH_TOKEN") {
            self.server.auth_token = Some(val);
        }
        if let Some(n) = env_parse("TASKRUNNER_REQUEST_TIMEOUT_MS") {
            self.server.request_timeout_ms = n;
        }

        // Retry settings
        if let Some(n) = env_parse("TASKRUNNER_UPDATE_ATTEMPTS") {
            self.retry.update_attempts = n;
        }
        if let Some(n) = env_parse("TASKRUNNER_UPDATE_BASE_DELAY_MS") {
            self.retry.update_base_delay_ms = n;
        }

        // Logging settings
        if let Ok(val) = std::env::var("TASKRUNNER_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("TASKRUNNER_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("TASKRUNNER_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        parse_base_url(&self.server.url)
            .map_err(|e| Error::config_field_invalid("server.url", e.to_string()))?;

        if self.worker.max_poll_batch == 0 {
            return Err(Error::config_field_invalid(
                "worker.max_poll_batch",
                "max_poll_batch must be at least 1",
            ));
        }
        if self.worker.max_capacity == 0 {
            return Err(Error::config_field_invalid(
                "worker.max_capacity",
                "max_capacity must be at least 1",
            ));
        }
        if self.retry.update_attempts == 0 {
            return Err(Error::config_field_invalid(
                "retry.update_attempts",
                "update_attempts must be at least 1",
            ));
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.tasks {
            let task_type = entry.task_type.trim();
            if task_type.is_empty() {
                return Err(Error::config_field_invalid("tasks.task_type", "task_type cannot be empty"));
            }
            if !seen.insert(task_type) {
                return Err(Error::config_field_invalid(
                    "tasks.task_type",
                    format!("task type '{}' is listed more than once", task_type),
                ));
            }
            if entry.handler.trim().is_empty() {
                return Err(Error::config_field_invalid(
                    "tasks.handler",
                    format!("no handler given for task type '{}'", task_type),
                ));
            }
            if entry.capacity == 0 || entry.capacity > self.worker.max_capacity {
                return Err(Error::config_field_invalid(
                    "tasks.capacity",
                    format!(
                        "capacity for '{}' must be between 1 and {}",
                        task_type, self.worker.max_capacity
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Worker identity, falling back to the host name
    pub fn worker_id(&self) -> String {
        self.worker
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(default_worker_id)
    }

    /// Options for `TaskRunner::new`
    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            worker_id: self.worker_id(),
            poll_interval: Duration::from_millis(self.worker.poll_interval_ms),
            poll_timeout: Duration::from_millis(self.worker.poll_timeout_ms),
            max_poll_batch: self.worker.max_poll_batch,
            max_capacity: self.worker.max_capacity,
            retry: RetryPolicy::new(
                self.retry.update_attempts,
                Duration::from_millis(self.retry.update_base_delay_ms),
            ),
        }
    }

    /// Settings for `HttpTaskClient::new`
    pub fn client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            base_url: self.server.url.clone(),
            auth_token: self.server.auth_token.clone(),
            request_timeout: Duration::from_millis(self.server.request_timeout_ms),
        }
    }

    /// Worker settings for one `[[tasks]]` entry
    pub fn worker_settings(&self, entry: &TaskEntry) -> WorkerSettings {
        WorkerSettings {
            poll_interval: Duration::from_millis(
                entry.poll_interval_ms.unwrap_or(self.worker.poll_interval_ms),
            ),
            poll_timeout: Duration::from_millis(
                entry.poll_timeout_ms.unwrap_or(self.worker.poll_timeout_ms),
            ),
            domain: entry.domain.clone(),
            paused: entry.paused,
        }
    }
}

/// Host name, or a random `worker-xxxxxxxx` id when it is unavailable
pub fn default_worker_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| {
            let id = uuid::Uuid::new_v4().simple().to_string();
            format!("worker-{}", &id[..8])
        })
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|val| val.parse().ok())
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Default location written by `config init`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".taskrunner")
        .join("config.toml")
}

/// Initialize a new configuration file, returning where it was written
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(Error::config_validation(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# Task Runner Configuration

[worker]
# Identity reported to the server (defaults to the host name)
# id = "worker-1"

# Idle time between polls when the server has no work (milliseconds)
poll_interval_ms = 100

# Long-poll timeout passed to the server (milliseconds)
poll_timeout_ms = 100

# Largest number of tasks requested in one poll
max_poll_batch = 100

# Largest capacity allowed for one task type
max_capacity = 1000

[server]
# Base URL of the orchestration server API
url = "http://localhost:8080/api"

# Access token sent as the X-Authorization header
# auth_token = ""

# Timeout for a single request (milliseconds)
request_timeout_ms = 30000

[retry]
# Attempts per task result, including the first
update_attempts = 3

# Delay after the first failed attempt, doubled each time (milliseconds)
update_base_delay_ms = 1000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.taskrunner/logs/taskrunner.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false

# Task types started by `taskrunner run`.
# Built-in handlers: echo, noop, fail
#
# [[tasks]]
# task_type = "echo_task"
# handler = "echo"
# capacity = 5
# poll_interval_ms = 200
# domain = "blue"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.server.url, "http://localhost:8080/api");
        assert_eq!(config.worker.max_poll_batch, 100);
        assert_eq!(config.retry.update_attempts, 3);
        assert_eq!(config.logging.level, "info");
        assert!(config.tasks.is_empty());
    }

    #[test]
    fn test_env_override() {
        env::set_var("TASKRUNNER_SERVER_URL", "https://conductor.example.com/api");
        env::set_var("TASKRUNNER_MAX_POLL_BATCH", "25");
        env::set_var("TASKRUNNER_LOG_LEVEL", "debug");

        let mut config = RunnerConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.server.url, "https://conductor.example.com/api");
        assert_eq!(config.worker.max_poll_batch, 25);
        assert_eq!(config.logging.level, "debug");

        env::remove_var("TASKRUNNER_SERVER_URL");
        env::remove_var("TASKRUNNER_MAX_POLL_BATCH");
        env::remove_var("TASKRUNNER_LOG_LEVEL");
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut config = RunnerConfig::default();
        config.server.url = "ws://invalid.com".to_string();
        match config.validate() {
            Err(Error::ConfigValidation { field, .. }) => {
                assert_eq!(field.as_deref(), Some("server.url"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = RunnerConfig::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_task_entries() {
        let mut config = RunnerConfig::from_toml(
            r#"
[[tasks]]
task_type = "a"
handler = "echo"

[[tasks]]
task_type = "a"
handler = "noop"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        config.tasks[1].task_type = "b".to_string();
        assert!(config.validate().is_ok());

        config.tasks[1].capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(RunnerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_path_expansion() {
        let mut config = RunnerConfig::default();
        config.logging.file = Some("~/logs/runner.log".to_string());
        config.expand_paths();

        assert!(!config.logging.file.unwrap().contains('~'));
    }

    #[test]
    fn test_parse_config_file() {
        let config = RunnerConfig::from_toml(
            r#"
[worker]
id = "test-worker"
poll_interval_ms = 250

[server]
url = "http://conductor:8080/api"
auth_token = "secret"

[retry]
update_attempts = 5

[[tasks]]
task_type = "resize"
handler = "echo"
capacity = 4
domain = "blue"
"#,
        )
        .unwrap();

        assert_eq!(config.worker_id(), "test-worker");
        assert_eq!(config.worker.poll_interval_ms, 250);
        assert_eq!(config.worker.poll_timeout_ms, 100);
        assert_eq!(config.server.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.retry.update_attempts, 5);
        assert_eq!(config.tasks.len(), 1);
        assert_eq!(config.tasks[0].capacity, 4);

        let settings = config.worker_settings(&config.tasks[0]);
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.domain.as_deref(), Some("blue"));

        let options = config.runner_options();
        assert_eq!(options.retry.attempts, 5);
        assert_eq!(options.retry.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_parse_error_keeps_source() {
        let err = RunnerConfig::from_toml("[worker\nid = 1").unwrap_err();
        assert!(matches!(err, Error::ConfigParse { source: Some(_), .. }));
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = RunnerConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = RunnerConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config.server.url, parsed.server.url);
        assert_eq!(config.worker.max_capacity, parsed.worker.max_capacity);
    }

    #[test]
    fn test_generated_default_parses() {
        let config = RunnerConfig::from_toml(&generate_default_config()).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_worker_id_not_empty() {
        assert!(!default_worker_id().is_empty());
    }
}
