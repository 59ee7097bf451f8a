//! Agent configuration
//!
//! Read from an optional JSON file named by `NEOVIM_AGENT_CONFIG`, then
//! overridden field by field from the environment.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

pub const ENV_CONFIG: &str = "NEOVIM_AGENT_CONFIG";
pub const ENV_NVIM: &str = "NEOVIM_AGENT_NVIM";
pub const ENV_INBOUND: &str = "NEOVIM_AGENT_INBOUND";
pub const ENV_OUTBOUND: &str = "NEOVIM_AGENT_OUTBOUND";
pub const ENV_RUNTIME: &str = "NEOVIM_AGENT_RUNTIME";
pub const ENV_LOCALE: &str = "NEOVIM_AGENT_LOCALE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Neovim executable
    pub nvim_path: String,
    /// Start Neovim with --clean (no plugins or user config)
    pub clean: bool,
    /// Exported as `VIMRUNTIME`
    pub runtime_path: Option<PathBuf>,
    /// Exported as `LANG`
    pub locale: Option<String>,
    pub inbound_socket: PathBuf,
    /// Host socket for notifications; none runs standalone
    pub outbound_socket: Option<PathBuf>,
    pub call_timeout_ms: u64,
    pub send_timeout_ms: u64,
    pub log_filter: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            nvim_path: default_nvim_path().to_string(),
            clean: false,
            runtime_path: None,
            locale: None,
            inbound_socket: std::env::temp_dir()
                .join(format!("neovim-agent-{}.sock", std::process::id())),
            outbound_socket: None,
            call_timeout_ms: 10_000,
            send_timeout_ms: 10_000,
            log_filter: "info".to_string(),
        }
    }
}

/// Get platform-specific default Neovim path
fn default_nvim_path() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "nvim.exe"
    }
    #[cfg(not(target_os = "windows"))]
    {
        "nvim"
    }
}

impl AgentConfig {
    /// Load from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var_os(ENV_CONFIG).map(PathBuf::from);
        Self::load_from(file.as_deref(), |key| std::env::var(key).ok())
    }

    /// Load from an optional file with overrides from `env`
    pub fn load_from<F>(file: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some(path) => Self::read_file(path)?,
            None => Self::default(),
        };

        if let Some(nvim) = env(ENV_NVIM) {
            config.nvim_path = nvim;
        }
        if let Some(inbound) = env(ENV_INBOUND) {
            config.inbound_socket = PathBuf::from(inbound);
        }
        if let Some(outbound) = env(ENV_OUTBOUND) {
            config.outbound_socket = Some(PathBuf::from(outbound));
        }
        if let Some(runtime) = env(ENV_RUNTIME) {
            config.runtime_path = Some(PathBuf::from(runtime));
        }
        if let Some(locale) = env(ENV_LOCALE) {
            config.locale = Some(locale);
        }
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Export the runtime path and locale for the engine process
    ///
    /// Must run before any other thread is spawned.
    pub fn apply_engine_env(&self) {
        if let Some(runtime) = &self.runtime_path {
            std::env::set_var("VIMRUNTIME", runtime);
        }
        if let Some(locale) = &self.locale {
            std::env::set_var("LANG", locale);
        }
    }
}

/// Result of validating Neovim executable path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid { version: String },
    NotFound,
    NotExecutable,
    InvalidVersion { error: String },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid { .. })
    }
}

/// Run `nvim --version` to check the configured executable
pub fn validate_nvim_path(path: &str) -> ValidationResult {
    if path.is_empty() {
        return ValidationResult::NotFound;
    }

    let path_obj = Path::new(path);
    if path_obj.is_absolute() && !path_obj.exists() {
        return ValidationResult::NotFound;
    }

    match Command::new(path).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout.lines().next().unwrap_or("Unknown version").to_string();
            ValidationResult::Valid { version }
        }
        Ok(output) => ValidationResult::InvalidVersion {
            error: String::from_utf8_lossy(&output.stderr).to_string(),
        },
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => ValidationResult::NotFound,
            std::io::ErrorKind::PermissionDenied => ValidationResult::NotExecutable,
            _ => ValidationResult::InvalidVersion {
                error: e.to_string(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::load_from(None, no_env).unwrap();
        assert_eq!(config.nvim_path, default_nvim_path());
        assert!(!config.clean);
        assert_eq!(config.outbound_socket, None);
        assert_eq!(config.call_timeout(), Duration::from_secs(10));
        assert_eq!(config.send_timeout(), Duration::from_secs(10));
        assert_eq!(config.log_filter, "info");
        assert!(config
            .inbound_socket
            .to_string_lossy()
            .ends_with(&format!("neovim-agent-{}.sock", std::process::id())));
    }

    #[test]
    fn test_file_then_env_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"nvim_path": "/opt/nvim/bin/nvim", "clean": true, "call_timeout_ms": 250}}"#
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            (ENV_NVIM, "/usr/local/bin/nvim"),
            (ENV_OUTBOUND, "/tmp/host.sock"),
            (ENV_LOCALE, "ja_JP.UTF-8"),
        ]
        .into_iter()
        .collect();
        let config = AgentConfig::load_from(Some(file.path()), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.nvim_path, "/usr/local/bin/nvim");
        assert!(config.clean);
        assert_eq!(config.call_timeout(), Duration::from_millis(250));
        assert_eq!(config.send_timeout_ms, 10_000);
        assert_eq!(config.outbound_socket, Some(PathBuf::from("/tmp/host.sock")));
        assert_eq!(config.locale.as_deref(), Some("ja_JP.UTF-8"));
        assert_eq!(config.runtime_path, None);
    }

    #[test]
    fn test_bad_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = AgentConfig::load_from(Some(file.path()), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = AgentConfig::load_from(Some(Path::new("/nonexistent/agent.json")), no_env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_validate_missing_executable() {
        assert_eq!(validate_nvim_path(""), ValidationResult::NotFound);
        assert_eq!(
            validate_nvim_path("/nonexistent/bin/nvim"),
            ValidationResult::NotFound
        );
        assert!(!validate_nvim_path("neovim-agent-no-such-binary").is_valid());
    }
}
