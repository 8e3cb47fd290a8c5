//! Configuration loading.
//!
//! Sources, highest priority first: CLI flags (applied by the caller),
//! environment variables, the TOML config file, built-in defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::length::Length;
use crate::llm::{ProviderKind, ProviderSpec};
use crate::report::Format;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "CHRONICLE_CONFIG";
/// Environment variable overriding the run timeout, in seconds.
pub const TIMEOUT_ENV_VAR: &str = "CHRONICLE_TIMEOUT";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderEntry>,
}

/// Report defaults used when the matching flag is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub format: Format,

    #[serde(default)]
    pub length: Length,

    /// Whole-run deadline in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Start of the default window, e.g. `"14 days ago"`.
    #[serde(default)]
    pub window: Option<String>,

    #[serde(default)]
    pub include_merges: bool,
}

/// One `[[providers]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub kind: ProviderKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Defaults to the entry's position in the list, starting at 1.
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProviderEntry {
    fn new(kind: ProviderKind, priority: u32) -> Self {
        Self {
            kind,
            model: None,
            api_key_env: None,
            priority: Some(priority),
            base_url: None,
        }
    }

    fn to_spec(&self, position: usize) -> ProviderSpec {
        let priority = self.priority.unwrap_or(position as u32 + 1);
        let mut spec = ProviderSpec::new(self.kind, priority);
        if let Some(model) = &self.model {
            spec.model = model.clone();
        }
        if let Some(var) = &self.api_key_env {
            spec.api_key_env = Some(var.clone());
        }
        spec.base_url = self.base_url.clone();
        spec
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_providers() -> Vec<ProviderEntry> {
    vec![
        ProviderEntry::new(ProviderKind::Anthropic, 1),
        ProviderEntry::new(ProviderKind::OpenAi, 2),
        ProviderEntry::new(ProviderKind::Gemini, 3),
    ]
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            format: Format::default(),
            length: Length::default(),
            timeout_secs: default_timeout_secs(),
            window: None,
            include_merges: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            defaults: Defaults::default(),
            providers: default_providers(),
        }
    }
}

impl Config {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Platform config location, e.g. `~/.config/chronicle/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chronicle").join("config.toml"))
    }

    /// Resolve the config file and apply environment overrides.
    ///
    /// An explicit path, or one named by `CHRONICLE_CONFIG`, must exist. The
    /// platform default path is optional and falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = env::var(CONFIG_ENV_VAR)
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => {
                    debug!("Loading config from {}", path.display());
                    Self::from_file(&path)?
                }
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `CHRONICLE_TIMEOUT`. Invalid values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        match env::var(TIMEOUT_ENV_VAR) {
            Ok(v) if !v.is_empty() => match v.parse::<u64>() {
                Ok(secs) if secs > 0 => self.defaults.timeout_secs = secs,
                _ => warn!(
                    "Invalid {} value '{}', using {}s",
                    TIMEOUT_ENV_VAR, v, self.defaults.timeout_secs
                ),
            },
            _ => {}
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "defaults.timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        let mut seen = Vec::new();
        for (position, entry) in self.providers.iter().enumerate() {
            if entry.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    key: format!("providers[{}].model", position),
                    reason: "must not be empty".to_string(),
                });
            }

            let priority = entry.priority.unwrap_or(position as u32 + 1);
            if seen.contains(&priority) {
                return Err(ConfigError::InvalidValue {
                    key: format!("providers[{}].priority", position),
                    reason: format!("priority {} is used more than once", priority),
                });
            }
            seen.push(priority);
        }

        Ok(())
    }

    /// Provider specs ordered by ascending priority.
    pub fn provider_specs(&self) -> Vec<ProviderSpec> {
        let mut specs: Vec<ProviderSpec> = self
            .providers
            .iter()
            .enumerate()
            .map(|(position, entry)| entry.to_spec(position))
            .collect();
        specs.sort_by_key(|spec| spec.priority);
        specs
    }
}

/// Move `kind` to the front of the chain, adding it with defaults when it
/// is not configured. Priorities are renumbered from 1.
pub fn prefer_provider(specs: Vec<ProviderSpec>, kind: ProviderKind) -> Vec<ProviderSpec> {
    let (mut preferred, rest): (Vec<_>, Vec<_>) =
        specs.into_iter().partition(|spec| spec.kind == kind);
    if preferred.is_empty() {
        preferred.push(ProviderSpec::new(kind, 0));
    }

    preferred
        .into_iter()
        .chain(rest)
        .enumerate()
        .map(|(i, mut spec)| {
            spec.priority = i as u32 + 1;
            spec
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.defaults.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.defaults.length, Length::Short);
        assert_eq!(config.defaults.format, Format::Markdown);
        let kinds: Vec<_> = config.provider_specs().iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![ProviderKind::Anthropic, ProviderKind::OpenAi, ProviderKind::Gemini]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial_config() {
        let file = write_config(
            r#"
[defaults]
length = "detailed"
window = "14 days ago"
"#,
        );
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.defaults.length, Length::Detailed);
        assert_eq!(config.defaults.window.as_deref(), Some("14 days ago"));
        assert_eq!(config.defaults.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.providers.len(), 3);
    }

    #[test]
    fn test_providers_table() {
        let file = write_config(
            r#"
[[providers]]
kind = "ollama"
model = "qwen2.5"
base_url = "http://gpu-box:11434"

[[providers]]
kind = "anthropic"
api_key_env = "WORK_ANTHROPIC_KEY"
priority = 0
"#,
        );
        let specs = Config::from_file(file.path()).unwrap().provider_specs();
        assert_eq!(specs[0].kind, ProviderKind::Anthropic);
        assert_eq!(specs[0].api_key_env.as_deref(), Some("WORK_ANTHROPIC_KEY"));
        assert_eq!(specs[0].model, "claude-sonnet-4-5");
        assert_eq!(specs[1].kind, ProviderKind::Ollama);
        assert_eq!(specs[1].model, "qwen2.5");
        assert_eq!(specs[1].base_url.as_deref(), Some("http://gpu-box:11434"));
    }

    #[test]
    fn test_duplicate_priorities_rejected() {
        let file = write_config(
            r#"
[[providers]]
kind = "anthropic"
priority = 1

[[providers]]
kind = "openai"
priority = 1
"#,
        );
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "providers[1].priority"));
    }

    #[test]
    fn test_empty_model_rejected() {
        let file = write_config("[[providers]]\nkind = \"gemini\"\nmodel = \"  \"\n");
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let file = write_config("[defaults]\ntimeout_secs = 0\n");
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let file = write_config("[defaults\nlength = ");
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::ParseFailed(_))
        ));
    }

    #[test]
    fn test_unknown_provider_kind_is_parse_error() {
        let file = write_config("[[providers]]\nkind = \"mystery\"\n");
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::ParseFailed(_))
        ));
    }

    #[test]
    fn test_load_nonexistent_explicit_file() {
        let result = Config::load(Some(Path::new("/nonexistent/chronicle.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_from_env_path() {
        let file = write_config("[defaults]\nformat = \"json\"\n");
        let path = file.path().to_string_lossy().to_string();
        temp_env::with_vars(
            [(CONFIG_ENV_VAR, Some(path.as_str())), (TIMEOUT_ENV_VAR, None)],
            || {
                let config = Config::load(None).unwrap();
                assert_eq!(config.defaults.format, Format::Json);
            },
        );
    }

    #[test]
    fn test_timeout_env_override() {
        let mut config = Config::default();
        temp_env::with_var(TIMEOUT_ENV_VAR, Some("45"), || {
            config.apply_env_overrides();
        });
        assert_eq!(config.defaults.timeout_secs, 45);
    }

    #[test]
    fn test_invalid_timeout_env_is_ignored() {
        for value in ["soon", "0", "-5"] {
            let mut config = Config::default();
            temp_env::with_var(TIMEOUT_ENV_VAR, Some(value), || {
                config.apply_env_overrides();
            });
            assert_eq!(config.defaults.timeout_secs, DEFAULT_TIMEOUT_SECS);
        }
    }

    #[test]
    fn test_prefer_provider_moves_to_front() {
        let specs = Config::default().provider_specs();
        let reordered = prefer_provider(specs, ProviderKind::Gemini);
        let kinds: Vec<_> = reordered.iter().map(|s| (s.kind, s.priority)).collect();
        assert_eq!(
            kinds,
            vec![
                (ProviderKind::Gemini, 1),
                (ProviderKind::Anthropic, 2),
                (ProviderKind::OpenAi, 3)
            ]
        );
    }

    #[test]
    fn test_prefer_unconfigured_provider_is_added() {
        let specs = Config::default().provider_specs();
        let reordered = prefer_provider(specs, ProviderKind::ClaudeCode);
        assert_eq!(reordered.len(), 4);
        assert_eq!(reordered[0].kind, ProviderKind::ClaudeCode);
        assert_eq!(reordered[0].model, "sonnet");
    }

    #[test]
    fn test_config_paths_use_platform_dirs() {
        if let Some(path) = Config::default_path() {
            assert!(path.ends_with("chronicle/config.toml"));
        }
    }
}
