//! Configuration for the reply hook and the bundled process executor.
//!
//! Sources, lowest precedence first: built-in defaults, the TOML config file,
//! then `CODEHOOK__*` style environment variables (`__` separates sections).

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::interactive::ProcessServiceConfig;

pub const APP_NAME: &str = "codehook";

pub const DEFAULT_CODE_BLOCK_PREFIX: &str = "```csharp";
pub const DEFAULT_CODE_BLOCK_SUFFIX: &str = "```";
pub const DEFAULT_MAXIMUM_OUTPUT_TO_KEEP: usize = 500;

/// Prefix the CLI uses out of the box, matching its default `sh -c` executor.
pub const CLI_CODE_BLOCK_PREFIX: &str = "```sh";

/// Settings of one code block reply hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Marker that opens a code block.
    #[serde(alias = "codeBlockPrefix")]
    pub code_block_prefix: String,
    /// Marker that closes a code block.
    #[serde(alias = "codeBlockSuffix")]
    pub code_block_suffix: String,
    /// Hard cap on reply length, in characters.
    #[serde(alias = "maximumOutputToKeep")]
    pub maximum_output_to_keep: usize,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            code_block_prefix: DEFAULT_CODE_BLOCK_PREFIX.to_string(),
            code_block_suffix: DEFAULT_CODE_BLOCK_SUFFIX.to_string(),
            maximum_output_to_keep: DEFAULT_MAXIMUM_OUTPUT_TO_KEEP,
        }
    }
}

impl HookConfig {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.code_block_prefix = prefix.into();
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.code_block_suffix = suffix.into();
        self
    }

    pub fn with_maximum_output(mut self, max: usize) -> Self {
        self.maximum_output_to_keep = max;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.code_block_prefix.is_empty() {
            return Err(ConfigError::EmptyMarker {
                field: "code_block_prefix",
            });
        }
        if self.code_block_suffix.is_empty() {
            return Err(ConfigError::EmptyMarker {
                field: "code_block_suffix",
            });
        }
        Ok(())
    }
}

/// Interpreter used by the CLI's process executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    /// Working directory; `~` and `$VARS` are expanded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    pub env: BTreeMap<String, String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: "sh".to_string(),
            args: vec!["-c".to_string()],
            timeout_secs: 30,
            working_dir: None,
            env: BTreeMap::new(),
        }
    }
}

impl ExecutorConfig {
    pub fn to_service_config(&self) -> Result<ProcessServiceConfig, ConfigError> {
        let working_dir = self
            .working_dir
            .as_deref()
            .map(expand_str_path)
            .transpose()?;

        Ok(ProcessServiceConfig {
            program: self.program.clone(),
            args: self.args.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            working_dir,
            env: self.env.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sender name on produced replies.
    pub agent_name: String,
    /// Reply used when no strategy produces one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_reply: Option<String>,
    pub logging: LoggingConfig,
    pub hook: HookConfig,
    pub executor: ExecutorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent_name: "assistant".to_string(),
            default_reply: None,
            logging: LoggingConfig::default(),
            hook: HookConfig::default().with_prefix(CLI_CODE_BLOCK_PREFIX),
            executor: ExecutorConfig::default(),
        }
    }
}

/// Load configuration from `config_file` (optional on disk) and the process environment.
pub fn load_config(config_file: &Path) -> Result<AppConfig> {
    let env = Environment::with_prefix(&env_prefix())
        .separator("__")
        .try_parsing(true);
    build_config(config_file, env)
}

fn build_config(config_file: &Path, env: Environment) -> Result<AppConfig> {
    let built = Config::builder()
        .set_default("agent_name", "assistant")?
        .set_default("logging.level", "info")?
        .set_default("hook.code_block_prefix", CLI_CODE_BLOCK_PREFIX)?
        .set_default("hook.code_block_suffix", DEFAULT_CODE_BLOCK_SUFFIX)?
        .set_default("hook.maximum_output_to_keep", DEFAULT_MAXIMUM_OUTPUT_TO_KEEP as u64)?
        .add_source(
            File::from(config_file)
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(env)
        .build()
        .with_context(|| format!("reading config from {}", config_file.display()))?;

    // The builder always carries snake_case hook defaults, so camelCase keys from
    // the file must replace them rather than reach serde as duplicates.
    let mut raw: serde_json::Value = built
        .try_deserialize()
        .context("deserializing configuration")?;
    normalize_hook_keys(&mut raw);

    let config: AppConfig =
        serde_json::from_value(raw).context("deserializing configuration")?;
    config.hook.validate()?;
    Ok(config)
}

const HOOK_KEYS: [&str; 3] = [
    "code_block_prefix",
    "code_block_suffix",
    "maximum_output_to_keep",
];

/// Rename `codeBlockPrefix`-style hook keys to their snake_case field names.
fn normalize_hook_keys(raw: &mut serde_json::Value) {
    let Some(hook) = raw.get_mut("hook").and_then(serde_json::Value::as_object_mut) else {
        return;
    };
    let renames: Vec<(String, &str)> = hook
        .keys()
        .filter(|key| !HOOK_KEYS.contains(&key.as_str()))
        .filter_map(|key| {
            let folded = key.to_ascii_lowercase();
            HOOK_KEYS
                .iter()
                .find(|field| field.replace('_', "") == folded)
                .map(|field| (key.clone(), *field))
        })
        .collect();
    for (key, field) in renames {
        if let Some(value) = hook.remove(&key) {
            hook.insert(field.to_string(), value);
        }
    }
}

pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let toml = toml::to_string_pretty(&AppConfig::default())
        .context("serializing default config to TOML")?;
    let mut body = String::new();
    body.push_str("# Configuration for ");
    body.push_str(APP_NAME);
    body.push('\n');
    body.push_str("# File: ");
    body.push_str(&path.display().to_string());
    body.push_str("\n\n");
    body.push_str(&toml);
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}

/// Resolve the config file: an explicit path (or directory), else the XDG location.
pub fn resolve_config_file(override_path: Option<PathBuf>) -> Result<PathBuf> {
    match override_path {
        Some(path) => {
            let expanded = match path.to_str() {
                Some(text) => expand_str_path(text)?,
                None => path,
            };
            if expanded.is_dir() {
                Ok(expanded.join("config.toml"))
            } else {
                Ok(expanded)
            }
        }
        None => Ok(default_config_dir()?.join("config.toml")),
    }
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        let mut path = PathBuf::from(dir);
        path.push(APP_NAME);
        return Ok(path);
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

fn expand_str_path(text: &str) -> Result<PathBuf, ConfigError> {
    shellexpand::full(text)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| ConfigError::InvalidPath {
            path: text.to_string(),
            message: e.to_string(),
        })
}

pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
