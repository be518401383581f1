//! Optional `config.toml` in the config directory. Every key may be omitted:
//!
//! ```toml
//! cache_dir = "~/.cache/shaders"
//! compiler_root = "$HOME/VulkanSDK/x86_64"
//! target_env = "vulkan1.2"
//! http_timeout = "30s"
//! ```
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use directories_next::BaseDirs;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use shadertoy::{CacheError, CompilerConfig};
use tracing::debug;

pub const ENV_VULKAN_SDK: &str = "VULKAN_SDK";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub cache_dir: Option<String>,
    pub compiler_root: Option<String>,
    pub target_env: Option<String>,
    #[serde(deserialize_with = "deserialize_duration_opt")]
    pub http_timeout: Option<Duration>,
}

impl Settings {
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("failed to parse config file at {}", path.display()))
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Cache root: `cache_dir` from the config file, or `default`.
    pub fn cache_root(&self, default: PathBuf) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(raw) => expand_path(raw).context("invalid cache_dir in config file"),
            None => Ok(default),
        }
    }

    /// The compiler located under `$VULKAN_SDK`, falling back to
    /// `compiler_root`. Fails when neither names an SDK with `bin/glslc`.
    pub fn compiler_config(&self) -> Result<CompilerConfig> {
        let root = match env::var_os(ENV_VULKAN_SDK).filter(|value| !value.is_empty()) {
            Some(value) => PathBuf::from(value),
            None => match &self.compiler_root {
                Some(raw) => expand_path(raw).context("invalid compiler_root in config file")?,
                None => {
                    return Err(CacheError::Precondition(format!(
                        "{ENV_VULKAN_SDK} is not set and no compiler_root is configured"
                    ))
                    .into())
                }
            },
        };
        let mut config = CompilerConfig::from_sdk_root(&root);
        if let Some(target_env) = &self.target_env {
            config = config.with_target_env(target_env.clone());
        }
        config.check()?;
        Ok(config)
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a timeout in seconds or a human-readable duration")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u64::try_from(v)
                .map(|secs| Some(Duration::from_secs(secs)))
                .map_err(|_| E::custom("duration must be non-negative"))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Expands `$VAR`, `${VAR}` and a leading `~` or `~/`.
pub fn expand_path(input: &str) -> Result<PathBuf> {
    let expanded = expand_home(&expand_env_vars(input)?)?;
    debug!(input = %input, expanded = %expanded.display(), "expanded config path");
    Ok(expanded)
}

fn expand_home(input: &str) -> Result<PathBuf> {
    let rest = match input.strip_prefix('~') {
        None => return Ok(PathBuf::from(input)),
        Some(rest) => rest,
    };
    if !rest.is_empty() && !rest.starts_with('/') {
        bail!("'~user' expansion is not supported in '{input}'");
    }
    let base_dirs =
        BaseDirs::new().ok_or_else(|| anyhow!("unable to determine home directory"))?;
    Ok(base_dirs.home_dir().join(rest.trim_start_matches('/')))
}

fn expand_env_vars(input: &str) -> Result<String> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            output.push(ch);
            continue;
        }
        let name = match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => bail!("unterminated '${{' in '{input}'"),
                    }
                }
                name
            }
            Some(&c) if c == '_' || c.is_ascii_alphanumeric() => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c != '_' && !c.is_ascii_alphanumeric() {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                name
            }
            _ => {
                output.push('$');
                continue;
            }
        };
        if name.is_empty() {
            bail!("empty variable reference in '{input}'");
        }
        let value = env::var(&name).map_err(|_| anyhow!("environment variable '{name}' is not set"))?;
        output.push_str(&value);
    }

    Ok(output)
}
