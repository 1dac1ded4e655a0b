//! Configuration layering: compiled-in defaults → global config file
//! → project config file → environment variables → CLI flags.
//!
//! Environment variable expansion supports the same syntax across every
//! YAML file this host reads:
//! - `${VAR}` - Simple substitution
//! - `${VAR:-default}` - Use default if VAR is unset or empty
//! - `${VAR-default}` - Use default if VAR is unset
//! - `${VAR:+alt}` - Use alt if VAR is set and non-empty
//! - `${VAR+alt}` - Use alt if VAR is set

pub mod manifest;
pub mod project;

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const GLOBAL_CONFIG_ENV_VAR: &str = "WHARF_CONFIG_PATH";

/// User-level configuration, read from `~/.config/wharf/config.yaml` (or
/// the path named by `WHARF_CONFIG_PATH`). Optional: its absence is not an
/// error, the host just falls back to compiled-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    #[serde(default)]
    pub default_registry: String,
}

fn global_config_path() -> PathBuf {
    env::var(GLOBAL_CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
            p.push("wharf/config.yaml");
            p
        })
}

pub fn load_global_config() -> anyhow::Result<GlobalConfig> {
    let path = global_config_path();
    if !path.exists() {
        return Ok(GlobalConfig::default());
    }
    let data = fs::read_to_string(&path)
        .with_context(|| format!("reading global config {}", path.display()))?;
    let expanded = expand_env_placeholders(&data);
    let cfg: GlobalConfig = serde_yaml::from_str(&expanded)
        .with_context(|| format!("parsing global config {}", path.display()))?;
    Ok(cfg)
}

/// Expands `${VAR}`-style placeholders in `input` against the process
/// environment.
pub fn expand_env_placeholders(input: &str) -> String {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?:(:?[-+])([^}]*))?\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let op = caps.get(2).map_or("", |m| m.as_str());
        let val = caps.get(3).map_or("", |m| m.as_str());
        let var = env::var(var_name).ok();

        match (var.as_deref(), op) {
            (Some(v), _) if op.is_empty() => v.to_string(),
            (Some(v), ":-") if !v.is_empty() => v.to_string(),
            (None, ":-") => val.to_string(),
            (Some(v), "-") => {
                if v.is_empty() {
                    val.to_string()
                } else {
                    v.to_string()
                }
            }
            (None, "-") => val.to_string(),
            (Some(_), ":+") => val.to_string(),
            (Some(_), "+") => val.to_string(),
            _ => String::new(),
        }
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_simple_placeholder() {
        std::env::set_var("WHARF_TEST_VAR", "hello");
        assert_eq!(expand_env_placeholders("${WHARF_TEST_VAR}"), "hello");
        std::env::remove_var("WHARF_TEST_VAR");
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        std::env::remove_var("WHARF_TEST_MISSING");
        assert_eq!(
            expand_env_placeholders("${WHARF_TEST_MISSING:-fallback}"),
            "fallback"
        );
    }
}
