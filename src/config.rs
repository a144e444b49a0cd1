//! Configuration for raise capture and correlation.
//!
//! Loaded from YAML or JSON, or built in code. The process-wide configuration is
//! fixed by the first `init` (or implicitly by `ensure_initialized`) and cannot be
//! changed afterwards, because observations already recorded were captured under it.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, ThrowContextError};
use crate::error_ref::CauseChain;
use crate::registry::DEFAULT_SWEEP_THRESHOLD;

/// Environment variable naming a configuration file for `ThrowContextConfig::from_env`
pub const CONFIG_ENV_VAR: &str = "THROW_CONTEXT_CONFIG";

static GLOBAL: OnceCell<ThrowContextConfig> = OnceCell::new();

/// Order in which one error's observations are replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayOrder {
    /// Original raise first: the first raise owns colliding keys
    #[default]
    Chronological,
    /// Latest rethrow first: the most recent raise owns colliding keys
    MostRecentFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrowContextConfig {
    /// Capture the flow-local state alongside the log context at each raise
    pub capture_flow: bool,

    pub replay_order: ReplayOrder,

    /// Upper bound on cause chain links visited per event
    pub max_chain_depth: usize,

    /// Registry size that triggers the first reachability sweep
    pub sweep_threshold: usize,
}

impl Default for ThrowContextConfig {
    fn default() -> Self {
        Self {
            capture_flow: true,
            replay_order: ReplayOrder::Chronological,
            max_chain_depth: CauseChain::DEFAULT_MAX_DEPTH,
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
        }
    }
}

impl ThrowContextConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            other => Err(ThrowContextError::Config(format!(
                "Unsupported config file extension {:?} for {}",
                other,
                path.display()
            ))),
        }
    }

    /// Load the file named by `THROW_CONTEXT_CONFIG`, or the defaults if it is unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => {
                debug!("Loading throw context config from {:?}", path);
                Self::from_file(Path::new(&path))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chain_depth == 0 {
            return Err(ThrowContextError::Config(
                "max_chain_depth must be at least 1".to_string(),
            ));
        }
        if self.sweep_threshold == 0 {
            return Err(ThrowContextError::Config(
                "sweep_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fix the process-wide configuration and install the raise hook.
///
/// Calling it again with an equal configuration is a no-op; a different one is
/// rejected with `ThrowContextError::AlreadyInitialized`.
pub fn init(config: ThrowContextConfig) -> Result<()> {
    config.validate()?;
    let installed = GLOBAL.get_or_init(|| config.clone());
    if *installed != config {
        return Err(ThrowContextError::AlreadyInitialized);
    }
    crate::hook::install();
    Ok(())
}

/// The process-wide configuration, defaulting it if nothing was installed yet.
pub fn global() -> &'static ThrowContextConfig {
    GLOBAL.get_or_init(ThrowContextConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ThrowContextConfig::default();
        assert!(config.capture_flow);
        assert_eq!(config.replay_order, ReplayOrder::Chronological);
        assert_eq!(config.max_chain_depth, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = ThrowContextConfig::from_yaml_str("replay_order: most_recent_first\n")
            .expect("valid yaml");
        assert_eq!(
            config,
            ThrowContextConfig {
                replay_order: ReplayOrder::MostRecentFirst,
                ..ThrowContextConfig::default()
            }
        );
    }

    #[test]
    fn test_json() {
        let config =
            ThrowContextConfig::from_json_str(r#"{"capture_flow": false, "max_chain_depth": 8}"#)
                .expect("valid json");
        assert!(!config.capture_flow);
        assert_eq!(config.max_chain_depth, 8);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = ThrowContextConfig::from_yaml_str("max_chain_depth: 0").unwrap_err();
        assert!(matches!(err, ThrowContextError::Config(_)));
    }

    #[test]
    fn test_unknown_replay_order_rejected() {
        let err = ThrowContextConfig::from_yaml_str("replay_order: sideways").unwrap_err();
        assert!(matches!(err, ThrowContextError::Yaml(_)));
    }
}
