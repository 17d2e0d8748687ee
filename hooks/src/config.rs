//! Configuration loading for hooks

use crate::catalog::HandlerCatalog;
use crate::definition::HookDefinition;
use crate::engine::HookEngine;
use crate::validation::ValidationError;
use std::path::Path;
use vtp_protocol::HookBinding;
use vtp_protocol::HooksConfig;

/// Load hooks configuration from a TOML file
pub fn load_config_from_file(path: impl AsRef<Path>) -> Result<HooksConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parse hooks configuration from TOML text
pub fn load_config_from_str(content: &str) -> Result<HooksConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Build a HookEngine from configuration
///
/// Every binding goes through the same validator as programmatic
/// registration. The first failing binding aborts the build.
pub fn build_engine_from_config(
    config: HooksConfig,
    catalog: &HandlerCatalog,
) -> Result<HookEngine, ConfigError> {
    let engine = HookEngine::with_settings(config.engine);

    for binding in config.hooks {
        let name = binding.name.clone();
        let definition = definition_from_binding(binding, catalog)?;
        engine.register(definition)?;
        tracing::debug!(name = %name, "Registered hook from config");
    }

    tracing::info!(hooks = engine.len(), "Built hook engine from config");
    Ok(engine)
}

/// Resolve a binding's handler and turn it into a definition
pub fn definition_from_binding(
    binding: HookBinding,
    catalog: &HandlerCatalog,
) -> Result<HookDefinition, ConfigError> {
    let priority = binding
        .priority
        .as_integer()
        .ok_or_else(|| ValidationError::InvalidPriority(binding.priority.to_string()))?;
    let timeout_ms = binding
        .timeout_ms
        .as_integer()
        .ok_or_else(|| ValidationError::InvalidTimeout(binding.timeout_ms.to_string()))?;
    let handler = catalog
        .get(&binding.handler)
        .ok_or_else(|| ConfigError::UnknownHandler(binding.handler.clone()))?;

    Ok(HookDefinition::new(binding.name, binding.chain, priority, handler)
        .with_timeout_ms(timeout_ms)
        .with_enabled(binding.enabled)
        .with_description(binding.description)
        .with_metadata("handler", binding.handler))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unknown handler: {0}")]
    UnknownHandler(String),

    #[error("Invalid hook: {0}")]
    Validation(#[from] ValidationError),
}
