//! Admission checks for hook definitions.
//!
//! Every check here is pure. The registry runs all of them, together with
//! the name-uniqueness check, before it touches any of its state.

use crate::definition::HookDefinition;
use crate::types::MAX_PRIORITY;
use crate::types::MAX_TIMEOUT_MS;
use crate::types::MIN_PRIORITY;
use crate::types::MIN_TIMEOUT_MS;
use once_cell::sync::Lazy;
use regex::Regex;

// Note: expect() is acceptable here as this is a hardcoded pattern that never fails
#[allow(clippy::expect_used)]
static HOOK_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9-]{1,64}$").expect("hook name pattern is hardcoded and must be valid")
});

/// Registration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid hook name {0:?}: must be 1-64 characters of [a-z0-9-]")]
    InvalidName(String),

    #[error("invalid priority {0}: must be an integer in [0, 100]")]
    InvalidPriority(String),

    #[error("invalid timeout {0}: must be an integer number of ms in [1, 30000]")]
    InvalidTimeout(String),

    #[error("hook {0:?} is already registered")]
    DuplicateName(String),
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if HOOK_NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(name.to_string()))
    }
}

pub fn validate_priority(priority: i64) -> Result<(), ValidationError> {
    if (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPriority(priority.to_string()))
    }
}

pub fn validate_timeout(timeout_ms: i64) -> Result<(), ValidationError> {
    if (MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&timeout_ms) {
        Ok(())
    } else {
        Err(ValidationError::InvalidTimeout(timeout_ms.to_string()))
    }
}

/// Runs the shape checks on a definition. Uniqueness is the registry's job.
pub fn validate_definition(definition: &HookDefinition) -> Result<(), ValidationError> {
    validate_name(definition.name())?;
    validate_priority(definition.priority())?;
    validate_timeout(definition.timeout_budget_ms())
}
