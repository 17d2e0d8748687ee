//! Interception points of the adaptation pipeline.

use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;
use strum_macros::EnumIter;
use strum_macros::EnumString;

/// The closed set of chains a hook can be registered against.
///
/// Two phases bracket every model turn: [`ChainType::PreInject`] runs before
/// values are injected into a prompt, [`ChainType::PostSelect`] runs after a
/// constitution has been selected for the turn. The remaining four are
/// fired by the state machine, the composer, the output checker, and the
/// scheduler respectively.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChainType {
    /// Before a constitution is injected into model context.
    PreInject,
    /// After the adaptation layer selects a constitution.
    PostSelect,
    /// When the context state machine transitions between states.
    OnTransition,
    /// When composition detects conflicting rules.
    OnConflict,
    /// When a rule violation is detected in model output.
    OnViolation,
    /// On a timer at a configured interval.
    Periodic,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_chain_type_display_matches_wire_name() {
        assert_eq!(ChainType::PreInject.to_string(), "pre_inject");
        assert_eq!(ChainType::OnViolation.to_string(), "on_violation");
        assert_eq!(
            serde_json::to_value(ChainType::PostSelect).unwrap(),
            serde_json::json!("post_select")
        );
    }

    #[test]
    fn test_chain_type_parse_round_trips_every_variant() {
        let all: Vec<ChainType> = ChainType::iter().collect();
        assert_eq!(all.len(), 6);
        for chain in all {
            assert_eq!(ChainType::from_str(&chain.to_string()).unwrap(), chain);
        }
        assert!(ChainType::from_str("PreInject").is_err());
    }
}
