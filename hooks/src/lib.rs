//! # VTP Hook Chains
//!
//! A deterministic hook chain engine for the adaptation layer of the
//! value-transport protocol.
//!
//! ## Overview
//!
//! Every constitutional decision passes through a named interception point
//! (a [`ChainType`]) before it reaches, or after it leaves, a model. Hooks
//! registered against a chain can:
//! - Pass the turn through unchanged
//! - Replace the context and/or constitution seen by later hooks
//! - Abort the turn with a reason
//!
//! ## Architecture
//!
//! - **Validator**: rejects malformed definitions before they are stored
//! - **Chain Store**: per-chain lists sorted by descending priority
//! - **Engine**: walks a chain for each `fire` call
//! - **Event Bus**: synchronous lifecycle notifications for observers
//!
//! ## Usage
//!
//! ```
//! use vtp_hooks::ChainType;
//! use vtp_hooks::ExecutionInput;
//! use vtp_hooks::HookDefinition;
//! use vtp_hooks::HookEngine;
//! use vtp_hooks::HookOutcome;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = HookEngine::new();
//! engine
//!     .register(HookDefinition::from_fn(
//!         "scope-filter",
//!         ChainType::PreInject,
//!         90,
//!         |input| {
//!             if input.session["environment"] == "untrusted" {
//!                 Ok(HookOutcome::abort("constitution out of scope"))
//!             } else {
//!                 Ok(HookOutcome::Continue)
//!             }
//!         },
//!     ))
//!     .unwrap();
//!
//! let input = ExecutionInput::new(serde_json::json!({}), serde_json::json!({}))
//!     .with_session(serde_json::json!({"environment": "untrusted"}));
//! let result = engine.fire(ChainType::PreInject, input).await;
//!
//! assert!(!result.completed);
//! assert_eq!(result.aborted_by.as_deref(), Some("scope-filter"));
//! # }
//! ```

pub mod bus;
pub mod catalog;
pub mod config;
pub mod definition;
pub mod engine;
pub mod store;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use bus::EventBus;
pub use bus::LifecycleListener;
pub use bus::ListenerHandle;
pub use catalog::HandlerCatalog;
pub use config::ConfigError;
pub use config::build_engine_from_config;
pub use config::load_config_from_file;
pub use config::load_config_from_str;
pub use definition::HandlerFault;
pub use definition::HookCondition;
pub use definition::HookDefinition;
pub use definition::HookHandler;
pub use definition::handler_fn;
pub use engine::HookEngine;
pub use store::ChainStore;
pub use store::HookScope;
pub use types::ChainResult;
pub use types::ChainState;
pub use types::ExecutionInput;
pub use types::HookExecution;
pub use types::HookInput;
pub use types::HookOutcome;
pub use validation::ValidationError;
pub use vtp_protocol::ChainEvent;
pub use vtp_protocol::ChainType;
pub use vtp_protocol::EngineSettings;
pub use vtp_protocol::LifecycleEvent;
pub use vtp_protocol::LifecycleEventKind;
