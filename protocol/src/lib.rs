//! Protocol types for the value-transport hook chain.
//!
//! These types carry no behavior of their own. They are shared between the
//! hook chain engine (`vtp-hooks`) and the surrounding protocol stack, which
//! serializes them for transport, audit, and configuration.

pub mod chain;
pub mod config;
pub mod events;
pub mod lifecycle;

pub use chain::ChainType;
pub use config::ConfigNumber;
pub use config::EngineSettings;
pub use config::HookBinding;
pub use config::HooksConfig;
pub use events::ChainEvent;
pub use lifecycle::LifecycleEvent;
pub use lifecycle::LifecycleEventKind;
