//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + HACKATHON_CHAIN_PRIVATE_KEY
//!     → loader.rs (parse & deserialize, env override)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → injected into ChainContext, never read from a global
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError, PRIVATE_KEY_ENV_VAR};
pub use schema::{
    AppConfig, ChainConfig, ConfirmationConfig, ContractsConfig, ObservabilityConfig,
    ReconciliationConfig, StoreConfig, SubmitterConfig,
};
