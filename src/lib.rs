//! On-chain transaction orchestration for a hackathon platform.
//!
//! # Architecture Overview
//!
//! ```text
//!   façades (services)                 reconcile
//!   events / check-ins / votes / NFTs  verifier ──▶ VerificationReport
//!        │            │                    │
//!        ▼            ▼                    ▼
//!   contracts ──▶ submitter ──▶ chain::ChainRpc ◀── confirmation tracker
//!   (ABI)         (gas, retry)  (node | mock)          │
//!                                                      ▼
//!                                   outcome sink ──▶ store (off-chain rows)
//! ```
//!
//! Cross-cutting: `config` (TOML, validated once) and `observability`
//! (tracing + Prometheus metrics).

pub mod chain;
pub mod config;
pub mod confirmation;
pub mod contracts;
pub mod observability;
pub mod reconcile;
pub mod services;
pub mod store;
pub mod submitter;

pub use config::AppConfig;
pub use services::{ChainContext, OperationResult, ServiceError};
pub use store::{MemoryStore, OffChainStore};
