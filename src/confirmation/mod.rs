//! Confirmation tracking for broadcast transactions.
//!
//! # Data Flow
//! ```text
//! tx hash
//!     ├─ wait_for_receipt(hash, timeout)     blocking façades (events, votes)
//!     │       → TxReceipt | TxReverted | ConfirmationTimeout
//!     ├─ spawn_detached(pending, outcomes)   async façades (check-in, mint)
//!     │       → ConfirmationOutcome ──mpsc──▶ sink::spawn_recorder ──▶ OffChainStore
//!     └─ status(hash)
//!             → Mined(receipt) | Pending | Unknown
//! ```
//!
//! # Design Decisions
//! - "No receipt yet" and RPC errors are both transient while polling
//! - A mined failure is terminal and never surfaces as a timeout
//! - Background tasks own a bounded budget and report over a one-way channel,
//!   so a request never waits on them

pub mod sink;
pub mod tracker;

pub use sink::{record_outcome, spawn_recorder};
pub use tracker::{ConfirmationOutcome, ConfirmationResult, ConfirmationTracker, PendingConfirmation};
