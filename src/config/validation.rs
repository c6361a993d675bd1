//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Contract addresses are well-formed
//! - RPC URLs parse
//! - Value ranges (timeouts > 0, attempts >= 1, multiplier >= 1.0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::AppConfig;
use crate::contracts::is_valid_address;

/// A single semantic problem with a config value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint and collect all failures.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if url::Url::parse(&config.chain.rpc_url).is_err() {
        errors.push(ValidationError::new("chain.rpc_url", "not a valid URL"));
    }
    for (i, failover) in config.chain.failover_urls.iter().enumerate() {
        if url::Url::parse(failover).is_err() {
            errors.push(ValidationError::new(
                &format!("chain.failover_urls[{}]", i),
                "not a valid URL",
            ));
        }
    }
    if config.chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("chain.rpc_timeout_secs", "must be > 0"));
    }

    for (field, value) in [
        ("contracts.event_registry", &config.contracts.event_registry),
        ("contracts.checkin_registry", &config.contracts.checkin_registry),
        ("contracts.nft_registry", &config.contracts.nft_registry),
    ] {
        if !is_valid_address(value) {
            errors.push(ValidationError::new(
                field,
                format!("'{}' is not a 40-hex-digit address", value),
            ));
        }
    }

    let submitter = &config.submitter;
    if submitter.gas_price_multiplier < 1.0 {
        errors.push(ValidationError::new(
            "submitter.gas_price_multiplier",
            "must be >= 1.0",
        ));
    }
    if submitter.max_attempts == 0 {
        errors.push(ValidationError::new("submitter.max_attempts", "must be >= 1"));
    }
    if submitter.gas_bump_percent == 0 {
        errors.push(ValidationError::new(
            "submitter.gas_bump_percent",
            "must be > 0 so retries strictly raise the price",
        ));
    }
    if submitter.fallback_gas_price_gwei > submitter.max_gas_price_gwei {
        errors.push(ValidationError::new(
            "submitter.fallback_gas_price_gwei",
            "must not exceed max_gas_price_gwei",
        ));
    }

    let confirmation = &config.confirmation;
    if confirmation.poll_interval_ms == 0 || confirmation.background_poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "confirmation",
            "poll intervals must be > 0",
        ));
    }
    if confirmation.blocking_timeout_secs == 0 || confirmation.batch_timeout_secs == 0 {
        errors.push(ValidationError::new("confirmation", "timeouts must be > 0"));
    }
    if confirmation.confirmation_blocks == 0 {
        errors.push(ValidationError::new(
            "confirmation.confirmation_blocks",
            "must be >= 1",
        ));
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format '{}'", other),
        )),
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
