//! Wallet management and transaction signing.
//!
//! # Security
//! - Keys come from config or `HACKATHON_CHAIN_PRIVATE_KEY`, never from call sites
//! - Keys are never logged or serialized
//! - No nonce is held here: every submission re-reads the pending nonce

use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;

use crate::chain::types::{ChainError, ChainResult, SignedTransaction};

/// Signing wallet bound to one chain.
#[derive(Clone)]
pub struct Wallet {
    /// Address derived from the key.
    address: Address,
    /// Network wallet used to sign envelopes.
    signer: EthereumWallet,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    /// * `chain_id` - Chain ID for transaction signing
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> ChainResult<Self> {
        let trimmed = private_key_hex.trim();
        let key_hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| ChainError::Wallet(format!("Invalid private key format: {}", e)))?;
        let address = signer.address();

        tracing::info!(address = %address, chain_id = chain_id, "Wallet initialized");

        Ok(Self {
            address,
            signer: EthereumWallet::from(signer),
            chain_id,
        })
    }

    /// Get the wallet's address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the chain ID this wallet is configured for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign a legacy (gas-price) contract call.
    pub async fn sign_call(
        &self,
        to: Address,
        input: Bytes,
        nonce: u64,
        gas_price: u128,
        gas_limit: u64,
    ) -> ChainResult<SignedTransaction> {
        let request = TransactionRequest::default()
            .with_from(self.address)
            .with_to(to)
            .with_value(U256::ZERO)
            .with_input(input.clone())
            .with_nonce(nonce)
            .with_gas_price(gas_price)
            .with_gas_limit(gas_limit)
            .with_chain_id(self.chain_id);

        let envelope: TxEnvelope = request
            .build(&self.signer)
            .await
            .map_err(|e| ChainError::Wallet(format!("Signing failed: {}", e)))?;

        Ok(SignedTransaction {
            hash: *envelope.tx_hash(),
            raw: Bytes::from(envelope.encoded_2718()),
            from: self.address,
            to,
            input,
            nonce,
            gas_price,
            gas_limit,
        })
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}
