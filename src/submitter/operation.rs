//! Operation intents and broadcast attempts.

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chain::SignedTransaction;
use crate::contracts::build_call_data;

/// What a transaction does, for logs, metrics and the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    ActivateEvent,
    EndEvent,
    CheckIn,
    BatchCheckIn,
    Vote,
    RevokeVote,
    MintNft,
    BatchMintNft,
    RegisterEvent,
    AuthorizeOrganizer,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::CreateEvent => "create_event",
            OperationKind::UpdateEvent => "update_event",
            OperationKind::DeleteEvent => "delete_event",
            OperationKind::ActivateEvent => "activate_event",
            OperationKind::EndEvent => "end_event",
            OperationKind::CheckIn => "check_in",
            OperationKind::BatchCheckIn => "batch_check_in",
            OperationKind::Vote => "vote",
            OperationKind::RevokeVote => "revoke_vote",
            OperationKind::MintNft => "mint_nft",
            OperationKind::BatchMintNft => "batch_mint_nft",
            OperationKind::RegisterEvent => "register_event",
            OperationKind::AuthorizeOrganizer => "authorize_organizer",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical state change, before pricing and signing.
///
/// Every broadcast attempt made for this request shares its `intent_id`.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub intent_id: Uuid,
    pub kind: OperationKind,
    pub contract: Address,
    pub input: Bytes,
    /// Items in a batch call; 0 for single-item calls.
    pub batch_size: usize,
}

impl OperationRequest {
    pub fn new<C: SolCall>(kind: OperationKind, contract: Address, call: &C) -> Self {
        Self {
            intent_id: Uuid::new_v4(),
            kind,
            contract,
            input: build_call_data(call),
            batch_size: 0,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn is_batch(&self) -> bool {
        matches!(self.kind, OperationKind::BatchCheckIn | OperationKind::BatchMintNft)
    }
}

/// One signed broadcast attempt. Never mutated; a re-priced retry is a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainOperation {
    pub intent_id: Uuid,
    /// 1-based attempt number within the intent.
    pub attempt: u32,
    pub kind: OperationKind,
    pub contract: Address,
    #[serde(skip)]
    pub input: Bytes,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub tx_hash: TxHash,
}

impl ChainOperation {
    pub fn from_signed(request: &OperationRequest, attempt: u32, signed: &SignedTransaction) -> Self {
        Self {
            intent_id: request.intent_id,
            attempt,
            kind: request.kind,
            contract: request.contract,
            input: signed.input.clone(),
            nonce: signed.nonce,
            gas_price: signed.gas_price,
            gas_limit: signed.gas_limit,
            tx_hash: signed.hash,
        }
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedTx {
    /// The attempt the node accepted.
    pub operation: ChainOperation,
    /// Earlier attempts the node refused as underpriced.
    pub rejected: Vec<ChainOperation>,
}

impl SubmittedTx {
    pub fn tx_hash(&self) -> TxHash {
        self.operation.tx_hash
    }

    pub fn attempts(&self) -> u32 {
        self.operation.attempt
    }
}
