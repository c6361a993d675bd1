//! Outcome sink: applies background confirmation results to the store.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::confirmation::tracker::{ConfirmationOutcome, ConfirmationResult};
use crate::contracts::event_registry::created_event_id;
use crate::contracts::nft_registry::minted_tokens;
use crate::store::{OffChainStore, OutcomeUpdate, RecordStatus};

/// Drain `outcomes` into `store` until every sender is dropped.
pub fn spawn_recorder(
    store: Arc<dyn OffChainStore>,
    mut outcomes: UnboundedReceiver<ConfirmationOutcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(outcome) = outcomes.recv().await {
            record_outcome(store.as_ref(), outcome).await;
        }
        tracing::debug!("Outcome channel closed, recorder exiting");
    })
}

/// Persist one outcome. Unresolved outcomes leave rows pending.
pub async fn record_outcome(store: &dyn OffChainStore, outcome: ConfirmationOutcome) {
    let Some(update) = to_update(&outcome) else {
        tracing::warn!(
            entity_id = %outcome.pending.entity_id,
            tx_hash = %outcome.pending.tx_hash,
            "Leaving record pending, no receipt observed"
        );
        return;
    };

    let status = update.status;
    match store.apply_outcome(update).await {
        Ok(()) => tracing::info!(
            entity_id = %outcome.pending.entity_id,
            kind = %outcome.pending.kind,
            tx_hash = %outcome.pending.tx_hash,
            status = ?status,
            "Recorded transaction outcome"
        ),
        Err(e) => tracing::error!(
            entity_id = %outcome.pending.entity_id,
            tx_hash = %outcome.pending.tx_hash,
            error = %e,
            "Failed to record transaction outcome"
        ),
    }
}

fn to_update(outcome: &ConfirmationOutcome) -> Option<OutcomeUpdate> {
    let tx_hash = outcome.pending.tx_hash;
    match &outcome.result {
        ConfirmationResult::Confirmed(receipt) => {
            let mut update = OutcomeUpdate::new(tx_hash, RecordStatus::Confirmed, Some(receipt.block_number));
            update.chain_assigned_id = created_event_id(receipt);
            update.minted = minted_tokens(receipt);
            Some(update)
        }
        ConfirmationResult::Reverted(receipt) => Some(OutcomeUpdate::new(
            tx_hash,
            RecordStatus::Failed,
            Some(receipt.block_number),
        )),
        ConfirmationResult::Unresolved => None,
    }
}
