//! Event lifecycle on the event registry. Every call blocks on confirmation.

use crate::chain::ChainError;
use crate::contracts::event_registry::created_event_id;
use crate::contracts::EventDraft;
use crate::services::{ChainContext, OperationResult, ServiceError, ServiceResult};
use crate::store::EventRow;

fn draft(row: &EventRow) -> EventDraft {
    EventDraft {
        name: row.name.clone(),
        description: row.description.clone(),
        location: row.location.clone(),
        start_time: row.start_time,
        end_time: row.end_time,
    }
}

fn entity_id(event_id: u64) -> String {
    format!("event:{}", event_id)
}

#[derive(Debug)]
pub struct EventService<'a> {
    ctx: &'a ChainContext,
}

impl<'a> EventService<'a> {
    pub(crate) fn new(ctx: &'a ChainContext) -> Self {
        Self { ctx }
    }

    /// Create the stored event on chain and persist the chain-assigned id.
    pub async fn create_event(&self, event_id: u64) -> ServiceResult<OperationResult> {
        let row = self.ctx.event_row(event_id).await?;
        if row.is_on_chain() {
            return Err(ServiceError::EventAlreadyOnChain(row.chain_event_id));
        }

        let request = self.ctx.events.create_event(&draft(&row));
        let receipt = self
            .ctx
            .submit_and_confirm(
                &entity_id(event_id),
                request,
                format!("create event '{}'", row.name),
                self.ctx.tracker.blocking_timeout(),
            )
            .await?;

        let chain_event_id = created_event_id(&receipt).ok_or_else(|| {
            ChainError::Abi(format!("no EventCreated log in receipt {}", receipt.tx_hash))
        })?;
        self.ctx.store.set_chain_event_id(event_id, chain_event_id).await?;
        tracing::info!(event_id, chain_event_id, tx_hash = %receipt.tx_hash, "Event created on chain");

        Ok(OperationResult::Completed {
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            chain_assigned_id: Some(chain_event_id),
        })
    }

    /// Push the stored metadata to the on-chain event.
    pub async fn update_event(&self, event_id: u64) -> ServiceResult<OperationResult> {
        let row = self.ctx.on_chain_event(event_id).await?;
        let request = self.ctx.events.update_event(row.chain_event_id, &draft(&row));
        let receipt = self
            .ctx
            .submit_and_confirm(
                &entity_id(event_id),
                request,
                format!("update event {}", row.chain_event_id),
                self.ctx.tracker.blocking_timeout(),
            )
            .await?;
        Ok(OperationResult::completed(&receipt))
    }

    /// Soft-delete on chain, then flag the stored row.
    pub async fn delete_event(&self, event_id: u64) -> ServiceResult<OperationResult> {
        let row = self.ctx.on_chain_event(event_id).await?;
        let request = self.ctx.events.delete_event(row.chain_event_id);
        let receipt = self
            .ctx
            .submit_and_confirm(
                &entity_id(event_id),
                request,
                format!("delete event {}", row.chain_event_id),
                self.ctx.tracker.blocking_timeout(),
            )
            .await?;
        self.ctx.store.mark_event_deleted(event_id).await?;
        Ok(OperationResult::completed(&receipt))
    }

    pub async fn activate_event(&self, event_id: u64) -> ServiceResult<OperationResult> {
        let row = self.ctx.on_chain_event(event_id).await?;
        let request = self.ctx.events.activate_event(row.chain_event_id);
        let receipt = self
            .ctx
            .submit_and_confirm(
                &entity_id(event_id),
                request,
                format!("activate event {}", row.chain_event_id),
                self.ctx.tracker.blocking_timeout(),
            )
            .await?;
        Ok(OperationResult::completed(&receipt))
    }

    pub async fn end_event(&self, event_id: u64) -> ServiceResult<OperationResult> {
        let row = self.ctx.on_chain_event(event_id).await?;
        let request = self.ctx.events.end_event(row.chain_event_id);
        let receipt = self
            .ctx
            .submit_and_confirm(
                &entity_id(event_id),
                request,
                format!("end event {}", row.chain_event_id),
                self.ctx.tracker.blocking_timeout(),
            )
            .await?;
        Ok(OperationResult::completed(&receipt))
    }
}
