//! Event registry: event lifecycle and relayed votes.

use alloy::primitives::{Address, U256};
use alloy::sol;
use std::sync::Arc;

use crate::chain::{ChainResult, ChainRpc, TxReceipt};
use crate::contracts::ContractBinding;
use crate::submitter::{OperationKind, OperationRequest};

sol! {
    /// On-chain event record.
    #[derive(Debug, PartialEq, Eq)]
    struct EventInfo {
        string name;
        string description;
        uint256 startTime;
        uint256 endTime;
        string location;
        address organizer;
        bool isActive;
        bool isDeleted;
    }

    /// One vote in a voter's on-chain list. Its position is the vote index.
    #[derive(Debug, PartialEq, Eq)]
    struct Vote {
        address voter;
        uint256 projectId;
        uint256 score;
        uint256 timestamp;
        bool isRevoked;
    }

    interface IEventRegistry {
        #[derive(Debug)]
        event EventCreated(uint256 indexed eventId, string name, address indexed organizer);

        function createEvent(string name, string description, uint256 startTime, uint256 endTime, string location) external returns (uint256);
        function updateEvent(uint256 eventId, string name, string description, uint256 startTime, uint256 endTime, string location) external;
        function deleteEvent(uint256 eventId) external;
        function activateEvent(uint256 eventId) external;
        function endEvent(uint256 eventId) external;
        function vote(uint256 eventId, address voter, uint256 projectId, uint256 score) external;
        function revokeVote(uint256 eventId, address voter, uint256 voteIndex) external;

        function getEvent(uint256 eventId) external view returns (EventInfo memory);
        function getUserVotes(uint256 eventId, address voter) external view returns (Vote[] memory);
    }
}

pub use IEventRegistry::EventCreated;

/// Event metadata as written to chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub name: String,
    pub description: String,
    pub location: String,
    /// Unix seconds.
    pub start_time: u64,
    pub end_time: u64,
}

#[derive(Clone, Debug)]
pub struct EventRegistry {
    binding: ContractBinding,
}

impl EventRegistry {
    pub fn new(address: Address, rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            binding: ContractBinding::new("EventRegistry", address, rpc),
        }
    }

    pub fn address(&self) -> Address {
        self.binding.address()
    }

    pub async fn get_event(&self, chain_event_id: u64) -> ChainResult<EventInfo> {
        self.binding
            .call(IEventRegistry::getEventCall {
                eventId: U256::from(chain_event_id),
            })
            .await
    }

    /// Every vote `voter` cast on the event, revoked ones included.
    pub async fn user_votes(&self, chain_event_id: u64, voter: Address) -> ChainResult<Vec<Vote>> {
        self.binding
            .call(IEventRegistry::getUserVotesCall {
                eventId: U256::from(chain_event_id),
                voter,
            })
            .await
    }

    pub fn create_event(&self, draft: &EventDraft) -> OperationRequest {
        OperationRequest::new(
            OperationKind::CreateEvent,
            self.address(),
            &IEventRegistry::createEventCall {
                name: draft.name.clone(),
                description: draft.description.clone(),
                startTime: U256::from(draft.start_time),
                endTime: U256::from(draft.end_time),
                location: draft.location.clone(),
            },
        )
    }

    pub fn update_event(&self, chain_event_id: u64, draft: &EventDraft) -> OperationRequest {
        OperationRequest::new(
            OperationKind::UpdateEvent,
            self.address(),
            &IEventRegistry::updateEventCall {
                eventId: U256::from(chain_event_id),
                name: draft.name.clone(),
                description: draft.description.clone(),
                startTime: U256::from(draft.start_time),
                endTime: U256::from(draft.end_time),
                location: draft.location.clone(),
            },
        )
    }

    pub fn delete_event(&self, chain_event_id: u64) -> OperationRequest {
        OperationRequest::new(
            OperationKind::DeleteEvent,
            self.address(),
            &IEventRegistry::deleteEventCall {
                eventId: U256::from(chain_event_id),
            },
        )
    }

    pub fn activate_event(&self, chain_event_id: u64) -> OperationRequest {
        OperationRequest::new(
            OperationKind::ActivateEvent,
            self.address(),
            &IEventRegistry::activateEventCall {
                eventId: U256::from(chain_event_id),
            },
        )
    }

    pub fn end_event(&self, chain_event_id: u64) -> OperationRequest {
        OperationRequest::new(
            OperationKind::EndEvent,
            self.address(),
            &IEventRegistry::endEventCall {
                eventId: U256::from(chain_event_id),
            },
        )
    }

    pub fn vote(
        &self,
        chain_event_id: u64,
        voter: Address,
        project_id: u64,
        score: u64,
    ) -> OperationRequest {
        OperationRequest::new(
            OperationKind::Vote,
            self.address(),
            &IEventRegistry::voteCall {
                eventId: U256::from(chain_event_id),
                voter,
                projectId: U256::from(project_id),
                score: U256::from(score),
            },
        )
    }

    pub fn revoke_vote(&self, chain_event_id: u64, voter: Address, vote_index: u64) -> OperationRequest {
        OperationRequest::new(
            OperationKind::RevokeVote,
            self.address(),
            &IEventRegistry::revokeVoteCall {
                eventId: U256::from(chain_event_id),
                voter,
                voteIndex: U256::from(vote_index),
            },
        )
    }
}

/// The chain-assigned id from a `createEvent` receipt.
pub fn created_event_id(receipt: &TxReceipt) -> Option<u64> {
    receipt
        .decode_logs::<EventCreated>()
        .first()
        .map(|event| event.eventId.saturating_to::<u64>())
}
