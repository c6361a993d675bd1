//! Check-in registry: one attendance record per (event, participant).

use alloy::primitives::{Address, U256};
use alloy::sol;
use std::sync::Arc;

use crate::chain::{ChainResult, ChainRpc};
use crate::contracts::ContractBinding;
use crate::submitter::{OperationKind, OperationRequest};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct CheckInRecord {
        uint256 eventId;
        address participant;
        uint256 timestamp;
        bytes32 transactionHash;
        bool isActive;
        uint256 checkInId;
        address organizer;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct CheckInStats {
        uint256 eventId;
        uint256 totalCheckIns;
        uint256 uniqueParticipants;
        uint256 lastCheckInTime;
    }

    interface ICheckInRegistry {
        #[derive(Debug)]
        event ParticipantCheckedIn(uint256 indexed eventId, address indexed participant, uint256 checkInId, uint256 timestamp);

        function registerEvent(uint256 eventId) external;
        function authorizeOrganizer(address organizer, bool authorized) external;
        function checkIn(uint256 eventId, address participant) external returns (uint256);
        function batchCheckIn(uint256 eventId, address[] participants) external returns (uint256[] memory);

        function getCheckInRecord(uint256 eventId, address participant) external view returns (CheckInRecord memory);
        function hasParticipantCheckedIn(uint256 eventId, address participant) external view returns (bool);
        function getEventCheckInCount(uint256 eventId) external view returns (uint256);
        function getEventCheckInStats(uint256 eventId) external view returns (CheckInStats memory);
        function batchCheckCheckInStatus(uint256 eventId, address[] participants) external view returns (bool[] memory);
        function isEventRegistered(uint256 eventId) external view returns (bool);
    }
}

pub use ICheckInRegistry::ParticipantCheckedIn;

#[derive(Clone, Debug)]
pub struct CheckInRegistry {
    binding: ContractBinding,
}

impl CheckInRegistry {
    pub fn new(address: Address, rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            binding: ContractBinding::new("CheckInRegistry", address, rpc),
        }
    }

    pub fn address(&self) -> Address {
        self.binding.address()
    }

    pub async fn is_event_registered(&self, event_id: u64) -> ChainResult<bool> {
        self.binding
            .call(ICheckInRegistry::isEventRegisteredCall {
                eventId: U256::from(event_id),
            })
            .await
    }

    pub async fn has_checked_in(&self, event_id: u64, participant: Address) -> ChainResult<bool> {
        self.binding
            .call(ICheckInRegistry::hasParticipantCheckedInCall {
                eventId: U256::from(event_id),
                participant,
            })
            .await
    }

    pub async fn record(&self, event_id: u64, participant: Address) -> ChainResult<CheckInRecord> {
        self.binding
            .call(ICheckInRegistry::getCheckInRecordCall {
                eventId: U256::from(event_id),
                participant,
            })
            .await
    }

    pub async fn check_in_count(&self, event_id: u64) -> ChainResult<u64> {
        let count = self
            .binding
            .call(ICheckInRegistry::getEventCheckInCountCall {
                eventId: U256::from(event_id),
            })
            .await?;
        Ok(count.saturating_to())
    }

    pub async fn stats(&self, event_id: u64) -> ChainResult<CheckInStats> {
        self.binding
            .call(ICheckInRegistry::getEventCheckInStatsCall {
                eventId: U256::from(event_id),
            })
            .await
    }

    /// Check-in flags for `participants`, in the same order.
    pub async fn batch_status(&self, event_id: u64, participants: Vec<Address>) -> ChainResult<Vec<bool>> {
        self.binding
            .call(ICheckInRegistry::batchCheckCheckInStatusCall {
                eventId: U256::from(event_id),
                participants,
            })
            .await
    }

    pub fn register_event(&self, event_id: u64) -> OperationRequest {
        OperationRequest::new(
            OperationKind::RegisterEvent,
            self.address(),
            &ICheckInRegistry::registerEventCall {
                eventId: U256::from(event_id),
            },
        )
    }

    pub fn authorize_organizer(&self, organizer: Address, authorized: bool) -> OperationRequest {
        OperationRequest::new(
            OperationKind::AuthorizeOrganizer,
            self.address(),
            &ICheckInRegistry::authorizeOrganizerCall {
                organizer,
                authorized,
            },
        )
    }

    pub fn check_in(&self, event_id: u64, participant: Address) -> OperationRequest {
        OperationRequest::new(
            OperationKind::CheckIn,
            self.address(),
            &ICheckInRegistry::checkInCall {
                eventId: U256::from(event_id),
                participant,
            },
        )
    }

    pub fn batch_check_in(&self, event_id: u64, participants: Vec<Address>) -> OperationRequest {
        let count = participants.len();
        OperationRequest::new(
            OperationKind::BatchCheckIn,
            self.address(),
            &ICheckInRegistry::batchCheckInCall {
                eventId: U256::from(event_id),
                participants,
            },
        )
        .with_batch_size(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChain;
    use alloy::sol_types::SolCall;

    #[tokio::test]
    async fn test_has_checked_in() {
        let chain = Arc::new(MockChain::new(31337));
        let alice = Address::repeat_byte(0xa1);
        chain.on_call::<ICheckInRegistry::hasParticipantCheckedInCall>(move |call| {
            call.eventId == U256::from(42) && call.participant == alice
        });

        let registry = CheckInRegistry::new(Address::repeat_byte(0xc1), chain);
        assert!(registry.has_checked_in(42, alice).await.unwrap());
        assert!(!registry.has_checked_in(43, alice).await.unwrap());
        assert!(!registry.has_checked_in(42, Address::ZERO).await.unwrap());
    }

    #[test]
    fn test_batch_request_carries_size() {
        let chain = Arc::new(MockChain::new(31337));
        let registry = CheckInRegistry::new(Address::repeat_byte(0xc1), chain);
        let request = registry.batch_check_in(1, vec![Address::ZERO; 4]);
        assert_eq!(request.batch_size, 4);
        let decoded = ICheckInRegistry::batchCheckInCall::abi_decode(&request.input).unwrap();
        assert_eq!(decoded.participants.len(), 4);
    }

    #[tokio::test]
    async fn test_revert_is_classified() {
        let chain = Arc::new(MockChain::new(31337));
        chain.on_call_revert::<ICheckInRegistry::getCheckInRecordCall>("Participant not checked in");
        let registry = CheckInRegistry::new(Address::repeat_byte(0xc1), chain);
        let err = registry.record(1, Address::ZERO).await.unwrap_err();
        assert!(err.to_string().contains("Participant not checked in"));
    }
}
