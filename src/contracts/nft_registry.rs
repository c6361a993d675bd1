//! Participation NFT registry: one token per (event, participant).

use alloy::primitives::{Address, U256};
use alloy::sol;
use std::sync::Arc;

use crate::chain::{ChainResult, ChainRpc, TxReceipt};
use crate::contracts::ContractBinding;
use crate::submitter::{OperationKind, OperationRequest};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct EventNFT {
        uint256 eventId;
        uint256 tokenId;
        address participant;
        uint256 timestamp;
        bool isActive;
        address organizer;
    }

    interface INftRegistry {
        #[derive(Debug)]
        event NFTMinted(uint256 indexed eventId, uint256 indexed tokenId, address indexed participant, address organizer, uint256 timestamp);

        function registerEvent(uint256 eventId) external;
        function authorizeOrganizer(address organizer, bool authorized) external;
        function mintEventNFT(uint256 eventId, address participant) external returns (uint256);
        function batchMintEventNFT(uint256 eventId, address[] participants) external returns (uint256[] memory);

        function hasParticipantNFT(uint256 eventId, address participant) external view returns (bool);
        function getEventNFTCount(uint256 eventId) external view returns (uint256);
        function getEventNFTTokenIds(uint256 eventId) external view returns (uint256[] memory);
        function getEventNFTInfos(uint256 eventId) external view returns (EventNFT[] memory);
        function getNFTInfo(uint256 tokenId) external view returns (EventNFT memory);
        function getParticipantNFTTokenId(uint256 eventId, address participant) external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function isEventRegistered(uint256 eventId) external view returns (bool);
        function isAuthorizedOrganizer(address organizer) external view returns (bool);
    }
}

pub use INftRegistry::NFTMinted;

#[derive(Clone, Debug)]
pub struct NftRegistry {
    binding: ContractBinding,
}

impl NftRegistry {
    pub fn new(address: Address, rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            binding: ContractBinding::new("NftRegistry", address, rpc),
        }
    }

    pub fn address(&self) -> Address {
        self.binding.address()
    }

    pub async fn is_event_registered(&self, event_id: u64) -> ChainResult<bool> {
        self.binding
            .call(INftRegistry::isEventRegisteredCall {
                eventId: U256::from(event_id),
            })
            .await
    }

    pub async fn is_authorized_organizer(&self, organizer: Address) -> ChainResult<bool> {
        self.binding
            .call(INftRegistry::isAuthorizedOrganizerCall { organizer })
            .await
    }

    pub async fn has_nft(&self, event_id: u64, participant: Address) -> ChainResult<bool> {
        self.binding
            .call(INftRegistry::hasParticipantNFTCall {
                eventId: U256::from(event_id),
                participant,
            })
            .await
    }

    pub async fn event_nft_count(&self, event_id: u64) -> ChainResult<u64> {
        let count = self
            .binding
            .call(INftRegistry::getEventNFTCountCall {
                eventId: U256::from(event_id),
            })
            .await?;
        Ok(count.saturating_to())
    }

    pub async fn event_token_ids(&self, event_id: u64) -> ChainResult<Vec<U256>> {
        self.binding
            .call(INftRegistry::getEventNFTTokenIdsCall {
                eventId: U256::from(event_id),
            })
            .await
    }

    pub async fn event_nfts(&self, event_id: u64) -> ChainResult<Vec<EventNFT>> {
        self.binding
            .call(INftRegistry::getEventNFTInfosCall {
                eventId: U256::from(event_id),
            })
            .await
    }

    pub async fn nft_info(&self, token_id: U256) -> ChainResult<EventNFT> {
        self.binding
            .call(INftRegistry::getNFTInfoCall { tokenId: token_id })
            .await
    }

    pub async fn participant_token_id(&self, event_id: u64, participant: Address) -> ChainResult<U256> {
        self.binding
            .call(INftRegistry::getParticipantNFTTokenIdCall {
                eventId: U256::from(event_id),
                participant,
            })
            .await
    }

    pub async fn total_supply(&self) -> ChainResult<U256> {
        self.binding.call(INftRegistry::totalSupplyCall {}).await
    }

    pub fn register_event(&self, event_id: u64) -> OperationRequest {
        OperationRequest::new(
            OperationKind::RegisterEvent,
            self.address(),
            &INftRegistry::registerEventCall {
                eventId: U256::from(event_id),
            },
        )
    }

    pub fn authorize_organizer(&self, organizer: Address, authorized: bool) -> OperationRequest {
        OperationRequest::new(
            OperationKind::AuthorizeOrganizer,
            self.address(),
            &INftRegistry::authorizeOrganizerCall {
                organizer,
                authorized,
            },
        )
    }

    pub fn mint(&self, event_id: u64, participant: Address) -> OperationRequest {
        OperationRequest::new(
            OperationKind::MintNft,
            self.address(),
            &INftRegistry::mintEventNFTCall {
                eventId: U256::from(event_id),
                participant,
            },
        )
    }

    pub fn batch_mint(&self, event_id: u64, participants: Vec<Address>) -> OperationRequest {
        let count = participants.len();
        OperationRequest::new(
            OperationKind::BatchMintNft,
            self.address(),
            &INftRegistry::batchMintEventNFTCall {
                eventId: U256::from(event_id),
                participants,
            },
        )
        .with_batch_size(count)
    }
}

/// `(participant, token id)` for every `NFTMinted` log in the receipt.
pub fn minted_tokens(receipt: &TxReceipt) -> Vec<(Address, U256)> {
    receipt
        .decode_logs::<NFTMinted>()
        .into_iter()
        .map(|event| (event.participant, event.tokenId))
        .collect()
}
