// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Account-model (EVM) chain adapter
//!
//! One [`EvmSource`] exists per configured chain. A query picks a live endpoint serving
//! the configured chain id, then walks every registered ERC-721 Enumerable contract:
//! balance, total supply, owned token ids, token URIs and finally the off-chain
//! metadata documents. A contract or token that fails is skipped on its own.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use api_client::{FetchTracker, IpfsGateway, NftSource, SourceContribution, SourceError};
use async_trait::async_trait;
use futures::{StreamExt, future::join_all, stream};
use serde_json::{Value, json};
use shared_types::{Attributes, MediaType, NftCollection, NftItem, SerialNumber, SourceFamily};
use tracing::{debug, info};

use crate::{
    abi::{self, balanceOfCall, tokenOfOwnerByIndexCall, tokenURICall, totalSupplyCall},
    address::is_account_model_address,
    config::{EvmChainConfig, EvmContract},
    endpoint::{ChainIdProbe, EndpointSelector},
    jsonrpc::HttpJsonRpc,
    metadata::MetadataFetcher,
    non_empty_string::NonEmptyString,
};

/// ERC-721 Enumerable adapter for one EVM chain
#[derive(Debug)]
pub struct EvmSource {
    name: NonEmptyString,
    currency: NonEmptyString,
    config: EvmChainConfig,
    rpc: Arc<HttpJsonRpc>,
    selector: EndpointSelector,
    metadata: Arc<MetadataFetcher>,
    gateway: IpfsGateway,
    tracker: FetchTracker,
}

/// Token-independent facts about one contract for the queried owner
struct ContractScan<'a> {
    endpoint: &'a str,
    contract: &'a EvmContract,
    owner: Address,
    owner_address: &'a str,
    total_supply: Option<u64>,
}

impl EvmSource {
    /// Create an adapter for `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the chain name or currency is empty, or the HTTP client
    /// cannot be built
    pub fn new(
        config: EvmChainConfig,
        metadata: Arc<MetadataFetcher>,
        gateway: IpfsGateway,
    ) -> Result<Self, SourceError> {
        let name = NonEmptyString::setting("evm chain name", config.name.clone())
            .map_err(|message| SourceError::Configuration { message })?;
        let currency = NonEmptyString::setting("evm chain currency", config.currency.clone())
            .map_err(|message| SourceError::Configuration { message })?;

        let rpc = Arc::new(HttpJsonRpc::new(config.request_timeout())?);
        let probe = ChainIdProbe::new(Arc::clone(&rpc));
        let selector = EndpointSelector::new(Arc::new(probe), config.probe_timeout());

        Ok(Self {
            name,
            currency,
            config,
            rpc,
            selector,
            metadata,
            gateway,
            tracker: FetchTracker::new(),
        })
    }

    /// In-flight query counter
    pub fn tracker(&self) -> &FetchTracker {
        &self.tracker
    }

    async fn eth_call(
        &self,
        endpoint: &str,
        to: &str,
        data: String,
    ) -> Result<String, SourceError> {
        let result: String = self
            .rpc
            .call(endpoint, "eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await?;
        Ok(result)
    }

    async fn read<C: SolCall>(
        &self,
        endpoint: &str,
        to: &str,
        call: C,
    ) -> Result<C::Return, SourceError> {
        let returned = self.eth_call(endpoint, to, abi::encode_call(&call)).await?;
        Ok(abi::decode_return::<C>(&returned)?)
    }

    async fn scan_contract(
        &self,
        endpoint: &str,
        contract: &EvmContract,
        owner: Address,
        owner_address: &str,
    ) -> Result<SourceContribution, SourceError> {
        let balance = self
            .read(endpoint, &contract.address, balanceOfCall { owner })
            .await?;
        let balance = u64::try_from(balance).unwrap_or(u64::MAX);
        if balance == 0 {
            return Ok(SourceContribution::empty());
        }

        let total_supply = self
            .read(endpoint, &contract.address, totalSupplyCall {})
            .await?;
        let scan = ContractScan {
            endpoint,
            contract,
            owner,
            owner_address,
            total_supply: u64::try_from(total_supply).ok(),
        };

        let owned = balance.min(self.config.max_tokens_per_contract);
        if owned < balance {
            debug!(
                chain = %self.name,
                contract = %contract.name,
                balance,
                limit = self.config.max_tokens_per_contract,
                "token enumeration truncated"
            );
        }

        // order is kept so skips line up with token indices
        let tokens: Vec<_> = stream::iter(0..owned)
            .map(|index| self.fetch_token(&scan, index))
            .buffered(self.config.max_concurrent_tokens.max(1))
            .collect()
            .await;

        let mut contribution = SourceContribution::empty();
        for (index, token) in (0..owned).zip(tokens) {
            match token {
                Ok(item) => contribution.push(item),
                Err(error) => {
                    contribution.skip(format!("{}#{index}", contract.address), error);
                }
            }
        }
        Ok(contribution)
    }

    async fn fetch_token(
        &self,
        scan: &ContractScan<'_>,
        index: u64,
    ) -> Result<NftItem, SourceError> {
        let contract = &scan.contract.address;
        let token_id = self
            .read(
                scan.endpoint,
                contract,
                tokenOfOwnerByIndexCall {
                    owner: scan.owner,
                    index: U256::from(index),
                },
            )
            .await?;
        let token_uri = self
            .read(scan.endpoint, contract, tokenURICall { tokenId: token_id })
            .await?;

        let metadata_uri = self.gateway.resolve(Some(&token_uri))?.ok_or_else(|| {
            SourceError::InvalidResponse {
                message: format!("token {token_id} has no metadata pointer"),
            }
        })?;
        let document = self.metadata.fetch_json(&metadata_uri).await?;

        let item = self.map_token(scan, token_id, metadata_uri, &document)?;
        item.validate().map_err(|e| SourceError::InvalidResponse {
            message: e.to_string(),
        })?;
        Ok(item)
    }

    fn map_token(
        &self,
        scan: &ContractScan<'_>,
        token_id: U256,
        metadata_uri: String,
        document: &Value,
    ) -> Result<NftItem, SourceError> {
        let contract = scan.contract;
        let text = |field: &str| document.get(field).and_then(Value::as_str);

        let image = self.gateway.resolve(text("image"))?;
        let media = match self.gateway.resolve(text("animation_url"))? {
            Some(animation) => Some(animation),
            None => image.clone(),
        };

        let mut item = NftItem::new(
            format!("{token_id}-{}", contract.name),
            self.name.as_str(),
            self.currency.as_str(),
            scan.owner_address,
        );
        item.name = text("name").unwrap_or(&contract.name).to_string();
        item.description = text("description").map(ToString::to_string);
        item.serial_number = document
            .get("edition")
            .and_then(SerialNumber::from_json)
            .or_else(|| Some(token_serial(token_id)));
        item.attributes = Attributes::from_json(document.get("attributes"));
        item.platform_uri = Some(self.config.explorer_url.clone());
        item.media_type = MediaType::from_extension(media.as_deref());
        item.thumbnail_uri = image;
        item.media_uri = media;
        item.metadata_uri = Some(metadata_uri);
        item.collection = NftCollection {
            id: Some(contract.address.clone()),
            name: Some(contract.name.clone()),
            total_supply: scan.total_supply,
        };

        Ok(item)
    }
}

fn token_serial(token_id: U256) -> SerialNumber {
    u64::try_from(token_id).map_or_else(
        |_| SerialNumber::Text(token_id.to_string()),
        SerialNumber::Number,
    )
}

#[async_trait]
impl NftSource for EvmSource {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::AccountModel
    }

    async fn fetch_by_address(
        &self,
        address: &str,
    ) -> Result<Option<SourceContribution>, SourceError> {
        if !is_account_model_address(address) {
            return Ok(None);
        }
        let owner = address.parse::<Address>().map_err(|e| SourceError::InvalidAddress {
            address: address.to_string(),
            message: e.to_string(),
        })?;

        let _guard = self.tracker.begin();

        let endpoint = self
            .selector
            .select(&self.config.rpc, self.config.chain_id)
            .await
            .ok_or_else(|| SourceError::Connection {
                message: format!(
                    "no endpoint for {} reports chain id {}",
                    self.name, self.config.chain_id
                ),
            })?;
        debug!(chain = %self.name, endpoint, "endpoint selected");

        let scans = self.config.contracts.iter().map(|contract| async move {
            (
                contract,
                self.scan_contract(endpoint, contract, owner, address).await,
            )
        });

        let mut contribution = SourceContribution::empty();
        for (contract, scanned) in join_all(scans).await {
            match scanned {
                Ok(scanned) => {
                    let (items, skipped) = scanned.into_parts();
                    for item in items {
                        contribution.push(item);
                    }
                    for skipped in skipped {
                        contribution.skip(skipped.key, skipped.reason);
                    }
                }
                Err(error) => contribution.skip(contract.address.clone(), error),
            }
        }

        info!(
            chain = %self.name,
            items = contribution.count(),
            skipped = contribution.skipped().len(),
            "evm chain scanned"
        );
        Ok(Some(contribution))
    }
}
