// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Statemine `Uniques` pallet adapter
//!
//! Owned items are found by scanning `Uniques::Account` keys under the owner's prefix.
//! For each `(collection, item)` pair the `Uniques::InstanceMetadataOf` entry is read
//! and its `data` field, an IPFS pointer, is resolved and fetched. All node reads
//! happen on one connection which is closed before the off-chain fetches start.

use std::sync::Arc;

use api_client::{FetchTracker, IpfsGateway, NftSource, SourceContribution, SourceError};
use async_trait::async_trait;
use blake2::{Blake2b, Digest, digest::consts::U16};
use futures::{StreamExt, stream};
use parity_scale_codec::{Decode, DecodeAll, Encode};
use serde_json::Value;
use shared_types::{Attributes, MediaType, NftCollection, NftItem, SerialNumber, SourceFamily};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    address::{PublicKey, decode_substrate, is_substrate_address},
    config::ChainStateSourceConfig,
    metadata::MetadataFetcher,
    substrate::{ChainStateConnection, ChainStateConnector},
};

/// `twox128("Uniques") ++ twox128("Account")`
const ACCOUNT_PREFIX: &str = "5e8a19e3cd1b7c148b33880c479c0281b99d880ec681799c0cf30e8886371da9";
/// `twox128("Uniques") ++ twox128("InstanceMetadataOf")`
const INSTANCE_METADATA_PREFIX: &str =
    "5e8a19e3cd1b7c148b33880c479c02819a8dc5b2c03b70e90784d1e133050146";

const PALLET_STORAGE_PREFIX_LEN: usize = 32;
const HASH_LEN: usize = 16;

const SOURCE_NAME: &str = "Statemine";

type Blake2b128 = Blake2b<U16>;

/// Errors decoding storage keys and values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageDecodeError {
    /// Not hex
    #[error("storage data is not hex: {0}")]
    Hex(String),

    /// Shorter than its layout requires
    #[error("storage data truncated")]
    Truncated,

    /// Value does not match its SCALE layout
    #[error("invalid SCALE value: {0}")]
    Scale(String),

    /// Key does not belong to the expected map
    #[error("unexpected storage key prefix")]
    Prefix,
}

impl From<StorageDecodeError> for SourceError {
    fn from(value: StorageDecodeError) -> Self {
        SourceError::InvalidResponse {
            message: value.to_string(),
        }
    }
}

fn blake2_128_concat(data: &[u8]) -> Vec<u8> {
    let mut out = Blake2b128::digest(data).to_vec();
    out.extend_from_slice(data);
    out
}

/// Prefix of every `Uniques::Account` key owned by `owner`
pub fn account_prefix(owner: &PublicKey) -> String {
    format!("0x{ACCOUNT_PREFIX}{}", hex::encode(blake2_128_concat(owner)))
}

/// Key of the `Uniques::InstanceMetadataOf` entry for an item
pub fn instance_metadata_key(collection: u32, item: u32) -> String {
    format!(
        "0x{INSTANCE_METADATA_PREFIX}{}{}",
        hex::encode(blake2_128_concat(&collection.encode())),
        hex::encode(blake2_128_concat(&item.encode()))
    )
}

/// Collection and item ids from a full `Uniques::Account` key
pub fn parse_account_key(key: &str) -> Result<(u32, u32), StorageDecodeError> {
    let bytes = decode_hex(key)?;
    let prefix = decode_hex(ACCOUNT_PREFIX)?;
    if !bytes.starts_with(&prefix) {
        return Err(StorageDecodeError::Prefix);
    }

    let mut input = bytes
        .get(PALLET_STORAGE_PREFIX_LEN + HASH_LEN + std::mem::size_of::<PublicKey>()..)
        .ok_or(StorageDecodeError::Truncated)?;
    let collection = read_concat_id(&mut input)?;
    let item = read_concat_id(&mut input)?;
    Ok((collection, item))
}

/// Skip a `blake2_128_concat` hash and decode the id it prefixes
fn read_concat_id(input: &mut &[u8]) -> Result<u32, StorageDecodeError> {
    *input = input.get(HASH_LEN..).ok_or(StorageDecodeError::Truncated)?;
    u32::decode(input).map_err(|_| StorageDecodeError::Truncated)
}

/// `pallet_uniques::ItemMetadata`
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ItemMetadata {
    /// Reserved deposit
    pub deposit: u128,
    /// Raw metadata, an IPFS pointer in practice
    pub data: Vec<u8>,
    /// Whether the metadata is frozen
    pub is_frozen: bool,
}

impl ItemMetadata {
    /// Decode a hex-encoded storage value
    pub fn from_storage(value: &str) -> Result<Self, StorageDecodeError> {
        let bytes = decode_hex(value)?;
        Self::decode_all(&mut bytes.as_slice())
            .map_err(|e| StorageDecodeError::Scale(e.to_string()))
    }

    /// `data` as text
    pub fn pointer(&self) -> Option<&str> {
        std::str::from_utf8(&self.data)
            .ok()
            .map(str::trim)
            .filter(|pointer| !pointer.is_empty())
    }
}

fn decode_hex(value: &str) -> Result<Vec<u8>, StorageDecodeError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|e| StorageDecodeError::Hex(e.to_string()))
}

/// Whether `pointer` is a CID with an optional path and no scheme
fn is_bare_cid(pointer: &str) -> bool {
    pointer
        .split('/')
        .next()
        .is_some_and(|cid| !cid.is_empty() && cid.chars().all(|c| c.is_ascii_alphanumeric()))
        && !pointer.contains(char::is_whitespace)
}

/// Node connection that is closed on every exit path
///
/// [`ConnectionGuard::close`] releases the connection in place. A guard dropped while
/// still holding it, for example when the query is cancelled, closes it on a
/// background task.
struct ConnectionGuard {
    connection: Option<Box<dyn ChainStateConnection>>,
    endpoint: String,
}

impl ConnectionGuard {
    fn new(connection: Box<dyn ChainStateConnection>, endpoint: &str) -> Self {
        Self {
            connection: Some(connection),
            endpoint: endpoint.to_string(),
        }
    }

    fn get(&mut self) -> Result<&mut (dyn ChainStateConnection + 'static), SourceError> {
        self.connection
            .as_deref_mut()
            .ok_or_else(|| SourceError::Connection {
                message: format!("connection to {} already closed", self.endpoint),
            })
    }

    async fn close(mut self) {
        if let Some(connection) = self.connection.take() {
            close_connection(connection, std::mem::take(&mut self.endpoint)).await;
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        let endpoint = std::mem::take(&mut self.endpoint);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(endpoint = %endpoint, "closing abandoned node connection");
                runtime.spawn(close_connection(connection, endpoint));
            }
            Err(_) => {
                warn!(endpoint = %endpoint, "no runtime left to close node connection");
            }
        }
    }
}

async fn close_connection(mut connection: Box<dyn ChainStateConnection>, endpoint: String) {
    if let Err(error) = connection.close().await {
        warn!(
            endpoint = %endpoint,
            error = %error,
            "failed to close node connection"
        );
    }
}

/// One owned item and the outcome of its metadata read
struct OwnedItem {
    collection: u32,
    item: u32,
    metadata: Result<ItemMetadata, SourceError>,
}

/// Adapter reading item ownership straight from chain state
#[derive(Debug)]
pub struct StatemineSource {
    config: ChainStateSourceConfig,
    connector: Arc<dyn ChainStateConnector>,
    metadata: Arc<MetadataFetcher>,
    gateway: IpfsGateway,
    tracker: FetchTracker,
}

impl StatemineSource {
    /// Create the adapter
    pub fn new(
        config: ChainStateSourceConfig,
        connector: Arc<dyn ChainStateConnector>,
        metadata: Arc<MetadataFetcher>,
        gateway: IpfsGateway,
    ) -> Self {
        Self {
            config,
            connector,
            metadata,
            gateway,
            tracker: FetchTracker::new(),
        }
    }

    /// In-flight query counter
    pub fn tracker(&self) -> &FetchTracker {
        &self.tracker
    }

    async fn read_chain_state(
        &self,
        connection: &mut dyn ChainStateConnection,
        owner: &PublicKey,
    ) -> Result<Vec<OwnedItem>, SourceError> {
        let prefix = account_prefix(owner);
        let mut keys = Vec::new();
        let mut start_key = None;

        for _ in 0..self.config.max_pages {
            let page = connection
                .keys_paged(&prefix, self.config.page_size, start_key)
                .await?;
            let full_page = u32::try_from(page.len()).is_ok_and(|len| len >= self.config.page_size);
            start_key = page.last().cloned();
            keys.extend(page);
            if !full_page || start_key.is_none() {
                break;
            }
        }
        debug!(keys = keys.len(), "account keys enumerated");

        let mut owned = Vec::with_capacity(keys.len());
        for key in keys {
            let (collection, item) = match parse_account_key(&key) {
                Ok(ids) => ids,
                Err(error) => {
                    warn!(key = %key, error = %error, "skipping undecodable account key");
                    continue;
                }
            };

            let metadata = match connection
                .storage(&instance_metadata_key(collection, item))
                .await
            {
                Ok(Some(value)) => ItemMetadata::from_storage(&value).map_err(SourceError::from),
                Ok(None) => Err(SourceError::InvalidResponse {
                    message: "item has no metadata".to_string(),
                }),
                Err(error) => Err(error),
            };
            owned.push(OwnedItem {
                collection,
                item,
                metadata,
            });
        }

        Ok(owned)
    }

    /// Resolve a pointer, accepting the bare CIDs item metadata is usually stored as
    fn resolve(&self, pointer: Option<&str>) -> Result<Option<String>, SourceError> {
        match self.gateway.resolve(pointer) {
            Err(SourceError::MalformedMediaUri { uri }) if is_bare_cid(&uri) => {
                Ok(Some(format!("{}{uri}", self.gateway.base())))
            }
            resolved => resolved,
        }
    }

    async fn build_item(
        &self,
        owned: OwnedItem,
        owner_address: &str,
    ) -> Result<NftItem, SourceError> {
        let metadata = owned.metadata?;
        let location = self
            .resolve(metadata.pointer())?
            .ok_or_else(|| SourceError::InvalidResponse {
                message: "metadata data is empty or not UTF-8".to_string(),
            })?;
        let document = self.metadata.fetch_json(&location).await?;

        let text = |field: &str| document.get(field).and_then(Value::as_str);
        let media = self.resolve(text("image"))?;

        let mut item = NftItem::new(
            format!("{}-{}", owned.collection, owned.item),
            SOURCE_NAME,
            self.config.token_symbol.as_str(),
            owner_address,
        );
        if let Some(name) = text("name") {
            item.name = name.to_string();
        }
        item.description = text("description").map(ToString::to_string);
        item.serial_number = Some(SerialNumber::Number(u64::from(owned.item)));
        item.attributes = Attributes::from_json(document.get("attributes"));
        item.platform_uri = Some(self.config.explorer_url.clone());
        item.media_type = MediaType::from_extension(media.as_deref());
        item.thumbnail_uri = media.clone();
        item.media_uri = media;
        item.metadata_uri = Some(location);
        item.collection = NftCollection {
            id: Some(owned.collection.to_string()),
            ..NftCollection::default()
        };

        item.validate().map_err(|e| SourceError::InvalidResponse {
            message: e.to_string(),
        })?;
        Ok(item)
    }
}

#[async_trait]
impl NftSource for StatemineSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn family(&self) -> SourceFamily {
        SourceFamily::Substrate
    }

    async fn fetch_by_address(
        &self,
        address: &str,
    ) -> Result<Option<SourceContribution>, SourceError> {
        if !is_substrate_address(address) {
            return Ok(None);
        }
        let owner = decode_substrate(address).map_err(|e| SourceError::InvalidAddress {
            address: address.to_string(),
            message: e.to_string(),
        })?;

        let _guard = self.tracker.begin();

        let connection = self.connector.connect(&self.config.endpoint).await?;
        let mut connection = ConnectionGuard::new(connection, &self.config.endpoint);
        let on_chain = self.read_chain_state(connection.get()?, &owner).await;
        connection.close().await;
        let owned = on_chain?;

        let keys: Vec<String> = owned
            .iter()
            .map(|o| format!("{}-{}", o.collection, o.item))
            .collect();
        let built: Vec<_> = stream::iter(owned)
            .map(|o| self.build_item(o, address))
            .buffered(self.config.max_concurrent_items.max(1))
            .collect()
            .await;

        let mut contribution = SourceContribution::empty();
        for (key, item) in keys.into_iter().zip(built) {
            match item {
                Ok(item) => contribution.push(item),
                Err(error) => contribution.skip(key, error),
            }
        }

        info!(
            items = contribution.count(),
            skipped = contribution.skipped().len(),
            "statemine scanned"
        );
        Ok(Some(contribution))
    }
}
