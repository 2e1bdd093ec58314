// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! RMRK indexer adapters
//!
//! Both RMRK indexers expose the same `nfts(where: ..)` GraphQL query shape; they
//! differ in the columns returned and in how rows map to canonical items. RMRK 2.0
//! additionally returns nested child items.

use std::fmt;

use api_client::{FetchTracker, IpfsGateway, NftSource, SourceContribution, SourceError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shared_types::{
    Attributes, MediaType, NftChild, NftCollection, NftItem, SerialNumber, SourceFamily,
    SourceSpecificData,
};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::{
    address::{is_substrate_address, to_ss58},
    config::GraphQlSourceConfig,
};

const RMRK1_QUERY: &str = r#"query RMRK1($address: String!) {
  nfts(where: { owner: { _eq: $address }, burned: { _eq: "" } }) {
    id
    sn
    metadata
    metadata_name
    metadata_description
    metadata_animation_url
    metadata_image
    metadata_content_type
    collection {
      id
      name
      max
    }
  }
}"#;

const RMRK2_QUERY: &str = r#"query RMRK2($address: String!) {
  nfts(where: { owner: { _eq: $address }, burned: { _eq: "" } }) {
    id
    sn
    symbol
    metadata
    metadata_name
    metadata_image
    metadata_description
    metadata_properties
    children {
      id
      metadata_name
      metadata_image
      sn
    }
    resources {
      metadata_content_type
      thumb
      src
    }
    collection {
      id
      metadata_name
      max
    }
  }
}"#;

/// RMRK standard version served by an indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RmrkVersion {
    /// RMRK 1.0
    V1,
    /// RMRK 2.0, with nested children
    V2,
}

impl RmrkVersion {
    /// Adapter name
    pub const fn source_name(self) -> &'static str {
        match self {
            Self::V1 => "RMRK1",
            Self::V2 => "RMRK2",
        }
    }

    const fn query(self) -> &'static str {
        match self {
            Self::V1 => RMRK1_QUERY,
            Self::V2 => RMRK2_QUERY,
        }
    }
}

impl fmt::Display for RmrkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_name())
    }
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<NftsData>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct NftsData {
    #[serde(default)]
    nfts: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Rmrk1Nft {
    id: String,
    sn: Option<String>,
    metadata: Option<String>,
    metadata_name: Option<String>,
    metadata_description: Option<String>,
    metadata_animation_url: Option<String>,
    metadata_image: Option<String>,
    metadata_content_type: Option<String>,
    collection: Option<Rmrk1Collection>,
}

#[derive(Debug, Deserialize)]
struct Rmrk1Collection {
    id: Option<String>,
    name: Option<String>,
    max: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Rmrk2Nft {
    id: String,
    sn: Option<String>,
    metadata: Option<String>,
    metadata_name: Option<String>,
    metadata_image: Option<String>,
    metadata_description: Option<String>,
    metadata_properties: Option<Value>,
    children: Option<Vec<Rmrk2Child>>,
    resources: Option<Vec<Rmrk2Resource>>,
    collection: Option<Rmrk2Collection>,
}

#[derive(Debug, Deserialize)]
struct Rmrk2Child {
    id: String,
    metadata_name: Option<String>,
    metadata_image: Option<String>,
    sn: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Rmrk2Resource {
    metadata_content_type: Option<String>,
    thumb: Option<String>,
    src: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Rmrk2Collection {
    id: Option<String>,
    metadata_name: Option<String>,
    max: Option<u64>,
}

/// Adapter for an RMRK GraphQL indexer
#[derive(Debug)]
pub struct RmrkSource {
    version: RmrkVersion,
    config: GraphQlSourceConfig,
    client: Client,
    gateway: IpfsGateway,
    tracker: FetchTracker,
}

impl RmrkSource {
    /// Create an adapter for the indexer in `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(
        version: RmrkVersion,
        config: GraphQlSourceConfig,
        gateway: IpfsGateway,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent("nft-api/0.1.0")
            .build()
            .map_err(|e| SourceError::Configuration {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            version,
            config,
            client,
            gateway,
            tracker: FetchTracker::new(),
        })
    }

    /// Indexer version
    pub fn version(&self) -> RmrkVersion {
        self.version
    }

    /// In-flight query counter
    pub fn tracker(&self) -> &FetchTracker {
        &self.tracker
    }

    async fn query_rows(&self, owner: &str) -> Result<Vec<Value>, SourceError> {
        let request = GraphQlRequest {
            query: self.version.query(),
            variables: json!({ "address": owner }),
        };

        debug!(source = %self.version, endpoint = %self.config.endpoint, owner, "querying indexer");

        let response = timeout(
            self.config.timeout(),
            self.client
                .post(&self.config.endpoint)
                .header("accept", "application/json")
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| SourceError::Timeout {
            timeout_seconds: self.config.timeout_seconds,
        })?
        .map_err(|e| SourceError::Http {
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                message: format!("indexer returned status {}", status.as_u16()),
            });
        }

        let body: GraphQlResponse = response.json().await.map_err(|e| {
            SourceError::InvalidResponse {
                message: e.to_string(),
            }
        })?;

        match (body.data, body.errors) {
            (Some(NftsData { nfts: Some(rows) }), _) => Ok(rows),
            (_, Some(errors)) if !errors.is_empty() => Err(SourceError::InvalidResponse {
                message: errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; "),
            }),
            _ => Err(SourceError::InvalidResponse {
                message: "response carries no nfts".to_string(),
            }),
        }
    }

    fn map_row(&self, row: Value, owner_address: &str) -> Result<NftItem, SourceError> {
        let decode_error = |e: serde_json::Error| SourceError::InvalidResponse {
            message: e.to_string(),
        };

        let item = match self.version {
            RmrkVersion::V1 => {
                self.map_rmrk1(serde_json::from_value(row).map_err(decode_error)?, owner_address)?
            }
            RmrkVersion::V2 => {
                self.map_rmrk2(serde_json::from_value(row).map_err(decode_error)?, owner_address)?
            }
        };

        item.validate().map_err(|e| SourceError::InvalidResponse {
            message: e.to_string(),
        })?;
        Ok(item)
    }

    fn base_item(&self, id: String, owner_address: &str) -> NftItem {
        let mut item = NftItem::new(
            id,
            self.version.source_name(),
            self.config.token_symbol.as_str(),
            owner_address,
        );
        item.platform_uri = Some(self.config.explorer_url.clone());
        item
    }

    fn map_rmrk1(&self, nft: Rmrk1Nft, owner_address: &str) -> Result<NftItem, SourceError> {
        let image = nft.metadata_image.as_deref();
        let animation = nft.metadata_animation_url.as_deref();

        let mut item = self.base_item(nft.id, owner_address);
        if let Some(name) = nft.metadata_name {
            item.name = name;
        }
        item.description = nft.metadata_description;
        item.serial_number = nft.sn.as_deref().map(SerialNumber::trimmed);
        item.thumbnail_uri = self.gateway.resolve(image.or(animation))?;
        item.media_uri = self.gateway.resolve(animation.or(image))?;
        item.media_type = MediaType::from_content_type(nft.metadata_content_type.as_deref());
        item.metadata_uri = self.gateway.resolve(nft.metadata.as_deref())?;
        if let Some(collection) = nft.collection {
            item.collection = NftCollection {
                id: collection.id,
                name: collection.name,
                total_supply: collection.max,
            };
        }
        Ok(item)
    }

    fn map_rmrk2(&self, nft: Rmrk2Nft, owner_address: &str) -> Result<NftItem, SourceError> {
        let resource = nft.resources.as_deref().and_then(<[_]>::first);
        let source_media = resource
            .and_then(|r| r.src.as_deref())
            .filter(|src| !src.trim().is_empty())
            .or(nft.metadata_image.as_deref());

        let media_uri = self.gateway.resolve(source_media)?;
        let thumbnail_uri = self.gateway.resolve(resource.and_then(|r| r.thumb.as_deref()))?;
        let media_type = match resource.and_then(|r| r.metadata_content_type.as_deref()) {
            Some(content_type) => MediaType::from_content_type(Some(content_type)),
            None => MediaType::from_extension(media_uri.as_deref()),
        };

        let children: Vec<NftChild> = nft
            .children
            .unwrap_or_default()
            .into_iter()
            .map(|child| NftChild {
                thumbnail_uri: self
                    .gateway
                    .resolve(child.metadata_image.as_deref())
                    .ok()
                    .flatten(),
                id: child.id,
                name: child.metadata_name,
                serial_number: child.sn.map(SerialNumber::Text),
            })
            .collect();

        let mut item = self.base_item(nft.id, owner_address);
        if let Some(name) = nft.metadata_name {
            item.name = name;
        }
        item.description = nft.metadata_description;
        item.serial_number = nft.sn.map(SerialNumber::Text);
        item.attributes = Attributes::from_json(nft.metadata_properties.as_ref());
        item.thumbnail_uri = thumbnail_uri;
        item.media_uri = media_uri;
        item.media_type = media_type;
        item.metadata_uri = self.gateway.resolve(nft.metadata.as_deref())?;
        if let Some(collection) = nft.collection {
            item.collection = NftCollection {
                id: collection.id,
                name: collection.metadata_name,
                total_supply: collection.max,
            };
        }
        if !children.is_empty() {
            item.source_data = Some(SourceSpecificData::Children(children));
        }
        Ok(item)
    }
}

#[async_trait]
impl NftSource for RmrkSource {
    fn name(&self) -> &str {
        self.version.source_name()
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
        let owner =
            to_ss58(address, self.config.ss58_prefix).map_err(|e| SourceError::InvalidAddress {
                address: address.to_string(),
                message: e.to_string(),
            })?;

        let _guard = self.tracker.begin();
        let rows = self.query_rows(&owner).await?;

        let mut contribution = SourceContribution::empty();
        for (index, row) in rows.into_iter().enumerate() {
            let key = row
                .get("id")
                .and_then(Value::as_str)
                .map_or_else(|| format!("row {index}"), ToString::to_string);

            match self.map_row(row, address) {
                Ok(item) => contribution.push(item),
                Err(error) => contribution.skip(key, error),
            }
        }

        info!(
            source = %self.version,
            items = contribution.count(),
            skipped = contribution.skipped().len(),
            "indexer queried"
        );
        Ok(Some(contribution))
    }
}
