// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Canonical NFT item model
//!
//! Every source adapter maps its native payload into [`NftItem`]. Sources disagree
//! on which fields they expose, so most fields are optional and a few are loosely
//! typed ([`SerialNumber`], [`Attributes`]).

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"];
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".mov"];

/// Normalized NFT record produced by every source adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NftItem {
    /// Identifier, unique within the producing source
    pub id: String,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Serial or edition number
    pub serial_number: Option<SerialNumber>,
    /// Source-defined traits
    pub attributes: Attributes,
    /// Link to a human-facing explorer page
    pub platform_uri: Option<String>,
    /// Native currency symbol of the source chain
    pub token_symbol: String,
    /// Resolved thumbnail location
    pub thumbnail_uri: Option<String>,
    /// Resolved media location
    pub media_uri: Option<String>,
    /// Kind of media behind `media_uri`
    pub media_type: MediaType,
    /// Raw pointer to the off-chain metadata document
    pub metadata_uri: Option<String>,
    /// Name of the adapter that produced the item
    pub source_name: String,
    /// Collection the item belongs to
    pub collection: NftCollection,
    /// The queried address, copied verbatim
    pub owner_address: String,
    /// Payload that only some sources can provide
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_data: Option<SourceSpecificData>,
}

/// Reasons an item is rejected before it reaches the aggregate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemValidationError {
    /// The item has no identifier
    #[error("item id is empty")]
    EmptyId,
    /// The item does not name the source that produced it
    #[error("item {id} has no source name")]
    EmptySourceName {
        /// Offending item id
        id: String,
    },
    /// The item does not carry the queried address
    #[error("item {id} has no owner address")]
    EmptyOwner {
        /// Offending item id
        id: String,
    },
}

impl NftItem {
    /// Create an item with the mandatory fields set and everything else empty
    pub fn new(
        id: impl Into<String>,
        source_name: impl Into<String>,
        token_symbol: impl Into<String>,
        owner_address: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: None,
            serial_number: None,
            attributes: Attributes::default(),
            platform_uri: None,
            token_symbol: token_symbol.into(),
            thumbnail_uri: None,
            media_uri: None,
            media_type: MediaType::Unknown,
            metadata_uri: None,
            source_name: source_name.into(),
            collection: NftCollection::default(),
            owner_address: owner_address.into(),
            source_data: None,
        }
    }

    /// Check the invariants every emitted item must satisfy
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.id.trim().is_empty() {
            return Err(ItemValidationError::EmptyId);
        }
        if self.source_name.trim().is_empty() {
            return Err(ItemValidationError::EmptySourceName {
                id: self.id.clone(),
            });
        }
        if self.owner_address.trim().is_empty() {
            return Err(ItemValidationError::EmptyOwner {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Child items, when the source supports composition
    pub fn children(&self) -> &[NftChild] {
        match &self.source_data {
            Some(SourceSpecificData::Children(children)) => children,
            None => &[],
        }
    }
}

/// Serial number as reported by the source
///
/// Some sources report numbers, others strings (sometimes zero-padded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum SerialNumber {
    /// Numeric serial
    Number(u64),
    /// Textual serial
    Text(String),
}

impl SerialNumber {
    /// Build a serial from text, dropping leading zeros (`"0003"` becomes `"3"`)
    pub fn trimmed(raw: &str) -> Self {
        let trimmed = raw.trim().trim_start_matches('0');
        if trimmed.is_empty() && !raw.trim().is_empty() {
            Self::Text("0".to_string())
        } else {
            Self::Text(trimmed.to_string())
        }
    }

    /// Interpret a JSON scalar as a serial, if it is one
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_u64().map(Self::Number),
            Value::String(text) if !text.trim().is_empty() => Some(Self::Text(text.clone())),
            _ => None,
        }
    }
}

impl From<u64> for SerialNumber {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Open key/value map of item traits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    /// Build attributes from whatever shape the source returned
    ///
    /// Objects are kept as-is. Arrays of `{ "trait_type": .., "value": .. }` entries are
    /// keyed by trait type. Anything else yields an empty map.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(map)) => Self(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            Some(Value::Array(entries)) => Self(
                entries
                    .iter()
                    .filter_map(|entry| {
                        let key = entry.get("trait_type")?.as_str()?;
                        let value = entry.get("value").cloned().unwrap_or(Value::Null);
                        Some((key.to_string(), value))
                    })
                    .collect(),
            ),
            _ => Self::default(),
        }
    }

    /// Insert or replace a trait
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Look up a trait
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of traits
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no traits
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Kind of media an item points to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Still image
    Image,
    /// Video
    Video,
    /// Anything else, or undetermined
    #[default]
    Unknown,
}

impl MediaType {
    /// Classify a media pointer by its file extension
    pub fn from_extension(uri: Option<&str>) -> Self {
        let Some(uri) = uri else {
            return Self::Unknown;
        };
        let path = uri
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        if IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            Self::Image
        } else if VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            Self::Video
        } else {
            Self::Unknown
        }
    }

    /// Classify a declared content type such as `image/png`
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let major = content_type
            .and_then(|ct| ct.split('/').next())
            .map(|major| major.trim().to_ascii_lowercase());

        match major.as_deref() {
            Some("image") => Self::Image,
            Some("video") => Self::Video,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Collection details; sources expose different subsets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NftCollection {
    /// Collection identifier or contract address
    pub id: Option<String>,
    /// Collection display name
    pub name: Option<String>,
    /// Maximum or current supply
    pub total_supply: Option<u64>,
}

/// Source-specific payload attached to an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SourceSpecificData {
    /// Nested items owned by this item
    Children(Vec<NftChild>),
}

/// A nested item owned by another item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NftChild {
    /// Child identifier
    pub id: String,
    /// Child display name
    pub name: Option<String>,
    /// Child serial number
    pub serial_number: Option<SerialNumber>,
    /// Child thumbnail location
    pub thumbnail_uri: Option<String>,
}
