// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Shared types for the NFT aggregation service
//!
//! This crate provides the normalized NFT record every source adapter produces,
//! the snapshot streamed to callers while a query is running, and the address
//! families used to route a query to the right adapters.

pub mod family;
pub mod nft;
pub mod snapshot;

pub use family::SourceFamily;
pub use nft::{
    Attributes, ItemValidationError, MediaType, NftChild, NftCollection, NftItem, SerialNumber,
    SourceSpecificData,
};
pub use snapshot::{NftSnapshot, SourceOutcome, SourceReport};
