// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! ERC-721 Enumerable calls made by the EVM adapter

#![allow(missing_docs)]

use alloy_sol_types::{SolCall, sol};
use api_client::SourceError;
use thiserror::Error;

pub use self::IERC721Enumerable::{
    balanceOfCall, tokenOfOwnerByIndexCall, tokenURICall, totalSupplyCall,
};

sol! {
    /// Read-only ERC-721 Enumerable surface
    interface IERC721Enumerable {
        function balanceOf(address owner) external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256);
        function tokenURI(uint256 tokenId) external view returns (string);
    }
}

/// Errors raised while decoding return data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    /// Return data is not hex
    #[error("return data is not hex: {0}")]
    Hex(String),

    /// Return data does not match the call's output types
    #[error("undecodable return data for {signature}: {message}")]
    Decode {
        /// Called function
        signature: &'static str,
        /// Decoder message
        message: String,
    },
}

impl From<AbiError> for SourceError {
    fn from(value: AbiError) -> Self {
        SourceError::InvalidResponse {
            message: value.to_string(),
        }
    }
}

/// Encode call data as a `0x`-prefixed hex string
pub fn encode_call<C: SolCall>(call: &C) -> String {
    format!("0x{}", hex::encode(call.abi_encode()))
}

/// Decode the hex return data of `C`
pub fn decode_return<C: SolCall>(data: &str) -> Result<C::Return, AbiError> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    let bytes = hex::decode(digits).map_err(|e| AbiError::Hex(e.to_string()))?;
    C::abi_decode_returns(&bytes).map_err(|e| AbiError::Decode {
        signature: C::SIGNATURE,
        message: e.to_string(),
    })
}
