// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Address families

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Family of data sources an address can plausibly be looked up in
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceFamily {
    /// Balance/contract-call style chains (20-byte hex addresses)
    AccountModel,
    /// Indexed-query and chain-state style chains (SS58 or 32-byte public keys)
    Substrate,
}

impl SourceFamily {
    /// Returns every known family
    pub const fn all() -> &'static [Self] {
        &[Self::AccountModel, Self::Substrate]
    }

    /// Returns the human-readable name of the family
    pub const fn name(self) -> &'static str {
        match self {
            Self::AccountModel => "account-model",
            Self::Substrate => "substrate",
        }
    }
}

impl fmt::Display for SourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
