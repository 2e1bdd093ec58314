// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Address classification
//!
//! The classifier is an ordered list of `(family, predicate)` rules. Every rule is
//! checked independently, so an address may belong to more than one family. Supporting
//! a new family means appending a rule; existing predicates are never touched.

use std::collections::BTreeSet;

use shared_types::SourceFamily;
use thiserror::Error;

use crate::address::{is_account_model_address, is_substrate_address};

/// Predicate deciding whether an address belongs to a family
pub type AddressPredicate = fn(&str) -> bool;

/// Reasons an address cannot be dispatched to any source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// Nothing was supplied
    #[error("No Address Provided")]
    Empty,

    /// No family recognizes the address
    #[error("Address is not a valid Substrate or Ethereum Address")]
    NoApplicableSource,

    /// The address is recognized but no enabled source serves its family
    #[error("No Source Available For This Address")]
    NoRegisteredSource,
}

/// Maps an address to the source families that can plausibly answer for it
#[derive(Debug, Clone)]
pub struct AddressClassifier {
    rules: Vec<(SourceFamily, AddressPredicate)>,
}

impl Default for AddressClassifier {
    fn default() -> Self {
        Self::empty()
            .with_rule(SourceFamily::Substrate, is_substrate_address)
            .with_rule(SourceFamily::AccountModel, is_account_model_address)
    }
}

impl AddressClassifier {
    /// Classifier without any rules
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule
    #[must_use]
    pub fn with_rule(mut self, family: SourceFamily, predicate: AddressPredicate) -> Self {
        self.rules.push((family, predicate));
        self
    }

    /// Families whose predicate accepts `address`
    pub fn classify(&self, address: &str) -> Result<BTreeSet<SourceFamily>, ClassifyError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ClassifyError::Empty);
        }

        let families: BTreeSet<_> = self
            .rules
            .iter()
            .filter(|(_, predicate)| predicate(address))
            .map(|(family, _)| *family)
            .collect();

        if families.is_empty() {
            Err(ClassifyError::NoApplicableSource)
        } else {
            Ok(families)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substrate_addresses() {
        let classifier = AddressClassifier::default();
        let families = classifier
            .classify("HNZata7iMYWmk5RvZRTiAsSDhV8366zq2YGb3tLH5Upf74F")
            .unwrap();
        assert_eq!(families, BTreeSet::from([SourceFamily::Substrate]));
    }

    #[test]
    fn account_model_addresses() {
        let classifier = AddressClassifier::default();
        let families = classifier
            .classify("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed")
            .unwrap();
        assert_eq!(families, BTreeSet::from([SourceFamily::AccountModel]));
    }

    #[test]
    fn empty_and_unknown_addresses() {
        let classifier = AddressClassifier::default();
        assert_eq!(classifier.classify(""), Err(ClassifyError::Empty));
        assert_eq!(classifier.classify("   "), Err(ClassifyError::Empty));
        assert_eq!(
            classifier.classify("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"),
            Err(ClassifyError::NoApplicableSource)
        );
    }

    #[test]
    fn rules_are_independent() {
        let classifier = AddressClassifier::empty()
            .with_rule(SourceFamily::AccountModel, |a| a.starts_with('x'))
            .with_rule(SourceFamily::Substrate, |a| a.ends_with('y'));

        assert_eq!(
            classifier.classify("xy").unwrap(),
            BTreeSet::from([SourceFamily::AccountModel, SourceFamily::Substrate])
        );
        assert_eq!(
            classifier.classify("xa").unwrap(),
            BTreeSet::from([SourceFamily::AccountModel])
        );
    }

    #[test]
    fn error_messages() {
        assert_eq!(ClassifyError::Empty.to_string(), "No Address Provided");
        assert_eq!(
            ClassifyError::NoApplicableSource.to_string(),
            "Address is not a valid Substrate or Ethereum Address"
        );
        assert_eq!(
            ClassifyError::NoRegisteredSource.to_string(),
            "No Source Available For This Address"
        );
    }
}
