// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Call-scoped adapter results

use serde::{Deserialize, Serialize};
use shared_types::NftItem;

/// Items one adapter produced for one query
///
/// `count` is derived from the items and cannot drift from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceContribution {
    items: Vec<NftItem>,
    skipped: Vec<SkippedItem>,
}

/// An item the adapter had to drop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    /// Source-native key of the dropped item (token id, storage key, row id)
    pub key: String,
    /// Why it was dropped
    pub reason: String,
}

impl SourceContribution {
    /// Create a contribution from a list of items
    pub fn new(items: Vec<NftItem>) -> Self {
        Self {
            items,
            skipped: Vec::new(),
        }
    }

    /// Contribution with nothing in it
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append an item
    pub fn push(&mut self, item: NftItem) {
        self.items.push(item);
    }

    /// Record an item that was dropped
    pub fn skip(&mut self, key: impl Into<String>, reason: impl ToString) {
        self.skipped.push(SkippedItem {
            key: key.into(),
            reason: reason.to_string(),
        });
    }

    /// Items in the order they were produced
    pub fn items(&self) -> &[NftItem] {
        &self.items
    }

    /// Number of items
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Whether no items were produced
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items that were dropped
    pub fn skipped(&self) -> &[SkippedItem] {
        &self.skipped
    }

    /// Split into items and dropped items
    pub fn into_parts(self) -> (Vec<NftItem>, Vec<SkippedItem>) {
        (self.items, self.skipped)
    }
}

impl FromIterator<NftItem> for SourceContribution {
    fn from_iter<T: IntoIterator<Item = NftItem>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_follows_items() {
        let mut contribution = SourceContribution::empty();
        assert!(contribution.is_empty());
        assert_eq!(contribution.count(), 0);

        contribution.push(NftItem::new("1-a", "src", "KSM", "addr"));
        contribution.push(NftItem::new("2-a", "src", "KSM", "addr"));
        contribution.skip("3", "metadata fetch failed");

        assert_eq!(contribution.count(), 2);
        assert_eq!(contribution.skipped().len(), 1);
        assert_eq!(contribution.skipped()[0].key, "3");

        let (items, skipped) = contribution.into_parts();
        assert_eq!(items.len(), 2);
        assert_eq!(skipped[0].reason, "metadata fetch failed");
    }

    #[test]
    fn collect_into_contribution() {
        let contribution: SourceContribution = (0..3)
            .map(|i| NftItem::new(format!("{i}-a"), "src", "KSM", "addr"))
            .collect();
        assert_eq!(contribution.count(), 3);
        assert!(contribution.skipped().is_empty());
    }
}
