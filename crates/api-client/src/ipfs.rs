// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! IPFS pointer normalization
//!
//! Sources hand out media and metadata pointers as `ipfs://<cid>`, `ipfs://ipfs/<cid>`
//! or plain URLs. Everything emitted on a canonical item goes through
//! [`IpfsGateway::resolve`] first.

use url::Url;

use crate::SourceError;

const IPFS_PATH_SCHEME: &str = "ipfs://ipfs/";
const IPFS_SCHEME: &str = "ipfs://";

/// Gateway used to turn `ipfs://` pointers into fetchable URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpfsGateway {
    base: String,
}

impl Default for IpfsGateway {
    fn default() -> Self {
        Self {
            base: Self::DEFAULT_BASE.to_string(),
        }
    }
}

impl IpfsGateway {
    /// Gateway used when none is configured
    pub const DEFAULT_BASE: &'static str = "https://talisman.mypinata.cloud/ipfs/";

    /// Create a gateway from its base URL
    ///
    /// A trailing `/` is added when missing.
    pub fn new(base: impl Into<String>) -> Result<Self, SourceError> {
        let mut base = base.into();
        Url::parse(&base).map_err(|e| SourceError::Configuration {
            message: format!("invalid IPFS gateway {base}: {e}"),
        })?;
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self { base })
    }

    /// Base URL, always ending in `/`
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Normalize a media or metadata pointer
    ///
    /// # Returns
    ///
    /// * `Ok(None)` for a missing or blank pointer
    /// * `Ok(Some(url))` for an `ipfs://` pointer rewritten onto the gateway, or an
    ///   already resolvable URL returned unchanged
    /// * `Err(SourceError::MalformedMediaUri)` for anything else
    pub fn resolve(&self, pointer: Option<&str>) -> Result<Option<String>, SourceError> {
        let Some(pointer) = pointer.map(str::trim).filter(|p| !p.is_empty()) else {
            return Ok(None);
        };

        let path = pointer
            .strip_prefix(IPFS_PATH_SCHEME)
            .or_else(|| pointer.strip_prefix(IPFS_SCHEME));

        match path {
            Some(path) if path.is_empty() => Err(malformed(pointer)),
            Some(path) => Ok(Some(format!("{}{path}", self.base))),
            None if Url::parse(pointer).is_ok() => Ok(Some(pointer.to_string())),
            None => Err(malformed(pointer)),
        }
    }
}

fn malformed(pointer: &str) -> SourceError {
    SourceError::MalformedMediaUri {
        uri: pointer.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CID: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi/1.png";

    #[test]
    fn both_ipfs_schemes_resolve_to_gateway() {
        let gateway = IpfsGateway::default();
        let expected = format!("{}{CID}", IpfsGateway::DEFAULT_BASE);

        assert_eq!(
            gateway.resolve(Some(&format!("ipfs://ipfs/{CID}"))).unwrap(),
            Some(expected.clone())
        );
        assert_eq!(
            gateway.resolve(Some(&format!("ipfs://{CID}"))).unwrap(),
            Some(expected)
        );
    }

    #[test]
    fn http_urls_pass_through() {
        let gateway = IpfsGateway::default();
        let url = "https://example.com/media/1.mp4";
        assert_eq!(gateway.resolve(Some(url)).unwrap(), Some(url.to_string()));
    }

    #[test]
    fn missing_pointer_stays_missing() {
        let gateway = IpfsGateway::default();
        assert_eq!(gateway.resolve(None).unwrap(), None);
        assert_eq!(gateway.resolve(Some("  ")).unwrap(), None);
    }

    #[test]
    fn malformed_pointers_are_rejected() {
        let gateway = IpfsGateway::default();
        assert!(matches!(
            gateway.resolve(Some("ipfs://")),
            Err(SourceError::MalformedMediaUri { .. })
        ));
        assert!(matches!(
            gateway.resolve(Some("not a pointer")),
            Err(SourceError::MalformedMediaUri { .. })
        ));
    }

    #[test]
    fn custom_gateway_gets_trailing_slash() {
        let gateway = IpfsGateway::new("https://ipfs.io/ipfs").unwrap();
        assert_eq!(gateway.base(), "https://ipfs.io/ipfs/");
        assert_eq!(
            gateway.resolve(Some("ipfs://abc")).unwrap(),
            Some("https://ipfs.io/ipfs/abc".to_string())
        );

        assert!(matches!(
            IpfsGateway::new("not a url"),
            Err(SourceError::Configuration { .. })
        ));
    }
}
