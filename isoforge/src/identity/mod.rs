//! Identity resolution: identity handle -> trusted public keys.
//!
//! - `IdentityReference` - validated account handle
//! - `KeySource` - capability that fetches the raw key listing
//! - `HttpKeySource` - `<endpoint>/<handle>.keys` over HTTPS
//! - `IdentityResolver` - turns a listing into a validated, non-empty `KeySet`

mod http;
mod key;

pub use http::HttpKeySource;
pub use key::{KNOWN_ALGORITHMS, KeyError, PublicKey};

use async_trait::async_trait;
use isoforge_shared::constants::identity::MAX_HANDLE_LEN;
use isoforge_shared::{ForgeError, ForgeResult};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// IDENTITY REFERENCE
// ============================================================================

/// External account handle whose keys are trusted on the installed host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityReference(String);

impl IdentityReference {
    /// Validate a handle so it is safe to use as a URL path segment.
    pub fn new(handle: impl Into<String>) -> ForgeResult<Self> {
        let handle = handle.into();

        if handle.is_empty() || handle.len() > MAX_HANDLE_LEN {
            return Err(ForgeError::InvalidInput(format!(
                "identity '{}' must be 1-{} characters long",
                handle, MAX_HANDLE_LEN
            )));
        }
        if handle.starts_with(['-', '.']) {
            return Err(ForgeError::InvalidInput(format!(
                "identity '{}' must not start with '-' or '.'",
                handle
            )));
        }
        if let Some(bad) = handle
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(ForgeError::InvalidInput(format!(
                "identity '{}' contains invalid character {:?}",
                handle, bad
            )));
        }

        Ok(Self(handle))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// KEY SET
// ============================================================================

/// Ordered, non-empty list of public keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySet {
    keys: Vec<PublicKey>,
}

impl KeySet {
    /// Returns `None` for an empty list.
    pub fn new(keys: Vec<PublicKey>) -> Option<Self> {
        (!keys.is_empty()).then_some(Self { keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PublicKey> {
        self.keys.iter()
    }

    pub fn fingerprints(&self) -> Vec<String> {
        self.keys.iter().map(PublicKey::fingerprint).collect()
    }
}

impl<'a> IntoIterator for &'a KeySet {
    type Item = &'a PublicKey;
    type IntoIter = std::slice::Iter<'a, PublicKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter()
    }
}

// ============================================================================
// KEY SOURCE
// ============================================================================

/// Fetches the raw, newline-separated key listing for an identity.
///
/// Implementations map "identity does not exist" to
/// `ForgeError::IdentityNotFound` and transport problems to
/// `ForgeError::Network`. Parsing is left to [`IdentityResolver`].
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch_listing(&self, identity: &IdentityReference) -> ForgeResult<String>;

    /// Human-readable location, for logging.
    fn describe(&self) -> String;
}

pub type SharedKeySource = Arc<dyn KeySource>;

// ============================================================================
// RESOLVER
// ============================================================================

/// Resolves an identity into a validated `KeySet`. Never retries.
#[derive(Clone)]
pub struct IdentityResolver {
    source: SharedKeySource,
}

impl IdentityResolver {
    pub fn new(source: SharedKeySource) -> Self {
        Self { source }
    }

    pub async fn resolve(&self, identity: &IdentityReference) -> ForgeResult<KeySet> {
        tracing::info!(
            identity = %identity,
            source = %self.source.describe(),
            "Fetching public keys"
        );

        let listing = self.source.fetch_listing(identity).await?;
        let keys = parse_listing(identity, &listing)?;

        tracing::info!(identity = %identity, count = keys.len(), "Resolved public keys");
        for key in &keys {
            tracing::debug!(
                fingerprint = %key.fingerprint(),
                algorithm = key.algorithm(),
                comment = key.comment().unwrap_or(""),
                "Trusted key"
            );
        }

        Ok(keys)
    }
}

/// Parse a key listing: one key per line, blank lines ignored, every other
/// line must be a valid key.
pub fn parse_listing(identity: &IdentityReference, listing: &str) -> ForgeResult<KeySet> {
    let keys = listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            PublicKey::parse(line).map_err(|e| ForgeError::InvalidKey {
                identity: identity.to_string(),
                index,
                reason: e.to_string(),
            })
        })
        .collect::<ForgeResult<Vec<_>>>()?;

    KeySet::new(keys).ok_or_else(|| ForgeError::NoKeysConfigured {
        identity: identity.to_string(),
    })
}
