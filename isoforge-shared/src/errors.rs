//! Stage-attributed error taxonomy.
//!
//! Every failure names the pipeline stage it came from so that the CLI can
//! report it and pick a distinct exit code:
//! - identity: [`ForgeError::IdentityNotFound`], [`ForgeError::NoKeysConfigured`],
//!   [`ForgeError::InvalidKey`], [`ForgeError::Network`] (the only transient class)
//! - render: [`ForgeError::TemplateRender`]
//! - transpile: [`ForgeError::Transpile`]
//! - validate: [`ForgeError::Validation`]
//! - compose: [`ForgeError::Composition`]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

// ============================================================================
// Stages
// ============================================================================

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ResolveIdentity,
    Render,
    Transpile,
    Validate,
    Compose,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 5] = [
        Stage::ResolveIdentity,
        Stage::Render,
        Stage::Transpile,
        Stage::Validate,
        Stage::Compose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ResolveIdentity => "identity",
            Stage::Render => "render",
            Stage::Transpile => "transpile",
            Stage::Validate => "validate",
            Stage::Compose => "compose",
        }
    }

    /// Position in the pipeline, starting at 0.
    pub fn index(&self) -> usize {
        match self {
            Stage::ResolveIdentity => 0,
            Stage::Render => 1,
            Stage::Transpile => 2,
            Stage::Validate => 3,
            Stage::Compose => 4,
        }
    }

    /// The stage that follows this one, if any.
    pub fn next(&self) -> Option<Stage> {
        Stage::ALL.get(self.index() + 1).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Exit codes
// ============================================================================

/// Process exit codes, distinct per failing stage.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    /// Failure outside the stage taxonomy.
    pub const FAILURE: i32 = 1;
    pub const INVALID_INPUT: i32 = 2;
    pub const IDENTITY_NOT_FOUND: i32 = 10;
    pub const NO_KEYS: i32 = 11;
    pub const INVALID_KEY: i32 = 12;
    pub const NETWORK: i32 = 13;
    pub const TEMPLATE: i32 = 20;
    pub const TRANSPILE: i32 = 30;
    pub const VALIDATION: i32 = 40;
    pub const COMPOSITION: i32 = 50;
    pub const MANIFESTS: i32 = 60;
    pub const IO: i32 = 70;
    pub const CANCELLED: i32 = 130;
}

// ============================================================================
// Error
// ============================================================================

/// Errors produced by the provisioning pipeline and its tooling.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// The key endpoint reports that the identity does not exist.
    #[error("identity: '{identity}' does not exist ({url} returned 404)")]
    IdentityNotFound { identity: String, url: String },

    /// The identity exists but lists no keys.
    #[error("identity: '{identity}' has no public keys configured")]
    NoKeysConfigured { identity: String },

    /// A listed line is not a syntactically valid public key.
    #[error("identity: key #{index} listed for '{identity}' is not a valid public key: {reason}")]
    InvalidKey {
        identity: String,
        index: usize,
        reason: String,
    },

    /// Transport failure or unexpected response from the key endpoint.
    #[error("identity: request to {url} failed: {reason}")]
    Network {
        url: String,
        reason: String,
        transient: bool,
    },

    /// Template could not be loaded, parsed or rendered.
    #[error("render: template '{template}': {reason}")]
    TemplateRender { template: String, reason: String },

    /// The transpiler rejected the rendered config. `diagnostic` is the tool's
    /// own output, unmodified.
    #[error("transpile: {tool} rejected the rendered config:\n{diagnostic}")]
    Transpile { tool: String, diagnostic: String },

    /// The transpiled config failed schema validation.
    #[error(
        "validate: transpiled config is INVALID; an image built from it would fail its \
         unattended first boot, so no image was built:\n{diagnostic}"
    )]
    Validation { diagnostic: String },

    /// Base image selection, embedding or artifact placement failed.
    #[error("compose: {0}")]
    Composition(String),

    /// Operator-supplied argument rejected before the pipeline started.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Options could not be loaded or are inconsistent.
    #[error("config: {0}")]
    Config(String),

    /// Manifest bundling failed.
    #[error("manifests: {0}")]
    Manifests(String),

    /// Local filesystem failure outside any tool.
    #[error("io: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Broken internal invariant, such as an out-of-order stage transition.
    #[error("internal error: {0}")]
    Internal(String),

    /// Interrupted before the artifact was written.
    #[error("cancelled before the artifact was written")]
    Cancelled,
}

/// Result alias used across isoforge.
pub type ForgeResult<T> = Result<T, ForgeError>;

impl ForgeError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Pipeline stage this error belongs to, if it is a stage error.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ForgeError::IdentityNotFound { .. }
            | ForgeError::NoKeysConfigured { .. }
            | ForgeError::InvalidKey { .. }
            | ForgeError::Network { .. } => Some(Stage::ResolveIdentity),
            ForgeError::TemplateRender { .. } => Some(Stage::Render),
            ForgeError::Transpile { .. } => Some(Stage::Transpile),
            ForgeError::Validation { .. } => Some(Stage::Validate),
            ForgeError::Composition(_) => Some(Stage::Compose),
            ForgeError::InvalidInput(_)
            | ForgeError::Config(_)
            | ForgeError::Manifests(_)
            | ForgeError::Io { .. }
            | ForgeError::Internal(_)
            | ForgeError::Cancelled => None,
        }
    }

    /// Whether re-running the same invocation might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ForgeError::Network {
                transient: true,
                ..
            }
        )
    }

    /// Exit code reported by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            ForgeError::IdentityNotFound { .. } => exit_codes::IDENTITY_NOT_FOUND,
            ForgeError::NoKeysConfigured { .. } => exit_codes::NO_KEYS,
            ForgeError::InvalidKey { .. } => exit_codes::INVALID_KEY,
            ForgeError::Network { .. } => exit_codes::NETWORK,
            ForgeError::TemplateRender { .. } => exit_codes::TEMPLATE,
            ForgeError::Transpile { .. } => exit_codes::TRANSPILE,
            ForgeError::Validation { .. } => exit_codes::VALIDATION,
            ForgeError::Composition(_) => exit_codes::COMPOSITION,
            ForgeError::InvalidInput(_) | ForgeError::Config(_) => exit_codes::INVALID_INPUT,
            ForgeError::Manifests(_) => exit_codes::MANIFESTS,
            ForgeError::Io { .. } | ForgeError::Internal(_) => exit_codes::IO,
            ForgeError::Cancelled => exit_codes::CANCELLED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::ResolveIdentity.next(), Some(Stage::Render));
        assert_eq!(Stage::Validate.next(), Some(Stage::Compose));
        assert_eq!(Stage::Compose.next(), None);

        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn test_stage_attribution() {
        let err = ForgeError::NoKeysConfigured {
            identity: "alice".into(),
        };
        assert_eq!(err.stage(), Some(Stage::ResolveIdentity));

        let err = ForgeError::Validation {
            diagnostic: "bad".into(),
        };
        assert_eq!(err.stage(), Some(Stage::Validate));

        assert_eq!(ForgeError::Cancelled.stage(), None);
    }

    #[test]
    fn test_exit_codes_distinct_per_stage() {
        let errors = [
            ForgeError::IdentityNotFound {
                identity: "a".into(),
                url: "u".into(),
            },
            ForgeError::NoKeysConfigured {
                identity: "a".into(),
            },
            ForgeError::Network {
                url: "u".into(),
                reason: "r".into(),
                transient: true,
            },
            ForgeError::TemplateRender {
                template: "t".into(),
                reason: "r".into(),
            },
            ForgeError::Transpile {
                tool: "butane".into(),
                diagnostic: "d".into(),
            },
            ForgeError::Validation {
                diagnostic: "d".into(),
            },
            ForgeError::Composition("c".into()),
        ];

        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&exit_codes::SUCCESS));
    }

    #[test]
    fn test_transient_only_for_network() {
        let transient = ForgeError::Network {
            url: "u".into(),
            reason: "timed out".into(),
            transient: true,
        };
        assert!(transient.is_transient());

        let permanent = ForgeError::Network {
            url: "u".into(),
            reason: "HTTP 403".into(),
            transient: false,
        };
        assert!(!permanent.is_transient());

        let not_found = ForgeError::IdentityNotFound {
            identity: "a".into(),
            url: "u".into(),
        };
        assert!(!not_found.is_transient());
    }

    #[test]
    fn test_validation_message_is_emphatic() {
        let err = ForgeError::Validation {
            diagnostic: "error at $.storage.files.0: missing path".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("validate:"));
        assert!(msg.contains("INVALID"));
        assert!(msg.contains("unattended first boot"));
        assert!(msg.contains("missing path"));
    }
}
