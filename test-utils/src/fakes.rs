//! In-process stand-ins for the pipeline's capabilities.
//!
//! All fakes share a [`CallLog`] so tests can assert which tools ran and in
//! what order.

use async_trait::async_trait;
use isoforge::identity::{IdentityReference, KeySource};
use isoforge::render::RenderedConfig;
use isoforge::tools::{
    DownloadRequest, EmbedRequest, ImageTool, Toolchain, TranspiledConfig, Transpiler, Validator,
};
use isoforge_shared::{ForgeError, ForgeResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Ordered record of capability calls, shared between fakes.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Whether any call starts with `prefix`.
    pub fn called(&self, prefix: &str) -> bool {
        self.0.lock().iter().any(|c| c.starts_with(prefix))
    }
}

// ============================================================================
// Key source
// ============================================================================

#[derive(Debug, Clone)]
enum Listing {
    Keys(String),
    NotFound,
    Unreachable,
}

/// Key source answering from a fixed table. Unknown identities are 404s.
#[derive(Debug, Clone, Default)]
pub struct StaticKeySource {
    listings: HashMap<String, Listing>,
    log: CallLog,
}

impl StaticKeySource {
    pub fn new(log: CallLog) -> Self {
        Self {
            listings: HashMap::new(),
            log,
        }
    }

    pub fn with_listing(mut self, identity: &str, listing: impl Into<String>) -> Self {
        self.listings
            .insert(identity.to_string(), Listing::Keys(listing.into()));
        self
    }

    pub fn with_not_found(mut self, identity: &str) -> Self {
        self.listings.insert(identity.to_string(), Listing::NotFound);
        self
    }

    /// Lookups for `identity` fail like a refused connection.
    pub fn with_unreachable(mut self, identity: &str) -> Self {
        self.listings
            .insert(identity.to_string(), Listing::Unreachable);
        self
    }

    fn url(identity: &IdentityReference) -> String {
        format!("static://{}.keys", identity)
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch_listing(&self, identity: &IdentityReference) -> ForgeResult<String> {
        self.log.push(format!("keys {}", identity));
        match self.listings.get(identity.as_str()) {
            Some(Listing::Keys(listing)) => Ok(listing.clone()),
            Some(Listing::Unreachable) => Err(ForgeError::Network {
                url: Self::url(identity),
                reason: "connection refused".to_string(),
                transient: true,
            }),
            Some(Listing::NotFound) | None => Err(ForgeError::IdentityNotFound {
                identity: identity.to_string(),
                url: Self::url(identity),
            }),
        }
    }

    fn describe(&self) -> String {
        "static key table".to_string()
    }
}

// ============================================================================
// Tools
// ============================================================================

/// Transpiler that passes the rendered text through as the config bytes.
#[derive(Debug, Clone)]
pub struct EchoTranspiler {
    log: CallLog,
    fail: Option<String>,
    files_dir: Arc<Mutex<Option<PathBuf>>>,
}

impl EchoTranspiler {
    /// `files_dir` passed on the most recent call.
    pub fn last_files_dir(&self) -> Option<PathBuf> {
        self.files_dir.lock().clone()
    }
}

#[async_trait]
impl Transpiler for EchoTranspiler {
    async fn transpile(
        &self,
        config: &RenderedConfig,
        files_dir: Option<&Path>,
    ) -> ForgeResult<TranspiledConfig> {
        self.log.push("transpile");
        *self.files_dir.lock() = files_dir.map(Path::to_path_buf);
        if let Some(diagnostic) = &self.fail {
            return Err(ForgeError::Transpile {
                tool: "fake-butane".to_string(),
                diagnostic: diagnostic.clone(),
            });
        }
        Ok(TranspiledConfig::new(config.as_bytes().to_vec()))
    }
}

#[derive(Debug, Clone)]
pub struct RecordingValidator {
    log: CallLog,
    fail: Option<String>,
}

#[async_trait]
impl Validator for RecordingValidator {
    async fn validate(&self, _config: &TranspiledConfig) -> ForgeResult<()> {
        self.log.push("validate");
        match &self.fail {
            Some(diagnostic) => Err(ForgeError::Validation {
                diagnostic: diagnostic.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Image tool whose "customized image" is the base image bytes followed by
/// the config bytes.
#[derive(Debug, Clone)]
pub struct ConcatImageTool {
    log: CallLog,
    fail: Option<String>,
    stall: bool,
}

impl ConcatImageTool {
    /// Base image content produced by `download_base_image`.
    pub const DOWNLOADED: &'static [u8] = b"DOWNLOADED-BASE";
}

#[async_trait]
impl ImageTool for ConcatImageTool {
    async fn download_base_image(&self, request: DownloadRequest<'_>) -> ForgeResult<()> {
        self.log.push(format!(
            "download {} {}",
            request.stream, request.architecture
        ));
        std::fs::write(request.dest_dir.join("fake-live.iso"), Self::DOWNLOADED)
            .map_err(|e| ForgeError::Composition(e.to_string()))
    }

    async fn embed(&self, request: EmbedRequest<'_>) -> ForgeResult<()> {
        self.log.push(format!("embed {}", request.device));
        if let Some(diagnostic) = &self.fail {
            return Err(ForgeError::Composition(diagnostic.clone()));
        }
        let mut bytes = std::fs::read(request.base_image)
            .map_err(|e| ForgeError::Composition(e.to_string()))?;
        if self.stall {
            // Half-written output, then never finish.
            std::fs::write(request.output, &bytes)
                .map_err(|e| ForgeError::Composition(e.to_string()))?;
            std::future::pending::<()>().await;
        }
        let config =
            std::fs::read(request.config).map_err(|e| ForgeError::Composition(e.to_string()))?;
        bytes.extend_from_slice(&config);
        std::fs::write(request.output, bytes).map_err(|e| ForgeError::Composition(e.to_string()))
    }
}

/// Builder for a [`Toolchain`] of fakes sharing one [`CallLog`].
#[derive(Debug, Clone, Default)]
pub struct FakeTools {
    pub log: CallLog,
    transpile_error: Option<String>,
    validation_error: Option<String>,
    embed_error: Option<String>,
    embed_stalls: bool,
}

impl FakeTools {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn failing_transpile(mut self, diagnostic: &str) -> Self {
        self.transpile_error = Some(diagnostic.to_string());
        self
    }

    pub fn failing_validation(mut self, diagnostic: &str) -> Self {
        self.validation_error = Some(diagnostic.to_string());
        self
    }

    pub fn failing_embed(mut self, diagnostic: &str) -> Self {
        self.embed_error = Some(diagnostic.to_string());
        self
    }

    /// `embed` writes partial output and then hangs until dropped.
    pub fn stalling_embed(mut self) -> Self {
        self.embed_stalls = true;
        self
    }

    pub fn transpiler(&self) -> EchoTranspiler {
        EchoTranspiler {
            log: self.log.clone(),
            fail: self.transpile_error.clone(),
            files_dir: Arc::default(),
        }
    }

    pub fn toolchain(&self) -> Toolchain {
        self.toolchain_with(self.transpiler())
    }

    /// Toolchain using a transpiler the caller keeps a handle to.
    pub fn toolchain_with(&self, transpiler: EchoTranspiler) -> Toolchain {
        Toolchain {
            transpiler: Arc::new(transpiler),
            validator: Arc::new(RecordingValidator {
                log: self.log.clone(),
                fail: self.validation_error.clone(),
            }),
            image_tool: Arc::new(ConcatImageTool {
                log: self.log.clone(),
                fail: self.embed_error.clone(),
                stall: self.embed_stalls,
            }),
        }
    }
}
