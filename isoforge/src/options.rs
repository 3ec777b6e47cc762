//! Configuration for isoforge.
//!
//! Options are read from an optional YAML file; every field has a default.
//! Command-line flags and environment variables are applied on top by the
//! caller.

use crate::compose::{Architecture, BaseImageSource};
use crate::layout::ForgeLayout;
use crate::render::TemplateSource;
use isoforge_shared::constants::{identity, image, payload, render, tools};
use isoforge_shared::{ForgeError, ForgeResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Identity Options
// ============================================================================

/// Where public keys are fetched from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityOptions {
    /// Base URL; keys are read from `<endpoint>/<identity>.keys`.
    ///
    /// Default: https://github.com
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Whole-request timeout for the key lookup.
    ///
    /// Default: 30
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IdentityOptions {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl IdentityOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_endpoint() -> String {
    identity::DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    identity::REQUEST_TIMEOUT_SECS
}

// ============================================================================
// Tool Paths
// ============================================================================

/// External tool binaries. Bare names are looked up in `PATH`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolPaths {
    #[serde(default = "default_butane")]
    pub butane: PathBuf,
    #[serde(default = "default_ignition_validate")]
    pub ignition_validate: PathBuf,
    #[serde(default = "default_coreos_installer")]
    pub coreos_installer: PathBuf,
    #[serde(default = "default_git")]
    pub git: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            butane: default_butane(),
            ignition_validate: default_ignition_validate(),
            coreos_installer: default_coreos_installer(),
            git: default_git(),
        }
    }
}

fn default_butane() -> PathBuf {
    PathBuf::from(tools::BUTANE)
}

fn default_ignition_validate() -> PathBuf {
    PathBuf::from(tools::IGNITION_VALIDATE)
}

fn default_coreos_installer() -> PathBuf {
    PathBuf::from(tools::COREOS_INSTALLER)
}

fn default_git() -> PathBuf {
    PathBuf::from(tools::GIT)
}

// ============================================================================
// Image Options
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageOptions {
    /// Use this base image instead of the cache.
    #[serde(default)]
    pub base_image: Option<PathBuf>,

    /// Installer architecture. None: the build host's.
    #[serde(default)]
    pub architecture: Option<String>,

    /// Release stream for downloads.
    ///
    /// Default: stable
    #[serde(default = "default_stream")]
    pub stream: String,

    /// Base image cache. None: `<user cache dir>/isoforge`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Directory the artifact is written to.
    ///
    /// Default: current directory
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Default: coreos-install.iso
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            base_image: None,
            architecture: None,
            stream: default_stream(),
            cache_dir: None,
            output_dir: default_output_dir(),
            artifact_name: default_artifact_name(),
        }
    }
}

impl ImageOptions {
    pub fn architecture(&self) -> ForgeResult<Architecture> {
        match &self.architecture {
            Some(name) => name.parse(),
            None => Architecture::host(),
        }
    }

    /// Resolve where the base image comes from.
    pub fn base_image_source(&self) -> ForgeResult<BaseImageSource> {
        if let Some(path) = &self.base_image {
            return Ok(BaseImageSource::Path(path.clone()));
        }

        let layout = match &self.cache_dir {
            Some(dir) => ForgeLayout::new(dir),
            None => ForgeLayout::user_default()?,
        };

        Ok(BaseImageSource::Cached {
            cache_dir: layout.cache_dir().to_path_buf(),
            stream: self.stream.clone(),
            architecture: self.architecture()?,
        })
    }
}

fn default_stream() -> String {
    image::DEFAULT_STREAM.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_artifact_name() -> String {
    image::ARTIFACT_NAME.to_string()
}

// ============================================================================
// Render Options
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderOptions {
    /// `embedded:<name>` or a template file path.
    ///
    /// Default: embedded:server
    #[serde(default = "default_template")]
    pub template: String,

    /// Auxiliary files to embed. None: no payload.
    #[serde(default)]
    pub payload_dir: Option<PathBuf>,

    /// Where payload files land on the installed host.
    ///
    /// Default: /var/lib/isoforge/payload
    #[serde(default = "default_payload_target_root")]
    pub payload_target_root: String,

    /// Treat transpiler warnings as errors.
    ///
    /// Default: true
    #[serde(default = "default_strict")]
    pub strict: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            template: default_template(),
            payload_dir: None,
            payload_target_root: default_payload_target_root(),
            strict: default_strict(),
        }
    }
}

impl RenderOptions {
    pub fn template_source(&self) -> TemplateSource {
        match self.template.parse() {
            Ok(source) => source,
            Err(never) => match never {},
        }
    }
}

fn default_template() -> String {
    format!("{}{}", render::EMBEDDED_PREFIX, render::DEFAULT_TEMPLATE)
}

fn default_payload_target_root() -> String {
    payload::DEFAULT_TARGET_ROOT.to_string()
}

fn default_strict() -> bool {
    true
}

// ============================================================================
// Forge Options
// ============================================================================

/// All options for one invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgeOptions {
    #[serde(default)]
    pub identity: IdentityOptions,
    #[serde(default)]
    pub tools: ToolPaths,
    #[serde(default)]
    pub image: ImageOptions,
    #[serde(default)]
    pub render: RenderOptions,
}

impl ForgeOptions {
    /// Parse options from YAML text.
    pub fn from_yaml(text: &str) -> ForgeResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
            .map_err(|e| ForgeError::Config(format!("invalid options: {}", e)))
    }

    /// Load options from a YAML file.
    pub fn load(path: &Path) -> ForgeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ForgeError::Config(format!("cannot read options file {}: {}", path.display(), e))
        })?;
        let options = Self::from_yaml(&text)?;
        tracing::debug!(path = %path.display(), "Loaded options file");
        Ok(options)
    }

    /// Reject values that can never work.
    pub fn validate(&self) -> ForgeResult<()> {
        let endpoint = &self.identity.endpoint;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ForgeError::Config(format!(
                "identity.endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }
        if self.identity.timeout_secs == 0 {
            return Err(ForgeError::Config(
                "identity.timeout_secs must be greater than zero".to_string(),
            ));
        }
        BaseImageSource::check_stream(&self.image.stream)?;
        if let Some(arch) = &self.image.architecture {
            arch.parse::<Architecture>()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ForgeOptions::default();
        assert_eq!(options.identity.endpoint, "https://github.com");
        assert_eq!(options.identity.timeout(), Duration::from_secs(30));
        assert_eq!(options.tools.butane, PathBuf::from("butane"));
        assert_eq!(options.image.artifact_name, "coreos-install.iso");
        assert_eq!(options.image.stream, "stable");
        assert_eq!(options.render.template, "embedded:server");
        assert!(options.render.strict);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let options = ForgeOptions::from_yaml(
            "identity:\n  endpoint: http://127.0.0.1:8080\ntools:\n  butane: /opt/bin/butane\n",
        )
        .unwrap();

        assert_eq!(options.identity.endpoint, "http://127.0.0.1:8080");
        assert_eq!(options.identity.timeout_secs, 30);
        assert_eq!(options.tools.butane, PathBuf::from("/opt/bin/butane"));
        assert_eq!(options.tools.git, PathBuf::from("git"));
        assert_eq!(options.image, ImageOptions::default());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(ForgeOptions::from_yaml("").unwrap(), ForgeOptions::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ForgeOptions::from_yaml("image:\n  strem: testing\n").unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut options = ForgeOptions::default();
        options.identity.endpoint = "ftp://example.com".into();
        assert!(options.validate().is_err());

        let mut options = ForgeOptions::default();
        options.identity.timeout_secs = 0;
        assert!(options.validate().is_err());

        let mut options = ForgeOptions::default();
        options.image.architecture = Some("mips".into());
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_stream_outside_cache() {
        for stream in ["", "../../x", "testing/../../etc"] {
            let mut options = ForgeOptions::default();
            options.image.stream = stream.into();
            assert!(
                matches!(options.validate(), Err(ForgeError::Config(_))),
                "accepted {:?}",
                stream
            );
        }
    }

    #[test]
    fn test_base_image_source() {
        let mut image = ImageOptions::default();
        image.base_image = Some(PathBuf::from("/srv/fcos.iso"));
        assert_eq!(
            image.base_image_source().unwrap(),
            BaseImageSource::Path(PathBuf::from("/srv/fcos.iso"))
        );

        let image = ImageOptions {
            cache_dir: Some(PathBuf::from("/var/cache/isoforge")),
            architecture: Some("aarch64".into()),
            stream: "testing".into(),
            ..Default::default()
        };
        assert_eq!(
            image.base_image_source().unwrap(),
            BaseImageSource::Cached {
                cache_dir: PathBuf::from("/var/cache/isoforge"),
                stream: "testing".into(),
                architecture: Architecture::Aarch64,
            }
        );
    }

    #[test]
    fn test_template_source() {
        let render = RenderOptions::default();
        assert_eq!(
            render.template_source(),
            TemplateSource::Embedded("server".into())
        );

        let render = RenderOptions {
            template: "/etc/isoforge/custom.bu".into(),
            ..Default::default()
        };
        assert_eq!(
            render.template_source(),
            TemplateSource::File(PathBuf::from("/etc/isoforge/custom.bu"))
        );
    }
}
