//! Shared constants.
//!
//! Centralized location for hardcoded names, endpoints and defaults.

/// Identity (public key listing) lookup
pub mod identity {
    /// Default key-listing endpoint. Keys live at `<endpoint>/<handle>.keys`.
    pub const DEFAULT_ENDPOINT: &str = "https://github.com";

    /// Suffix appended to the handle to form the listing path
    pub const KEYS_SUFFIX: &str = ".keys";

    /// Total request timeout in seconds
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// TCP/TLS connect timeout in seconds
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Longest accepted identity handle (GitHub limit)
    pub const MAX_HANDLE_LEN: usize = 39;
}

/// External tool binary names
pub mod tools {
    /// Butane -> Ignition transpiler
    pub const BUTANE: &str = "butane";

    /// Ignition schema validator
    pub const IGNITION_VALIDATE: &str = "ignition-validate";

    /// ISO download and customization tool
    pub const COREOS_INSTALLER: &str = "coreos-installer";

    /// Used by manifest bundling only
    pub const GIT: &str = "git";
}

/// Installer image composition
pub mod image {
    /// Fixed, well-known artifact file name inside the output directory
    pub const ARTIFACT_NAME: &str = "coreos-install.iso";

    /// Default release stream for base image downloads
    pub const DEFAULT_STREAM: &str = "stable";

    /// Prefix of per-run staging directories created next to the artifact
    pub const STAGING_PREFIX: &str = ".isoforge-";

    /// Subdirectory of the user cache dir holding base images
    pub const CACHE_DIR_NAME: &str = "isoforge";

    /// Base image format requested from the download tool
    pub const BASE_IMAGE_FORMAT: &str = "iso";
}

/// Template rendering
pub mod render {
    /// Name of the built-in template used when none is given
    pub const DEFAULT_TEMPLATE: &str = "server";

    /// Prefix selecting a built-in template instead of a file path
    pub const EMBEDDED_PREFIX: &str = "embedded:";

    /// Marker the template engine emits for missing values
    pub const NO_VALUE: &str = "<no value>";
}

/// Payload files
pub mod payload {
    /// Directory on the installed host that payload files land under
    pub const DEFAULT_TARGET_ROOT: &str = "/var/lib/isoforge/payload";
}

/// Manifest bundling defaults
pub mod manifests {
    pub const DEFAULT_REPO: &str = "https://github.com/kubernetes-csi/external-snapshotter.git";

    pub const DEFAULT_VERSION: &str = "v8.2.0";

    pub const DEFAULT_PATHS: &[&str] = &["client/config/crd", "deploy/kubernetes/snapshot-controller"];

    pub const DEFAULT_OUTPUT: &str = "snapshotter-manifests.yaml";

    /// Separator between combined YAML documents
    pub const DOCUMENT_SEPARATOR: &str = "\n---\n";
}

/// Environment variables
pub mod envs {
    pub const CONFIG: &str = "ISOFORGE_CONFIG";
    pub const KEYS_ENDPOINT: &str = "ISOFORGE_KEYS_ENDPOINT";
    pub const BUTANE: &str = "ISOFORGE_BUTANE";
    pub const IGNITION_VALIDATE: &str = "ISOFORGE_IGNITION_VALIDATE";
    pub const COREOS_INSTALLER: &str = "ISOFORGE_COREOS_INSTALLER";
    pub const GIT: &str = "ISOFORGE_GIT";
}
