//! isoforge: unattended Fedora CoreOS installer images.
//!
//! ```text
//! identity (keys) → render (Butane) → transpile (Ignition) → validate → compose (ISO)
//! ```
//!
//! External tools (`butane`, `ignition-validate`, `coreos-installer`) sit
//! behind the traits in [`tools`]; key lookup sits behind
//! [`identity::KeySource`].

pub mod compose;
pub mod identity;
pub mod layout;
pub mod manifests;
pub mod options;
pub mod payload;
pub mod pipeline;
pub mod render;
pub mod target;
pub mod tools;
pub mod util;

pub use compose::{Architecture, BaseImageSource, ImageComposer, InstallerArtifact};
pub use identity::{
    HttpKeySource, IdentityReference, IdentityResolver, KeySet, KeySource, PublicKey,
    SharedKeySource,
};
pub use isoforge_shared::{ForgeError, ForgeResult, Stage};
pub use options::ForgeOptions;
pub use payload::{PayloadFile, PayloadSet};
pub use pipeline::{
    BuildReport, BuildRequest, PipelineState, ProvisionPipeline, RenderReport, RenderRequest,
};
pub use render::{ConfigRenderer, RenderedConfig, TemplateContext, TemplateSource};
pub use target::InstallTarget;
pub use tools::{ImageTool, Toolchain, TranspiledConfig, Transpiler, Validator};
