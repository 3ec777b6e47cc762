//! Provisioning config rendering (template + context -> Butane YAML).
//!
//! Templates use Go `text/template` syntax. Rendering is a pure function of
//! the template text and the [`TemplateContext`]; the only thing ranged over
//! are arrays, so output order never depends on map iteration.

mod context;
mod embedded;

pub use context::{PAYLOAD_FIELDS, TemplateContext, VARIABLES, quote_scalar};

use isoforge_shared::constants::render::{DEFAULT_TEMPLATE, EMBEDDED_PREFIX, NO_VALUE};
use isoforge_shared::{ForgeError, ForgeResult};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

static ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("valid action regex"));

static STRING_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:[^"\\]|\\.)*"|`[^`]*`"#).expect("valid literal regex")
});

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s(|,$])\.([A-Za-z_][A-Za-z0-9_]*)").expect("valid field regex")
});

// ============================================================================
// TEMPLATE SOURCE
// ============================================================================

/// Where a template comes from: `embedded:<name>` or a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Embedded(String),
    File(PathBuf),
}

impl TemplateSource {
    pub fn identifier(&self) -> String {
        match self {
            TemplateSource::Embedded(name) => format!("{}{}", EMBEDDED_PREFIX, name),
            TemplateSource::File(path) => path.display().to_string(),
        }
    }
}

impl Default for TemplateSource {
    fn default() -> Self {
        TemplateSource::Embedded(DEFAULT_TEMPLATE.to_string())
    }
}

impl FromStr for TemplateSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.strip_prefix(EMBEDDED_PREFIX) {
            Some(name) => TemplateSource::Embedded(name.to_string()),
            None => TemplateSource::File(PathBuf::from(s)),
        })
    }
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

// ============================================================================
// RENDERED CONFIG
// ============================================================================

/// Human-authored, declarative provisioning config. Never executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    text: String,
}

impl RenderedConfig {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

// ============================================================================
// RENDERER
// ============================================================================

/// A loaded template, ready to render.
#[derive(Debug, Clone)]
pub struct ConfigRenderer {
    name: String,
    text: String,
}

impl ConfigRenderer {
    /// Load a template from the embedded catalog or the filesystem.
    pub fn load(source: &TemplateSource) -> ForgeResult<Self> {
        let text = match source {
            TemplateSource::Embedded(name) => embedded::lookup(name)
                .ok_or_else(|| ForgeError::TemplateRender {
                    template: source.identifier(),
                    reason: format!(
                        "no built-in template named '{}' (available: {})",
                        name,
                        embedded::names().join(", ")
                    ),
                })?
                .to_string(),
            TemplateSource::File(path) => {
                std::fs::read_to_string(path).map_err(|e| ForgeError::TemplateRender {
                    template: source.identifier(),
                    reason: format!("cannot read template: {}", e),
                })?
            }
        };

        Ok(Self::from_text(source.identifier(), text))
    }

    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the template against `context`.
    ///
    /// Unknown variables are rejected before execution, so a typo in a
    /// template never produces a config with a silently empty field.
    pub fn render(&self, context: TemplateContext) -> ForgeResult<RenderedConfig> {
        let unknown = unknown_fields(&self.text);
        if !unknown.is_empty() {
            return Err(self.error(format!(
                "unresolved variable(s): {} (available: {}; payload entries: {})",
                unknown.into_iter().collect::<Vec<_>>().join(", "),
                VARIABLES.join(", "),
                PAYLOAD_FIELDS.join(", ")
            )));
        }

        let mut template = gtmpl::Template::default();
        template
            .parse(self.text.as_str())
            .map_err(|e| self.error(format!("parse error: {}", e)))?;

        // Missing values are looked for with every injected string blanked,
        // so key material can never trip the check.
        let skeleton = self.execute(&template, context.masked())?;
        if skeleton.contains(NO_VALUE) {
            return Err(self.error("template produced a missing value".to_string()));
        }

        let text = self.execute(&template, context)?;

        tracing::debug!(template = %self.name, bytes = text.len(), "Rendered provisioning config");
        Ok(RenderedConfig { text })
    }

    fn execute(&self, template: &gtmpl::Template, context: TemplateContext) -> ForgeResult<String> {
        template
            .render(&gtmpl::Context::from(context.into_value()))
            .map_err(|e| self.error(format!("execution error: {}", e)))
    }

    fn error(&self, reason: String) -> ForgeError {
        ForgeError::TemplateRender {
            template: self.name.clone(),
            reason,
        }
    }
}

/// Field references in template actions that are not part of the context.
fn unknown_fields(text: &str) -> BTreeSet<String> {
    let mut unknown = BTreeSet::new();

    for action in ACTION.captures_iter(text) {
        let body = action[1].trim_start_matches('-').trim();
        if body.starts_with("/*") {
            continue;
        }
        let body = STRING_LITERAL.replace_all(body, "\"\"");

        for field in FIELD.captures_iter(&body) {
            let name = &field[1];
            if !VARIABLES.contains(&name) && !PAYLOAD_FIELDS.contains(&name) {
                unknown.insert(name.to_string());
            }
        }
    }

    unknown
}
