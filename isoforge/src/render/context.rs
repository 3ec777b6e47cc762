//! Template context: the only values a provisioning template can see.

use crate::identity::KeySet;
use crate::payload::PayloadSet;
use crate::target::InstallTarget;
use gtmpl_value::Value;
use std::collections::HashMap;

/// Top-level variables available to templates.
pub const VARIABLES: &[&str] = &["device", "keys", "payloads"];

/// Fields of each entry in `payloads`.
pub const PAYLOAD_FIELDS: &[&str] = &["name", "target"];

/// Quote a string as a YAML double-quoted scalar.
///
/// JSON string syntax is a subset of YAML's double-quoted style, so quotes,
/// backslashes, `#`, `:` and control characters all stay inside the scalar.
pub fn quote_scalar(raw: &str) -> String {
    serde_json::Value::String(raw.to_owned()).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PayloadEntry {
    name: String,
    target: String,
}

/// Resolved template inputs with every string pre-quoted.
///
/// Built once per run and consumed by [`super::ConfigRenderer::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateContext {
    device: String,
    keys: Vec<String>,
    payloads: Vec<PayloadEntry>,
}

impl TemplateContext {
    pub fn new(target: &InstallTarget, keys: &KeySet, payload: &PayloadSet) -> Self {
        Self {
            device: quote_scalar(target.as_str()),
            keys: keys.iter().map(|k| quote_scalar(k.as_str())).collect(),
            payloads: payload
                .files()
                .iter()
                .map(|f| PayloadEntry {
                    name: quote_scalar(&f.name),
                    target: quote_scalar(&f.target),
                })
                .collect(),
        }
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Same shape with every string replaced by an empty scalar.
    pub(crate) fn masked(&self) -> Self {
        let blank = quote_scalar("");
        Self {
            device: blank.clone(),
            keys: vec![blank.clone(); self.keys.len()],
            payloads: self
                .payloads
                .iter()
                .map(|_| PayloadEntry {
                    name: blank.clone(),
                    target: blank.clone(),
                })
                .collect(),
        }
    }

    pub(crate) fn into_value(self) -> Value {
        let payloads = self
            .payloads
            .into_iter()
            .map(|entry| {
                let mut fields = HashMap::new();
                fields.insert("name".to_string(), Value::String(entry.name));
                fields.insert("target".to_string(), Value::String(entry.target));
                Value::Object(fields)
            })
            .collect();

        let mut root = HashMap::new();
        root.insert("device".to_string(), Value::String(self.device));
        root.insert(
            "keys".to_string(),
            Value::Array(self.keys.into_iter().map(Value::String).collect()),
        );
        root.insert("payloads".to_string(), Value::Array(payloads));
        Value::Object(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_scalar_escapes() {
        assert_eq!(quote_scalar("plain"), r#""plain""#);
        assert_eq!(quote_scalar(r#"a"b"#), r#""a\"b""#);
        assert_eq!(quote_scalar(r"a\b"), r#""a\\b""#);
        assert_eq!(quote_scalar("tab\there"), r#""tab\there""#);
    }

    #[test]
    fn test_quoted_scalar_parses_back_as_yaml() {
        for raw in [
            r#"ssh-ed25519 AAAA "quoted" \back\slash"#,
            "colon: and # hash",
            "- leading dash",
            "{ flow: mapping }",
            "'single' quotes",
            "unicode \u{e9}\u{4e2d}",
        ] {
            let doc = format!("value: {}\n", quote_scalar(raw));
            let parsed: serde_yaml::Value = serde_yaml::from_str(&doc).unwrap();
            assert_eq!(parsed["value"].as_str(), Some(raw), "{doc}");
        }
    }
}
