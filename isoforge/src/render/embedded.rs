//! Templates compiled into the binary.

const SERVER: &str = include_str!("../../templates/server.bu");

const CATALOG: &[(&str, &str)] = &[("server", SERVER)];

/// Look up a built-in template by name.
pub fn lookup(name: &str) -> Option<&'static str> {
    CATALOG
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, text)| *text)
}

/// Names of all built-in templates.
pub fn names() -> Vec<&'static str> {
    CATALOG.iter().map(|(name, _)| *name).collect()
}
