//! Shared test helpers for isoforge crates.
//!
//! - [`keys`]: syntactically valid public key lines
//! - [`fakes`]: in-process key source and tools that record their calls
//! - [`scripts`]: stand-in executables for `butane`, `ignition-validate`,
//!   `coreos-installer` and `git`
//! - [`server`]: a tiny HTTP server that serves key listings

pub mod fakes;
pub mod keys;
pub mod scripts;
pub mod server;
