//! isoforge shared - error taxonomy and constants
//!
//! This crate contains the types every isoforge crate agrees on:
//! the stage-attributed error enum, exit codes, and fixed names
//! (tool binaries, endpoints, file names).

pub mod constants;
pub mod errors;

pub use errors::{ForgeError, ForgeResult, Stage};
