//! Pipeline stages.
//!
//! Each stage is a function with typed input/output.
//! Stages do ONE thing and have no side effects beyond their output, except
//! compose, which writes the artifact.
//!
//! ```text
//! Identity ──→ Render ──→ Transpile ──→ Validate ──→ Compose
//! ```

pub mod compose;
pub mod identity;
pub mod render;
pub mod transpile;
pub mod validate;
