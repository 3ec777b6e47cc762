pub mod build;
pub mod keys;
pub mod manifests;
pub mod render;
