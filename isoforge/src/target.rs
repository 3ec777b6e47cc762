//! Install target (destination block device on the machine being provisioned).
//!
//! The path refers to a device on the *target* hardware, not on the build
//! host, so it is only checked for shape and then passed through literally.

use isoforge_shared::{ForgeError, ForgeResult};
use std::fmt;

const DEVICE_PREFIX: &str = "/dev/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget(String);

impl InstallTarget {
    pub fn new(device: impl Into<String>) -> ForgeResult<Self> {
        let device = device.into();

        if device.is_empty() {
            return Err(ForgeError::InvalidInput(
                "install target device must not be empty".to_string(),
            ));
        }
        if device.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ForgeError::InvalidInput(format!(
                "install target {:?} contains whitespace or control characters",
                device
            )));
        }
        if !device.starts_with(DEVICE_PREFIX) || device.len() == DEVICE_PREFIX.len() {
            return Err(ForgeError::InvalidInput(format!(
                "install target '{}' is not a device path (expected {}<name>)",
                device, DEVICE_PREFIX
            )));
        }
        if device.ends_with('/') {
            return Err(ForgeError::InvalidInput(format!(
                "install target '{}' names a directory, not a device",
                device
            )));
        }

        Ok(Self(device))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
