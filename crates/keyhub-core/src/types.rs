//! Shared value types.

use serde::{Deserialize, Serialize};

/// Successful outcome of a license activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Activation {
    /// The machine took a new device slot.
    LicenseActivated,
    /// The machine was already bound; nothing changed.
    AlreadyActivated,
}

impl Activation {
    pub fn code(&self) -> &'static str {
        match self {
            Self::LicenseActivated => "LICENSE_ACTIVATED",
            Self::AlreadyActivated => "ALREADY_ACTIVATED",
        }
    }
}

/// User roles stored alongside the password hash.
pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";
