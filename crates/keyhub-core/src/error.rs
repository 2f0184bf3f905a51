//! Error types for KeyHub.
//!
//! Every variant carries a stable wire code (see [`KeyHubError::code`]) so
//! callers receive a categorical result instead of free-form text.

use thiserror::Error;

/// Errors produced by KeyHub services.
#[derive(Debug, Error)]
pub enum KeyHubError {
    /// A required request field was absent or empty.
    #[error("missing required fields")]
    MissingFields,

    #[error("a user with this email already exists")]
    EmailExists,

    #[error("invalid email or password")]
    InvalidCredentials,

    /// Activation was requested for an email with no registered user.
    #[error("unknown user")]
    UnknownUser,

    #[error("invalid license key")]
    InvalidLicense,

    #[error("maximum number of devices reached")]
    MaxDevicesReached,

    /// The license is already bound to a different user.
    #[error("license is owned by another user")]
    LicenseNotOwnedByUser,

    /// No active client matches the email and license key pair.
    #[error("client or license invalid")]
    ClientOrLicenseInvalid,

    #[error("license already used by another account")]
    LicenseAlreadyUsed,

    #[error("license key already exists")]
    LicenseExists,

    #[error("a client with this email already exists")]
    ClientExists,

    #[error("client not found")]
    ClientNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("max_devices must be at least 1")]
    InvalidMaxDevices,

    /// Every generated key collided with an existing one.
    #[error("could not generate a unique license key after {0} attempts")]
    KeyGenerationFailed(u32),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("email error: {0}")]
    Email(String),

    #[error("config error: {0}")]
    Config(String),

    /// Password hashing or token signing failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl KeyHubError {
    /// Stable SCREAMING_SNAKE code sent to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFields => "MISSING_FIELDS",
            Self::EmailExists => "EMAIL_EXISTS",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::UnknownUser => "UNKNOWN_USER",
            Self::InvalidLicense => "INVALID_LICENSE",
            Self::MaxDevicesReached => "MAX_DEVICES_REACHED",
            Self::LicenseNotOwnedByUser => "LICENSE_NOT_OWNED_BY_USER",
            Self::ClientOrLicenseInvalid => "CLIENT_OR_LICENSE_INVALID",
            Self::LicenseAlreadyUsed => "LICENSE_ALREADY_USED",
            Self::LicenseExists => "LICENSE_EXISTS",
            Self::ClientExists => "CLIENT_EXISTS",
            Self::ClientNotFound => "CLIENT_NOT_FOUND",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::InvalidMaxDevices => "INVALID_MAX_DEVICES",
            Self::KeyGenerationFailed(_) => "KEY_GENERATION_FAILED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::Email(_) => "EMAIL_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Crypto(_) => "CRYPTO_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn email(msg: impl Into<String>) -> Self {
        Self::Email(msg.into())
    }

    /// True for failures caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Storage(_)
                | Self::Email(_)
                | Self::Config(_)
                | Self::Crypto(_)
                | Self::KeyGenerationFailed(_)
        )
    }
}

/// Result type alias for KeyHub operations.
pub type Result<T> = std::result::Result<T, KeyHubError>;
