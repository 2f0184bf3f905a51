//! # KeyHub Core
//! Shared error codes, configuration, license key generation and traits.

pub mod config;
pub mod error;
pub mod keygen;
pub mod traits;
pub mod types;

pub use config::KeyHubConfig;
pub use error::{KeyHubError, Result};
pub use types::Activation;
