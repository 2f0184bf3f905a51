//! Seams between the core services and their I/O collaborators.

use async_trait::async_trait;

use crate::error::Result;

/// Delivers a freshly provisioned license key to a client.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Short name for logs (`smtp`, `disabled`, ...).
    fn name(&self) -> &str;

    async fn send_license_key(&self, to_email: &str, client_name: &str, license_key: &str) -> Result<()>;
}
