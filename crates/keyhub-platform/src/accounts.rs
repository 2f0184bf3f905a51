//! Client provisioning, user registration and login.

use keyhub_core::config::LicensingConfig;
use keyhub_core::error::{KeyHubError, Result};
use keyhub_core::keygen::generate_license_key;
use keyhub_core::types::{ROLE_ADMIN, ROLE_USER};
use serde::Serialize;

use crate::auth::{self, TokenIssuer};
use crate::db::{Client, LicenseDb, Queries};
use crate::licensing::require;

/// Result of a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginSession {
    pub user_id: String,
    pub role: String,
    pub token: String,
}

/// Register a user against a provisioned client and claim its license.
///
/// The client must be active and its email and license key must both match.
/// Returns the new user's id.
pub fn register(db: &mut LicenseDb, email: &str, password: &str, license_key: &str, bcrypt_cost: u32) -> Result<String> {
    require(&[email, password, license_key])?;
    let password_hash = auth::hash_password(password, bcrypt_cost)?;

    let tx = db.begin()?;
    let client_ok = tx
        .client_by_email(email)?
        .is_some_and(|c| c.is_active && c.license_key == license_key);
    if !client_ok {
        return Err(KeyHubError::ClientOrLicenseInvalid);
    }
    if tx.user_by_email(email)?.is_some() {
        return Err(KeyHubError::EmailExists);
    }
    let license = tx.license_by_key(license_key)?.ok_or(KeyHubError::ClientOrLicenseInvalid)?;

    let user_id = tx.insert_user(email, &password_hash, ROLE_USER)?;
    if !tx.bind_owner(&license.id, &user_id)? {
        // Dropping the transaction discards the user row as well.
        return Err(KeyHubError::LicenseAlreadyUsed);
    }
    tx.log_event("user_registered", "user", &user_id, Some(format!("key={license_key}").as_str()))?;
    tx.commit()?;

    tracing::info!("Registered {email} with license {license_key}");
    Ok(user_id)
}

/// Check credentials and issue a login token.
pub fn login(db: &LicenseDb, issuer: &TokenIssuer, email: &str, password: &str) -> Result<LoginSession> {
    require(&[email, password])?;
    let user = db.user_by_email(email)?.ok_or(KeyHubError::InvalidCredentials)?;
    if !auth::verify_password(password, &user.password_hash) {
        return Err(KeyHubError::InvalidCredentials);
    }
    let token = issuer.create_token(&user.id, &user.email, &user.role)?;
    Ok(LoginSession { user_id: user.id, role: user.role, token })
}

/// Create an operator account that may call the admin API.
pub fn create_admin(db: &mut LicenseDb, email: &str, password: &str, bcrypt_cost: u32) -> Result<String> {
    require(&[email, password])?;
    let password_hash = auth::hash_password(password, bcrypt_cost)?;

    let tx = db.begin()?;
    let id = tx.insert_user(email, &password_hash, ROLE_ADMIN)?;
    tx.log_event("admin_created", "system", &id, Some(format!("email={email}").as_str()))?;
    tx.commit()?;
    Ok(id)
}

/// Provision a client with a freshly generated license key.
pub fn provision_client(
    db: &mut LicenseDb,
    licensing: &LicensingConfig,
    email: &str,
    name: &str,
    max_devices: Option<i64>,
) -> Result<Client> {
    provision_client_with(db, licensing, email, name, max_devices, generate_license_key)
}

/// [`provision_client`] with a caller-supplied key generator.
///
/// A generated key that collides with an existing license is discarded and
/// another one drawn, up to `licensing.key_generation_attempts` times.
pub fn provision_client_with<G>(
    db: &mut LicenseDb,
    licensing: &LicensingConfig,
    email: &str,
    name: &str,
    max_devices: Option<i64>,
    mut keygen: G,
) -> Result<Client>
where
    G: FnMut() -> String,
{
    require(&[email, name])?;
    let max_devices = match max_devices {
        Some(n) => u32::try_from(n).ok().filter(|n| *n >= 1).ok_or(KeyHubError::InvalidMaxDevices)?,
        None => licensing.default_max_devices.max(1),
    };

    let tx = db.begin()?;
    if tx.client_by_email(email)?.is_some() {
        return Err(KeyHubError::ClientExists);
    }

    let attempts = licensing.key_generation_attempts.max(1);
    let mut issued = None;
    for attempt in 1..=attempts {
        let key = keygen();
        match tx.insert_license(&key, max_devices, None) {
            Ok(license_id) => {
                issued = Some((license_id, key));
                break;
            }
            Err(KeyHubError::LicenseExists) => {
                tracing::warn!("Generated key collided (attempt {attempt}/{attempts}), retrying");
            }
            Err(e) => return Err(e),
        }
    }
    let (license_id, license_key) = issued.ok_or(KeyHubError::KeyGenerationFailed(attempts))?;

    let client_id = tx.insert_client(email, name, &license_key)?;
    tx.link_client(&license_id, &client_id)?;
    tx.log_event("client_provisioned", "admin", &client_id, Some(format!("email={email} key={license_key}").as_str()))?;
    tx.commit()?;

    tracing::info!("Provisioned client {email} with license {license_key}");
    db.client_by_email(email)?
        .ok_or_else(|| KeyHubError::storage("provisioned client vanished"))
}

pub fn list_clients(db: &LicenseDb) -> Result<Vec<Client>> {
    db.list_clients()
}

/// Enable or disable a client's ability to register.
pub fn set_client_active(db: &mut LicenseDb, email: &str, is_active: bool) -> Result<()> {
    require(&[email])?;
    let tx = db.begin()?;
    if !tx.set_client_active(email, is_active)? {
        return Err(KeyHubError::ClientNotFound);
    }
    tx.log_event("client_status_changed", "admin", email, Some(format!("is_active={is_active}").as_str()))?;
    tx.commit()?;
    Ok(())
}
