//! License activation, status checks and license administration.

use keyhub_core::error::{KeyHubError, Result};
use keyhub_core::types::Activation;

use crate::db::{LicenseDb, LicenseListing, Queries};

/// Reject empty or whitespace-only request fields.
pub(crate) fn require(fields: &[&str]) -> Result<()> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(KeyHubError::MissingFields);
    }
    Ok(())
}

/// Bind `machine_id` to a license on behalf of the user registered under `email`.
///
/// A machine already on the license is reported as [`Activation::AlreadyActivated`]
/// without touching the store. Otherwise the license must have a free slot and
/// be unowned or owned by the same user; the first activation binds the owner.
pub fn activate(db: &mut LicenseDb, license_key: &str, machine_id: &str, email: &str) -> Result<Activation> {
    require(&[license_key, machine_id, email])?;

    let tx = db.begin()?;
    let user = tx.user_by_email(email)?.ok_or(KeyHubError::UnknownUser)?;
    let license = tx.license_by_key(license_key)?.ok_or(KeyHubError::InvalidLicense)?;

    if license.has_device(machine_id) {
        tracing::debug!("Machine {machine_id} already active on {license_key}");
        return Ok(Activation::AlreadyActivated);
    }

    if license.is_full() {
        return Err(KeyHubError::MaxDevicesReached);
    }

    match license.user_id.as_deref() {
        Some(owner) if owner != user.id => return Err(KeyHubError::LicenseNotOwnedByUser),
        Some(_) => {}
        None => {
            tx.bind_owner(&license.id, &user.id)?;
        }
    }

    tx.add_device(&license.id, machine_id)?;
    tx.log_event(
        "license_activated",
        "user",
        &user.id,
        Some(format!("key={license_key} machine={machine_id}").as_str()),
    )?;
    tx.commit()?;

    tracing::info!("Activated {license_key} on {machine_id} for {email}");
    Ok(Activation::LicenseActivated)
}

/// Whether `machine_id` is currently bound to the license.
pub fn status(db: &LicenseDb, license_key: &str, machine_id: &str) -> Result<bool> {
    let license = db.license_by_key(license_key)?.ok_or(KeyHubError::InvalidLicense)?;
    Ok(license.has_device(machine_id))
}

/// Create a license with an explicit key.
pub fn create_license(db: &mut LicenseDb, license_key: &str, max_devices: i64) -> Result<()> {
    require(&[license_key])?;
    let max_devices = u32::try_from(max_devices)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or(KeyHubError::InvalidMaxDevices)?;

    let tx = db.begin()?;
    tx.insert_license(license_key, max_devices, None)?;
    tx.log_event("license_created", "admin", "api", Some(format!("key={license_key} max_devices={max_devices}").as_str()))?;
    tx.commit()?;

    tracing::info!("Created license {license_key} (max_devices={max_devices})");
    Ok(())
}

pub fn list_licenses(db: &LicenseDb) -> Result<Vec<LicenseListing>> {
    db.list_licenses()
}

/// Delete a user and every license it owns. Returns the number of licenses removed.
pub fn delete_user(db: &mut LicenseDb, email: &str) -> Result<usize> {
    require(&[email])?;

    let tx = db.begin()?;
    let user = tx.user_by_email(email)?.ok_or(KeyHubError::UserNotFound)?;
    let removed = tx.delete_user(&user.id)?;
    tx.log_event("user_deleted", "admin", &user.id, Some(format!("email={email} licenses={removed}").as_str()))?;
    tx.commit()?;

    tracing::info!("Deleted user {email} and {removed} license(s)");
    Ok(removed)
}
