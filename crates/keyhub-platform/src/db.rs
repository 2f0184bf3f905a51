//! License database — SQLite schema for users, clients, licenses and devices.
//!
//! Reads are available on both [`LicenseDb`] and an open [`Tx`] through the
//! [`Queries`] trait. Writes only exist on [`Tx`], so every mutation happens
//! inside a transaction that the caller commits.

use keyhub_core::error::{KeyHubError, Result};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// License database handle.
pub struct LicenseDb {
    conn: Connection,
}

/// User record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: String,
    pub created_at: String,
}

/// Provisioned customer record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub email: String,
    pub name: String,
    pub license_key: String,
    pub is_active: bool,
    pub created_at: String,
}

/// License with its bound devices, in activation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub license_key: String,
    pub max_devices: u32,
    pub devices: Vec<String>,
    pub user_id: Option<String>,
    pub client_id: Option<String>,
    pub created_at: String,
}

impl License {
    pub fn has_device(&self, machine_id: &str) -> bool {
        self.devices.iter().any(|d| d == machine_id)
    }

    /// No free device slot left.
    pub fn is_full(&self) -> bool {
        self.devices.len() >= self.max_devices as usize
    }
}

/// Row of the admin license listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseListing {
    pub email: Option<String>,
    pub license_key: String,
    pub max_devices: u32,
    pub devices: Vec<String>,
}

/// Audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub event_type: String,
    pub actor_type: String,
    pub actor_id: String,
    pub details: Option<String>,
    pub created_at: String,
}

fn storage(context: &'static str) -> impl FnOnce(rusqlite::Error) -> KeyHubError {
    move |e| KeyHubError::storage(format!("{context}: {e}"))
}

/// Map a UNIQUE / PRIMARY KEY violation to `conflict`, anything else to a storage error.
fn unique_or(conflict: KeyHubError, context: &'static str) -> impl FnOnce(rusqlite::Error) -> KeyHubError {
    move |e| {
        if is_unique_violation(&e) {
            conflict
        } else {
            KeyHubError::storage(format!("{context}: {e}"))
        }
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?, email: row.get(1)?, password_hash: row.get(2)?,
        role: row.get(3)?, created_at: row.get(4)?,
    })
}

fn client_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?, email: row.get(1)?, name: row.get(2)?,
        license_key: row.get(3)?, is_active: row.get::<_, i32>(4)? != 0, created_at: row.get(5)?,
    })
}

fn devices_of(conn: &Connection, license_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT machine_id FROM license_devices WHERE license_id=?1 ORDER BY rowid")
        .map_err(storage("Prepare devices"))?;
    let devices = stmt
        .query_map(params![license_id], |row| row.get::<_, String>(0))
        .map_err(storage("Query devices"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(storage("Read devices"))?;
    Ok(devices)
}

/// Read-only queries shared by [`LicenseDb`] and [`Tx`].
pub trait Queries {
    fn conn(&self) -> &Connection;

    /// Look up a user by email.
    fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                "SELECT id, email, password_hash, role, created_at FROM users WHERE email=?1",
                params![email],
                user_from_row,
            )
            .optional()
            .map_err(storage("Get user"))
    }

    /// List all users, newest first.
    fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, email, password_hash, role, created_at FROM users ORDER BY created_at DESC, rowid DESC"
        ).map_err(storage("Prepare"))?;
        let users = stmt.query_map([], user_from_row).map_err(storage("Query"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage("Read users"))?;
        Ok(users)
    }

    /// Look up a license and its devices by key.
    fn license_by_key(&self, license_key: &str) -> Result<Option<License>> {
        let row = self.conn()
            .query_row(
                "SELECT id, license_key, max_devices, user_id, client_id, created_at FROM licenses WHERE license_key=?1",
                params![license_key],
                |row| Ok(License {
                    id: row.get(0)?, license_key: row.get(1)?, max_devices: row.get(2)?,
                    devices: Vec::new(), user_id: row.get(3)?, client_id: row.get(4)?,
                    created_at: row.get(5)?,
                }),
            )
            .optional()
            .map_err(storage("Get license"))?;

        match row {
            Some(mut license) => {
                license.devices = devices_of(self.conn(), &license.id)?;
                Ok(Some(license))
            }
            None => Ok(None),
        }
    }

    /// Every license with its owner's email, oldest first.
    fn list_licenses(&self) -> Result<Vec<LicenseListing>> {
        let mut stmt = self.conn().prepare(
            "SELECT l.id, u.email, l.license_key, l.max_devices
             FROM licenses l LEFT JOIN users u ON u.id = l.user_id
             ORDER BY l.created_at, l.rowid"
        ).map_err(storage("Prepare"))?;

        let rows = stmt.query_map([], |row| Ok((
            row.get::<_, String>(0)?,
            LicenseListing {
                email: row.get(1)?, license_key: row.get(2)?, max_devices: row.get(3)?,
                devices: Vec::new(),
            },
        ))).map_err(storage("Query"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage("Read licenses"))?;

        rows.into_iter()
            .map(|(id, mut listing)| -> Result<LicenseListing> {
                listing.devices = devices_of(self.conn(), &id)?;
                Ok(listing)
            })
            .collect()
    }

    fn client_by_email(&self, email: &str) -> Result<Option<Client>> {
        self.conn()
            .query_row(
                "SELECT id, email, name, license_key, is_active, created_at FROM clients WHERE email=?1",
                params![email],
                client_from_row,
            )
            .optional()
            .map_err(storage("Get client"))
    }

    /// List all clients, newest first.
    fn list_clients(&self) -> Result<Vec<Client>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, email, name, license_key, is_active, created_at FROM clients ORDER BY created_at DESC, rowid DESC"
        ).map_err(storage("Prepare"))?;
        let clients = stmt.query_map([], client_from_row).map_err(storage("Query"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage("Read clients"))?;
        Ok(clients)
    }

    /// Get recent audit entries, newest first.
    fn recent_events(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, event_type, actor_type, actor_id, details, created_at FROM audit_log ORDER BY id DESC LIMIT ?1"
        ).map_err(storage("Prepare"))?;

        let entries = stmt.query_map(params![limit as i64], |row| Ok(AuditEntry {
            id: row.get(0)?, event_type: row.get(1)?, actor_type: row.get(2)?,
            actor_id: row.get(3)?, details: row.get(4)?, created_at: row.get(5)?,
        })).map_err(storage("Query"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage("Read events"))?;
        Ok(entries)
    }
}

impl LicenseDb {
    /// Open or create the license database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| KeyHubError::storage(format!("Create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path).map_err(storage("DB open error"))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage("DB open error"))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Run schema migrations.
    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                created_at TEXT DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS clients (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                license_key TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS licenses (
                id TEXT PRIMARY KEY,
                license_key TEXT UNIQUE NOT NULL,
                max_devices INTEGER NOT NULL DEFAULT 1 CHECK (max_devices > 0),
                user_id TEXT REFERENCES users(id) ON DELETE CASCADE,
                client_id TEXT REFERENCES clients(id) ON DELETE SET NULL,
                created_at TEXT DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_licenses_user ON licenses(user_id);

            CREATE TABLE IF NOT EXISTS license_devices (
                license_id TEXT NOT NULL REFERENCES licenses(id) ON DELETE CASCADE,
                machine_id TEXT NOT NULL,
                activated_at TEXT DEFAULT (datetime('now')),
                PRIMARY KEY (license_id, machine_id)
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                actor_type TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                details TEXT,
                created_at TEXT DEFAULT (datetime('now'))
            );
        ").map_err(storage("Migration error"))?;
        Ok(())
    }

    /// Begin a write transaction.
    ///
    /// `IMMEDIATE` takes the write lock up front, so a read-check-write
    /// sequence inside the transaction cannot race another writer.
    pub fn begin(&mut self) -> Result<Tx<'_>> {
        let inner = self.conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage("Begin transaction"))?;
        Ok(Tx { inner })
    }
}

impl Queries for LicenseDb {
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// An open write transaction. Dropped without [`Tx::commit`] it rolls back.
pub struct Tx<'a> {
    inner: Transaction<'a>,
}

impl Queries for Tx<'_> {
    fn conn(&self) -> &Connection {
        &self.inner
    }
}

impl Tx<'_> {
    pub fn commit(self) -> Result<()> {
        self.inner.commit().map_err(storage("Commit"))
    }

    // ── Users ────────────────────────────────────

    /// Insert a user; `EmailExists` on a duplicate email.
    pub fn insert_user(&self, email: &str, password_hash: &str, role: &str) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.inner.execute(
            "INSERT INTO users (id, email, password_hash, role) VALUES (?1,?2,?3,?4)",
            params![id, email, password_hash, role],
        ).map_err(unique_or(KeyHubError::EmailExists, "Create user"))?;
        Ok(id)
    }

    /// Delete a user and every license it owns. Returns the number of licenses removed.
    pub fn delete_user(&self, user_id: &str) -> Result<usize> {
        let licenses = self.inner
            .execute("DELETE FROM licenses WHERE user_id=?1", params![user_id])
            .map_err(storage("Delete licenses"))?;
        self.inner
            .execute("DELETE FROM users WHERE id=?1", params![user_id])
            .map_err(storage("Delete user"))?;
        Ok(licenses)
    }

    // ── Licenses ────────────────────────────────────

    /// Insert a license; `LicenseExists` on a duplicate key.
    pub fn insert_license(&self, license_key: &str, max_devices: u32, client_id: Option<&str>) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.inner.execute(
            "INSERT INTO licenses (id, license_key, max_devices, client_id) VALUES (?1,?2,?3,?4)",
            params![id, license_key, max_devices, client_id],
        ).map_err(unique_or(KeyHubError::LicenseExists, "Insert license"))?;
        Ok(id)
    }

    pub fn add_device(&self, license_id: &str, machine_id: &str) -> Result<()> {
        self.inner.execute(
            "INSERT INTO license_devices (license_id, machine_id) VALUES (?1,?2)",
            params![license_id, machine_id],
        ).map_err(storage("Add device"))?;
        Ok(())
    }

    /// Set the owner of an unowned license. Returns false if it already had one.
    pub fn bind_owner(&self, license_id: &str, user_id: &str) -> Result<bool> {
        let changed = self.inner.execute(
            "UPDATE licenses SET user_id=?1 WHERE id=?2 AND user_id IS NULL",
            params![user_id, license_id],
        ).map_err(storage("Bind owner"))?;
        Ok(changed == 1)
    }

    pub fn link_client(&self, license_id: &str, client_id: &str) -> Result<()> {
        self.inner.execute(
            "UPDATE licenses SET client_id=?1 WHERE id=?2",
            params![client_id, license_id],
        ).map_err(storage("Link client"))?;
        Ok(())
    }

    // ── Clients ────────────────────────────────────

    /// Insert a client; `ClientExists` on a duplicate email.
    pub fn insert_client(&self, email: &str, name: &str, license_key: &str) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.inner.execute(
            "INSERT INTO clients (id, email, name, license_key) VALUES (?1,?2,?3,?4)",
            params![id, email, name, license_key],
        ).map_err(unique_or(KeyHubError::ClientExists, "Insert client"))?;
        Ok(id)
    }

    /// Returns false when no client has that email.
    pub fn set_client_active(&self, email: &str, is_active: bool) -> Result<bool> {
        let changed = self.inner.execute(
            "UPDATE clients SET is_active=?1 WHERE email=?2",
            params![is_active as i32, email],
        ).map_err(storage("Update client"))?;
        Ok(changed == 1)
    }

    // ── Audit Log ────────────────────────────────────

    /// Log an audit event as part of this transaction.
    pub fn log_event(&self, event_type: &str, actor_type: &str, actor_id: &str, details: Option<&str>) -> Result<()> {
        self.inner.execute(
            "INSERT INTO audit_log (event_type, actor_type, actor_id, details) VALUES (?1,?2,?3,?4)",
            params![event_type, actor_type, actor_id, details],
        ).map_err(storage("Log event"))?;
        Ok(())
    }
}
