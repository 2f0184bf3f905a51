//! # KeyHub Platform
//!
//! License store and the rules around it: device-bounded activation with
//! one-time owner binding, status checks, client provisioning, registration,
//! login and the administrative operations. Every mutation runs inside a
//! single SQLite transaction.

pub mod accounts;
pub mod auth;
pub mod db;
pub mod licensing;

pub use auth::TokenIssuer;
pub use db::{LicenseDb, Queries};
