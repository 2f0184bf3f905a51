//! # KeyHub Channels
//! Outbound delivery of license keys.

pub mod email;

pub use email::{DisabledMailer, SmtpMailer, deliver_license_key, mailer_from_config};
