//! License key generation.
//!
//! Keys are three random 16-bit groups in upper-case hex joined by `-`,
//! e.g. `3F9A-0C1D-B7E2`. Uniqueness is the store's job.

use rand::RngCore;
use rand::rngs::OsRng;

/// Number of hex groups in a key.
pub const KEY_GROUPS: usize = 3;

/// Generate a new `XXXX-XXXX-XXXX` key from the OS CSPRNG.
pub fn generate_license_key() -> String {
    let mut bytes = [0u8; KEY_GROUPS * 2];
    OsRng.fill_bytes(&mut bytes);
    bytes
        .chunks_exact(2)
        .map(|pair| format!("{:04X}", u16::from_be_bytes([pair[0], pair[1]])))
        .collect::<Vec<_>>()
        .join("-")
}

/// Random 256-bit secret as lower-case hex, for signing keys generated at startup.
pub fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Check that a string has the shape produced by [`generate_license_key`].
pub fn is_generated_format(key: &str) -> bool {
    let groups: Vec<&str> = key.split('-').collect();
    groups.len() == KEY_GROUPS
        && groups.iter().all(|g| {
            g.len() == 4 && g.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        })
}
