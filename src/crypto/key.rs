//! Process-wide secret key.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::KeyError;

/// Length of every secret key in bytes.
///
/// Fixed so the transform can never see an empty key.
pub const KEY_LEN: usize = 32;

/// Immutable key shared by every relay session of one proxy instance.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Generate a fresh key from the OS random number generator.
    pub fn generate() -> Result<Self, KeyError> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Build a key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a key from its 64-character hex form.
    pub fn from_hex(encoded: &str) -> Result<Self, KeyError> {
        let decoded = hex::decode(encoded.trim())?;
        let bytes: [u8; KEY_LEN] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::Length {
                expected: KEY_LEN,
                actual: decoded.len(),
            })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Hex form, used for the startup log line.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}
