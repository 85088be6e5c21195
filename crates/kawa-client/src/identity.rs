//! Process-lifetime client identity.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Opaque identity token for one client process.
///
/// Generated once at startup and immutable thereafter. The token serves as
/// the catalog registration handle, the suffix of this client's private
/// channel name, and the `caw` stamp on every outbound request. Format:
/// two 6-digit segments joined by a hyphen, e.g. `123456-789012`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientGuid(String);

impl ClientGuid {
    /// Generates a fresh identity from random entropy.
    #[must_use]
    pub fn generate() -> Self {
        let entropy = Uuid::new_v4().as_u128();
        let first = (entropy & 0xFFFF_FFFF_FFFF_FFFF) % 1_000_000;
        let second = (entropy >> 64) % 1_000_000;
        Self(format!("{first:06}-{second:06}"))
    }

    /// Validates and wraps an existing identity token.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidGuid`] when the token does not match the
    /// `NNNNNN-NNNNNN` format.
    pub fn parse(raw: &str) -> Result<Self, InvalidGuid> {
        let bytes = raw.as_bytes();
        let well_formed = bytes.len() == 13
            && bytes[6] == b'-'
            && bytes[..6].iter().all(u8::is_ascii_digit)
            && bytes[7..].iter().all(u8::is_ascii_digit);
        if well_formed {
            Ok(Self(raw.to_owned()))
        } else {
            Err(InvalidGuid(raw.to_owned()))
        }
    }

    /// Returns the token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientGuid {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl AsRef<str> for ClientGuid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Error returned when an identity token is malformed.
#[derive(Debug, Error)]
#[error("invalid client GUID '{0}': expected NNNNNN-NNNNNN")]
pub struct InvalidGuid(String);
