use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Decentralized identifier of a repository (one per account).
///
/// A `Did` is stable for the life of an account and is the authority part of
/// every AT-URI that points into the account's repository. Only the generic
/// `did:<method>:<identifier>` shape is validated here; method-specific rules
/// (`plc`, `web`) are left to resolvers.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// Maximum length accepted for a DID string.
    pub const MAX_LEN: usize = 2048;

    /// Parse and validate a DID string.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.len() > Self::MAX_LEN {
            return Err(TypeError::InvalidDid(format!(
                "length {} exceeds {}",
                value.len(),
                Self::MAX_LEN
            )));
        }
        let Some(rest) = value.strip_prefix("did:") else {
            return Err(TypeError::InvalidDid(value));
        };
        let Some((method, identifier)) = rest.split_once(':') else {
            return Err(TypeError::InvalidDid(value));
        };
        let method_ok =
            !method.is_empty() && method.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
        let identifier_ok = !identifier.is_empty()
            && !identifier.ends_with(':')
            && identifier
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_' | b':' | b'%'));
        if !method_ok || !identifier_ok {
            return Err(TypeError::InvalidDid(value));
        }
        Ok(Self(value))
    }

    /// The DID method (`plc`, `web`, ...).
    pub fn method(&self) -> &str {
        self.0[4..].split(':').next().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Did({})", self.0)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Did {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Did {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.0
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
