use std::fmt;

use serde::{Deserialize, Serialize};

/// Request body of `com.atproto.server.createSession`.
#[derive(Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub identifier: String,
    pub password: String,
}

impl fmt::Debug for CreateSessionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateSessionRequest")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Token pair returned by `createSession`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_jwt: String,
    pub refresh_jwt: String,
    pub handle: String,
    pub did: String,
}

impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("handle", &self.handle)
            .field("did", &self.did)
            .finish_non_exhaustive()
    }
}

/// Authentication state of the process towards the upstream service.
#[derive(Clone, Debug, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    Session(SessionTokens),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Session(tokens) => &tokens.handle,
        }
    }
}
