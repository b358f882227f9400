use anyhow::{bail, Context};
use skyline_protocol::{nsid, xrpc_url, AuthState, CreateSessionRequest, SessionTokens, XrpcError};
use tracing::info;

use crate::config::SessionConfig;

pub const IDENTIFIER_VAR: &str = "SKYLINE_IDENTIFIER";
pub const PASSWORD_VAR: &str = "SKYLINE_PASSWORD";

/// Credentials from `SKYLINE_IDENTIFIER` / `SKYLINE_PASSWORD`, when both are set.
pub fn credentials_from_env() -> Option<CreateSessionRequest> {
    let identifier = std::env::var(IDENTIFIER_VAR).ok().filter(|v| !v.is_empty())?;
    let password = std::env::var(PASSWORD_VAR).ok().filter(|v| !v.is_empty())?;
    Some(CreateSessionRequest {
        identifier,
        password,
    })
}

/// `com.atproto.server.createSession`.
pub async fn create_session(
    client: &reqwest::Client,
    service_url: &str,
    request: &CreateSessionRequest,
) -> anyhow::Result<SessionTokens> {
    let url = xrpc_url(service_url, nsid::CREATE_SESSION);
    let response = client
        .post(&url)
        .json(request)
        .send()
        .await
        .with_context(|| format!("sending createSession to {url}"))?;
    let status = response.status();
    if !status.is_success() {
        match response.json::<XrpcError>().await {
            Ok(err) => bail!("createSession failed ({status}): {}: {}", err.error, err.message),
            Err(_) => bail!("createSession failed ({status})"),
        }
    }
    response
        .json::<SessionTokens>()
        .await
        .context("decoding createSession response")
}

/// Create a session when credentials are configured.
///
/// The tokens are not used by ingestion; a configured but failing login is
/// still a startup error.
pub async fn bootstrap(config: &SessionConfig) -> anyhow::Result<AuthState> {
    let Some(request) = credentials_from_env() else {
        info!("no credentials configured, running anonymously");
        return Ok(AuthState::Anonymous);
    };
    let client = reqwest::Client::builder()
        .user_agent(concat!("skyline/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")?;
    let tokens = create_session(&client, &config.service_url, &request).await?;
    info!(handle = %tokens.handle, did = %tokens.did, "session created");
    Ok(AuthState::Session(tokens))
}
