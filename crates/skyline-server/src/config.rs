use std::net::{Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

/// `[server]` section of the configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Page size when the request names none.
    pub default_limit: usize,
    /// Upper bound on any requested page size.
    pub max_limit: usize,
    /// DID this feed generator is published under.
    pub service_did: String,
    /// `at://` URI of the feed generator record. When set, requests for any
    /// other feed are rejected.
    pub feed_uri: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 4000)),
            default_limit: 50,
            max_limit: 100,
            service_did: "did:web:localhost".into(),
            feed_uri: None,
        }
    }
}

impl ServerConfig {
    /// Page size for a request asking for `requested`, always at least one.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        let max = self.max_limit.max(1);
        requested.unwrap_or(self.default_limit).clamp(1, max)
    }
}
