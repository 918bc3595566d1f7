//! HTTP client construction
//!
//! Every artifact download goes through a client built here, so every request
//! carries the same identifying user agent and the same bounded timeout.

use crate::config::UserAgentConfig;
use crate::proxy::ProxyEndpoint;
use reqwest::{Client, Proxy};
use std::time::Duration;

/// Builds an HTTP client, optionally routed through one proxy endpoint
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Upper bound on a whole request, body included
/// * `proxy` - Egress proxy, or `None` for a direct connection
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use sumi_docket::config::UserAgentConfig;
/// use sumi_docket::fetcher::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "SumiDocket".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(120), None).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
    proxy: Option<&ProxyEndpoint>,
) -> Result<Client, reqwest::Error> {
    let builder = Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    let builder = match proxy {
        Some(endpoint) => builder.proxy(Proxy::all(endpoint.url())?),
        // Ignore proxy environment variables for direct clients
        None => builder.no_proxy(),
    };

    builder.build()
}
