//! Address handling for directory endpoints.

use edge_config::{LocalServices, AUTHORIZER_SERVICE, DEFAULT_LOCAL_ADDRESS, WRITER_SERVICE};
use url::Url;

use crate::error::{DirectoryError, DirectoryResult};

/// Path prefix every directory call lives under.
pub const API_PREFIX: &str = "api/v3/directory/";

/// Turn a `host:port` (or full URL) into the directory API base URL.
///
/// Bare addresses are assumed to speak TLS.
pub fn base_url(address: &str) -> DirectoryResult<Url> {
    let address = address.trim();
    if address.is_empty() {
        return Err(DirectoryError::InvalidAddress("address is empty".to_string()));
    }

    let raw = if address.contains("://") {
        address.to_string()
    } else {
        format!("https://{}", address)
    };

    let mut url = Url::parse(&raw)
        .map_err(|e| DirectoryError::InvalidAddress(format!("{}: {}", address, e)))?;
    if url.host_str().is_none() {
        return Err(DirectoryError::InvalidAddress(format!("{}: missing host", address)));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    url.join(API_PREFIX)
        .map_err(|e| DirectoryError::InvalidAddress(format!("{}: {}", address, e)))
}

/// `host:port` used for the TCP reachability probe.
pub fn socket_address(url: &Url) -> DirectoryResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| DirectoryError::InvalidAddress(format!("{}: missing host", url)))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| DirectoryError::InvalidAddress(format!("{}: missing port", url)))?;
    Ok(format!("{}:{}", host, port))
}

/// Pick the local store listener that accepts writes.
///
/// Prefers a dedicated writer listener, then an authorizer listener that
/// also hosts the writer role, then the built-in default.
pub fn resolve_local_address(local: &LocalServices) -> String {
    let usable = |addr: &str| !addr.trim().is_empty();

    if let Some(writer) = local.services.get(WRITER_SERVICE) {
        if usable(&writer.listen_address) {
            return writer.listen_address.clone();
        }
    }

    if let Some(authorizer) = local.services.get(AUTHORIZER_SERVICE) {
        if authorizer.hosts_role(WRITER_SERVICE) && usable(&authorizer.listen_address) {
            return authorizer.listen_address.clone();
        }
    }

    DEFAULT_LOCAL_ADDRESS.to_string()
}
