use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur while validating the API base URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP to a public host would expose the user id header.
    #[error("Insecure base URL: HTTPS required for public host {0}")]
    InsecurePublicHost(String),
    /// The URL has no host component.
    #[error("Base URL has no host")]
    MissingHost,
}

/// Validates the base URL the API client sends every request to.
///
/// Accepts:
/// - any `https://` URL with a host
/// - `http://` only for loopback (`localhost`, `127.0.0.1`, `::1`) and
///   private-network addresses (emulators and LAN dev servers)
///
/// A trailing slash is appended to the path so that relative endpoint paths
/// join under it instead of replacing its last segment.
///
/// # Examples
///
/// ```
/// use feedsync::util::validate_base_url;
///
/// let url = validate_base_url("http://localhost:8080/api/v1").unwrap();
/// assert_eq!(url.as_str(), "http://localhost:8080/api/v1/");
///
/// assert!(validate_base_url("http://example.com/api").is_err());
/// assert!(validate_base_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_base_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let mut url = Url::parse(url_str.trim())?;

    let host = url
        .host_str()
        .ok_or(UrlValidationError::MissingHost)?
        .to_string();

    match url.scheme() {
        "https" => {}
        "http" => {
            if !is_local_host(&host) {
                return Err(UrlValidationError::InsecurePublicHost(host));
            }
            tracing::debug!(host = %host, "Using plain HTTP base URL for local host");
        }
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

fn is_local_host(host: &str) -> bool {
    if host == "localhost" {
        return true;
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    match host_for_parse.parse::<IpAddr>() {
        Ok(ip) => ip.is_loopback() || is_private_ip(&ip),
        Err(_) => false,
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => ipv4.is_private() || ipv4.is_link_local(),
        IpAddr::V6(ipv6) => {
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}
