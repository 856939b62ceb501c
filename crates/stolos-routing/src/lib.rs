//! Public hostname resolution for project services.
//!
//! Every project owns a public base URL (`host[:port]`, no scheme). Services
//! and their container ports are exposed under hostnames derived from that
//! base, either as a subdomain (`web-80.proj.example.com`) or by suffixing the
//! first label (`proj-web-80.example.com`) when the edge cannot serve nested
//! wildcard certificates.
//!
//! Resolution is pure: no I/O, no configuration lookups.

/// Errors reported by [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    /// Label-suffix routing needs a base URL with at least one `.`.
    #[error("public URL '{0}' has no '.' to split a subdomain from")]
    UndottedBase(String),
}

/// Build the routing token for a service and optional port.
pub fn token(service: &str, port: Option<u16>) -> String {
    match port {
        Some(port) => format!("{}-{}", service, port),
        None => service.to_string(),
    }
}

/// Resolve the public hostname for `service` (and optionally one of its ports).
///
/// - No service: the base URL is returned unchanged; a port alone is ignored.
/// - `use_subdomains`: `"{token}.{base_url}"`.
/// - Otherwise the base is split at its first `.` into `(subdomain, rest)` and
///   the result is `"{subdomain}-{token}.{rest}"`.
pub fn resolve(
    base_url: &str,
    use_subdomains: bool,
    service: Option<&str>,
    port: Option<u16>,
) -> Result<String, RoutingError> {
    let service = match service {
        Some(s) => s,
        None => return Ok(base_url.to_string()),
    };
    let token = token(service, port);

    if use_subdomains {
        return Ok(format!("{}.{}", token, base_url));
    }

    let (subdomain, rest) = base_url
        .split_once('.')
        .ok_or_else(|| RoutingError::UndottedBase(base_url.to_string()))?;
    Ok(format!("{}-{}.{}", subdomain, token, rest))
}

/// Whether `base_url` satisfies the precondition of label-suffix routing.
pub fn supports_label_routing(base_url: &str) -> bool {
    base_url.contains('.')
}
