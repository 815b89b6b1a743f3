//! Request authentication helpers
//!
//! The HTTP shim calls these before dispatching into the facade:
//! api-key check (401 when missing, 403 when wrong), origin allow-list
//! with `*.` wildcards, and the body-size cap. All string comparisons of
//! credentials are constant-time.

use crate::config::AppConfig;
use matchday_core::error::{Error, Result};
use matchday_engine::leagues::constant_time_eq;

/// Check the `x-api-key` header value
pub fn verify_api_key(config: &AppConfig, presented: Option<&str>) -> Result<()> {
    let Some(presented) = presented else {
        return Err(Error::unauthenticated("missing api key"));
    };
    if constant_time_eq(config.api_key.as_bytes(), presented.as_bytes()) {
        Ok(())
    } else {
        Err(Error::forbidden("invalid api key"))
    }
}

/// Does an origin match one allow-list pattern?
///
/// `*.example.com` matches any single-or-deeper subdomain of
/// `example.com` but not the apex itself; all other patterns match
/// exactly.
pub fn origin_matches(pattern: &str, origin: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(suffix) => {
            // scheme-aware: "*.example.com" should match
            // "https://foo.example.com"
            let host = origin.split("://").last().unwrap_or(origin);
            host.ends_with(suffix)
                && host.len() > suffix.len()
                && host.as_bytes()[host.len() - suffix.len() - 1] == b'.'
        }
        None => pattern == origin,
    }
}

/// Check the `Origin` header against the configured allow-list.
///
/// An empty allow-list admits everything (local development).
pub fn check_origin(config: &AppConfig, origin: Option<&str>) -> Result<()> {
    if config.allowed_origins.is_empty() {
        return Ok(());
    }
    let Some(origin) = origin else {
        return Err(Error::forbidden("missing origin"));
    };
    if config
        .allowed_origins
        .iter()
        .any(|pattern| origin_matches(pattern, origin))
    {
        Ok(())
    } else {
        Err(Error::forbidden(format!("origin {origin:?} is not allowed")))
    }
}

/// Enforce the request body cap before reading the body
pub fn check_body_size(config: &AppConfig, declared_len: usize) -> Result<()> {
    if declared_len > config.body_size_limit {
        return Err(Error::BodyTooLarge {
            limit: config.body_size_limit,
            actual: declared_len,
        });
    }
    Ok(())
}
