//! OAuth 2.0 MAC request signing (HMAC-SHA1).
//!
//! The signed base string is
//!
//! ```text
//! <ts>\n<nonce>\n<METHOD>\n<path?query>\n<host>\n<port>\n\n
//! ```
//!
//! and the header sent is
//! `MAC id="<token>",ts="<ts>",nonce="<nonce>",mac="<base64 mac>"`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::Rng;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use sha1::Sha1;
use tracing::trace;

use crate::Result;
use crate::auth::{AccessToken, MacKey};
use crate::error::InvalidInputError;
use crate::request::RequestDescriptor;

type HmacSha1 = Hmac<Sha1>;

/// A fresh nonce: `n` followed by a number in 0..=10000.
pub fn generate_nonce() -> String {
    format!("n{}", rand::thread_rng().gen_range(0..=10000))
}

/// The newline-joined string the MAC is computed over.
pub fn base_string(
    timestamp: i64,
    nonce: &str,
    verb: &str,
    path: &str,
    host: &str,
    port: u16,
) -> String {
    format!("{timestamp}\n{nonce}\n{verb}\n{path}\n{host}\n{port}\n\n")
}

/// Base64 HMAC-SHA1 of `message` under `key`.
pub fn hmac_sha1_base64(key: &str, message: &str) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).map_err(|e| InvalidInputError::Other {
        message: format!("unusable MAC key: {e}"),
    })?;
    mac.update(message.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build the `Authorization` header value for one request.
///
/// `host_with_port` may carry an explicit `:port`; without one the port is
/// 443 for https and 80 otherwise.
#[allow(clippy::too_many_arguments)]
pub fn generate_mac(
    verb: &str,
    access_token: &AccessToken,
    mac_key: &MacKey,
    host_with_port: &str,
    path: &str,
    secure: bool,
    timestamp: i64,
    nonce: &str,
) -> Result<String> {
    let (host, port) = match host_with_port.split_once(':') {
        Some((host, port)) => (host, port.parse().unwrap_or(if secure { 443 } else { 80 })),
        None => (host_with_port, if secure { 443 } else { 80 }),
    };

    let base = base_string(timestamp, nonce, verb, path, host, port);
    trace!(base = %base.escape_debug(), "MAC base string");
    let mac = hmac_sha1_base64(mac_key.as_str(), &base)?;

    Ok(format!(
        r#"MAC id="{}",ts="{}",nonce="{}",mac="{}""#,
        access_token.as_str(),
        timestamp,
        nonce,
        mac
    ))
}

/// Sign a prepared request with the current time and a fresh nonce,
/// replacing any previous Authorization header.
pub fn sign_request(
    request: &mut RequestDescriptor,
    access_token: &AccessToken,
    mac_key: &MacKey,
) -> Result<()> {
    let host = request
        .url
        .host_str()
        .ok_or_else(|| InvalidInputError::Url {
            value: request.url.to_string(),
            reason: "URL has no host".to_string(),
        })?;
    let host_with_port = match request.url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let secure = request.url.scheme() == "https";

    let header = generate_mac(
        request.verb.as_str(),
        access_token,
        mac_key,
        &host_with_port,
        &request.path_and_query(),
        secure,
        Utc::now().timestamp(),
        &generate_nonce(),
    )?;

    let value = HeaderValue::from_str(&header).map_err(|_| InvalidInputError::Header {
        name: AUTHORIZATION.to_string(),
    })?;
    request.headers.insert(AUTHORIZATION, value);
    Ok(())
}
