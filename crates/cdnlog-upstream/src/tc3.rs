//! TC3-HMAC-SHA256 request signing
//!
//! Every cloud API call is a JSON `POST /` whose signature covers the
//! `content-type` and `host` headers plus the SHA-256 of the payload. The
//! signing key is derived per day and per service, so the string to sign
//! carries a credential scope of `{date}/{service}/tc3_request`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

pub const ALGORITHM: &str = "TC3-HMAC-SHA256";
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";
const SIGNED_HEADERS: &str = "content-type;host";

type HmacSha256 = Hmac<Sha256>;

/// Inputs of one signature
#[derive(Debug, Clone, Copy)]
pub struct SigningRequest<'a> {
    pub service: &'a str,
    pub host: &'a str,
    pub payload: &'a [u8],
    pub timestamp: DateTime<Utc>,
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub fn canonical_request(host: &str, payload: &[u8]) -> String {
    format!(
        "POST\n/\n\ncontent-type:{}\nhost:{}\n\n{}\n{}",
        CONTENT_TYPE,
        host,
        SIGNED_HEADERS,
        sha256_hex(payload)
    )
}

pub fn credential_scope(date: &str, service: &str) -> String {
    format!("{}/{}/tc3_request", date, service)
}

pub fn string_to_sign(request: &SigningRequest<'_>) -> String {
    let date = request.timestamp.format("%Y-%m-%d").to_string();
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        request.timestamp.timestamp(),
        credential_scope(&date, request.service),
        sha256_hex(canonical_request(request.host, request.payload).as_bytes())
    )
}

/// Hex signature for `request` with `secret_key`
pub fn signature(secret_key: &str, request: &SigningRequest<'_>) -> String {
    let date = request.timestamp.format("%Y-%m-%d").to_string();
    let secret_date = hmac_sha256(format!("TC3{}", secret_key).as_bytes(), date.as_bytes());
    let secret_service = hmac_sha256(&secret_date, request.service.as_bytes());
    let secret_signing = hmac_sha256(&secret_service, b"tc3_request");
    hex::encode(hmac_sha256(
        &secret_signing,
        string_to_sign(request).as_bytes(),
    ))
}

/// Value of the `Authorization` header
pub fn authorization(secret_id: &str, secret_key: &str, request: &SigningRequest<'_>) -> String {
    let date = request.timestamp.format("%Y-%m-%d").to_string();
    format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM,
        secret_id,
        credential_scope(&date, request.service),
        SIGNED_HEADERS,
        signature(secret_key, request)
    )
}
