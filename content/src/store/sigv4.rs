//! AWS Signature Version 4 for S3.
//!
//! Two signing modes:
//! - [`sign_request`]: `Authorization` header for HEAD/GET/PUT issued by the store.
//! - [`presign`]: query-string signature for credential-free read URLs.
//!
//! Paths passed in must already be URI-encoded with [`uri_encode`].

use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
/// Longest lifetime S3 accepts for a presigned URL (7 days).
pub const MAX_PRESIGN_SECS: u64 = 604_800;

/// Static or temporary (session) credentials.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Percent-encode per the SigV4 rules: everything except `A-Z a-z 0-9 - _ . ~`
/// (and `/` when `encode_slash` is false).
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any length");
    mac.update(data.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn signing_key(secret: &str, date: &str, region: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date);
    let k_region = hmac_sha256(&k_date, region);
    let k_service = hmac_sha256(&k_region, SERVICE);
    hmac_sha256(&k_service, "aws4_request")
}

struct Timestamp {
    /// `20130524T000000Z`
    amz_date: String,
    /// `20130524`
    date: String,
}

impl Timestamp {
    fn new(time: DateTime<Utc>) -> Self {
        Self {
            amz_date: time.format("%Y%m%dT%H%M%SZ").to_string(),
            date: time.format("%Y%m%d").to_string(),
        }
    }

    fn scope(&self, region: &str) -> String {
        format!("{}/{region}/{SERVICE}/aws4_request", self.date)
    }
}

/// Canonical query string: encoded pairs sorted by key, then value.
fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Returns `(signature, signed_headers)`.
#[allow(clippy::too_many_arguments)]
fn signature(
    credentials: &Credentials,
    region: &str,
    ts: &Timestamp,
    method: &str,
    path: &str,
    query: &str,
    headers: &[(String, String)],
    payload_hash: &str,
) -> (String, String) {
    let mut headers: Vec<(String, String)> = headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    headers.sort();

    let canonical_headers: String = headers.iter().map(|(k, v)| format!("{k}:{v}\n")).collect();
    let signed_headers = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{method}\n{path}\n{query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{}\n{}\n{}",
        ts.amz_date,
        ts.scope(region),
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(&credentials.secret_access_key, &ts.date, region);
    (
        hex::encode(hmac_sha256(&key, &string_to_sign)),
        signed_headers,
    )
}

/// Sign a request in header mode.
///
/// `extra_headers` are signed alongside `host`, `x-amz-date` and
/// `x-amz-content-sha256`. Returns the headers the caller must attach
/// (everything except `host`, which the HTTP client sets).
#[allow(clippy::too_many_arguments)]
pub fn sign_request(
    credentials: &Credentials,
    region: &str,
    method: &str,
    host: &str,
    path: &str,
    extra_headers: &[(&str, &str)],
    payload_hash: &str,
    time: DateTime<Utc>,
) -> Vec<(String, String)> {
    let ts = Timestamp::new(time);

    let mut to_attach = vec![
        ("x-amz-content-sha256".to_string(), payload_hash.to_string()),
        ("x-amz-date".to_string(), ts.amz_date.clone()),
    ];
    if let Some(token) = &credentials.session_token {
        to_attach.push(("x-amz-security-token".to_string(), token.clone()));
    }
    for (k, v) in extra_headers {
        to_attach.push((k.to_string(), v.to_string()));
    }

    let mut signed = to_attach.clone();
    signed.push(("host".to_string(), host.to_string()));

    let (sig, signed_headers) = signature(
        credentials,
        region,
        &ts,
        method,
        path,
        "",
        &signed,
        payload_hash,
    );

    to_attach.push((
        "authorization".to_string(),
        format!(
            "{ALGORITHM} Credential={}/{}, SignedHeaders={signed_headers}, Signature={sig}",
            credentials.access_key_id,
            ts.scope(region)
        ),
    ));
    to_attach
}

/// Build the signed query string for a presigned URL valid for `expires_secs`.
pub fn presign(
    credentials: &Credentials,
    region: &str,
    method: &str,
    host: &str,
    path: &str,
    expires_secs: u64,
    time: DateTime<Utc>,
) -> String {
    let ts = Timestamp::new(time);

    let mut params = vec![
        ("X-Amz-Algorithm".to_string(), ALGORITHM.to_string()),
        (
            "X-Amz-Credential".to_string(),
            format!("{}/{}", credentials.access_key_id, ts.scope(region)),
        ),
        ("X-Amz-Date".to_string(), ts.amz_date.clone()),
        ("X-Amz-Expires".to_string(), expires_secs.to_string()),
        ("X-Amz-SignedHeaders".to_string(), "host".to_string()),
    ];
    if let Some(token) = &credentials.session_token {
        params.push(("X-Amz-Security-Token".to_string(), token.clone()));
    }
    let query = canonical_query(&params);

    let (sig, _) = signature(
        credentials,
        region,
        &ts,
        method,
        path,
        &query,
        &[("host".to_string(), host.to_string())],
        UNSIGNED_PAYLOAD,
    );
    format!("{query}&X-Amz-Signature={sig}")
}
