use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, StatusCode};
use tracing::debug;

use super::sigv4::{self, Credentials};
use super::{ContentStore, StoreError};

/// Connection settings for an S3-compatible bucket.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint (MinIO, LocalStack, R2). When set, requests use
    /// path-style addressing; otherwise AWS virtual-hosted addressing.
    pub endpoint: Option<String>,
    pub credentials: Credentials,
    pub request_timeout: Duration,
}

/// Where a key lives on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ObjectLocation {
    scheme: String,
    /// Host header value, including a non-default port.
    host: String,
    /// URI-encoded absolute path.
    path: String,
}

impl ObjectLocation {
    fn url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }
}

/// [`ContentStore`] backed by S3 (or any S3-compatible service).
pub struct S3ContentStore {
    config: S3Config,
    http: reqwest::Client,
}

impl S3ContentStore {
    pub fn new(config: S3Config) -> Result<Self, StoreError> {
        if config.bucket.trim().is_empty() {
            return Err(StoreError::Config("bucket name is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StoreError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    fn locate(&self, key: &str) -> Result<ObjectLocation, StoreError> {
        let encoded_key = sigv4::uri_encode(key, false);
        match &self.config.endpoint {
            None => Ok(ObjectLocation {
                scheme: "https".into(),
                host: format!(
                    "{}.s3.{}.amazonaws.com",
                    self.config.bucket, self.config.region
                ),
                path: format!("/{encoded_key}"),
            }),
            Some(endpoint) => {
                let url = reqwest::Url::parse(endpoint).map_err(|e| {
                    StoreError::Config(format!("invalid S3 endpoint {endpoint}: {e}"))
                })?;
                let host = url.host_str().ok_or_else(|| {
                    StoreError::Config(format!("S3 endpoint {endpoint} has no host"))
                })?;
                let host = match url.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_string(),
                };
                Ok(ObjectLocation {
                    scheme: url.scheme().to_string(),
                    host,
                    path: format!(
                        "/{}/{encoded_key}",
                        sigv4::uri_encode(&self.config.bucket, true)
                    ),
                })
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        key: &str,
        body: Option<Vec<u8>>,
        extra_headers: &[(&str, &str)],
    ) -> Result<reqwest::Response, StoreError> {
        let location = self.locate(key)?;
        let payload_hash = sigv4::sha256_hex(body.as_deref().unwrap_or_default());
        let signed = sigv4::sign_request(
            &self.config.credentials,
            &self.config.region,
            method.as_str(),
            &location.host,
            &location.path,
            &[],
            &payload_hash,
            Utc::now(),
        );

        let mut request = self.http.request(method.clone(), location.url());
        for (name, value) in signed {
            request = request.header(name, value);
        }
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        debug!(method = %method, key, bucket = %self.config.bucket, "S3 request");
        request.send().await.map_err(|e| StoreError::Request {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    async fn status_error(key: &str, response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StoreError::Status {
            key: key.to_string(),
            status,
            body,
        }
    }
}

#[async_trait]
impl ContentStore for S3ContentStore {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let response = self.send(Method::HEAD, key, None, &[]).await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            // Without s3:ListBucket a missing key answers 403 rather than 404.
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Ok(false),
            _ => Err(Self::status_error(key, response).await),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let response = self.send(Method::GET, key, None, &[]).await?;
        match response.status() {
            s if s.is_success() => response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| StoreError::Request {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(key.to_string())),
            _ => Err(Self::status_error(key, response).await),
        }
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), StoreError> {
        let response = self
            .send(
                Method::PUT,
                key,
                Some(body),
                &[("content-type", content_type), ("cache-control", cache_control)],
            )
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::status_error(key, response).await)
        }
    }

    async fn signed_read_url(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        let secs = ttl.as_secs();
        if secs == 0 || secs > sigv4::MAX_PRESIGN_SECS {
            return Err(StoreError::Config(format!(
                "presigned URL lifetime must be 1..={} seconds, got {secs}",
                sigv4::MAX_PRESIGN_SECS
            )));
        }
        let location = self.locate(key)?;
        let query = sigv4::presign(
            &self.config.credentials,
            &self.config.region,
            "GET",
            &location.host,
            &location.path,
            secs,
            Utc::now(),
        );
        Ok(format!("{}?{query}", location.url()))
    }
}
