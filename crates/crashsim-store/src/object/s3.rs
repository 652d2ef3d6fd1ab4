//! S3 `PutObject` over signed HTTP

use super::{ObjectStore, PutObject};
use crate::error::ObjectStoreError;
use crate::sigv4::{self, AwsCredentials, SigningRequest};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use std::time::Duration;

/// Bucket coordinates and credentials
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Path-style endpoint override, e.g. `http://localhost:4566`
    pub endpoint: Option<String>,
    pub credentials: AwsCredentials,
}

impl S3Config {
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        credentials: AwsCredentials,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint: None,
            credentials,
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Link reported for an uploaded object
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }

    fn target(&self, key: &str) -> Result<Target, ObjectStoreError> {
        let encoded_key = key
            .trim_start_matches('/')
            .split('/')
            .map(sigv4::percent_encode)
            .collect::<Vec<_>>()
            .join("/");

        match &self.endpoint {
            None => {
                let host = format!("{}.s3.{}.amazonaws.com", self.bucket, self.region);
                let canonical_uri = format!("/{encoded_key}");
                Ok(Target {
                    url: format!("https://{host}{canonical_uri}"),
                    host,
                    canonical_uri,
                })
            }
            Some(raw) => {
                let endpoint = Endpoint::parse(raw)?;
                let mut canonical_uri = String::new();
                for segment in &endpoint.base_path {
                    canonical_uri.push('/');
                    canonical_uri.push_str(&sigv4::percent_encode(segment));
                }
                canonical_uri.push('/');
                canonical_uri.push_str(&sigv4::percent_encode(&self.bucket));
                canonical_uri.push('/');
                canonical_uri.push_str(&encoded_key);
                Ok(Target {
                    url: format!("{}://{}{}", endpoint.scheme, endpoint.authority, canonical_uri),
                    host: endpoint.authority,
                    canonical_uri,
                })
            }
        }
    }
}

struct Target {
    url: String,
    host: String,
    canonical_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    scheme: &'static str,
    authority: String,
    base_path: Vec<String>,
}

impl Endpoint {
    fn parse(raw: &str) -> Result<Self, ObjectStoreError> {
        let invalid = || ObjectStoreError::InvalidEndpoint(raw.to_string());
        let (scheme, rest) = raw.split_once("://").ok_or_else(invalid)?;
        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "http" => "http",
            "https" => "https",
            _ => return Err(invalid()),
        };
        let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
        if authority.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            scheme,
            authority: authority.to_string(),
            base_path: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

/// Object store client for S3 and S3-compatible endpoints
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    config: S3Config,
    client: reqwest::Client,
    timeout: Duration,
}

impl S3ObjectStore {
    /// Build a client whose requests give up after `timeout`
    ///
    /// # Errors
    /// Returns [`ObjectStoreError::InvalidEndpoint`] for an unusable endpoint
    /// override, or a network error if the HTTP client cannot be built.
    pub fn new(config: S3Config, timeout: Duration) -> Result<Self, ObjectStoreError> {
        if let Some(endpoint) = &config.endpoint {
            Endpoint::parse(endpoint)?;
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ObjectStoreError::Network(e.to_string()))?;
        Ok(Self {
            config,
            client,
            timeout,
        })
    }

    #[must_use]
    pub fn config(&self) -> &S3Config {
        &self.config
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn put_object(&self, request: PutObject<'_>) -> Result<String, ObjectStoreError> {
        let key = request.key.as_str();
        let target = self.config.target(key)?;

        let mut headers = vec![
            ("content-type".to_string(), request.content_type.to_string()),
            ("x-amz-content-sha256".to_string(), request.payload_sha256.clone()),
        ];
        headers.extend(
            request
                .metadata
                .iter()
                .map(|(name, value)| (format!("x-amz-meta-{name}"), value.clone())),
        );

        let signed = sigv4::sign(
            &self.config.credentials,
            SigningRequest {
                method: "PUT",
                service: "s3",
                region: &self.config.region,
                host: &target.host,
                canonical_uri: &target.canonical_uri,
                headers,
                payload_sha256: &request.payload_sha256,
            },
            Utc::now(),
        )?;

        let mut builder = self
            .client
            .put(&target.url)
            .header("authorization", signed.authorization);
        for (name, value) in signed.headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .body(request.body.to_vec())
            .send()
            .await
            .map_err(|e| ObjectStoreError::from_reqwest(&e, self.timeout))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(bucket = %self.config.bucket, %key, "object uploaded");
            return Ok(self.config.public_url(key));
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ObjectStoreError::Auth {
                status: status.as_u16(),
            },
            StatusCode::NOT_FOUND => ObjectStoreError::NoSuchBucket {
                bucket: self.config.bucket.clone(),
            },
            _ => ObjectStoreError::UnexpectedResponse {
                status: status.as_u16(),
                body,
            },
        })
    }
}
