//! DynamoDB `PutItem` / `GetItem` over the JSON 1.0 protocol

use super::{validate_key, KeyValueStore};
use crate::error::KvError;
use crate::sigv4::{self, AwsCredentials, SigningRequest};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::time::Duration;

const CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const TARGET_PREFIX: &str = "DynamoDB_20120810";

/// Table coordinates and credentials
#[derive(Debug, Clone)]
pub struct DynamoDbConfig {
    pub table: String,
    pub region: String,
    /// Partition key attribute name
    pub partition_key: String,
    /// Endpoint override, e.g. `http://localhost:8000`
    pub endpoint: Option<String>,
    pub credentials: AwsCredentials,
}

impl DynamoDbConfig {
    pub fn new(
        table: impl Into<String>,
        region: impl Into<String>,
        partition_key: impl Into<String>,
        credentials: AwsCredentials,
    ) -> Self {
        Self {
            table: table.into(),
            region: region.into(),
            partition_key: partition_key.into(),
            endpoint: None,
            credentials,
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    fn url_and_host(&self) -> (String, String) {
        match &self.endpoint {
            Some(endpoint) => {
                let endpoint = endpoint.trim_end_matches('/');
                let host = endpoint
                    .split_once("://")
                    .map_or(endpoint, |(_, rest)| rest)
                    .split('/')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                (format!("{endpoint}/"), host)
            }
            None => {
                let host = format!("dynamodb.{}.amazonaws.com", self.region);
                (format!("https://{host}/"), host)
            }
        }
    }
}

/// Crash table backed by DynamoDB
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    config: DynamoDbConfig,
    client: reqwest::Client,
    timeout: Duration,
}

impl DynamoDbStore {
    /// # Errors
    /// A network error if the HTTP client cannot be built.
    pub fn new(config: DynamoDbConfig, timeout: Duration) -> Result<Self, KvError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KvError::Network(e.to_string()))?;
        Ok(Self {
            config,
            client,
            timeout,
        })
    }

    async fn call(&self, operation: &str, body: &Value) -> Result<Value, KvError> {
        let payload = serde_json::to_vec(body)?;
        let payload_sha256 = sigv4::payload_hash(&payload);
        let (url, host) = self.config.url_and_host();
        let target = format!("{TARGET_PREFIX}.{operation}");

        let signed = sigv4::sign(
            &self.config.credentials,
            SigningRequest {
                method: "POST",
                service: "dynamodb",
                region: &self.config.region,
                host: &host,
                canonical_uri: "/",
                headers: vec![
                    ("content-type".to_string(), CONTENT_TYPE.to_string()),
                    ("x-amz-target".to_string(), target),
                ],
                payload_sha256: &payload_sha256,
            },
            Utc::now(),
        )?;

        let mut builder = self
            .client
            .post(&url)
            .header("authorization", signed.authorization);
        for (name, value) in signed.headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .body(payload)
            .send()
            .await
            .map_err(|e| KvError::from_reqwest(&e, self.timeout))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| KvError::from_reqwest(&e, self.timeout))?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Object(Map::new()));
            }
            return Ok(serde_json::from_str(&text)?);
        }

        let (code, message) = parse_error(&text);
        Err(KvError::Rejected {
            status: status.as_u16(),
            code,
            message,
        })
    }
}

#[async_trait]
impl KeyValueStore for DynamoDbStore {
    fn name(&self) -> &'static str {
        "dynamodb"
    }

    async fn put(&self, key: &str, item: &Value) -> Result<(), KvError> {
        validate_key(key)?;
        let Value::Object(fields) = item else {
            return Err(KvError::InvalidItem("item must be a JSON object".into()));
        };
        let mut fields = fields.clone();
        fields.insert(self.config.partition_key.clone(), Value::String(key.to_string()));

        let body = json!({
            "TableName": self.config.table,
            "Item": to_item(&fields),
        });
        self.call("PutItem", &body).await?;
        tracing::debug!(table = %self.config.table, %key, "item written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
        validate_key(key)?;
        let mut item_key = Map::new();
        item_key.insert(self.config.partition_key.clone(), json!({ "S": key }));
        let body = json!({
            "TableName": self.config.table,
            "Key": item_key,
            "ConsistentRead": true,
        });
        let response = self.call("GetItem", &body).await?;
        match response.get("Item") {
            Some(Value::Object(item)) => Ok(Some(from_item(item)?)),
            _ => Ok(None),
        }
    }
}

/// `{"__type": "...#Code", "message": "..."}`
fn parse_error(body: &str) -> (String, String) {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let code = parsed
        .get("__type")
        .and_then(Value::as_str)
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let message = parsed
        .get("message")
        .or_else(|| parsed.get("Message"))
        .and_then(Value::as_str)
        .map_or_else(|| body.to_string(), str::to_string);
    (code, message)
}

fn to_item(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), to_attribute(v)))
            .collect(),
    )
}

/// JSON value to a DynamoDB attribute value
fn to_attribute(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "NULL": true }),
        Value::Bool(b) => json!({ "BOOL": b }),
        Value::Number(n) => json!({ "N": n.to_string() }),
        Value::String(s) => json!({ "S": s }),
        Value::Array(items) => json!({ "L": items.iter().map(to_attribute).collect::<Vec<_>>() }),
        Value::Object(fields) => json!({ "M": to_item(fields) }),
    }
}

fn from_item(item: &Map<String, Value>) -> Result<Value, KvError> {
    item.iter()
        .map(|(k, v)| from_attribute(v).map(|v| (k.clone(), v)))
        .collect::<Result<Map<_, _>, _>>()
        .map(Value::Object)
}

fn from_attribute(attr: &Value) -> Result<Value, KvError> {
    let invalid = || KvError::InvalidItem(format!("unsupported attribute value: {attr}"));
    let Value::Object(tagged) = attr else {
        return Err(invalid());
    };
    let (tag, inner) = tagged.iter().next().ok_or_else(invalid)?;
    match (tag.as_str(), inner) {
        ("NULL", _) => Ok(Value::Null),
        ("BOOL", Value::Bool(b)) => Ok(Value::Bool(*b)),
        ("S", Value::String(s)) => Ok(Value::String(s.clone())),
        ("N", Value::String(n)) => serde_json::from_str::<serde_json::Number>(n)
            .map(Value::Number)
            .map_err(|_| invalid()),
        ("L", Value::Array(items)) => items
            .iter()
            .map(from_attribute)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ("M", Value::Object(fields)) => from_item(fields),
        _ => Err(invalid()),
    }
}
