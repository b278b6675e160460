#![deny(warnings)]

//! Client for the transaction relay reached over JSON-RPC.
//!
//! The game only needs one capability from the relay: try a real send with a
//! strategy's options and report whether it landed. Every transport or
//! protocol problem collapses into [`RelayUnavailable`] so callers can fall
//! back to simulation.

use async_trait::async_trait;
use gauntlet_core::{RelayOptions, RelayVerdict};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const BUILD_METHOD: &str = "buildGatewayTransaction";
pub const SEND_METHOD: &str = "sendTransaction";

/// Where and how to reach the relay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub base_url: String,
    /// Cluster name appended to the base URL, e.g. "devnet".
    pub network: String,
    pub api_key: Option<String>,
    pub request_id: String,
    /// Encoded unsigned transaction handed to the build step.
    pub transaction_payload: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tpg.sanctum.so/v1".to_string(),
            network: "devnet".to_string(),
            api_key: None,
            request_id: "gateway-gauntlet".to_string(),
            transaction_payload: String::new(),
        }
    }
}

impl RelayConfig {
    /// `{base}/{network}?apiKey={key}`.
    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match &self.api_key {
            Some(key) => format!("{base}/{}?apiKey={key}", self.network),
            None => format!("{base}/{}", self.network),
        }
    }
}

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: &'a str,
    pub method: &'a str,
    pub params: Vec<Value>,
}

/// Error object of a JSON-RPC response.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// Failures of a single relay call.
#[derive(Debug, Error, PartialEq)]
pub enum RelayError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("relay returned HTTP {0}")]
    Status(u16),
    #[error("malformed relay response: {0}")]
    Malformed(String),
    /// The relay answered and rejected the request.
    #[error("relay rejected request ({code}): {message}")]
    Rpc { code: i64, message: String },
}

/// No usable answer from the relay; the caller should simulate instead.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("relay unavailable: {0}")]
pub struct RelayUnavailable(pub String);

/// The narrow relay capability used by the game session.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Try a real send. A relay-side rejection is a concrete failed
    /// verdict; anything else that goes wrong is `RelayUnavailable`.
    async fn attempt_send(&self, options: &RelayOptions) -> Result<RelayVerdict, RelayUnavailable>;
}

/// Extract the `result` of a JSON-RPC response body.
pub fn parse_response(body: &str) -> Result<Value, RelayError> {
    let resp: RpcResponse =
        serde_json::from_str(body).map_err(|e| RelayError::Malformed(e.to_string()))?;
    if let Some(err) = resp.error {
        return Err(RelayError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    resp.result
        .ok_or_else(|| RelayError::Malformed("neither result nor error present".into()))
}

/// Pull a string out of a result that is either the string itself or an
/// object carrying it under `field`.
fn string_field(result: &Value, field: &str) -> Result<String, RelayError> {
    match result {
        Value::String(s) => Ok(s.clone()),
        Value::Object(map) => map
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RelayError::Malformed(format!("missing `{field}`"))),
        other => Err(RelayError::Malformed(format!("unexpected result: {other}"))),
    }
}

/// Map the outcome of a send sequence onto the relay contract.
pub fn verdict_from(res: Result<String, RelayError>) -> Result<RelayVerdict, RelayUnavailable> {
    match res {
        Ok(signature) => Ok(RelayVerdict::landed(signature)),
        Err(RelayError::Rpc { code, message }) => {
            info!(code, %message, "relay rejected transaction");
            Ok(RelayVerdict::rejected(message))
        }
        Err(e) => {
            warn!(error = %e, "relay unavailable, falling back to simulation");
            Err(RelayUnavailable(e.to_string()))
        }
    }
}

/// reqwest-backed relay client.
#[derive(Clone, Debug)]
pub struct HttpRelay {
    client: reqwest::Client,
    config: RelayConfig,
}

impl HttpRelay {
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// One JSON-RPC round trip.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RelayError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: &self.config.request_id,
            method,
            params,
        };
        debug!(method, "sending relay request");
        let response = self
            .client
            .post(self.config.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        // Outages come back as non-2xx even with an `error` body.
        if !status.is_success() {
            return Err(RelayError::Status(status.as_u16()));
        }
        parse_response(&body)
    }

    /// Build then send; returns the landed signature.
    pub async fn send_sequence(&self, options: &RelayOptions) -> Result<String, RelayError> {
        let options =
            serde_json::to_value(options).map_err(|e| RelayError::Malformed(e.to_string()))?;
        let built = self
            .call(
                BUILD_METHOD,
                vec![json!(self.config.transaction_payload), options],
            )
            .await?;
        let transaction = string_field(&built, "transaction")?;
        let sent = self.call(SEND_METHOD, vec![json!(transaction)]).await?;
        string_field(&sent, "signature")
    }
}

#[async_trait]
impl Relay for HttpRelay {
    async fn attempt_send(&self, options: &RelayOptions) -> Result<RelayVerdict, RelayUnavailable> {
        verdict_from(self.send_sequence(options).await)
    }
}
