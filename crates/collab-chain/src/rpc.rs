//! JSON-RPC client for a deployment relay
//!
//! The relay holds the deployer's key, signs and submits each operation and
//! answers only once the remote environment has finalised it. A successful
//! response is therefore a confirmation.
//!
//! Methods:
//! - `component_create` `{kind, artifact, args, resourceLimit}` → `{address, transactionHash}`
//! - `component_invoke` `{address, method, args, resourceLimit}` → `{transactionHash, resourceUsed?}`

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::address::Address;
use crate::component::{Arg, ComponentKind, Confirmation, DeploymentHandle, ResourceLimit};
use crate::error::{ChainError, ChainResult};
use crate::traits::ChainClient;

/// Time allowed to establish a connection to the relay.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Relay connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay endpoint URL
    pub url: String,
    /// Bound on establishing the connection. A submitted operation is
    /// never abandoned because of it.
    pub connect_timeout: Duration,
    /// Optional bound on a whole request. Unset by default: the relay
    /// answers only after finality, and giving up earlier would report a
    /// failure for an operation the remote side may still finalise.
    pub timeout: Option<Duration>,
}

impl RelayConfig {
    pub fn new(url: &str) -> Self {
        RelayConfig {
            url: url.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateParams<'a> {
    kind: ComponentKind,
    artifact: &'static str,
    args: &'a [Arg],
    resource_limit: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResult {
    address: String,
    transaction_hash: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InvokeParams<'a> {
    address: &'a Address,
    method: &'a str,
    args: &'a [Arg],
    resource_limit: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvokeResult {
    transaction_hash: String,
    resource_used: Option<u64>,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Build a JSON-RPC 2.0 request envelope.
fn request_body<P: Serialize>(id: u64, method: &str, params: P) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Extract the typed result from a JSON-RPC response body.
fn decode_response<R: DeserializeOwned>(operation: &str, body: &str) -> ChainResult<R> {
    let response: RpcResponse = serde_json::from_str(body)
        .map_err(|e| ChainError::MalformedResponse(format!("{}: {}", operation, e)))?;

    if let Some(error) = response.error {
        return Err(ChainError::Rejected {
            operation: operation.to_string(),
            reason: format!("{} (code {})", error.message, error.code),
        });
    }

    let result = response.result.ok_or_else(|| {
        ChainError::MalformedResponse(format!("{}: neither result nor error", operation))
    })?;
    serde_json::from_value(result)
        .map_err(|e| ChainError::MalformedResponse(format!("{}: {}", operation, e)))
}

/// Relay-backed [`ChainClient`]
pub struct RelayClient {
    config: RelayConfig,
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl RelayClient {
    pub fn new(config: RelayConfig) -> ChainResult<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("collab-chain/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(RelayClient {
            config,
            http_client,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<P, R>(&self, method: &str, params: P, operation: &str) -> ChainResult<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = request_body(id, method, params);
        debug!(rpc_method = %method, id = id, "Sending relay request");

        let response = self
            .http_client
            .post(&self.config.url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ChainError::Transport(format!(
                "{}: relay returned HTTP {}: {}",
                operation, status, text
            )));
        }
        decode_response(operation, &text)
    }
}

#[async_trait]
impl ChainClient for RelayClient {
    async fn create(
        &self,
        kind: ComponentKind,
        args: Vec<Arg>,
        limit: ResourceLimit,
    ) -> ChainResult<DeploymentHandle> {
        let operation = format!("create {}", kind.artifact());
        let params = CreateParams {
            kind,
            artifact: kind.artifact(),
            args: &args,
            resource_limit: limit.0,
        };
        let result: CreateResult = self.call("component_create", params, &operation).await?;

        Ok(DeploymentHandle {
            kind,
            address: Address::parse(&result.address)?,
            transaction: result.transaction_hash,
        })
    }

    async fn invoke(
        &self,
        handle: &DeploymentHandle,
        method: &str,
        args: Vec<Arg>,
        limit: ResourceLimit,
    ) -> ChainResult<Confirmation> {
        let operation = format!("{}.{}", handle.kind.artifact(), method);
        let params = InvokeParams {
            address: &handle.address,
            method,
            args: &args,
            resource_limit: limit.0,
        };
        let result: InvokeResult = self.call("component_invoke", params, &operation).await?;

        Ok(Confirmation {
            transaction: result.transaction_hash,
            resource_used: result.resource_used,
        })
    }
}
