//! Transport collaborator.
//!
//! The client never builds SOAP envelopes itself. It hands a [`Transport`] an
//! operation name, a structured payload and a freshly signed header, and gets
//! back a structured reply or a fault.

use crate::auth::AuthHeader;
use crate::errors::ClientError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

/// Fault reported by the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    /// Machine-readable `serviceException` code, e.g. `"20103"`.
    pub code: Option<String>,
    pub message: String,
}

impl SoapFault {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// Reads a fault object. The code is taken from `code`, falling back to
    /// `detail.serviceException.code`.
    pub fn from_value(fault: &Value) -> Self {
        let service_exception = fault.pointer("/detail/serviceException");

        let code = fault
            .get("code")
            .or_else(|| service_exception.and_then(|e| e.get("code")))
            .and_then(scalar_text);

        let message = fault
            .get("message")
            .or_else(|| fault.get("faultstring"))
            .or_else(|| service_exception.and_then(|e| e.get("message")))
            .and_then(scalar_text)
            .unwrap_or_else(|| "unknown fault".to_string());

        Self { code, message }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Ways a transport call can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The remote side rejected the call.
    Fault(SoapFault),
    /// Connectivity, timeout or malformed envelope.
    Failure(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Fault(fault) => match &fault.code {
                Some(code) => write!(f, "fault {}: {}", code, fault.message),
                None => write!(f, "fault: {}", fault.message),
            },
            TransportError::Failure(msg) => write!(f, "transport failure: {}", msg),
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Fault(fault) => ClientError::RemoteFault {
                code: fault.code,
                message: fault.message,
            },
            TransportError::Failure(msg) => ClientError::Transport(msg),
        }
    }
}

/// Raw payloads of the most recent call, kept for debug tracing. When the
/// call failed before a reply arrived, `response` holds the failure text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub request: String,
    pub response: String,
}

/// Performs one signed remote operation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(
        &self,
        operation: &str,
        params: Value,
        header: &AuthHeader,
    ) -> Result<Value, TransportError>;

    /// Last raw request/response pair, if the transport keeps one.
    fn last_exchange(&self) -> Option<Exchange> {
        None
    }
}

/// Transport that forwards calls to a SOAP gateway sidecar over HTTP.
///
/// The gateway owns envelope construction and WSDL handling; this side posts
/// `{endpoint, operation, header, params}` as JSON to
/// `<base_url>/mktows/<operation>` and reads back either the decoded reply or
/// `{"fault": {...}}`.
pub struct GatewayTransport {
    client: reqwest::Client,
    base_url: String,
    endpoint: String,
    timeout: Duration,
    last_exchange: Mutex<Option<Exchange>>,
}

impl GatewayTransport {
    /// Creates a new `GatewayTransport`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the gateway.
    /// * `endpoint` - The SOAP endpoint the gateway should call.
    /// * `timeout` - Bound on one round trip.
    pub fn new(
        base_url: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to create gateway client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            endpoint: endpoint.into(),
            timeout,
            last_exchange: Mutex::new(None),
        })
    }

    fn remember(&self, request: &Value, response: String) {
        if let Ok(mut slot) = self.last_exchange.lock() {
            *slot = Some(Exchange {
                request: request.to_string(),
                response,
            });
        }
    }
}

#[async_trait]
impl Transport for GatewayTransport {
    async fn call(
        &self,
        operation: &str,
        params: Value,
        header: &AuthHeader,
    ) -> Result<Value, TransportError> {
        let url = format!("{}/mktows/{}", self.base_url, operation);
        let body = json!({
            "endpoint": self.endpoint,
            "operation": operation,
            "header": header,
            "params": params,
        });

        tracing::debug!("Posting {} to gateway: {}", operation, url);

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                let err = if e.is_timeout() {
                    TransportError::Failure(format!(
                        "{} timed out after {}ms",
                        operation,
                        self.timeout.as_millis()
                    ))
                } else {
                    TransportError::Failure(format!("Gateway request failed: {}", e))
                };
                self.remember(&body, err.to_string());
                return Err(err);
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                let err = TransportError::Failure(format!("Failed to read gateway reply: {}", e));
                self.remember(&body, err.to_string());
                return Err(err);
            }
        };
        self.remember(&body, text.clone());

        let reply: Option<Value> = serde_json::from_str(&text).ok();

        if let Some(fault) = reply.as_ref().and_then(|r| r.get("fault")) {
            let fault = SoapFault::from_value(fault);
            tracing::debug!("Gateway returned fault for {}: {:?}", operation, fault.code);
            return Err(TransportError::Fault(fault));
        }

        if !status.is_success() {
            return Err(TransportError::Failure(format!(
                "Gateway returned {}: {}",
                status, text
            )));
        }

        reply.ok_or_else(|| {
            TransportError::Failure(format!("Gateway reply for {} is not valid JSON", operation))
        })
    }

    fn last_exchange(&self) -> Option<Exchange> {
        self.last_exchange.lock().ok().and_then(|slot| slot.clone())
    }
}
