//! Responses API client for the reasoning service.

use crate::config::ServiceConfig;
use crate::interfaces::{
    FaultKind, ReasoningService, RuntimeError, ServiceFault, ServiceRequest, ServiceResponse,
    Truncation,
};
use crate::types::{InteractionItem, KNOWN_ITEM_TYPES};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Error types the service uses for overload and internal failures.
const TRANSIENT_ERROR_TYPES: &[&str] = &["server_error", "overloaded_error"];

/// Longest body excerpt kept on a fault.
const MAX_FAULT_BODY: usize = 800;

static REASONING_ID: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\b(rs_[A-Za-z0-9_\-]+)").ok());

static MISSING_CALL: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)no tool call found for [a-z_ ]*call output",
        r"(?: with call_id '?([A-Za-z0-9_\-]+))?"
    ))
    .ok()
});

#[derive(Debug, Serialize)]
struct ReasoningOptions<'a> {
    effort: &'a str,
    summary: &'a str,
}

/// Request payload for `POST /responses`.
#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a [InteractionItem],
    tools: &'a [Value],
    truncation: Truncation,
    store: bool,
    reasoning: ReasoningOptions<'a>,
}

/// HTTP client for the Responses API.
#[derive(Clone)]
pub struct ResponsesClient {
    config: ServiceConfig,
    client: reqwest::Client,
}

fn secs(value: f64, fallback: u64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::from_secs(fallback))
}

impl ResponsesClient {
    /// Create a new client.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: ServiceConfig) -> Result<Self, RuntimeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(secs(config.connect_timeout_secs, 20))
            .timeout(secs(config.read_timeout_secs, 180))
            .build()
            .map_err(|e| RuntimeError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.config.base_url.trim_end_matches('/'))
    }

    fn payload<'a>(&'a self, request: &'a ServiceRequest) -> ResponsesRequest<'a> {
        ResponsesRequest {
            model: &self.config.model,
            input: &request.input,
            tools: &request.tools,
            truncation: request.truncation,
            store: self.config.store,
            reasoning: ReasoningOptions {
                effort: &self.config.reasoning_effort,
                summary: &self.config.reasoning_summary,
            },
        }
    }
}

#[async_trait]
impl ReasoningService for ResponsesClient {
    async fn respond(&self, request: &ServiceRequest) -> Result<ServiceResponse, ServiceFault> {
        let url = self.endpoint();
        debug!("responses url={} items={}", url, request.input.len());

        let mut builder = self.client.post(&url).json(&self.payload(request));
        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }
        if let Some(org) = &self.config.organization {
            builder = builder.header("OpenAI-Organization", org);
        }

        let response = builder.send().await.map_err(classify_transport)?;
        let status = response.status().as_u16();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(e).with_request_id(request_id.clone()))?;
        let parsed: Option<Value> = serde_json::from_str(&body).ok();

        if status == 200 {
            if let Some(value) = parsed.as_ref().filter(|v| v.get("output").is_some()) {
                return parse_response(value).map_err(|f| f.with_request_id(request_id));
            }
        }

        Err(classify_error(status, parsed.as_ref(), &body).with_request_id(request_id))
    }
}

/// Classify a transport failure.
fn classify_transport(error: reqwest::Error) -> ServiceFault {
    if error.is_timeout() {
        ServiceFault::transient(format!("request timed out: {}", error))
    } else if error.is_connect() || error.is_request() || error.is_body() {
        ServiceFault::transient(format!("connection failed: {}", error))
    } else {
        ServiceFault::fatal(format!("HTTP request failed: {}", error))
    }
}

fn excerpt(raw: &str) -> String {
    raw.chars().take(MAX_FAULT_BODY).collect()
}

/// Classify a non-success response.
///
/// # Arguments
/// * `status` - HTTP status code
/// * `body` - Parsed JSON body, if the body was JSON
/// * `raw` - Raw body text
pub fn classify_error(status: u16, body: Option<&Value>, raw: &str) -> ServiceFault {
    let error = body.and_then(|b| b.get("error"));
    let error_type = error
        .and_then(|e| e.get("type"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| excerpt(raw));
    let message = format!("HTTP {}: {}", status, message);

    if status >= 500 || status == 429 || TRANSIENT_ERROR_TYPES.contains(&error_type) {
        return ServiceFault::transient(message);
    }
    if body.is_none() {
        return ServiceFault::fatal(message);
    }

    let lower = message.to_lowercase();
    if lower.contains("reasoning") && lower.contains("required") {
        if let Some(id) = REASONING_ID
            .as_ref()
            .and_then(|re| re.captures(&message))
            .and_then(|c| c.get(1))
        {
            let id = id.as_str().to_string();
            return ServiceFault::new(FaultKind::MissingReasoning { id }, message);
        }
    }

    if let Some(captures) = MISSING_CALL.as_ref().and_then(|re| re.captures(&message)) {
        let call_id = captures.get(1).map(|m| m.as_str().to_string());
        return ServiceFault::new(FaultKind::MissingCallForOutput { call_id }, message);
    }

    ServiceFault::fatal(message)
}

/// Parse a successful response body.
///
/// Items of unknown type are skipped; malformed known items are fatal.
pub fn parse_response(body: &Value) -> Result<ServiceResponse, ServiceFault> {
    let items = body
        .get("output")
        .and_then(Value::as_array)
        .ok_or_else(|| ServiceFault::fatal("response output is not an array"))?;

    let mut output = Vec::with_capacity(items.len());
    for raw in items {
        let kind = raw.get("type").and_then(Value::as_str).unwrap_or("<none>");
        if !KNOWN_ITEM_TYPES.contains(&kind) {
            warn!("Skipping output item of unknown type: {}", kind);
            continue;
        }
        let item: InteractionItem = serde_json::from_value(raw.clone())
            .map_err(|e| ServiceFault::fatal(format!("malformed {} item: {}", kind, e)))?;
        output.push(item);
    }

    Ok(ServiceResponse {
        id: body.get("id").and_then(Value::as_str).map(str::to_string),
        output,
    })
}
