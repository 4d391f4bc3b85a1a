//! Abstract interfaces for runtime dependencies.

use crate::computer::CapabilityError;
use crate::types::InteractionItem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Runtime errors.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    /// A result whose request is absent from the whole log.
    #[error("Integrity fault: no request found for result with call_id {call_id}")]
    IntegrityError { call_id: String },

    #[error("Capability error: {0}")]
    CapabilityError(#[from] CapabilityError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// How the service may truncate an oversized context.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Truncation {
    #[default]
    Auto,
    Disabled,
}

/// One outbound call to the reasoning service.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub input: Vec<InteractionItem>,
    pub tools: Vec<serde_json::Value>,
    pub truncation: Truncation,
}

/// Items produced by one service call.
#[derive(Debug, Clone, Default)]
pub struct ServiceResponse {
    pub id: Option<String>,
    pub output: Vec<InteractionItem>,
}

/// Reason a service call was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    /// An item required a reasoning trace that was not sent.
    MissingReasoning { id: String },
    /// A result was sent without its request.
    MissingCallForOutput { call_id: Option<String> },
    /// Overload, 5xx, rate limit, timeout, or connection failure.
    Transient,
    /// Anything the runtime cannot recover from by retrying.
    Fatal,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::MissingReasoning { id } => write!(f, "missing reasoning item {id}"),
            FaultKind::MissingCallForOutput { call_id: Some(id) } => {
                write!(f, "missing call for output {id}")
            }
            FaultKind::MissingCallForOutput { call_id: None } => {
                write!(f, "missing call for output")
            }
            FaultKind::Transient => write!(f, "transient"),
            FaultKind::Fatal => write!(f, "fatal"),
        }
    }
}

/// Structured rejection returned by the reasoning service boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ServiceFault {
    pub kind: FaultKind,
    pub message: String,
    pub request_id: Option<String>,
}

impl ServiceFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            request_id: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Transient, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Fatal, message)
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Structural faults are repaired by widening the context.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.kind,
            FaultKind::MissingReasoning { .. } | FaultKind::MissingCallForOutput { .. }
        )
    }
}

/// Remote vision-capable reasoning service.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Send one request; faults come back classified.
    async fn respond(&self, request: &ServiceRequest) -> Result<ServiceResponse, ServiceFault>;
}
