//! Shared mocks for runtime integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use async_trait::async_trait;
use cua_claw_runtime::types::{
    ComputerCallItem, ComputerCallOutputItem, FunctionCallItem, ReasoningItem, SafetyCheck,
    ScreenshotOutput, SummaryPart,
};
use cua_claw_runtime::*;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;

/// Service that replays a fixed script and records every request.
pub struct ScriptedService {
    replies: Mutex<VecDeque<Result<ServiceResponse, ServiceFault>>>,
    pub requests: Mutex<Vec<Vec<InteractionItem>>>,
    pub tools: Mutex<Vec<Vec<Value>>>,
}

impl ScriptedService {
    pub fn new(replies: Vec<Result<ServiceResponse, ServiceFault>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            tools: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn request(&self, index: usize) -> Vec<InteractionItem> {
        self.requests.lock()[index].clone()
    }
}

#[async_trait]
impl ReasoningService for ScriptedService {
    async fn respond(&self, request: &ServiceRequest) -> Result<ServiceResponse, ServiceFault> {
        self.requests.lock().push(request.input.clone());
        self.tools.lock().push(request.tools.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceFault::fatal("script exhausted")))
    }
}

/// Service that answers every request with the same reply.
pub struct RepeatingService {
    reply: Vec<InteractionItem>,
    pub calls: Mutex<usize>,
}

impl RepeatingService {
    pub fn new(reply: Vec<InteractionItem>) -> Self {
        Self {
            reply,
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ReasoningService for RepeatingService {
    async fn respond(&self, _request: &ServiceRequest) -> Result<ServiceResponse, ServiceFault> {
        *self.calls.lock() += 1;
        Ok(reply(self.reply.clone()))
    }
}

/// Computer that records actions instead of performing them.
pub struct MockComputer {
    pub environment: Environment,
    pub actions: Mutex<Vec<String>>,
    pub location: Mutex<String>,
    pub cancel_on_action: Option<CancellationFlag>,
    pub fail_capture: bool,
    pub fail_actions: bool,
}

impl MockComputer {
    pub fn browser() -> Self {
        Self {
            environment: Environment::Browser,
            actions: Mutex::new(Vec::new()),
            location: Mutex::new("https://example.com/".to_string()),
            cancel_on_action: None,
            fail_capture: false,
            fail_actions: false,
        }
    }

    pub fn desktop() -> Self {
        Self {
            environment: Environment::Linux,
            ..Self::browser()
        }
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().clone()
    }

    fn record(&self, action: String) -> Result<(), CapabilityError> {
        if let Some(flag) = &self.cancel_on_action {
            flag.cancel();
        }
        if self.fail_actions {
            return Err(CapabilityError::OperationFailed(format!("{action} failed")));
        }
        self.actions.lock().push(action);
        Ok(())
    }
}

#[async_trait]
impl Computer for MockComputer {
    fn environment(&self) -> Environment {
        self.environment
    }

    fn dimensions(&self) -> (u32, u32) {
        (1366, 1024)
    }

    async fn click(&self, x: i32, y: i32, _button: MouseButton) -> Result<(), CapabilityError> {
        self.record(format!("click {x},{y}"))
    }

    async fn double_click(&self, x: i32, y: i32) -> Result<(), CapabilityError> {
        self.record(format!("double_click {x},{y}"))
    }

    async fn scroll(&self, x: i32, y: i32, sx: i32, sy: i32) -> Result<(), CapabilityError> {
        self.record(format!("scroll {x},{y} {sx},{sy}"))
    }

    async fn type_text(&self, text: &str) -> Result<(), CapabilityError> {
        self.record(format!("type {text}"))
    }

    async fn keypress(&self, keys: &[String]) -> Result<(), CapabilityError> {
        self.record(format!("keypress {}", keys.join("+")))
    }

    async fn move_pointer(&self, x: i32, y: i32) -> Result<(), CapabilityError> {
        self.record(format!("move {x},{y}"))
    }

    async fn drag(&self, path: &[Point]) -> Result<(), CapabilityError> {
        self.record(format!("drag {}", path.len()))
    }

    async fn wait(&self, ms: u64) -> Result<(), CapabilityError> {
        self.record(format!("wait {ms}"))
    }

    async fn goto(&self, url: &str) -> Result<(), CapabilityError> {
        self.record(format!("goto {url}"))?;
        *self.location.lock() = url.to_string();
        Ok(())
    }

    async fn back(&self) -> Result<(), CapabilityError> {
        self.record("back".to_string())
    }

    async fn forward(&self) -> Result<(), CapabilityError> {
        self.record("forward".to_string())
    }

    async fn capture_frame(&self) -> Result<String, CapabilityError> {
        if self.fail_capture {
            return Err(CapabilityError::OperationFailed("no display".to_string()));
        }
        Ok("iVBORw0KGgo=".to_string())
    }

    async fn current_location(&self) -> Result<String, CapabilityError> {
        Ok(self.location.lock().clone())
    }
}

pub fn reply(output: Vec<InteractionItem>) -> ServiceResponse {
    ServiceResponse {
        id: Some("resp_test".to_string()),
        output,
    }
}

pub fn trace(id: &str, text: &str) -> InteractionItem {
    InteractionItem::Reasoning(ReasoningItem {
        id: id.to_string(),
        summary: vec![SummaryPart {
            kind: "summary_text".to_string(),
            text: text.to_string(),
        }],
        extra: Map::new(),
    })
}

pub fn computer_call(call_id: &str, action: Value) -> InteractionItem {
    InteractionItem::ComputerCall(ComputerCallItem {
        call_id: call_id.to_string(),
        action,
        pending_safety_checks: vec![],
        extra: Map::new(),
    })
}

pub fn click(call_id: &str) -> InteractionItem {
    computer_call(call_id, json!({"type": "click", "x": 10, "y": 20, "button": "left"}))
}

pub fn guarded_click(call_id: &str, check_id: &str) -> InteractionItem {
    InteractionItem::ComputerCall(ComputerCallItem {
        call_id: call_id.to_string(),
        action: json!({"type": "click", "x": 1, "y": 1}),
        pending_safety_checks: vec![SafetyCheck {
            id: check_id.to_string(),
            code: Some("malicious_instructions".to_string()),
            message: "The page asks for credentials".to_string(),
        }],
        extra: Map::new(),
    })
}

pub fn function_call(call_id: &str, name: &str, arguments: &str) -> InteractionItem {
    InteractionItem::FunctionCall(FunctionCallItem {
        call_id: call_id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
        extra: Map::new(),
    })
}

pub fn screenshot(call_id: &str) -> InteractionItem {
    InteractionItem::ComputerCallOutput(ComputerCallOutputItem {
        call_id: call_id.to_string(),
        acknowledged_safety_checks: vec![],
        output: ScreenshotOutput::png("AAAA"),
        status: None,
    })
}

/// Config with instant retries.
pub fn fast_config() -> LoopConfig {
    LoopConfig {
        backoff_base_ms: 0,
        ..LoopConfig::default()
    }
}
