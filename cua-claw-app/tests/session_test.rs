//! Session runner against the dry-run backend.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use async_trait::async_trait;
use cua_claw_app::session::{exit_code, Session};
use cua_claw_runtime::types::ComputerCallItem;
use cua_claw_runtime::*;
use cua_claw_tools::DryRunComputer;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct ScriptedService {
    replies: Mutex<VecDeque<Vec<InteractionItem>>>,
}

impl ScriptedService {
    fn new(replies: Vec<Vec<InteractionItem>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

#[async_trait]
impl ReasoningService for ScriptedService {
    async fn respond(&self, _request: &ServiceRequest) -> Result<ServiceResponse, ServiceFault> {
        match self.replies.lock().unwrap().pop_front() {
            Some(output) => Ok(ServiceResponse { id: None, output }),
            None => Err(ServiceFault::fatal("HTTP 400: script exhausted")),
        }
    }
}

fn click(call_id: &str) -> InteractionItem {
    InteractionItem::ComputerCall(ComputerCallItem {
        call_id: call_id.to_string(),
        action: json!({"type": "click", "x": 5, "y": 6}),
        pending_safety_checks: vec![],
        extra: Map::new(),
    })
}

fn session(replies: Vec<Vec<InteractionItem>>) -> Session<ScriptedService, DryRunComputer> {
    let config = LoopConfig {
        backoff_base_ms: 0,
        ..LoopConfig::default()
    };
    let turn = TurnLoop::new(
        Arc::new(ScriptedService::new(replies)),
        Arc::new(DryRunComputer::new()),
        &config,
    );
    Session::new(turn)
}

#[tokio::test]
async fn test_transcript_is_redacted() {
    let mut session = session(vec![
        vec![click("c1")],
        vec![InteractionItem::assistant("Clicked.")],
    ]);

    let outcome = session.run("click the button").await.unwrap();
    assert_eq!(exit_code(&outcome), 0);
    assert_eq!(session.computer().actions(), vec!["click 5,6 Left"]);

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("transcript.json");
    session.write_transcript(&path).unwrap();

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let items = written["items"].as_array().unwrap();
    assert_eq!(items.len(), 4);
    assert_eq!(items[2]["type"], "computer_call_output");
    assert_eq!(items[2]["output"]["image_url"], "[omitted]");
    assert!(written["exported_at"].is_string());
}

#[tokio::test]
async fn test_session_keeps_log_across_instructions() {
    let mut session = session(vec![
        vec![InteractionItem::assistant("One.")],
        vec![InteractionItem::assistant("Two.")],
    ]);

    session.run("first").await.unwrap();
    let outcome = session.run("second").await.unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Completed {
            message: "Two.".to_string()
        }
    );
    assert_eq!(session.log().len(), 4);
}

#[tokio::test]
async fn test_fatal_fault_gives_failing_exit_code() {
    let mut session = session(vec![]);

    let outcome = session.run("anything").await.unwrap();

    assert!(matches!(outcome, TurnOutcome::Aborted { .. }));
    assert_ne!(exit_code(&outcome), 0);
}
