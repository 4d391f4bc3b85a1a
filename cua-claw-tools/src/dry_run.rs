//! A browser-shaped backend that performs nothing.
//!
//! Useful for exercising the whole loop against the live service without
//! touching the local display: every action is logged and recorded, the
//! frame is always blank, and navigation is simulated with a history stack.

use crate::os_capabilities::validate_url;
use async_trait::async_trait;
use cua_claw_runtime::{
    CapabilityError, Computer, Environment, MouseButton, Point, BLANK_PNG_B64,
};
use parking_lot::Mutex;
use tracing::info;

pub const DRY_RUN_DIMENSIONS: (u32, u32) = (1024, 768);
const BLANK_PAGE: &str = "about:blank";

#[derive(Debug, Default)]
struct DryRunState {
    actions: Vec<String>,
    history: Vec<String>,
    cursor: usize,
}

#[derive(Debug, Default)]
pub struct DryRunComputer {
    state: Mutex<DryRunState>,
}

impl DryRunComputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Actions performed so far, in order.
    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    fn record(&self, action: String) {
        info!(action = %action, "dry-run");
        self.state.lock().actions.push(action);
    }
}

#[async_trait]
impl Computer for DryRunComputer {
    fn environment(&self) -> Environment {
        Environment::Browser
    }

    fn dimensions(&self) -> (u32, u32) {
        DRY_RUN_DIMENSIONS
    }

    async fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<(), CapabilityError> {
        self.record(format!("click {x},{y} {button:?}"));
        Ok(())
    }

    async fn double_click(&self, x: i32, y: i32) -> Result<(), CapabilityError> {
        self.record(format!("double_click {x},{y}"));
        Ok(())
    }

    async fn scroll(
        &self,
        x: i32,
        y: i32,
        scroll_x: i32,
        scroll_y: i32,
    ) -> Result<(), CapabilityError> {
        self.record(format!("scroll {x},{y} by {scroll_x},{scroll_y}"));
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), CapabilityError> {
        self.record(format!("type {text:?}"));
        Ok(())
    }

    async fn keypress(&self, keys: &[String]) -> Result<(), CapabilityError> {
        if keys.is_empty() {
            return Err(CapabilityError::InvalidArgument("no keys given".to_string()));
        }
        self.record(format!("keypress {}", keys.join("+")));
        Ok(())
    }

    async fn move_pointer(&self, x: i32, y: i32) -> Result<(), CapabilityError> {
        self.record(format!("move {x},{y}"));
        Ok(())
    }

    async fn drag(&self, path: &[Point]) -> Result<(), CapabilityError> {
        let points: Vec<String> = path.iter().map(|p| format!("{},{}", p.x, p.y)).collect();
        self.record(format!("drag {}", points.join(" -> ")));
        Ok(())
    }

    async fn wait(&self, ms: u64) -> Result<(), CapabilityError> {
        self.record(format!("wait {ms}ms"));
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<(), CapabilityError> {
        validate_url(url)?;
        self.record(format!("goto {url}"));
        let mut state = self.state.lock();
        if !state.history.is_empty() {
            let keep = state.cursor + 1;
            state.history.truncate(keep);
        }
        state.history.push(url.to_string());
        state.cursor = state.history.len() - 1;
        Ok(())
    }

    async fn back(&self) -> Result<(), CapabilityError> {
        self.record("back".to_string());
        let mut state = self.state.lock();
        state.cursor = state.cursor.saturating_sub(1);
        Ok(())
    }

    async fn forward(&self) -> Result<(), CapabilityError> {
        self.record("forward".to_string());
        let mut state = self.state.lock();
        if state.cursor + 1 < state.history.len() {
            state.cursor += 1;
        }
        Ok(())
    }

    async fn capture_frame(&self) -> Result<String, CapabilityError> {
        Ok(BLANK_PNG_B64.to_string())
    }

    async fn current_location(&self) -> Result<String, CapabilityError> {
        let state = self.state.lock();
        Ok(state
            .history
            .get(state.cursor)
            .cloned()
            .unwrap_or_else(|| BLANK_PAGE.to_string()))
    }
}
