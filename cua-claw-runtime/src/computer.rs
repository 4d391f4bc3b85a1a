//! Automation capability boundary.
//!
//! A [`Computer`] is the only way the runtime touches the machine it drives.
//! Backends live outside this crate; the runtime sees typed actions and
//! classified faults.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// 1x1 PNG used when a real frame cannot be captured.
pub const BLANK_PNG_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR4nGNgYAAAAAMAASsJTYQAAAAASUVORK5CYII=";

/// Action type names accepted by [`ComputerAction::parse`].
const ACTION_TYPES: &[&str] = &[
    "click",
    "double_click",
    "scroll",
    "type",
    "keypress",
    "move",
    "drag",
    "wait",
    "screenshot",
];

/// Errors raised by an automation backend.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Environment kind reported to the reasoning service.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Browser,
    Mac,
    Windows,
    Ubuntu,
    Linux,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Browser => "browser",
            Environment::Mac => "mac",
            Environment::Windows => "windows",
            Environment::Ubuntu => "ubuntu",
            Environment::Linux => "linux",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Wheel,
    Back,
    Forward,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

fn default_wait_ms() -> u64 {
    1000
}

/// Typed automation primitive parsed from a request's action payload.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComputerAction {
    Click {
        x: i32,
        y: i32,
        #[serde(default)]
        button: MouseButton,
    },
    DoubleClick {
        x: i32,
        y: i32,
    },
    Scroll {
        x: i32,
        y: i32,
        #[serde(default)]
        scroll_x: i32,
        #[serde(default)]
        scroll_y: i32,
    },
    Type {
        text: String,
    },
    Keypress {
        keys: Vec<String>,
    },
    Move {
        x: i32,
        y: i32,
    },
    Drag {
        path: Vec<Point>,
    },
    Wait {
        #[serde(default = "default_wait_ms")]
        ms: u64,
    },
    Screenshot,
}

impl ComputerAction {
    /// Parse an action payload.
    ///
    /// # Errors
    /// `Unsupported` for an unknown action type, `InvalidArgument` for a
    /// known type with malformed fields
    pub fn parse(action: &Value) -> Result<Self, CapabilityError> {
        let kind = action
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| CapabilityError::InvalidArgument("action has no type".to_string()))?;

        if !ACTION_TYPES.contains(&kind) {
            return Err(CapabilityError::Unsupported(format!("action '{kind}'")));
        }

        serde_json::from_value(action.clone())
            .map_err(|e| CapabilityError::InvalidArgument(format!("{kind}: {e}")))
    }
}

/// Machine the runtime drives.
///
/// Methods take `&self`; backends that track state use interior mutability.
#[async_trait]
pub trait Computer: Send + Sync {
    fn environment(&self) -> Environment;

    /// Display size as (width, height).
    fn dimensions(&self) -> (u32, u32);

    async fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<(), CapabilityError>;
    async fn double_click(&self, x: i32, y: i32) -> Result<(), CapabilityError>;
    async fn scroll(
        &self,
        x: i32,
        y: i32,
        scroll_x: i32,
        scroll_y: i32,
    ) -> Result<(), CapabilityError>;
    async fn type_text(&self, text: &str) -> Result<(), CapabilityError>;
    async fn keypress(&self, keys: &[String]) -> Result<(), CapabilityError>;
    async fn move_pointer(&self, x: i32, y: i32) -> Result<(), CapabilityError>;
    async fn drag(&self, path: &[Point]) -> Result<(), CapabilityError>;
    async fn wait(&self, ms: u64) -> Result<(), CapabilityError> {
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<(), CapabilityError>;
    async fn back(&self) -> Result<(), CapabilityError>;
    async fn forward(&self) -> Result<(), CapabilityError>;

    /// Capture the display as base64-encoded PNG.
    async fn capture_frame(&self) -> Result<String, CapabilityError>;

    /// Current location: a URL for browsers, a window descriptor otherwise.
    async fn current_location(&self) -> Result<String, CapabilityError>;
}

/// Run one typed action against a computer.
pub async fn execute_action<C>(computer: &C, action: &ComputerAction) -> Result<(), CapabilityError>
where
    C: Computer + ?Sized,
{
    match action {
        ComputerAction::Click { x, y, button } => computer.click(*x, *y, *button).await,
        ComputerAction::DoubleClick { x, y } => computer.double_click(*x, *y).await,
        ComputerAction::Scroll {
            x,
            y,
            scroll_x,
            scroll_y,
        } => computer.scroll(*x, *y, *scroll_x, *scroll_y).await,
        ComputerAction::Type { text } => computer.type_text(text).await,
        ComputerAction::Keypress { keys } => computer.keypress(keys).await,
        ComputerAction::Move { x, y } => computer.move_pointer(*x, *y).await,
        ComputerAction::Drag { path } => {
            if path.len() < 2 {
                return Err(CapabilityError::InvalidArgument(
                    "drag path needs at least two points".to_string(),
                ));
            }
            computer.drag(path).await
        }
        ComputerAction::Wait { ms } => computer.wait(*ms).await,
        // The frame is captured after every action anyway.
        ComputerAction::Screenshot => Ok(()),
    }
}
