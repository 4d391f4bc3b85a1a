//! Named functions and the capability manifest sent with every request.

use crate::computer::{CapabilityError, Computer, Environment};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Function the reasoning service may call by name.
#[async_trait]
pub trait NamedFunction: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> Value;

    async fn execute(&self, computer: &dyn Computer, args: Value)
        -> Result<(), CapabilityError>;
}

/// Navigate to a URL.
pub struct GotoFunction;

#[async_trait]
impl NamedFunction for GotoFunction {
    fn name(&self) -> &'static str {
        "goto"
    }

    fn description(&self) -> &'static str {
        "Go to a specific URL."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Fully qualified URL to navigate to."
                }
            },
            "additionalProperties": false,
            "required": ["url"]
        })
    }

    async fn execute(&self, computer: &dyn Computer, args: Value) -> Result<(), CapabilityError> {
        let url = args
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| CapabilityError::InvalidArgument("url is required".to_string()))?;
        computer.goto(url).await
    }
}

/// Navigate back in history.
pub struct BackFunction;

#[async_trait]
impl NamedFunction for BackFunction {
    fn name(&self) -> &'static str {
        "back"
    }

    fn description(&self) -> &'static str {
        "Go back to the previous page."
    }

    fn schema(&self) -> Value {
        empty_schema()
    }

    async fn execute(&self, computer: &dyn Computer, _args: Value) -> Result<(), CapabilityError> {
        computer.back().await
    }
}

/// Navigate forward in history.
pub struct ForwardFunction;

#[async_trait]
impl NamedFunction for ForwardFunction {
    fn name(&self) -> &'static str {
        "forward"
    }

    fn description(&self) -> &'static str {
        "Go forward to the next page."
    }

    fn schema(&self) -> Value {
        empty_schema()
    }

    async fn execute(&self, computer: &dyn Computer, _args: Value) -> Result<(), CapabilityError> {
        computer.forward().await
    }
}

fn empty_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "additionalProperties": false
    })
}

/// Registry of named functions, keyed by name.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<dyn NamedFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `goto`, `back` and `forward`.
    pub fn with_navigation() -> Self {
        let mut registry = Self::new();
        registry
            .register(Arc::new(GotoFunction))
            .register(Arc::new(BackFunction))
            .register(Arc::new(ForwardFunction));
        registry
    }

    pub fn register(&mut self, function: Arc<dyn NamedFunction>) -> &mut Self {
        self.functions.insert(function.name().to_string(), function);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn NamedFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.functions.len()
    }

    /// Invoke a function by name.
    ///
    /// # Errors
    /// `Unsupported` when no function with that name is registered
    pub async fn invoke(
        &self,
        computer: &dyn Computer,
        name: &str,
        args: Value,
    ) -> Result<(), CapabilityError> {
        let function = self
            .get(name)
            .ok_or_else(|| CapabilityError::Unsupported(format!("function '{name}'")))?;
        function.execute(computer, args).await
    }

    /// Function tools in Responses API format.
    pub fn schemas(&self) -> Vec<Value> {
        self.functions
            .values()
            .map(|function| {
                json!({
                    "type": "function",
                    "name": function.name(),
                    "description": function.description(),
                    "parameters": function.schema(),
                })
            })
            .collect()
    }
}

/// Tools advertised to the reasoning service.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityManifest {
    pub display_width: u32,
    pub display_height: u32,
    pub environment: Environment,
    pub functions: Vec<Value>,
}

impl CapabilityManifest {
    pub fn new(computer: &dyn Computer, registry: &FunctionRegistry) -> Self {
        let (display_width, display_height) = computer.dimensions();
        Self {
            display_width,
            display_height,
            environment: computer.environment(),
            functions: registry.schemas(),
        }
    }

    /// Render the `tools` array of a request.
    pub fn tools(&self) -> Vec<Value> {
        let mut tools = Vec::with_capacity(self.functions.len() + 1);
        tools.push(json!({
            "type": "computer_use_preview",
            "display_width": self.display_width,
            "display_height": self.display_height,
            "environment": self.environment.as_str(),
        }));
        tools.extend(self.functions.iter().cloned());
        tools
    }
}
