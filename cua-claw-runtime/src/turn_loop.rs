//! Turn loop - drives the service until it answers with a message.

use crate::cancellation::CancellationFlag;
use crate::compactor::Compactor;
use crate::computer::{
    execute_action, CapabilityError, Computer, ComputerAction, Environment, BLANK_PNG_B64,
};
use crate::config::LoopConfig;
use crate::enforcer::InvariantEnforcer;
use crate::functions::{CapabilityManifest, FunctionRegistry};
use crate::interfaces::{ReasoningService, RuntimeError, Truncation};
use crate::log::InteractionLog;
use crate::metrics::MetricTimer;
use crate::retry::{AbortReason, RetryController, SendOutcome};
use crate::safety::{DeclineAll, SafetyAcknowledger, SafetyPolicy};
use crate::types::{
    ComputerCallItem, ComputerCallOutputItem, FunctionCallItem, FunctionCallOutputItem,
    InteractionItem, ItemStatus, ScreenshotOutput,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The service answered with an assistant message.
    Completed { message: String },
    Cancelled,
    Aborted { reason: AbortReason },
    /// An action landed on a blocked location.
    Blocked { url: String },
    /// A pending safety check was not acknowledged.
    SafetyDeclined { message: String },
    IterationLimit,
}

/// Bounded queue of reasoning summaries waiting for their action.
#[derive(Debug)]
struct ReasonQueue {
    reasons: VecDeque<String>,
    capacity: usize,
}

impl ReasonQueue {
    fn new(capacity: usize) -> Self {
        Self {
            reasons: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, reason: String) {
        if self.reasons.len() == self.capacity {
            self.reasons.pop_front();
        }
        self.reasons.push_back(reason);
    }

    fn pop(&mut self) -> Option<String> {
        self.reasons.pop_front()
    }
}

/// What dispatching one action produced.
enum Dispatch {
    Result(InteractionItem),
    Blocked { result: InteractionItem, url: String },
    Declined(String),
}

/// Turn loop over one reasoning service and one computer.
pub struct TurnLoop<S, C>
where
    S: ReasoningService,
    C: Computer,
{
    service: Arc<S>,
    computer: Arc<C>,
    functions: FunctionRegistry,
    tools: Vec<Value>,
    compactor: Compactor,
    enforcer: InvariantEnforcer,
    retry: RetryController,
    safety: SafetyPolicy,
    acknowledger: Arc<dyn SafetyAcknowledger>,
    reasons: ReasonQueue,
    cancel: CancellationFlag,
    max_iterations: usize,
    truncation: Truncation,
}

impl<S, C> TurnLoop<S, C>
where
    S: ReasoningService,
    C: Computer,
{
    /// Create a turn loop with navigation functions and a declining
    /// safety acknowledger.
    pub fn new(service: Arc<S>, computer: Arc<C>, config: &LoopConfig) -> Self {
        let compactor = Compactor::new(config.compaction_policy());
        let enforcer = InvariantEnforcer::new(config.enforcer_policy());
        let retry =
            RetryController::new(config.retry_policy(), compactor.clone(), enforcer.clone());
        let functions = FunctionRegistry::with_navigation();
        let tools = CapabilityManifest::new(computer.as_ref(), &functions).tools();

        Self {
            service,
            computer,
            functions,
            tools,
            compactor,
            enforcer,
            retry,
            safety: config.safety_policy(),
            acknowledger: Arc::new(DeclineAll),
            reasons: ReasonQueue::new(config.reason_queue_len),
            cancel: CancellationFlag::new(),
            max_iterations: config.max_iterations,
            truncation: Truncation::Auto,
        }
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.tools = CapabilityManifest::new(self.computer.as_ref(), &functions).tools();
        self.functions = functions;
        self
    }

    pub fn with_acknowledger(mut self, acknowledger: Arc<dyn SafetyAcknowledger>) -> Self {
        self.acknowledger = acknowledger;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_truncation(mut self, truncation: Truncation) -> Self {
        self.truncation = truncation;
        self
    }

    /// Handle shared with whoever may cancel the turn.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn computer(&self) -> &Arc<C> {
        &self.computer
    }

    /// Rendered tools array sent with every request.
    pub fn tools(&self) -> &[Value] {
        &self.tools
    }

    /// Append a user instruction and run a turn.
    pub async fn run_instruction(
        &mut self,
        log: &mut InteractionLog,
        instruction: &str,
    ) -> Result<TurnOutcome, RuntimeError> {
        log.push(InteractionItem::user(instruction));
        self.run_turn(log).await
    }

    /// Run until the log ends with an assistant message.
    ///
    /// # Arguments
    /// * `log` - Session log; service output and action results are appended
    ///
    /// # Returns
    /// How the turn ended. Aborts, cancellation and safety stops are
    /// outcomes, not errors; the log keeps everything appended so far.
    ///
    /// # Errors
    /// `IntegrityError` if the log holds a result with no request
    pub async fn run_turn(
        &mut self,
        log: &mut InteractionLog,
    ) -> Result<TurnOutcome, RuntimeError> {
        let mut iterations = 0;

        while !log.is_terminal() {
            if self.cancel.is_cancelled() {
                info!("Turn cancelled before request");
                return Ok(TurnOutcome::Cancelled);
            }
            if iterations >= self.max_iterations {
                warn!("Turn stopped after {} service round trips", iterations);
                return Ok(TurnOutcome::IterationLimit);
            }
            iterations += 1;
            debug!("Turn iteration {}/{}", iterations, self.max_iterations);

            let candidate = self.compactor.compact(log);
            let candidate = self.enforcer.enforce(log, &candidate)?;

            let response = match self
                .retry
                .send_with_recovery(
                    self.service.as_ref(),
                    log,
                    candidate,
                    &self.tools,
                    self.truncation,
                )
                .await?
            {
                SendOutcome::Success(response) => response,
                SendOutcome::Aborted(reason) => {
                    warn!("Turn aborted: {}", reason);
                    return Ok(TurnOutcome::Aborted { reason });
                }
            };

            if response.output.is_empty() {
                warn!("Service returned no output");
                return Ok(TurnOutcome::Aborted {
                    reason: AbortReason::EmptyResponse,
                });
            }

            let first_new = log.len();
            for item in response.output {
                log.push(item);
            }
            let end = log.len();

            let mut dispatched = 0;
            for position in first_new..end {
                let Some(item) = log.get(position).cloned() else {
                    continue;
                };

                let dispatch = match item {
                    InteractionItem::Reasoning(reasoning) => {
                        let reason = reasoning.reason();
                        info!("[Reasoning] {}", reason);
                        self.reasons.push(reason);
                        continue;
                    }
                    InteractionItem::Message(_) => {
                        if let Some(text) = item.message_text() {
                            info!("Message: {}", text);
                        }
                        continue;
                    }
                    InteractionItem::ComputerCall(call) => {
                        if dispatched > 0 && self.cancel.is_cancelled() {
                            info!("Turn cancelled before {}", call.call_id);
                            return Ok(TurnOutcome::Cancelled);
                        }
                        dispatched += 1;
                        self.dispatch_computer_call(&call).await
                    }
                    InteractionItem::FunctionCall(call) => {
                        if dispatched > 0 && self.cancel.is_cancelled() {
                            info!("Turn cancelled before {}", call.call_id);
                            return Ok(TurnOutcome::Cancelled);
                        }
                        dispatched += 1;
                        self.dispatch_function_call(&call).await
                    }
                    InteractionItem::ComputerCallOutput(_)
                    | InteractionItem::FunctionCallOutput(_) => {
                        warn!("Ignoring action result sent by the service");
                        continue;
                    }
                };

                match dispatch {
                    Dispatch::Result(result) => {
                        log.push(result);
                    }
                    Dispatch::Blocked { result, url } => {
                        log.push(result);
                        warn!("Blocked location reached: {}", url);
                        return Ok(TurnOutcome::Blocked { url });
                    }
                    Dispatch::Declined(message) => {
                        warn!("Safety check declined: {}", message);
                        return Ok(TurnOutcome::SafetyDeclined { message });
                    }
                }
            }
        }

        let message = log.final_message().unwrap_or_default();
        info!("Turn completed after {} service round trips", iterations);
        Ok(TurnOutcome::Completed { message })
    }

    async fn dispatch_computer_call(&mut self, call: &ComputerCallItem) -> Dispatch {
        let suffix = self
            .reasons
            .pop()
            .map(|reason| format!("  # {}", reason))
            .unwrap_or_default();
        info!("{} {}{}", call.action_type(), call.action, suffix);

        for check in &call.pending_safety_checks {
            if !self.acknowledger.acknowledge(check).await {
                return Dispatch::Declined(check.message.clone());
            }
        }

        let status = {
            let _timer = MetricTimer::new("action_latency");
            let executed = match ComputerAction::parse(&call.action) {
                Ok(action) => execute_action(self.computer.as_ref(), &action).await,
                Err(e) => Err(e),
            };
            match executed {
                Ok(()) => None,
                Err(e) => {
                    warn!(call_id = %call.call_id, "Action failed: {}", e);
                    Some(ItemStatus::Incomplete)
                }
            }
        };

        let frame = match self.computer.capture_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Frame capture failed, sending blank frame: {}", e);
                BLANK_PNG_B64.to_string()
            }
        };
        let mut output = ScreenshotOutput::png(&frame);

        let mut blocked = None;
        if self.computer.environment() == Environment::Browser {
            match self.computer.current_location().await {
                Ok(url) => {
                    if self.safety.is_blocked(&url) {
                        blocked = Some(url.clone());
                    }
                    output.current_url = Some(url);
                }
                Err(e) => warn!("Could not read current location: {}", e),
            }
        }

        let result = InteractionItem::ComputerCallOutput(ComputerCallOutputItem {
            call_id: call.call_id.clone(),
            acknowledged_safety_checks: call.pending_safety_checks.clone(),
            output,
            status,
        });

        match blocked {
            Some(url) => Dispatch::Blocked { result, url },
            None => Dispatch::Result(result),
        }
    }

    async fn dispatch_function_call(&mut self, call: &FunctionCallItem) -> Dispatch {
        let suffix = self
            .reasons
            .pop()
            .map(|reason| format!("  # {}", reason))
            .unwrap_or_default();
        info!("{}({}){}", call.name, call.arguments, suffix);

        let output = {
            let _timer = MetricTimer::new("action_latency");
            match parse_arguments(&call.arguments) {
                Ok(args) => {
                    match self
                        .functions
                        .invoke(self.computer.as_ref(), &call.name, args)
                        .await
                    {
                        Ok(()) => "success".to_string(),
                        Err(CapabilityError::Unsupported(message)) => {
                            warn!("Unsupported function call: {}", message);
                            json!({"error": "unsupported", "message": message}).to_string()
                        }
                        Err(e) => {
                            warn!(call_id = %call.call_id, "Function failed: {}", e);
                            json!({"error": "failed", "message": e.to_string()}).to_string()
                        }
                    }
                }
                Err(e) => {
                    json!({"error": "invalid_arguments", "message": e.to_string()}).to_string()
                }
            }
        };

        Dispatch::Result(InteractionItem::FunctionCallOutput(FunctionCallOutputItem {
            call_id: call.call_id.clone(),
            output,
        }))
    }
}

fn parse_arguments(arguments: &str) -> Result<Value, serde_json::Error> {
    if arguments.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(arguments)
}
