//! Retry controller: sends a candidate and recovers from service faults.
//!
//! Transient faults resend the same candidate after a jittered exponential
//! delay. Structural faults rebuild the candidate from a wider tail, forcing
//! in any reasoning trace the service named. Both ladders are bounded; when
//! they run out the turn is aborted, never crashed.

use crate::compactor::Compactor;
use crate::enforcer::InvariantEnforcer;
use crate::interfaces::{
    FaultKind, ReasoningService, RuntimeError, ServiceFault, ServiceRequest, ServiceResponse,
    Truncation,
};
use crate::log::{Candidate, InteractionLog};
use crate::metrics::MetricTimer;
use rand::Rng;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Bounds for both recovery ladders.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total sends allowed per request, including the first.
    pub max_attempts: u32,
    /// Distinct tail widenings before falling back to the full log.
    pub max_widenings: u32,
    pub widen_factor: usize,
    pub max_tail: usize,
    pub backoff_base: Duration,
    pub backoff_factor: f64,
    pub backoff_max: Duration,
    /// Send the entire log as a last resort for structural faults.
    pub full_log_fallback: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_widenings: 2,
            widen_factor: 2,
            max_tail: 64,
            backoff_base: Duration::from_millis(700),
            backoff_factor: 1.7,
            backoff_max: Duration::from_secs(20),
            full_log_fallback: true,
        }
    }
}

/// Why a request was given up on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    #[error("gave up after {attempts} attempts: {last}")]
    AttemptsExhausted { attempts: u32, last: ServiceFault },

    #[error("non-recoverable service fault: {0}")]
    NonRecoverable(ServiceFault),

    #[error("structural fault persisted after widening: {0}")]
    StructuralUnresolved(ServiceFault),

    #[error("service returned no output")]
    EmptyResponse,
}

/// Result of [`RetryController::send_with_recovery`].
#[derive(Debug)]
pub enum SendOutcome {
    Success(ServiceResponse),
    Aborted(AbortReason),
}

#[derive(Debug)]
enum Recovery {
    Backoff,
    Widen { reasoning_id: Option<String> },
}

#[derive(Debug)]
enum AttemptState {
    Sending,
    Success(ServiceResponse),
    Retryable(Recovery, ServiceFault),
    Fatal(AbortReason),
}

/// Mutable bookkeeping for one `send_with_recovery` call.
struct Attempts {
    candidate: Candidate,
    attempt: u32,
    widenings: u32,
    keep_tail: usize,
    forced: BTreeSet<String>,
    sent_full: bool,
}

fn classify(fault: ServiceFault) -> AttemptState {
    match &fault.kind {
        FaultKind::Transient => AttemptState::Retryable(Recovery::Backoff, fault),
        FaultKind::MissingReasoning { id } => {
            let reasoning_id = Some(id.clone());
            AttemptState::Retryable(Recovery::Widen { reasoning_id }, fault)
        }
        FaultKind::MissingCallForOutput { .. } => {
            AttemptState::Retryable(Recovery::Widen { reasoning_id: None }, fault)
        }
        FaultKind::Fatal => AttemptState::Fatal(AbortReason::NonRecoverable(fault)),
    }
}

fn fault_label(kind: &FaultKind) -> &'static str {
    match kind {
        FaultKind::MissingReasoning { .. } => "missing_reasoning",
        FaultKind::MissingCallForOutput { .. } => "missing_call",
        FaultKind::Transient => "transient",
        FaultKind::Fatal => "fatal",
    }
}

/// Drives one outbound request to success or a graceful abort.
#[derive(Debug, Clone, Default)]
pub struct RetryController {
    policy: RetryPolicy,
    compactor: Compactor,
    enforcer: InvariantEnforcer,
}

impl RetryController {
    pub fn new(policy: RetryPolicy, compactor: Compactor, enforcer: InvariantEnforcer) -> Self {
        Self {
            policy,
            compactor,
            enforcer,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Delay before transient retry number `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let jitter = rand::thread_rng().gen_range(0.85..1.35);
        let seconds = self.policy.backoff_base.as_secs_f64()
            * self.policy.backoff_factor.powi(exponent)
            * jitter;
        let capped = seconds.min(self.policy.backoff_max.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.policy.backoff_max)
    }

    /// Send a candidate, recovering from faults within the policy bounds.
    ///
    /// The log is never modified. A structural retry may send a different,
    /// wider candidate than the one passed in.
    ///
    /// # Arguments
    /// * `service` - Reasoning service
    /// * `log` - Full interaction log
    /// * `candidate` - Enforced candidate for the first attempt
    /// * `tools` - Rendered capability manifest
    /// * `truncation` - Truncation mode for every attempt
    ///
    /// # Returns
    /// The service response, or the reason the request was abandoned
    ///
    /// # Errors
    /// `IntegrityError` if rebuilding a widened candidate finds a result
    /// without any request in the log
    pub async fn send_with_recovery<S>(
        &self,
        service: &S,
        log: &InteractionLog,
        candidate: Candidate,
        tools: &[Value],
        truncation: Truncation,
    ) -> Result<SendOutcome, RuntimeError>
    where
        S: ReasoningService + ?Sized,
    {
        let mut run = Attempts {
            candidate,
            attempt: 0,
            widenings: 0,
            keep_tail: self.compactor.policy().keep_tail,
            forced: BTreeSet::new(),
            sent_full: false,
        };
        let mut state = AttemptState::Sending;

        loop {
            state = match state {
                AttemptState::Sending => {
                    run.attempt += 1;
                    match self.send_once(service, log, &run, tools, truncation).await {
                        Ok(response) => AttemptState::Success(response),
                        Err(fault) => classify(fault),
                    }
                }
                AttemptState::Success(response) => {
                    if run.attempt > 1 {
                        info!("Request succeeded on attempt {}", run.attempt);
                    }
                    return Ok(SendOutcome::Success(response));
                }
                AttemptState::Fatal(reason) => {
                    warn!("Aborting request: {}", reason);
                    return Ok(SendOutcome::Aborted(reason));
                }
                AttemptState::Retryable(recovery, fault) => {
                    crate::metrics::increment_retry_count(fault_label(&fault.kind));

                    if run.attempt >= self.policy.max_attempts {
                        let reason = AbortReason::AttemptsExhausted {
                            attempts: run.attempt,
                            last: fault,
                        };
                        warn!("Aborting request: {}", reason);
                        return Ok(SendOutcome::Aborted(reason));
                    }

                    match recovery {
                        Recovery::Backoff => {
                            let delay = self.backoff_delay(run.attempt);
                            warn!(
                                attempt = run.attempt,
                                max_attempts = self.policy.max_attempts,
                                request_id = fault.request_id.as_deref().unwrap_or("-"),
                                "[Retry] {}; retrying in {:?}",
                                fault.message,
                                delay
                            );
                            tokio::time::sleep(delay).await;
                            AttemptState::Sending
                        }
                        Recovery::Widen { reasoning_id } => {
                            match self.widen(log, &mut run, reasoning_id, &fault)? {
                                Some(reason) => AttemptState::Fatal(reason),
                                None => AttemptState::Sending,
                            }
                        }
                    }
                }
            };
        }
    }

    async fn send_once<S>(
        &self,
        service: &S,
        log: &InteractionLog,
        run: &Attempts,
        tools: &[Value],
        truncation: Truncation,
    ) -> Result<ServiceResponse, ServiceFault>
    where
        S: ReasoningService + ?Sized,
    {
        let input = run.candidate.materialize(log);
        crate::metrics::record_candidate_items(input.len());
        debug!(
            attempt = run.attempt,
            items = input.len(),
            "Request input: {}",
            serde_json::to_string(
                &input.iter().map(|item| item.redacted()).collect::<Vec<_>>()
            )
            .unwrap_or_default()
        );

        let request = ServiceRequest {
            input,
            tools: tools.to_vec(),
            truncation,
        };

        let _timer = MetricTimer::new("service_request_latency");
        service.respond(&request).await
    }

    /// Apply one widening step. Returns an abort reason when the ladder is spent.
    fn widen(
        &self,
        log: &InteractionLog,
        run: &mut Attempts,
        reasoning_id: Option<String>,
        fault: &ServiceFault,
    ) -> Result<Option<AbortReason>, RuntimeError> {
        if run.sent_full {
            return Ok(Some(AbortReason::StructuralUnresolved(fault.clone())));
        }

        run.widenings += 1;
        crate::metrics::increment_widening_count();
        run.keep_tail = run
            .keep_tail
            .saturating_mul(self.policy.widen_factor)
            .min(self.policy.max_tail)
            .max(run.keep_tail);
        if let Some(id) = reasoning_id {
            run.forced.insert(id);
        }

        let ladder_spent = run.widenings > self.policy.max_widenings;
        let final_attempt = run.attempt + 1 >= self.policy.max_attempts;

        if self.policy.full_log_fallback && (ladder_spent || final_attempt) {
            info!(
                widenings = run.widenings,
                "Structural fault ({}); sending the full log ({} items)",
                fault.kind,
                log.len()
            );
            run.candidate = Candidate::full(log.len());
            run.sent_full = true;
            return Ok(None);
        }

        if ladder_spent {
            return Ok(Some(AbortReason::StructuralUnresolved(fault.clone())));
        }

        info!(
            widenings = run.widenings,
            keep_tail = run.keep_tail,
            "Structural fault ({}); widening context",
            fault.kind
        );
        run.candidate = self.rebuild(log, run.keep_tail, &run.forced)?;
        Ok(None)
    }

    /// Compact with a wider tail, force in named traces, and re-enforce.
    fn rebuild(
        &self,
        log: &InteractionLog,
        keep_tail: usize,
        forced: &BTreeSet<String>,
    ) -> Result<Candidate, RuntimeError> {
        let mut candidate = self.compactor.compact_with_tail(log, keep_tail);

        for id in forced {
            let position = log
                .items()
                .iter()
                .rposition(|item| item.reasoning_id() == Some(id.as_str()));
            match position {
                Some(trace) => {
                    candidate.insert(trace);
                    if log.get(trace + 1).map(|i| i.is_action_request()).unwrap_or(false) {
                        candidate.insert(trace + 1);
                    }
                }
                None => warn!("Service named reasoning item {} which is not in the log", id),
            }
        }

        self.enforcer.enforce(log, &candidate)
    }
}
