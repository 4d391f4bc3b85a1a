//! Structural repair of request candidates.
//!
//! The service rejects a request when a result arrives without its request,
//! or when an action request arrives without the reasoning trace that
//! preceded it. The enforcer repairs a candidate so neither can happen, using
//! only correlation keys and log positions.

use crate::interfaces::RuntimeError;
use crate::log::{Candidate, InteractionLog};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, error};

/// Enforcer tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnforcerPolicy {
    /// Number of most recent trace/request pairs always included.
    pub pad_pairs: usize,
}

/// Structural defect found in a candidate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("result at {position} has no earlier request for call_id {call_id}")]
    UnpairedResult { position: usize, call_id: String },

    #[error("request at {position} is missing its reasoning trace")]
    DetachedRequest { position: usize },

    #[error("reasoning trace at {position} is not followed by its request")]
    OrphanTrace { position: usize },
}

/// Correlation-key lookups over the full log.
struct LogIndex<'a> {
    log: &'a InteractionLog,
    /// call_id to request positions, ascending.
    requests: HashMap<&'a str, Vec<usize>>,
}

impl<'a> LogIndex<'a> {
    fn build(log: &'a InteractionLog) -> Self {
        let mut requests: HashMap<&str, Vec<usize>> = HashMap::new();
        for (position, item) in log.items().iter().enumerate() {
            if let Some(call_id) = item.request_call_id() {
                requests.entry(call_id).or_default().push(position);
            }
        }
        Self { log, requests }
    }

    /// Most recent request for `call_id` strictly before `before`.
    fn request_before(&self, call_id: &str, before: usize) -> Option<usize> {
        self.requests
            .get(call_id)?
            .iter()
            .rev()
            .copied()
            .find(|&position| position < before)
    }

    fn has_request_before(&self, candidate: &Candidate, call_id: &str, before: usize) -> bool {
        self.requests
            .get(call_id)
            .map(|positions| {
                positions
                    .iter()
                    .any(|&position| position < before && candidate.contains(position))
            })
            .unwrap_or(false)
    }

    fn is_request(&self, position: usize) -> bool {
        self.log
            .get(position)
            .map(|item| item.is_action_request())
            .unwrap_or(false)
    }

    fn is_trace(&self, position: usize) -> bool {
        self.log
            .get(position)
            .map(|item| item.is_reasoning())
            .unwrap_or(false)
    }

    /// Trace sitting immediately before a request in the log.
    fn preceding_trace(&self, request: usize) -> Option<usize> {
        let trace = request.checked_sub(1)?;
        self.is_trace(trace).then_some(trace)
    }

    /// Request sitting immediately after a trace in the log.
    fn following_request(&self, trace: usize) -> Option<usize> {
        let request = trace + 1;
        self.is_request(request).then_some(request)
    }
}

/// First candidate position of each result call_id, in position order.
fn first_results<'a>(log: &'a InteractionLog, candidate: &Candidate) -> BTreeMap<usize, &'a str> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for position in candidate.positions() {
        if let Some(call_id) = log.get(position).and_then(|item| item.result_call_id()) {
            seen.entry(call_id).or_insert(position);
        }
    }
    seen.into_iter()
        .map(|(call_id, position)| (position, call_id))
        .collect()
}

/// Repairs candidates so pairing and adjacency hold.
#[derive(Debug, Clone, Default)]
pub struct InvariantEnforcer {
    policy: EnforcerPolicy,
}

impl InvariantEnforcer {
    pub fn new(policy: EnforcerPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> EnforcerPolicy {
        self.policy
    }

    /// Repair a candidate against the full log.
    ///
    /// Runs pairing repair, adjacency repair, orphan elimination and
    /// padding, in that order. Positions outside the log are discarded.
    ///
    /// # Arguments
    /// * `log` - Full interaction log
    /// * `candidate` - Proposed subset, usually from the compactor
    ///
    /// # Returns
    /// A candidate where every result follows its request and every
    /// request that had a reasoning trace sits right after it
    ///
    /// # Errors
    /// `IntegrityError` when a result's request is nowhere in the log
    pub fn enforce(
        &self,
        log: &InteractionLog,
        candidate: &Candidate,
    ) -> Result<Candidate, RuntimeError> {
        let index = LogIndex::build(log);
        let mut repaired =
            Candidate::from_positions(candidate.positions().filter(|&p| p < log.len()));
        let before = repaired.len();

        // Pairing
        let mut paired = 0;
        for (first, call_id) in first_results(log, &repaired) {
            if index.has_request_before(&repaired, call_id, first) {
                continue;
            }
            match index.request_before(call_id, first) {
                Some(request) => {
                    repaired.insert(request);
                    paired += 1;
                }
                None => {
                    error!(
                        call_id = call_id,
                        position = first,
                        "Result has no matching request anywhere in the log"
                    );
                    crate::metrics::increment_integrity_faults();
                    return Err(RuntimeError::IntegrityError {
                        call_id: call_id.to_string(),
                    });
                }
            }
        }

        // Adjacency
        let requests: Vec<usize> = repaired
            .positions()
            .filter(|&p| index.is_request(p))
            .collect();
        let mut attached = 0;
        for request in requests {
            if let Some(trace) = index.preceding_trace(request) {
                if repaired.insert(trace) {
                    attached += 1;
                }
            }
        }

        // Orphans
        let traces: Vec<usize> = repaired.positions().filter(|&p| index.is_trace(p)).collect();
        let mut orphans = 0;
        for trace in traces {
            let anchored = index
                .following_request(trace)
                .map(|request| repaired.contains(request))
                .unwrap_or(false);
            if !anchored {
                repaired.remove(trace);
                orphans += 1;
            }
        }

        // Padding
        let mut padded = 0;
        if self.policy.pad_pairs > 0 {
            let pairs: Vec<(usize, usize)> = (0..log.len())
                .rev()
                .filter(|&position| index.is_trace(position))
                .filter_map(|trace| {
                    index
                        .following_request(trace)
                        .map(|request| (trace, request))
                })
                .take(self.policy.pad_pairs)
                .collect();
            for (trace, request) in pairs {
                if !repaired.contains(request) {
                    repaired.insert(trace);
                    repaired.insert(request);
                    padded += 1;
                }
            }
        }

        debug!(
            before,
            after = repaired.len(),
            paired,
            attached,
            orphans,
            padded,
            "Enforced candidate"
        );

        Ok(repaired)
    }

    /// Check a candidate without repairing it.
    ///
    /// # Errors
    /// The first structural defect found, in position order
    pub fn verify(log: &InteractionLog, candidate: &Candidate) -> Result<(), Violation> {
        let index = LogIndex::build(log);

        for (position, call_id) in first_results(log, candidate) {
            if !index.has_request_before(candidate, call_id, position) {
                return Err(Violation::UnpairedResult {
                    position,
                    call_id: call_id.to_string(),
                });
            }
        }

        for position in candidate.positions() {
            if index.is_request(position) {
                if let Some(trace) = index.preceding_trace(position) {
                    if !candidate.contains(trace) {
                        return Err(Violation::DetachedRequest { position });
                    }
                }
            }
            if index.is_trace(position) {
                let anchored = index
                    .following_request(position)
                    .map(|request| candidate.contains(request))
                    .unwrap_or(false);
                if !anchored {
                    return Err(Violation::OrphanTrace { position });
                }
            }
        }

        Ok(())
    }
}
