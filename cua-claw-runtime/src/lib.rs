//! CUA-Claw Runtime Core
//!
//! Computer-use agent runtime: keeps the interaction log, bounds each request
//! to the service, repairs request structure, and recovers from service
//! rejections without losing the session.

pub mod cancellation;
pub mod compactor;
pub mod computer;
pub mod config;
pub mod enforcer;
pub mod functions;
pub mod interfaces;
pub mod llm_client;
pub mod log;
pub mod metrics;
pub mod retry;
pub mod safety;
pub mod turn_loop;
pub mod types;

pub use cancellation::CancellationFlag;
pub use compactor::{CompactionPolicy, Compactor};
pub use computer::{
    execute_action, CapabilityError, Computer, ComputerAction, Environment, MouseButton, Point,
    BLANK_PNG_B64,
};
pub use config::{load_config, Config, LoopConfig, ServiceConfig};
pub use enforcer::{EnforcerPolicy, InvariantEnforcer, Violation};
pub use functions::{CapabilityManifest, FunctionRegistry, NamedFunction};
pub use interfaces::{
    FaultKind, ReasoningService, RuntimeError, ServiceFault, ServiceRequest, ServiceResponse,
    Truncation,
};
pub use llm_client::ResponsesClient;
pub use log::{Candidate, InteractionLog};
pub use retry::{AbortReason, RetryController, RetryPolicy, SendOutcome};
pub use safety::{AcknowledgeAll, DeclineAll, SafetyAcknowledger, SafetyPolicy};
pub use turn_loop::{TurnLoop, TurnOutcome};
pub use types::{InteractionItem, Role};
