//! Agent runtime: natural language in, one CRM mutation out.
//!
//! The pipeline is strictly sequential:
//! 1. **Intent parsing** (`intent`) - the intent service translates a command into a typed
//!    [`Intent`](crmpilot_core::Intent)
//! 2. **Dispatch** (`dispatcher`) - names are resolved, stages normalized, and exactly one
//!    create or update is issued through the CRM transport
//!
//! The LLM is strictly a translator. It never decides record identifiers or stage labels;
//! those come from CRM lookups and the fixed stage table.

pub mod dispatcher;
pub mod intent;
pub mod llm;
pub mod runtime;

pub use dispatcher::{ActionDispatcher, DispatchOutcome, DispatchStatus};
pub use intent::IntentParser;
pub use llm::{CompletionRequest, HttpLlmClient, LlmClient};
pub use runtime::{AgentRuntime, Execution};
