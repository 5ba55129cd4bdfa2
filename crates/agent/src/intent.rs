//! Natural-language command to [`Intent`] translation.
//!
//! The service is asked for a single JSON document; everything it wraps around that
//! document (code fences, a sentence of preamble) is discarded before decoding.

use std::sync::Arc;

use crmpilot_core::errors::{CommandError, IntentParseError};
use crmpilot_core::Intent;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::{CompletionRequest, LlmClient};

pub const INSTRUCTION: &str = r#"You are a CRM command analyzer for Zoho CRM operations. Analyze the user's natural language command and determine which CRM operation should be performed.

Respond with a single JSON object and nothing else, containing:
- "operation": one of "create_account", "create_deal", "update_deal_stage", or "unknown"
- "data": the fields extracted from the command.

Field names by operation:
- create_account: "account_name", "phone", "website", "industry", "annual_revenue"
- create_deal: "deal_name", "account_name", "contact_name", "amount", "stage", "closing_date" (YYYY-MM-DD)
- update_deal_stage: "deal_name", "new_stage"

Omit fields the command does not mention.

Example:
{"operation": "create_deal", "data": {"account_name": "Acme Corp", "deal_name": "Big Deal", "amount": 1000, "stage": "Qualification", "contact_name": "John Doe", "closing_date": "2025-08-15"}}"#;

const DETERMINISTIC_TEMPERATURE: f32 = 0.0;

pub struct IntentParser {
    llm: Arc<dyn LlmClient>,
}

impl IntentParser {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn parse(&self, command: &str) -> Result<Intent, CommandError> {
        let request = CompletionRequest {
            instruction: INSTRUCTION.to_string(),
            command: command.trim().to_string(),
            temperature: DETERMINISTIC_TEMPERATURE,
        };

        let response = self.llm.complete(&request).await.map_err(|error| {
            warn!(event_name = "agent.intent.service_failed", error = %format!("{error:#}"), "intent service call failed");
            CommandError::IntentService(format!("{error:#}"))
        })?;

        let intent = decode_intent(&response)?;
        debug!(
            event_name = "agent.intent.parsed",
            operation = intent.operation().as_str(),
            "intent parsed"
        );
        Ok(intent)
    }
}

/// Decodes a service response into an intent, tolerating markdown fences and prose around
/// the outermost JSON object.
pub fn decode_intent(response: &str) -> Result<Intent, IntentParseError> {
    let payload = extract_document(response);
    let document: Value = serde_json::from_str(payload).map_err(|error| IntentParseError {
        message: error.to_string(),
        response: response.to_string(),
    })?;
    Intent::from_document(document)
}

fn extract_document(response: &str) -> &str {
    let trimmed = strip_fences(response.trim());
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn strip_fences(text: &str) -> &str {
    let text = text.strip_prefix("```json").or_else(|| text.strip_prefix("```")).unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}
