use std::sync::Arc;

use crmpilot_core::config::AppConfig;
use crmpilot_core::errors::CommandError;
use crmpilot_core::Intent;
use crmpilot_crm::{CrmTransport, EntityResolver, TokenManager, ZohoTransport};
use reqwest::Client;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::dispatcher::{ActionDispatcher, DispatchOutcome};
use crate::intent::IntentParser;
use crate::llm::{HttpLlmClient, LlmClient};

/// Everything one command produced: the parsed intent when parsing got that far, and the
/// dispatch result or the first error.
#[derive(Debug)]
pub struct Execution {
    pub command_id: String,
    pub intent: Option<Intent>,
    pub result: Result<DispatchOutcome, CommandError>,
}

/// Owns the parse → dispatch pipeline for a process. Collaborators are injected so tests can
/// swap in scripted doubles.
pub struct AgentRuntime {
    parser: IntentParser,
    dispatcher: ActionDispatcher,
    transport: Arc<dyn CrmTransport>,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, transport: Arc<dyn CrmTransport>) -> Self {
        Self {
            parser: IntentParser::new(llm),
            dispatcher: ActionDispatcher::new(transport.clone()),
            transport,
        }
    }

    /// Wires the HTTP intent service, the Zoho transport and a single token manager.
    pub fn from_config(config: &AppConfig) -> Self {
        let client = Client::new();
        let tokens = Arc::new(TokenManager::from_config(client.clone(), config));
        let transport = Arc::new(ZohoTransport::new(client.clone(), &config.crm, tokens));
        let llm = Arc::new(HttpLlmClient::from_config(client, &config.llm));
        Self::new(llm, transport)
    }

    pub async fn parse(&self, command: &str) -> Result<Intent, CommandError> {
        self.parser.parse(command).await
    }

    pub async fn dispatch(&self, intent: &Intent) -> Result<DispatchOutcome, CommandError> {
        self.dispatcher.dispatch(intent).await
    }

    pub fn resolver(&self) -> EntityResolver<'_> {
        EntityResolver::new(self.transport.as_ref())
    }

    pub async fn execute(&self, command: &str) -> Execution {
        let command_id = format!("CMD-{}", Uuid::new_v4().simple());
        let span = info_span!("command", command_id = %command_id);

        async {
            let intent = match self.parse(command).await {
                Ok(intent) => intent,
                Err(error) => return Execution { command_id, intent: None, result: Err(error) },
            };
            let result = self.dispatch(&intent).await;
            Execution { command_id, intent: Some(intent), result }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use crmpilot_core::errors::CommandError;
    use crmpilot_core::{Intent, Operation};
    use crmpilot_crm::{CrmModule, InMemoryCrmTransport, TransportCall};
    use serde_json::json;

    use super::AgentRuntime;
    use crate::dispatcher::DispatchStatus;
    use crate::llm::{CompletionRequest, LlmClient};

    struct CannedLlm(&'static str);

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Ok(self.0.to_owned())
        }
    }

    fn runtime(reply: &'static str, transport: &Arc<InMemoryCrmTransport>) -> AgentRuntime {
        AgentRuntime::new(Arc::new(CannedLlm(reply)), transport.clone())
    }

    #[tokio::test]
    async fn create_deal_command_resolves_both_references() {
        let transport = Arc::new(InMemoryCrmTransport::new());
        transport.seed(CrmModule::Accounts, "acc-1", json!({ "Account_Name": "Acme Corp" })).await;
        transport.seed(CrmModule::Contacts, "con-1", json!({ "Full_Name": "John Doe" })).await;
        let runtime = runtime(
            r#"{"operation":"create_deal","data":{"account_name":"Acme Corp","deal_name":"Rocket Launch","amount":5000,"contact_name":"John Doe","closing_date":"2025-09-01"}}"#,
            &transport,
        );

        let execution = runtime
            .execute(
                "Create a deal called Rocket Launch for Acme Corp worth 5000 with John Doe, closing 2025-09-01",
            )
            .await;
        assert!(execution.command_id.starts_with("CMD-"));
        assert_eq!(execution.intent.as_ref().map(Intent::operation), Some(Operation::CreateDeal));
        let outcome = execution.result.expect("dispatch should succeed");
        assert_eq!(outcome.status, DispatchStatus::Applied);
        assert!(outcome.warnings.is_empty());

        let calls = transport.calls().await;
        assert_eq!(calls.len(), 3, "two lookups then one create");
        assert_eq!(transport.mutation_count().await, 1);
        match calls.last() {
            Some(TransportCall::Create { module, fields }) => {
                assert_eq!(*module, CrmModule::Deals);
                assert_eq!(
                    serde_json::Value::Object(fields.clone()),
                    json!({
                        "Deal_Name": "Rocket Launch",
                        "Amount": 5000,
                        "Stage": "Qualification",
                        "Closing_Date": "2025-09-01",
                        "Account_Name": { "id": "acc-1" },
                        "Contact_Name": { "id": "con-1" }
                    })
                );
            }
            other => panic!("expected a deal create, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn move_deal_command_searches_once_and_updates_once() {
        let transport = Arc::new(InMemoryCrmTransport::new());
        transport.seed(CrmModule::Deals, "deal-7", json!({ "Deal_Name": "Rocket Launch" })).await;
        let runtime = runtime(
            r#"{"operation":"update_deal_stage","data":{"deal_name":"Rocket Launch","new_stage":"negotiation"}}"#,
            &transport,
        );

        let execution = runtime.execute("Move the Rocket Launch deal to negotiation").await;
        let outcome = execution.result.expect("dispatch should succeed");
        assert_eq!(outcome.record_id.as_deref(), Some("deal-7"));

        let calls = transport.calls().await;
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], TransportCall::Search { module: CrmModule::Deals, .. }));
        match &calls[1] {
            TransportCall::Update { id, fields, .. } => {
                assert_eq!(id, "deal-7");
                assert_eq!(
                    serde_json::Value::Object(fields.clone()),
                    json!({ "Stage": "Negotiation/Review" })
                );
            }
            other => panic!("expected a stage update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn parse_failure_has_no_intent_and_no_crm_calls() {
        let transport = Arc::new(InMemoryCrmTransport::new());
        let runtime = runtime("Sorry, I can't help with that.", &transport);

        let execution = runtime.execute("do something").await;
        assert!(execution.intent.is_none());
        assert!(matches!(execution.result, Err(CommandError::IntentParse(_))));
        assert!(transport.calls().await.is_empty());
    }

    #[tokio::test]
    async fn resolver_is_available_for_lookups() {
        let transport = Arc::new(InMemoryCrmTransport::new());
        transport.seed_user("usr-4", "Priya Natarajan").await;
        let runtime = runtime("{}", &transport);

        let found = runtime.resolver().find_user_id("priya").await.expect("lookup");
        assert_eq!(found.map(|reference| reference.id), Some("usr-4".to_owned()));
    }
}
