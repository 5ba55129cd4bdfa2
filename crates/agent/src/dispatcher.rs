use std::sync::Arc;

use chrono::NaiveDate;
use crmpilot_core::domain::intent::{AccountPayload, Amount, DealPayload, StageUpdatePayload};
use crmpilot_core::errors::CommandError;
use crmpilot_core::{canonical_stage, normalize_stage, Intent, Operation, DEFAULT_DEAL_STAGE};
use crmpilot_crm::{CrmModule, CrmTransport, EntityResolver, MutationRecord, SearchCriteria};
use serde::Serialize;
use serde_json::{json, Map, Number, Value};
use tracing::{info, warn};

pub const UNSUPPORTED_MESSAGE: &str = "Unknown or unsupported operation";
const UNNAMED_ACCOUNT: &str = "Unnamed";
const NO_DEAL_NAME: &str = "(no deal name given)";
const CLOSING_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Applied,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub operation: Operation,
    pub status: DispatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub message: String,
    pub warnings: Vec<String>,
    pub response: Value,
}

impl DispatchOutcome {
    fn applied(operation: Operation, record: MutationRecord, warnings: Vec<String>) -> Self {
        let response = json!({
            "code": record.code,
            "message": record.message,
            "details": record.details,
        });
        Self {
            operation,
            status: DispatchStatus::Applied,
            message: record.message,
            record_id: record.id,
            warnings,
            response,
        }
    }

    fn unsupported() -> Self {
        Self {
            operation: Operation::Unknown,
            status: DispatchStatus::Unsupported,
            record_id: None,
            message: UNSUPPORTED_MESSAGE.to_string(),
            warnings: Vec::new(),
            response: json!({ "message": UNSUPPORTED_MESSAGE }),
        }
    }
}

/// Executes exactly one terminal action per intent, issuing at most one mutating CRM call.
pub struct ActionDispatcher {
    transport: Arc<dyn CrmTransport>,
}

impl ActionDispatcher {
    pub fn new(transport: Arc<dyn CrmTransport>) -> Self {
        Self { transport }
    }

    pub async fn dispatch(&self, intent: &Intent) -> Result<DispatchOutcome, CommandError> {
        let outcome = match intent {
            Intent::CreateAccount(payload) => self.create_account(payload).await?,
            Intent::CreateDeal(payload) => self.create_deal(payload).await?,
            Intent::UpdateDealStage(payload) => self.update_deal_stage(payload).await?,
            Intent::Unknown(request) => {
                info!(
                    event_name = "agent.dispatch.unsupported",
                    requested = request.requested.as_deref().unwrap_or(""),
                    "operation is not supported"
                );
                return Ok(DispatchOutcome::unsupported());
            }
        };

        info!(
            event_name = "agent.dispatch.completed",
            operation = outcome.operation.as_str(),
            record_id = outcome.record_id.as_deref().unwrap_or(""),
            warnings = outcome.warnings.len(),
            "crm mutation applied"
        );
        Ok(outcome)
    }

    async fn create_account(&self, payload: &AccountPayload) -> Result<DispatchOutcome, CommandError> {
        let name = payload.name.as_deref().ok_or(CommandError::MissingField {
            operation: Operation::CreateAccount.as_str(),
            field: "account_name",
        })?;

        let mut fields = Map::new();
        fields.insert("Account_Name".to_string(), json!(name));
        insert_text(&mut fields, "Phone", payload.phone.as_deref());
        insert_text(&mut fields, "Website", payload.website.as_deref());
        insert_text(&mut fields, "Industry", payload.industry.as_deref());
        let mut warnings = Vec::new();
        match &payload.annual_revenue {
            Some(Amount::Number(revenue)) => {
                fields.insert("Annual_Revenue".to_string(), Value::Number(revenue.clone()));
            }
            Some(Amount::Unparsed(raw)) => warnings
                .push(format!("Annual revenue `{raw}` is not a number and was not sent")),
            None => {}
        }

        let record = self.transport.create(CrmModule::Accounts, fields).await?;
        Ok(DispatchOutcome::applied(Operation::CreateAccount, record, warnings))
    }

    async fn create_deal(&self, payload: &DealPayload) -> Result<DispatchOutcome, CommandError> {
        let resolver = EntityResolver::new(self.transport.as_ref());
        let mut warnings = Vec::new();

        let account = match payload.account_name.as_deref() {
            Some(name) => {
                let found = resolver.find_account_id(name).await?;
                if found.is_none() {
                    warnings.push(format!("Account not found: {name}; deal created without an account"));
                }
                found
            }
            None => None,
        };
        let contact = match payload.contact_name.as_deref() {
            Some(name) => {
                let found = resolver.find_contact_id(name).await?;
                if found.is_none() {
                    warnings.push(format!("Contact not found: {name}; deal created without a contact"));
                }
                found
            }
            None => None,
        };

        let deal_name = payload.deal_name.clone().unwrap_or_else(|| {
            format!("{} Deal", payload.account_name.as_deref().unwrap_or(UNNAMED_ACCOUNT))
        });
        let amount = match &payload.amount {
            Some(Amount::Number(amount)) => amount.clone(),
            Some(Amount::Unparsed(raw)) => {
                warnings.push(format!(
                    "Amount `{raw}` is not a number; the deal was created with amount 0"
                ));
                Number::from(0)
            }
            None => Number::from(0),
        };
        let stage = match payload.stage.as_deref() {
            Some(stage) => normalize_with_warning(stage, &mut warnings),
            None => DEFAULT_DEAL_STAGE.to_string(),
        };

        let mut fields = Map::new();
        fields.insert("Deal_Name".to_string(), json!(deal_name));
        fields.insert("Amount".to_string(), Value::Number(amount));
        fields.insert("Stage".to_string(), json!(stage));
        if let Some(raw) = payload.closing_date.as_deref() {
            match NaiveDate::parse_from_str(raw, CLOSING_DATE_FORMAT) {
                Ok(date) => {
                    fields.insert(
                        "Closing_Date".to_string(),
                        json!(date.format(CLOSING_DATE_FORMAT).to_string()),
                    );
                }
                Err(_) => warnings.push(format!(
                    "Closing date `{raw}` is not a YYYY-MM-DD date and was not sent"
                )),
            }
        }
        if let Some(account) = account {
            fields.insert("Account_Name".to_string(), json!({ "id": account.id }));
        }
        if let Some(contact) = contact {
            fields.insert("Contact_Name".to_string(), json!({ "id": contact.id }));
        }

        let record = self.transport.create(CrmModule::Deals, fields).await?;
        Ok(DispatchOutcome::applied(Operation::CreateDeal, record, warnings))
    }

    async fn update_deal_stage(
        &self,
        payload: &StageUpdatePayload,
    ) -> Result<DispatchOutcome, CommandError> {
        let Some(deal_name) = payload.deal_name.as_deref() else {
            return Err(CommandError::DealNotFound { deal_name: NO_DEAL_NAME.to_string() });
        };

        let matches = self
            .transport
            .search(CrmModule::Deals, &SearchCriteria::contains("Deal_Name", deal_name))
            .await?;
        let Some(deal) = matches.into_iter().next() else {
            return Err(CommandError::DealNotFound { deal_name: deal_name.to_string() });
        };

        let raw_stage = payload
            .new_stage
            .as_deref()
            .filter(|stage| !stage.trim().is_empty())
            .ok_or(CommandError::MissingStage)?;
        let mut warnings = Vec::new();
        let stage = normalize_with_warning(raw_stage, &mut warnings);

        let mut fields = Map::new();
        fields.insert("Stage".to_string(), json!(stage));
        let record = self.transport.update(CrmModule::Deals, &deal.id, fields).await?;

        let mut outcome = DispatchOutcome::applied(Operation::UpdateDealStage, record, warnings);
        outcome.record_id.get_or_insert(deal.id);
        Ok(outcome)
    }
}

fn insert_text(fields: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), json!(value));
    }
}

fn normalize_with_warning(stage: &str, warnings: &mut Vec<String>) -> String {
    if canonical_stage(stage).is_none() {
        warn!(event_name = "agent.dispatch.unmapped_stage", stage, "stage label forwarded unmapped");
        warnings.push(format!("Stage `{stage}` is not a known pipeline stage and was sent as given"));
    }
    normalize_stage(stage)
}
