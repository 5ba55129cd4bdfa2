use std::collections::HashMap;

use async_trait::async_trait;
use crmpilot_core::errors::{CrmError, TransportError};
use serde_json::{json, Map, Value};
use tokio::sync::{Mutex, RwLock};

use crate::criteria::{CrmModule, SearchCriteria, SearchOperator};
use crate::transport::{CrmRecord, CrmTransport, CrmUser, MutationRecord};

#[derive(Clone, Debug, PartialEq)]
pub enum TransportCall {
    Search { module: CrmModule, criteria: String },
    Create { module: CrmModule, fields: Map<String, Value> },
    Update { module: CrmModule, id: String, fields: Map<String, Value> },
    ListActiveUsers,
}

impl TransportCall {
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Create { .. } | Self::Update { .. })
    }
}

/// Transport backed by process memory. Searches compare case-insensitively, created
/// records receive sequential ids, and every call is recorded for later inspection.
#[derive(Default)]
pub struct InMemoryCrmTransport {
    records: RwLock<HashMap<CrmModule, Vec<CrmRecord>>>,
    users: RwLock<Vec<CrmUser>>,
    calls: Mutex<Vec<TransportCall>>,
    rejection: Mutex<Option<TransportError>>,
    next_id: Mutex<u64>,
}

impl InMemoryCrmTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, module: CrmModule, id: &str, fields: Value) {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.records
            .write()
            .await
            .entry(module)
            .or_default()
            .push(CrmRecord { id: id.to_string(), fields });
    }

    pub async fn seed_user(&self, id: &str, full_name: &str) {
        self.users.write().await.push(CrmUser { id: id.to_string(), full_name: full_name.to_string() });
    }

    /// Makes the next create or update fail with `error`.
    pub async fn reject_next_mutation(&self, error: TransportError) {
        *self.rejection.lock().await = Some(error);
    }

    pub async fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().await.clone()
    }

    pub async fn mutation_count(&self) -> usize {
        self.calls.lock().await.iter().filter(|call| call.is_mutation()).count()
    }

    pub async fn records(&self, module: CrmModule) -> Vec<CrmRecord> {
        self.records.read().await.get(&module).cloned().unwrap_or_default()
    }

    async fn record_call(&self, call: TransportCall) {
        self.calls.lock().await.push(call);
    }

    async fn take_rejection(&self) -> Option<TransportError> {
        self.rejection.lock().await.take()
    }

    async fn allocate_id(&self) -> String {
        let mut next_id = self.next_id.lock().await;
        *next_id += 1;
        format!("mem-{:06}", *next_id)
    }
}

fn matches_criteria(record: &CrmRecord, criteria: &SearchCriteria) -> bool {
    let Some(value) = record.field_str(criteria.field) else {
        return false;
    };
    let value = value.to_lowercase();
    let needle = criteria.value.to_lowercase();
    match criteria.operator {
        SearchOperator::Equals => value == needle,
        SearchOperator::Contains => value.contains(&needle),
    }
}

fn success(id: &str, message: &str) -> MutationRecord {
    MutationRecord {
        id: Some(id.to_string()),
        code: "SUCCESS".to_string(),
        message: message.to_string(),
        details: json!({ "id": id }),
    }
}

#[async_trait]
impl CrmTransport for InMemoryCrmTransport {
    async fn search(
        &self,
        module: CrmModule,
        criteria: &SearchCriteria,
    ) -> Result<Vec<CrmRecord>, CrmError> {
        self.record_call(TransportCall::Search { module, criteria: criteria.to_string() }).await;
        let records = self.records.read().await;
        Ok(records
            .get(&module)
            .map(|records| {
                records.iter().filter(|record| matches_criteria(record, criteria)).cloned().collect()
            })
            .unwrap_or_default())
    }

    async fn create(
        &self,
        module: CrmModule,
        fields: Map<String, Value>,
    ) -> Result<MutationRecord, CrmError> {
        self.record_call(TransportCall::Create { module, fields: fields.clone() }).await;
        if let Some(error) = self.take_rejection().await {
            return Err(error.into());
        }

        let id = self.allocate_id().await;
        self.records
            .write()
            .await
            .entry(module)
            .or_default()
            .push(CrmRecord { id: id.clone(), fields });
        Ok(success(&id, "record added"))
    }

    async fn update(
        &self,
        module: CrmModule,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<MutationRecord, CrmError> {
        self.record_call(TransportCall::Update {
            module,
            id: id.to_string(),
            fields: fields.clone(),
        })
        .await;
        if let Some(error) = self.take_rejection().await {
            return Err(error.into());
        }

        let mut records = self.records.write().await;
        let record = records
            .get_mut(&module)
            .and_then(|records| records.iter_mut().find(|record| record.id == id))
            .ok_or_else(|| TransportError::Rejected {
                code: "INVALID_DATA".to_string(),
                message: "the id given seems to be invalid".to_string(),
            })?;
        record.fields.extend(fields);
        Ok(success(id, "record updated"))
    }

    async fn list_active_users(&self) -> Result<Vec<CrmUser>, CrmError> {
        self.record_call(TransportCall::ListActiveUsers).await;
        Ok(self.users.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use crmpilot_core::errors::{CrmError, TransportError};
    use serde_json::{json, Map};

    use super::{InMemoryCrmTransport, TransportCall};
    use crate::criteria::{CrmModule, SearchCriteria};
    use crate::transport::CrmTransport;

    #[tokio::test]
    async fn search_matches_case_insensitively() {
        let transport = InMemoryCrmTransport::new();
        transport.seed(CrmModule::Deals, "d-1", json!({ "Deal_Name": "Rocket Launch" })).await;
        transport.seed(CrmModule::Deals, "d-2", json!({ "Deal_Name": "Harbor Expansion" })).await;

        let contains = transport
            .search(CrmModule::Deals, &SearchCriteria::contains("Deal_Name", "rocket"))
            .await
            .expect("search");
        assert_eq!(contains.len(), 1);
        assert_eq!(contains[0].id, "d-1");

        let equals = transport
            .search(CrmModule::Deals, &SearchCriteria::equals("Deal_Name", "rocket"))
            .await
            .expect("search");
        assert!(equals.is_empty());

        assert_eq!(
            transport.calls().await[0],
            TransportCall::Search {
                module: CrmModule::Deals,
                criteria: "(Deal_Name:contains:rocket)".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn create_then_update_roundtrips_fields() {
        let transport = InMemoryCrmTransport::new();
        let mut fields = Map::new();
        fields.insert("Deal_Name".to_owned(), json!("Rocket Launch"));
        let created = transport.create(CrmModule::Deals, fields).await.expect("create");
        let id = created.id.expect("created record id");

        let mut stage = Map::new();
        stage.insert("Stage".to_owned(), json!("Closed Won"));
        transport.update(CrmModule::Deals, &id, stage).await.expect("update");

        let records = transport.records(CrmModule::Deals).await;
        assert_eq!(records[0].field_str("Stage"), Some("Closed Won"));
        assert_eq!(records[0].field_str("Deal_Name"), Some("Rocket Launch"));
        assert_eq!(transport.mutation_count().await, 2);
    }

    #[tokio::test]
    async fn unknown_id_and_injected_rejection_fail() {
        let transport = InMemoryCrmTransport::new();
        let error = transport.update(CrmModule::Deals, "nope", Map::new()).await.expect_err("unknown id");
        assert!(matches!(error, CrmError::Transport(TransportError::Rejected { .. })));

        transport
            .reject_next_mutation(TransportError::Status { status: 503, body: "down".to_owned() })
            .await;
        let error = transport.create(CrmModule::Accounts, Map::new()).await.expect_err("injected");
        assert_eq!(
            error,
            CrmError::Transport(TransportError::Status { status: 503, body: "down".to_owned() })
        );
        transport.create(CrmModule::Accounts, Map::new()).await.expect("rejection is one-shot");
    }
}
