use std::sync::Arc;

use async_trait::async_trait;
use crmpilot_core::config::CrmConfig;
use crmpilot_core::errors::{CrmError, TransportError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::criteria::{CrmModule, SearchCriteria};
use crate::token::TokenManager;

const MAX_ERROR_BODY_CHARS: usize = 500;

/// A record returned by a module search. Only `id` is interpreted; the rest is kept verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrmRecord {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CrmRecord {
    pub fn field_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmUser {
    pub id: String,
    #[serde(default)]
    pub full_name: String,
}

/// First entry of a create/update response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MutationRecord {
    pub id: Option<String>,
    pub code: String,
    pub message: String,
    pub details: Value,
}

#[async_trait]
pub trait CrmTransport: Send + Sync {
    async fn search(
        &self,
        module: CrmModule,
        criteria: &SearchCriteria,
    ) -> Result<Vec<CrmRecord>, CrmError>;

    async fn create(
        &self,
        module: CrmModule,
        fields: Map<String, Value>,
    ) -> Result<MutationRecord, CrmError>;

    async fn update(
        &self,
        module: CrmModule,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<MutationRecord, CrmError>;

    async fn list_active_users(&self) -> Result<Vec<CrmUser>, CrmError>;
}

/// Zoho CRM REST transport. Every request carries the header set produced by the
/// shared [`TokenManager`].
pub struct ZohoTransport {
    client: Client,
    base_url: String,
    api_version: String,
    tokens: Arc<TokenManager>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    data: Vec<CrmRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct UsersEnvelope {
    #[serde(default)]
    users: Vec<CrmUser>,
}

impl ZohoTransport {
    pub fn new(client: Client, config: &CrmConfig, tokens: Arc<TokenManager>) -> Self {
        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.trim_matches('/').to_string(),
            tokens,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/crm/{}/{}", self.base_url, self.api_version, path)
    }

    /// Headers replace any value already set on the request, so a body encoder's
    /// `Content-Type` is never sent twice.
    async fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, CrmError> {
        let mut headers = HeaderMap::new();
        for (name, value) in self.tokens.auth_header().await? {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|error| TransportError::Request(format!("invalid header name: {error}")))?;
            let mut value = HeaderValue::from_str(&value)
                .map_err(|error| TransportError::Request(format!("invalid header value: {error}")))?;
            value.set_sensitive(name == reqwest::header::AUTHORIZATION);
            headers.insert(name, value);
        }
        Ok(builder.headers(headers))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, CrmError> {
        let response = self
            .authorized(builder)
            .await?
            .send()
            .await
            .map_err(|error| TransportError::Request(error.to_string()))?;
        Ok(response)
    }

    async fn mutation_result(&self, response: Response) -> Result<MutationRecord, CrmError> {
        let status = response.status();
        let body = response.text().await.map_err(|error| TransportError::Decode(error.to_string()))?;

        if !status.is_success() {
            // Zoho reports per-record validation failures in the body of a 4xx response.
            if let Ok(Err(rejected @ TransportError::Rejected { .. })) =
                serde_json::from_str::<Value>(&body).map(parse_mutation_response)
            {
                return Err(rejected.into());
            }
            return Err(status_error(status, &body).into());
        }

        let value = serde_json::from_str::<Value>(&body)
            .map_err(|error| TransportError::Decode(error.to_string()))?;
        Ok(parse_mutation_response(value)?)
    }
}

#[async_trait]
impl CrmTransport for ZohoTransport {
    async fn search(
        &self,
        module: CrmModule,
        criteria: &SearchCriteria,
    ) -> Result<Vec<CrmRecord>, CrmError> {
        let criteria_text = criteria.to_string();
        let request = self
            .client
            .get(self.api_url(&format!("{}/search", module.as_str())))
            .query(&[("criteria", criteria_text.as_str())]);
        let response = self.send(request).await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            debug!(
                event_name = "crm.transport.search",
                module = module.as_str(),
                criteria = %criteria_text,
                matches = 0,
                "search returned no content"
            );
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body).into());
        }

        let envelope = response
            .json::<SearchEnvelope>()
            .await
            .map_err(|error| TransportError::Decode(error.to_string()))?;
        debug!(
            event_name = "crm.transport.search",
            module = module.as_str(),
            criteria = %criteria_text,
            matches = envelope.data.len(),
            "search completed"
        );
        Ok(envelope.data)
    }

    async fn create(
        &self,
        module: CrmModule,
        fields: Map<String, Value>,
    ) -> Result<MutationRecord, CrmError> {
        let request =
            self.client.post(self.api_url(module.as_str())).json(&json!({ "data": [fields] }));
        let response = self.send(request).await?;
        let record = self.mutation_result(response).await?;
        info!(
            event_name = "crm.transport.create",
            module = module.as_str(),
            record_id = record.id.as_deref().unwrap_or("unknown"),
            "record created"
        );
        Ok(record)
    }

    async fn update(
        &self,
        module: CrmModule,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<MutationRecord, CrmError> {
        let request = self
            .client
            .put(self.api_url(&format!("{}/{id}", module.as_str())))
            .json(&json!({ "data": [fields] }));
        let response = self.send(request).await?;
        let record = self.mutation_result(response).await?;
        info!(
            event_name = "crm.transport.update",
            module = module.as_str(),
            record_id = id,
            "record updated"
        );
        Ok(record)
    }

    async fn list_active_users(&self) -> Result<Vec<CrmUser>, CrmError> {
        let request = self.client.get(self.api_url("users")).query(&[("type", "ActiveUsers")]);
        let response = self.send(request).await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body).into());
        }

        let envelope = response
            .json::<UsersEnvelope>()
            .await
            .map_err(|error| TransportError::Decode(error.to_string()))?;
        Ok(envelope.users)
    }
}

/// Reads the first `data` entry of a create/update response, failing when the CRM marked it
/// as an error even though the request itself succeeded.
pub fn parse_mutation_response(body: Value) -> Result<MutationRecord, TransportError> {
    let entry = body
        .get("data")
        .and_then(Value::as_array)
        .and_then(|entries| entries.first())
        .ok_or_else(|| TransportError::Decode("mutation response has no `data` entries".into()))?;

    let text = |key: &str| entry.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let code = text("code");
    let message = text("message");

    if entry.get("status").and_then(Value::as_str).is_some_and(|s| s.eq_ignore_ascii_case("error"))
    {
        warn!(
            event_name = "crm.transport.rejected",
            code = %code,
            message = %message,
            "crm rejected the record"
        );
        return Err(TransportError::Rejected { code, message });
    }

    let details = entry.get("details").cloned().unwrap_or(Value::Null);
    let id = details.get("id").and_then(Value::as_str).map(str::to_owned);
    Ok(MutationRecord { id, code, message, details })
}

fn status_error(status: StatusCode, body: &str) -> TransportError {
    TransportError::Status {
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    }
}
