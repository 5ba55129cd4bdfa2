use crmpilot_core::errors::CrmError;
use serde::Serialize;
use tracing::debug;

use crate::criteria::{CrmModule, SearchCriteria};
use crate::transport::CrmTransport;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedReference {
    pub id: String,
    pub query: String,
}

/// Name-to-identifier lookups. A blank name resolves to `None` without a CRM call, and
/// when several records match the first one returned wins.
pub struct EntityResolver<'a> {
    transport: &'a dyn CrmTransport,
}

impl<'a> EntityResolver<'a> {
    pub fn new(transport: &'a dyn CrmTransport) -> Self {
        Self { transport }
    }

    pub async fn find_account_id(
        &self,
        name: &str,
    ) -> Result<Option<ResolvedReference>, CrmError> {
        self.find_by_exact_name(CrmModule::Accounts, "Account_Name", name).await
    }

    pub async fn find_contact_id(
        &self,
        name: &str,
    ) -> Result<Option<ResolvedReference>, CrmError> {
        self.find_by_exact_name(CrmModule::Contacts, "Full_Name", name).await
    }

    /// Case-insensitive substring match over active users' full names.
    pub async fn find_user_id(&self, name: &str) -> Result<Option<ResolvedReference>, CrmError> {
        let query = name.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let needle = query.to_lowercase();
        let users = self.transport.list_active_users().await?;
        let found = users
            .into_iter()
            .find(|user| user.full_name.to_lowercase().contains(&needle))
            .map(|user| ResolvedReference { id: user.id, query: query.to_string() });
        debug!(
            event_name = "crm.resolver.user",
            query,
            resolved = found.is_some(),
            "user lookup finished"
        );
        Ok(found)
    }

    async fn find_by_exact_name(
        &self,
        module: CrmModule,
        field: &'static str,
        name: &str,
    ) -> Result<Option<ResolvedReference>, CrmError> {
        let query = name.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let records = self.transport.search(module, &SearchCriteria::equals(field, query)).await?;
        let found = records
            .into_iter()
            .next()
            .map(|record| ResolvedReference { id: record.id, query: query.to_string() });
        debug!(
            event_name = "crm.resolver.lookup",
            module = module.as_str(),
            query,
            resolved = found.is_some(),
            "name lookup finished"
        );
        Ok(found)
    }
}
