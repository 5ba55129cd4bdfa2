//! CRM adapter layer.
//!
//! Everything here talks to (or stands in for) the Zoho CRM REST API:
//! - `criteria` builds `(Field:operator:value)` search expressions
//! - `transport` defines the [`CrmTransport`] seam and its reqwest-backed Zoho implementation
//! - `resolver` turns names into record identifiers
//! - `token` owns the OAuth access token and refreshes it when absent
//! - `store` writes refreshed tokens back into the configuration file
//! - `memory` is an in-process transport used by tests across the workspace

pub mod criteria;
pub mod memory;
pub mod resolver;
pub mod store;
pub mod token;
pub mod transport;

pub use criteria::{CrmModule, SearchCriteria, SearchOperator};
pub use memory::{InMemoryCrmTransport, TransportCall};
pub use resolver::{EntityResolver, ResolvedReference};
pub use store::{CredentialStore, TomlCredentialStore};
pub use token::{RefreshCredentials, TokenManager, TokenProvider, ZohoTokenProvider};
pub use transport::{CrmRecord, CrmTransport, CrmUser, MutationRecord, ZohoTransport};
