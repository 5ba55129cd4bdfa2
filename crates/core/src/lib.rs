pub mod config;
pub mod domain;
pub mod errors;

pub use domain::intent::{
    AccountPayload, Amount, DealPayload, Intent, Operation, StageUpdatePayload,
    UnsupportedRequest,
};
pub use domain::stage::{canonical_stage, normalize_stage, DEFAULT_DEAL_STAGE};
pub use errors::{
    CommandError, CrmError, IntentParseError, TokenRefreshError, TransportError,
};
