use thiserror::Error;

/// Failure talking to the CRM REST API.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("crm request failed: {0}")]
    Request(String),
    #[error("crm returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("crm response could not be decoded: {0}")]
    Decode(String),
    #[error("crm rejected the record ({code}): {message}")]
    Rejected { code: String, message: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TokenRefreshError {
    #[error("token refresh is not configured: {0}")]
    NotConfigured(String),
    #[error("token endpoint request failed: {0}")]
    Request(String),
    #[error("token endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("token endpoint did not return an access token: {0}")]
    Rejected(String),
    #[error("could not persist access token to `{path}`: {message}")]
    Persist { path: String, message: String },
}

/// Anything an outbound CRM call can fail with, including acquiring its credential.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CrmError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    TokenRefresh(#[from] TokenRefreshError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("could not parse intent service response: {message}")]
pub struct IntentParseError {
    pub message: String,
    pub response: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("intent service call failed: {0}")]
    IntentService(String),
    #[error(transparent)]
    IntentParse(#[from] IntentParseError),
    #[error("Deal not found: {deal_name}")]
    DealNotFound { deal_name: String },
    #[error("No stage provided for update.")]
    MissingStage,
    #[error("missing required field `{field}` for {operation}")]
    MissingField { operation: &'static str, field: &'static str },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    TokenRefresh(#[from] TokenRefreshError),
}

impl From<CrmError> for CommandError {
    fn from(value: CrmError) -> Self {
        match value {
            CrmError::Transport(error) => Self::Transport(error),
            CrmError::TokenRefresh(error) => Self::TokenRefresh(error),
        }
    }
}

impl CommandError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::IntentService(_) => "intent_service",
            Self::IntentParse(_) => "intent_parse",
            Self::DealNotFound { .. } => "deal_not_found",
            Self::MissingStage => "missing_stage",
            Self::MissingField { .. } => "missing_field",
            Self::Transport(_) => "transport",
            Self::TokenRefresh(_) => "token_refresh",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::IntentService(_) | Self::IntentParse(_) => 4,
            Self::DealNotFound { .. } | Self::MissingStage | Self::MissingField { .. } => 5,
            Self::Transport(_) => 6,
            Self::TokenRefresh(_) => 7,
        }
    }
}
