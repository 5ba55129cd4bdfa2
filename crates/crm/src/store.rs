use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crmpilot_core::errors::TokenRefreshError;
use secrecy::{ExposeSecret, SecretString};
use toml::{Table, Value};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
const CRM_SECTION: &str = "crm";

/// Durable home for credentials obtained at runtime.
pub trait CredentialStore: Send + Sync {
    fn persist(&self, key: &str, value: &SecretString) -> Result<(), TokenRefreshError>;
}

/// Writes credentials into the `[crm]` table of a TOML configuration file, creating the
/// file when it does not exist. Other tables and keys are kept; comments are not.
#[derive(Clone, Debug)]
pub struct TomlCredentialStore {
    path: PathBuf,
}

impl TomlCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist_error(&self, message: impl Into<String>) -> TokenRefreshError {
        TokenRefreshError::Persist { path: self.path.display().to_string(), message: message.into() }
    }

    fn read_table(&self) -> Result<Table, TokenRefreshError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Table::new()),
            Err(error) => return Err(self.persist_error(error.to_string())),
        };
        raw.parse::<Table>().map_err(|error| self.persist_error(error.to_string()))
    }
}

impl CredentialStore for TomlCredentialStore {
    fn persist(&self, key: &str, value: &SecretString) -> Result<(), TokenRefreshError> {
        let mut document = self.read_table()?;
        let section = document
            .entry(CRM_SECTION)
            .or_insert_with(|| Value::Table(Table::new()))
            .as_table_mut()
            .ok_or_else(|| self.persist_error("`crm` is present but is not a table"))?;
        section.insert(key.to_string(), Value::String(value.expose_secret().to_string()));

        let rendered =
            toml::to_string(&document).map_err(|error| self.persist_error(error.to_string()))?;
        fs::write(&self.path, rendered).map_err(|error| self.persist_error(error.to_string()))
    }
}
