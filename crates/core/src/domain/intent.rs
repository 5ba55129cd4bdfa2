//! Typed intents produced from an intent service document.
//!
//! The intent service answers with a loosely shaped `{ "operation": ..., "data": {...} }`
//! document. [`Intent::from_document`] coerces it into a closed union where every field is
//! either present or absent. No semantic validation happens here: an amount that does not
//! read as a number is kept as [`Amount::Unparsed`], and the dispatcher decides what to do
//! with it and with missing required values.

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::errors::IntentParseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateAccount,
    CreateDeal,
    UpdateDealStage,
    Unknown,
}

impl Operation {
    /// Matches case-insensitively, ignoring `_`, `-` and spaces.
    pub fn parse(raw: &str) -> Self {
        let key = raw
            .chars()
            .filter(|ch| !matches!(ch, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "createaccount" => Self::CreateAccount,
            "createdeal" => Self::CreateDeal,
            "updatedealstage" => Self::UpdateDealStage,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateAccount => "create_account",
            Self::CreateDeal => "create_deal",
            Self::UpdateDealStage => "update_deal_stage",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monetary value as the service gave it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Amount {
    Number(Number),
    Unparsed(String),
}

impl Amount {
    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Self::Number(number) => Some(number),
            Self::Unparsed(_) => None,
        }
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Unparsed(raw) => f.write_str(raw),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AccountPayload {
    #[serde(rename = "account_name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_revenue: Option<Amount>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DealPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closing_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StageUpdatePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_stage: Option<String>,
}

/// Carries the operation name the service asked for when it is not one we support.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UnsupportedRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", content = "data", rename_all = "snake_case")]
pub enum Intent {
    CreateAccount(AccountPayload),
    CreateDeal(DealPayload),
    UpdateDealStage(StageUpdatePayload),
    Unknown(UnsupportedRequest),
}

impl Intent {
    pub fn operation(&self) -> Operation {
        match self {
            Self::CreateAccount(_) => Operation::CreateAccount,
            Self::CreateDeal(_) => Operation::CreateDeal,
            Self::UpdateDealStage(_) => Operation::UpdateDealStage,
            Self::Unknown(_) => Operation::Unknown,
        }
    }

    /// Builds an intent from a decoded service document.
    ///
    /// Fails only when the document is not a JSON object. A missing or unrecognized
    /// `operation` yields [`Intent::Unknown`]; a missing or non-object `data` is treated
    /// as empty.
    pub fn from_document(document: Value) -> Result<Self, IntentParseError> {
        let mut root = match document {
            Value::Object(root) => root,
            other => {
                return Err(IntentParseError {
                    message: "expected a JSON object with `operation` and `data`".to_owned(),
                    response: other.to_string(),
                })
            }
        };

        let requested = root.get("operation").and_then(text_value);
        let data = match root.remove("data") {
            Some(Value::Object(data)) => data,
            _ => Map::new(),
        };

        let operation = requested.as_deref().map(Operation::parse).unwrap_or(Operation::Unknown);
        let intent = match operation {
            Operation::CreateAccount => Self::CreateAccount(AccountPayload {
                name: text(&data, &["account_name", "name"]),
                phone: text(&data, &["phone"]),
                website: text(&data, &["website"]),
                industry: text(&data, &["industry"]),
                annual_revenue: amount(&data, &["annual_revenue"]),
            }),
            Operation::CreateDeal => Self::CreateDeal(DealPayload {
                deal_name: text(&data, &["deal_name"]),
                amount: amount(&data, &["amount", "deal_amount"]),
                stage: text(&data, &["stage"]),
                closing_date: text(&data, &["closing_date"]),
                account_name: text(&data, &["account_name"]),
                contact_name: text(&data, &["contact_name"]),
            }),
            Operation::UpdateDealStage => Self::UpdateDealStage(StageUpdatePayload {
                deal_name: text(&data, &["deal_name"]),
                new_stage: text(&data, &["new_stage", "stage"]),
            }),
            Operation::Unknown => Self::Unknown(UnsupportedRequest { requested }),
        };

        Ok(intent)
    }
}

fn text(data: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| data.get(*key).and_then(text_value))
}

fn amount(data: &Map<String, Value>, keys: &[&str]) -> Option<Amount> {
    keys.iter().find_map(|key| data.get(*key).and_then(amount_value))
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn amount_value(value: &Value) -> Option<Amount> {
    match value {
        Value::Null => None,
        Value::Number(number) => Some(Amount::Number(number.clone())),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return None;
            }
            Some(match parse_number(trimmed) {
                Some(number) => Amount::Number(number),
                None => Amount::Unparsed(trimmed.to_owned()),
            })
        }
        other => Some(Amount::Unparsed(other.to_string())),
    }
}

fn parse_number(raw: &str) -> Option<Number> {
    let cleaned = raw
        .chars()
        .filter(|ch| !ch.is_whitespace() && !matches!(ch, ',' | '$' | '€' | '£'))
        .collect::<String>();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(integer) = cleaned.parse::<i64>() {
        return Some(Number::from(integer));
    }
    cleaned.parse::<f64>().ok().and_then(Number::from_f64)
}
