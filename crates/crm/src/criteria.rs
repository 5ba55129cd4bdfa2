use std::fmt;

/// CRM record category addressed by the REST API path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CrmModule {
    Accounts,
    Contacts,
    Deals,
}

impl CrmModule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accounts => "Accounts",
            Self::Contacts => "Contacts",
            Self::Deals => "Deals",
        }
    }
}

impl fmt::Display for CrmModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchOperator {
    Equals,
    Contains,
}

impl SearchOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
        }
    }
}

/// A single-condition search expression, rendered as `(Field:operator:value)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchCriteria {
    pub field: &'static str,
    pub operator: SearchOperator,
    pub value: String,
}

impl SearchCriteria {
    pub fn equals(field: &'static str, value: impl Into<String>) -> Self {
        Self { field, operator: SearchOperator::Equals, value: value.into() }
    }

    pub fn contains(field: &'static str, value: impl Into<String>) -> Self {
        Self { field, operator: SearchOperator::Contains, value: value.into() }
    }
}

impl fmt::Display for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}:{}:{})", self.field, self.operator.as_str(), escape_value(&self.value))
    }
}

// Parentheses and commas are criteria syntax and must be backslash-escaped in values.
fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '(' | ')' | ',') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
