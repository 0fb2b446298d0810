//! Property store for configuration and cached state
//!
//! The ledger reads its advisory credit limit from here and publishes the
//! current aggregate balance back, so displays can poll a property instead of
//! subscribing to notifications.

use crate::core::traits::PropertiesManager;
use dashmap::DashMap;

/// Property holding the configured credit limit, in cents
pub const CREDIT_LIMIT_KEY: &str = "Bank.Limit";

/// Property holding the last committed aggregate balance, in cents
pub const CURRENT_BALANCE_KEY: &str = "Bank.Balance";

/// Property value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl PropertyValue {
    /// Integer payload, if this is an integer property
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

/// Concurrent in-memory property store
#[derive(Debug, Default)]
pub struct InMemoryProperties {
    values: DashMap<String, PropertyValue>,
}

impl InMemoryProperties {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PropertiesManager for InMemoryProperties {
    fn get_property(&self, key: &str, default: PropertyValue) -> PropertyValue {
        self.values
            .get(key)
            .map(|entry| entry.value().clone())
            .unwrap_or(default)
    }

    fn set_property(&self, key: &str, value: PropertyValue) {
        self.values.insert(key.to_string(), value);
    }
}
