//! Typed access to a declaration's property bag

use std::collections::BTreeMap;
use thiserror::Error;
use toml::{Table, Value};

/// Keys interpreted by the graph builder itself rather than by module types
pub const RESERVED_KEYS: [&str; 4] = ["name", "deps", "variants", "primary_builder"];

/// A property has the wrong shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("property '{property}' {reason}")]
pub struct PropertyError {
    pub property: String,
    pub reason: String,
}

impl PropertyError {
    fn new(property: &str, reason: impl Into<String>) -> Self {
        Self {
            property: property.to_string(),
            reason: reason.into(),
        }
    }

    fn expected(property: &str, expected: &str, found: &Value) -> Self {
        Self::new(
            property,
            format!("must be {}, found {}", expected, found.type_str()),
        )
    }
}

/// Properties of one module declaration, as written in the description
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    table: Table,
}

impl Properties {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.table.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.table.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// Keys other than the reserved ones
    pub fn custom_keys(&self) -> impl Iterator<Item = &str> {
        self.keys().filter(|k| !RESERVED_KEYS.contains(k))
    }

    pub fn string(&self, key: &str) -> Result<Option<&str>, PropertyError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(PropertyError::expected(key, "a string", other)),
        }
    }

    pub fn require_string(&self, key: &str) -> Result<&str, PropertyError> {
        self.string(key)?
            .ok_or_else(|| PropertyError::new(key, "is required"))
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>, PropertyError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(Value::Boolean(b)) => Ok(Some(*b)),
            Some(other) => Err(PropertyError::expected(key, "a boolean", other)),
        }
    }

    /// A list of strings; a missing key is an empty list
    pub fn string_list(&self, key: &str) -> Result<Vec<String>, PropertyError> {
        match self.table.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(PropertyError::expected(key, "a list of strings", other)),
                })
                .collect(),
            Some(other) => Err(PropertyError::expected(key, "a list of strings", other)),
        }
    }

    /// A table of string lists, e.g. `variants = { arch = ["x86_64", "arm64"] }`
    pub fn string_list_table(
        &self,
        key: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, PropertyError> {
        let table = match self.table.get(key) {
            None => return Ok(BTreeMap::new()),
            Some(Value::Table(table)) => table,
            Some(other) => return Err(PropertyError::expected(key, "a table", other)),
        };

        let mut result = BTreeMap::new();
        for (axis, values) in table {
            let Value::Array(items) = values else {
                return Err(PropertyError::expected(key, "a table of string lists", values));
            };
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => list.push(s.clone()),
                    other => {
                        return Err(PropertyError::expected(key, "a table of string lists", other))
                    }
                }
            }
            result.insert(axis.clone(), list);
        }
        Ok(result)
    }
}
