//! Restricted value container for options and metadata.
//!
//! Matcher configuration, handler options, and match metadata all cross a
//! typed/untyped boundary: TOML on the way in, typed option structs inside
//! handlers. [`OptionValue`] restricts what can travel across that boundary
//! to strings, integers, booleans, lists, and maps, with no arbitrary dynamic
//! typing inside the core.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A map of option keys to restricted values.
pub type OptionMap = BTreeMap<String, OptionValue>;

/// A restricted dynamic value: string, integer, boolean, list, or map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// A string.
    Str(String),
    /// A signed integer.
    Int(i64),
    /// A boolean.
    Bool(bool),
    /// A homogeneous-or-not list of values.
    List(Vec<OptionValue>),
    /// A nested map.
    Map(OptionMap),
}

impl OptionValue {
    /// The value's type name, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "integer",
            Self::Bool(_) => "boolean",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Borrow as a string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Extract an integer, if this is one.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract a boolean, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as a list, if this is one.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow as a map, if this is one.
    #[must_use]
    pub const fn as_map(&self) -> Option<&OptionMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Convert a TOML value, rejecting floats and datetimes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for value types outside the
    /// restricted set.
    pub fn from_toml(key: &str, value: toml::Value) -> Result<Self, ConfigError> {
        match value {
            toml::Value::String(s) => Ok(Self::Str(s)),
            toml::Value::Integer(i) => Ok(Self::Int(i)),
            toml::Value::Boolean(b) => Ok(Self::Bool(b)),
            toml::Value::Array(items) => {
                let converted: Result<Vec<Self>, ConfigError> = items
                    .into_iter()
                    .map(|v| Self::from_toml(key, v))
                    .collect();
                Ok(Self::List(converted?))
            }
            toml::Value::Table(table) => Ok(Self::Map(option_map_from_toml(table)?)),
            other => Err(ConfigError::InvalidOption {
                key: key.to_string(),
                message: format!("unsupported value type '{}'", other.type_str()),
            }),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Convert a TOML table into an [`OptionMap`].
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOption`] if any value falls outside the
/// restricted set.
pub fn option_map_from_toml(
    table: toml::map::Map<String, toml::Value>,
) -> Result<OptionMap, ConfigError> {
    let mut map = OptionMap::new();
    for (key, value) in table {
        let converted = OptionValue::from_toml(&key, value)?;
        map.insert(key, converted);
    }
    Ok(map)
}

/// Fetch a string option, erroring on a type mismatch.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOption`] when the key is present but not a
/// string.
pub fn get_str<'a>(map: &'a OptionMap, key: &str) -> Result<Option<&'a str>, ConfigError> {
    match map.get(key) {
        None => Ok(None),
        Some(OptionValue::Str(s)) => Ok(Some(s)),
        Some(other) => Err(ConfigError::InvalidOption {
            key: key.to_string(),
            message: format!("expected string, got {}", other.type_name()),
        }),
    }
}

/// Fetch a string-list option, erroring on a type mismatch.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOption`] when the key is present but not a
/// list of strings.
pub fn get_str_list(map: &OptionMap, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
    match map.get(key) {
        None => Ok(None),
        Some(OptionValue::List(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) => out.push(s.to_string()),
                    None => {
                        return Err(ConfigError::InvalidOption {
                            key: key.to_string(),
                            message: format!(
                                "expected list of strings, found {} element",
                                item.type_name()
                            ),
                        });
                    }
                }
            }
            Ok(Some(out))
        }
        Some(other) => Err(ConfigError::InvalidOption {
            key: key.to_string(),
            message: format!("expected list, got {}", other.type_name()),
        }),
    }
}
