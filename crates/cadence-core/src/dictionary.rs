//! String-keyed configuration map with typed lookups.
//!
//! Output controls are configured from a flat mapping of keys to scalar
//! values (`outputControl: runTime`, `outputInterval: 0.5`, ...). The
//! mapping is usually one entry of the `functions` section of
//! `cadence-config.yaml`, but can be built in code with
//! [`Dictionary::with`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::control::ConfigurationError;

/// A scalar configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// A boolean switch.
    Bool(bool),
    /// A whole number.
    Integer(i64),
    /// A real number.
    Real(f64),
    /// A word or free-form string.
    Word(String),
}

impl ConfigValue {
    /// Short name of the value's type, used in error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Word(_) => "word",
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Word(value) => f.write_str(value),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Word(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::Word(value)
    }
}

/// Flat key/value configuration for one controlled entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dictionary {
    entries: BTreeMap<String, ConfigValue>,
}

impl Dictionary {
    /// Create an empty dictionary.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Parse a dictionary from a YAML mapping.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the text is not a mapping of scalars.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: &str, value: impl Into<ConfigValue>) {
        self.entries.insert(key.to_owned(), value.into());
    }

    /// Raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a word.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidValue`] if the value is present
    /// but not a word.
    pub fn lookup_word(&self, key: &str) -> Result<Option<&str>, ConfigurationError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(ConfigValue::Word(word)) => Ok(Some(word.as_str())),
            Some(other) => Err(invalid(key, "word", other)),
        }
    }

    /// Look up a whole number. Reals with no fractional part are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidValue`] if the value is present
    /// but not a whole number.
    pub fn lookup_integer(&self, key: &str) -> Result<Option<i64>, ConfigurationError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(ConfigValue::Integer(value)) => Ok(Some(*value)),
            Some(other @ ConfigValue::Real(value)) => real_to_integer(*value)
                .map(Some)
                .ok_or_else(|| invalid(key, "integer", other)),
            Some(other) => Err(invalid(key, "integer", other)),
        }
    }

    /// Look up a finite real number. Integers are widened.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidValue`] if the value is present
    /// but not a finite number.
    #[allow(clippy::cast_precision_loss)]
    pub fn lookup_real(&self, key: &str) -> Result<Option<f64>, ConfigurationError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(ConfigValue::Integer(value)) => Ok(Some(*value as f64)),
            Some(ConfigValue::Real(value)) if value.is_finite() => Ok(Some(*value)),
            Some(other) => Err(invalid(key, "real", other)),
        }
    }
}

fn invalid(key: &str, expected: &'static str, found: &ConfigValue) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        key: key.to_owned(),
        expected,
        found: format!("{found} ({})", found.type_name()),
    }
}

/// Convert a real with no fractional part to `i64`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn real_to_integer(value: f64) -> Option<i64> {
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (value.is_finite() && value.fract() == 0.0 && in_range).then_some(value as i64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn parse_yaml_scalars() {
        let yaml = "
outputControl: runTime
outputInterval: 0.5
evaluateInterval: 3
enabled: true
";
        let dict = Dictionary::parse(yaml).unwrap();
        assert_eq!(dict.len(), 4);
        assert_eq!(dict.lookup_word("outputControl").unwrap(), Some("runTime"));
        assert_eq!(dict.lookup_real("outputInterval").unwrap(), Some(0.5));
        assert_eq!(dict.lookup_integer("evaluateInterval").unwrap(), Some(3));
        assert_eq!(dict.get("enabled"), Some(&ConfigValue::Bool(true)));
    }

    #[test]
    fn parse_empty_yaml() {
        let dict = Dictionary::parse("").unwrap();
        assert!(dict.is_empty());
    }

    #[test]
    fn parse_rejects_non_mapping() {
        assert!(Dictionary::parse("- a\n- b\n").is_err());
    }

    #[test]
    fn missing_keys_are_none() {
        let dict = Dictionary::new();
        assert_eq!(dict.lookup_word("outputControl").unwrap(), None);
        assert_eq!(dict.lookup_integer("outputInterval").unwrap(), None);
        assert_eq!(dict.lookup_real("outputInterval").unwrap(), None);
    }

    #[test]
    fn integers_widen_to_reals() {
        let dict = Dictionary::new().with("outputInterval", 4_i64);
        assert_eq!(dict.lookup_real("outputInterval").unwrap(), Some(4.0));
    }

    #[test]
    fn whole_reals_narrow_to_integers() {
        let dict = Dictionary::new()
            .with("whole", 6.0)
            .with("fractional", 6.5);
        assert_eq!(dict.lookup_integer("whole").unwrap(), Some(6));
        assert!(dict.lookup_integer("fractional").is_err());
    }

    #[test]
    fn wrong_types_are_errors() {
        let dict = Dictionary::new()
            .with("outputControl", 3_i64)
            .with("outputInterval", "often")
            .with("nan", f64::NAN);

        let err = dict.lookup_word("outputControl").unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidValue { expected: "word", .. }
        ));
        assert!(dict.lookup_real("outputInterval").is_err());
        assert!(dict.lookup_integer("outputInterval").is_err());
        assert!(dict.lookup_real("nan").is_err());
    }

    #[test]
    fn error_message_names_key_and_value() {
        let dict = Dictionary::new().with("outputInterval", "often");
        let message = dict.lookup_real("outputInterval").unwrap_err().to_string();
        assert!(message.contains("outputInterval"));
        assert!(message.contains("often (word)"));
    }

    #[test]
    fn serialises_in_key_order() {
        let dict = Dictionary::new().with("b", 1_i64).with("a", "x");
        let json = serde_json::to_string(&dict).unwrap();
        assert_eq!(json, r#"{"a":"x","b":1}"#);
    }
}
