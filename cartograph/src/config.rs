//! [`ConnectionConfig`] describes how to reach a backend.

use std::fmt::{Debug, Formatter};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CartographError;

/// Ordered key/value string map describing how to reach a backend: paths, hosts, ports,
/// credentials, timeouts.
///
/// Keys are case-sensitive and unique. The map does not validate anything; each backend
/// checks the keys it needs when a data source is opened.
///
/// ```
/// use cartograph::ConnectionConfig;
///
/// let config = ConnectionConfig::new()
///     .with("PG_HOST", "localhost")
///     .with("PG_PORT", "5432");
///
/// assert_eq!(config.get("PG_PORT"), Some("5432"));
/// assert_eq!(config.keys().collect::<Vec<_>>(), ["PG_HOST", "PG_PORT"]);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    entries: Vec<(String, String)>,
}

impl ConnectionConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from a JSON object with string values.
    pub fn from_json(json: &str) -> Result<Self, CartographError> {
        serde_json::from_str(json).map_err(|err| CartographError::InvalidConfig(err.to_string()))
    }

    /// Inserts the value for the key, or overwrites it in place if the key is already set.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Same as [`ConnectionConfig::set`], builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Value for the key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Removes the key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Returns true if the key is set.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterates over the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Returns the value of the first of `keys` that is set, or a `ConnectionFailed` error
    /// for `backend` naming the missing key.
    pub fn require(&self, backend: &str, keys: &[&str]) -> Result<&str, CartographError> {
        keys.iter()
            .find_map(|key| self.get(key))
            .ok_or_else(|| CartographError::ConnectionFailed {
                backend: backend.to_owned(),
                reason: format!("missing required configuration key {}", keys.join(" or ")),
            })
    }
}

impl Debug for ConnectionConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.iter() {
            if key.to_ascii_uppercase().contains("PASSWORD") {
                map.entry(&key, &"***");
            } else {
                map.entry(&key, &value);
            }
        }
        map.finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConnectionConfig {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut config = Self::new();
        for (key, value) in iter {
            config.set(key, value);
        }
        config
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for ConnectionConfig {
    fn from(value: [(K, V); N]) -> Self {
        value.into_iter().collect()
    }
}

impl Serialize for ConnectionConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ConnectionConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ConfigVisitor;

        impl<'de> Visitor<'de> for ConfigVisitor {
            type Value = ConnectionConfig;

            fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
                formatter.write_str("a map of string keys to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut config = ConnectionConfig::new();
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    config.set(key, value);
                }
                Ok(config)
            }
        }

        deserializer.deserialize_map(ConfigVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn set_overwrites_in_place() {
        let mut config = ConnectionConfig::new();
        config.set("A", "1");
        config.set("B", "2");
        config.set("A", "3");

        assert_eq!(config.iter().collect::<Vec<_>>(), [("A", "3"), ("B", "2")]);
    }

    #[test]
    fn keys_are_case_sensitive() {
        let config = ConnectionConfig::from([("uri", "a"), ("URI", "b")]);
        assert_eq!(config.len(), 2);
        assert_eq!(config.get("URI"), Some("b"));
        assert_eq!(config.get("Uri"), None);
    }

    #[test]
    fn remove_keeps_order_of_the_rest() {
        let mut config = ConnectionConfig::from([("A", "1"), ("B", "2"), ("C", "3")]);
        assert_eq!(config.remove("B"), Some("2".to_string()));
        assert_eq!(config.remove("B"), None);
        assert_eq!(config.keys().collect::<Vec<_>>(), ["A", "C"]);
    }

    #[test]
    fn require_reports_missing_keys() {
        let config = ConnectionConfig::from([("SOURCE", "/data")]);
        assert_eq!(config.require("file-vector", &["URI", "SOURCE"]).unwrap(), "/data");

        let err = config.require("spatial-db", &["PG_HOST"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
        assert!(err.to_string().contains("PG_HOST"));
    }

    #[test]
    fn json_preserves_order() {
        let config =
            ConnectionConfig::from_json(r#"{"PG_PORT": "5432", "PG_HOST": "db", "PG_USER": "u"}"#)
                .unwrap();
        assert_eq!(
            config.keys().collect::<Vec<_>>(),
            ["PG_PORT", "PG_HOST", "PG_USER"]
        );
        assert_eq!(
            serde_json::to_string(&config).unwrap(),
            r#"{"PG_PORT":"5432","PG_HOST":"db","PG_USER":"u"}"#
        );
    }

    #[test]
    fn non_string_json_values_are_rejected() {
        let err = ConnectionConfig::from_json(r#"{"PG_PORT": 5432}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.to_string().starts_with("invalid connection configuration"));

        let err = ConnectionConfig::from_json("[]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn debug_masks_passwords() {
        let config = ConnectionConfig::from([("PG_USER", "admin"), ("PG_PASSWORD", "secret")]);
        let debug = format!("{config:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("secret"));
    }
}
