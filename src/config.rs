//! Configuration Module
//!
//! Named-cache property lookup using the `<cacheName>.<propertyName>`
//! convention. An absent, empty, or all-whitespace value falls back to the
//! supplied default; any non-empty value is trimmed before use.

use std::collections::HashMap;

use crate::error::{CacheError, Result};

/// A flat set of cache configuration properties.
///
/// Properties are keyed `<cacheName>.<propertyName>`, e.g.
/// `nodeCache.maxItems`.
#[derive(Debug, Clone, Default)]
pub struct CacheProperties {
    properties: HashMap<String, String>,
}

impl CacheProperties {
    // == Constructor ==
    /// Creates an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    // == Set ==
    /// Sets a property for a named cache.
    pub fn set(&mut self, cache_name: &str, property: &str, value: &str) {
        self.properties
            .insert(format!("{}.{}", cache_name, property), value.to_string());
    }

    // == String Lookup ==
    /// Looks up a property, falling back to `default` when the value is
    /// absent, empty, or all-whitespace. Non-empty values are trimmed.
    pub fn value_or<'a>(&'a self, cache_name: &str, property: &str, default: &'a str) -> &'a str {
        let key = format!("{}.{}", cache_name, property);
        match self.properties.get(&key) {
            Some(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    default
                } else {
                    trimmed
                }
            }
            None => default,
        }
    }

    // == Integer Lookup ==
    /// Looks up an integer property with a default.
    pub fn i64_or(&self, cache_name: &str, property: &str, default: i64) -> Result<i64> {
        let raw = self.value_or(cache_name, property, "");
        if raw.is_empty() {
            return Ok(default);
        }
        raw.parse::<i64>().map_err(|_| CacheError::InvalidProperty {
            property: format!("{}.{}", cache_name, property),
            value: raw.to_string(),
        })
    }

    // == Boolean Lookup ==
    /// Looks up a boolean property with a default.
    pub fn bool_or(&self, cache_name: &str, property: &str, default: bool) -> Result<bool> {
        let raw = self.value_or(cache_name, property, "");
        if raw.is_empty() {
            return Ok(default);
        }
        raw.parse::<bool>().map_err(|_| CacheError::InvalidProperty {
            property: format!("{}.{}", cache_name, property),
            value: raw.to_string(),
        })
    }

    // == Optional Seconds Lookup ==
    /// Looks up a non-negative seconds value; `0` or absent means "none".
    pub fn seconds_or_none(&self, cache_name: &str, property: &str) -> Result<Option<u64>> {
        let value = self.i64_or(cache_name, property, 0)?;
        if value < 0 {
            return Err(CacheError::InvalidProperty {
                property: format!("{}.{}", cache_name, property),
                value: value.to_string(),
            });
        }
        Ok(if value == 0 { None } else { Some(value as u64) })
    }
}

impl<const N: usize> From<[(&str, &str); N]> for CacheProperties {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self {
            properties: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_or_absent_uses_default() {
        let props = CacheProperties::new();
        assert_eq!(props.value_or("nodeCache", "maxItems", "500"), "500");
    }

    #[test]
    fn test_value_or_trims() {
        let mut props = CacheProperties::new();
        props.set("nodeCache", "maxItems", "  123  ");
        assert_eq!(props.value_or("nodeCache", "maxItems", "500"), "123");
    }

    #[test]
    fn test_value_or_whitespace_uses_default() {
        let mut props = CacheProperties::new();
        props.set("nodeCache", "maxItems", "   ");
        assert_eq!(props.value_or("nodeCache", "maxItems", "500"), "500");
    }

    #[test]
    fn test_value_or_empty_uses_default() {
        let mut props = CacheProperties::new();
        props.set("nodeCache", "maxItems", "");
        assert_eq!(props.value_or("nodeCache", "maxItems", "500"), "500");
    }

    #[test]
    fn test_i64_or() {
        let mut props = CacheProperties::new();
        props.set("nodeCache", "maxItems", "42");
        assert_eq!(props.i64_or("nodeCache", "maxItems", 500).unwrap(), 42);
        assert_eq!(props.i64_or("nodeCache", "other", 500).unwrap(), 500);
    }

    #[test]
    fn test_i64_or_garbage_fails() {
        let mut props = CacheProperties::new();
        props.set("nodeCache", "maxItems", "lots");
        let result = props.i64_or("nodeCache", "maxItems", 500);
        assert!(matches!(result, Err(CacheError::InvalidProperty { .. })));
    }

    #[test]
    fn test_bool_or() {
        let mut props = CacheProperties::new();
        props.set("nodeCache", "mutable", " false ");
        assert!(!props.bool_or("nodeCache", "mutable", true).unwrap());
        assert!(props.bool_or("nodeCache", "statsEnabled", true).unwrap());
    }

    #[test]
    fn test_seconds_or_none() {
        let mut props = CacheProperties::new();
        props.set("nodeCache", "timeToLiveSeconds", "30");
        props.set("nodeCache", "timeToIdleSeconds", "0");
        assert_eq!(
            props.seconds_or_none("nodeCache", "timeToLiveSeconds").unwrap(),
            Some(30)
        );
        assert_eq!(
            props.seconds_or_none("nodeCache", "timeToIdleSeconds").unwrap(),
            None
        );
    }

    #[test]
    fn test_seconds_or_none_negative_fails() {
        let mut props = CacheProperties::new();
        props.set("nodeCache", "timeToLiveSeconds", "-1");
        let result = props.seconds_or_none("nodeCache", "timeToLiveSeconds");
        assert!(matches!(result, Err(CacheError::InvalidProperty { .. })));
    }

    #[test]
    fn test_from_pairs() {
        let props = CacheProperties::from([("a.x", "1"), ("b.y", "2")]);
        assert_eq!(props.value_or("a", "x", "0"), "1");
        assert_eq!(props.value_or("b", "y", "0"), "2");
    }
}
