//! Named surface parameters and their conversion to sanitized numbers.
//!
//! Surfaces arrive from the presentation layer as loosely typed maps: values
//! may be numbers, numeric text (possibly with a decimal comma) or booleans.
//! Lookups ignore case and surrounding whitespace in the parameter name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{SurfaceError, SurfaceResult};

/// A single raw parameter value as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Boolean(bool),
    Text(String),
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Name → value map describing one surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterMap {
    entries: BTreeMap<String, ParamValue>,
}

impl ParameterMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for constructing surfaces in code.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.entries.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Looks up a parameter, preferring an exact name match.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        if let Some(value) = self.entries.get(name) {
            return Some(value);
        }
        let wanted = normalize_name(name);
        self.entries
            .iter()
            .find(|(key, _)| normalize_name(key) == wanted)
            .map(|(_, value)| value)
    }

    /// Strict numeric lookup: `Ok(None)` when absent, an error when present
    /// but not convertible to a finite number.
    pub fn try_number(&self, name: &str) -> SurfaceResult<Option<f64>> {
        self.get(name)
            .map(|value| coerce_number(name, value))
            .transpose()
    }

    /// Sanitized numeric lookup. Missing or malformed values become `0.0`.
    #[must_use]
    pub fn number(&self, name: &str) -> f64 {
        match self.try_number(name) {
            Ok(value) => value.unwrap_or(0.0),
            Err(err) => {
                log::warn!("{err}; using 0");
                0.0
            }
        }
    }

    /// Sanitized lookup of `prefix{n}` for every `n` in `powers`.
    #[must_use]
    pub fn coefficients(&self, prefix: &str, powers: impl IntoIterator<Item = u32>) -> Vec<f64> {
        powers
            .into_iter()
            .map(|power| self.number(&format!("{prefix}{power}")))
            .collect()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParameterMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

/// Converts a raw parameter value to a finite `f64`.
pub fn coerce_number(name: &str, value: &ParamValue) -> SurfaceResult<f64> {
    let malformed = || SurfaceError::MalformedParameter {
        name: name.to_owned(),
        value: match value {
            ParamValue::Number(n) => n.to_string(),
            ParamValue::Boolean(b) => b.to_string(),
            ParamValue::Text(s) => s.clone(),
        },
    };

    let number = match value {
        ParamValue::Number(n) => *n,
        ParamValue::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        ParamValue::Text(text) => parse_decimal(text).ok_or_else(malformed)?,
    };

    if number.is_finite() {
        Ok(number)
    } else {
        Err(malformed())
    }
}

fn parse_decimal(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed
        .parse()
        .ok()
        .or_else(|| trimmed.replace(',', ".").parse().ok())
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
