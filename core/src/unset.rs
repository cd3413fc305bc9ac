//! Three-state optional values for request parameters.
//!
//! # Design
//! A parameter can be left out, sent as an explicit null, or sent with a
//! value. `Option<T>` cannot tell the first two apart, so endpoint parameter
//! structs use `MaybeUnset<T>` and serde's `skip_serializing_if` to drop the
//! unset fields per type, with no runtime field introspection.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum MaybeUnset<T> {
    /// Not transmitted at all.
    #[default]
    Unset,
    /// Transmitted as an explicit null.
    Null,
    Value(T),
}

impl<T> MaybeUnset<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, MaybeUnset::Unset)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MaybeUnset::Null)
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            MaybeUnset::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> MaybeUnset<&T> {
        match self {
            MaybeUnset::Unset => MaybeUnset::Unset,
            MaybeUnset::Null => MaybeUnset::Null,
            MaybeUnset::Value(v) => MaybeUnset::Value(v),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> MaybeUnset<U> {
        match self {
            MaybeUnset::Unset => MaybeUnset::Unset,
            MaybeUnset::Null => MaybeUnset::Null,
            MaybeUnset::Value(v) => MaybeUnset::Value(f(v)),
        }
    }
}

impl<T> From<T> for MaybeUnset<T> {
    fn from(value: T) -> Self {
        MaybeUnset::Value(value)
    }
}

/// `None` means explicit null; use `MaybeUnset::Unset` to omit.
impl<T> From<Option<T>> for MaybeUnset<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => MaybeUnset::Value(v),
            None => MaybeUnset::Null,
        }
    }
}

impl<T: Serialize> Serialize for MaybeUnset<T> {
    /// `Unset` fields must be skipped by the container; if one reaches the
    /// serializer anyway it is written as null.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MaybeUnset::Value(v) => v.serialize(serializer),
            MaybeUnset::Null | MaybeUnset::Unset => serializer.serialize_none(),
        }
    }
}

/// Pair with `#[serde(default)]` so a missing key stays `Unset`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for MaybeUnset<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.into())
    }
}

/// Accumulates query pairs, dropping unset parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBuilder {
    pairs: Vec<(String, String)>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit null is sent as an empty value (`name=`).
    pub fn push<T: fmt::Display>(mut self, name: &str, value: &MaybeUnset<T>) -> Self {
        match value {
            MaybeUnset::Unset => {}
            MaybeUnset::Null => self.pairs.push((name.to_string(), String::new())),
            MaybeUnset::Value(v) => self.pairs.push((name.to_string(), v.to_string())),
        }
        self
    }

    pub fn build(self) -> Vec<(String, String)> {
        self.pairs
    }
}
