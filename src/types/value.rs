//! Opaque script values exchanged with the story engine

use serde::{Deserialize, Serialize};

/// A value passed between host and story engine.
///
/// The controller never interprets these: numbers, strings, booleans and null
/// map to the obvious variants, while engine-internal lists and objects ride
/// along in `Opaque` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptValue {
    /// Absent or explicit null
    Null,
    /// Boolean
    Bool(bool),
    /// Integer number
    Int(i64),
    /// Floating-point number
    Float(f64),
    /// String
    Str(String),
    /// Engine-internal list/object types, passed through uninterpreted
    Opaque(serde_json::Value),
}

impl ScriptValue {
    /// Whether this value is the null sentinel
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// String content, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, if this is an integer value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Boolean content, if this is a boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl Default for ScriptValue {
    fn default() -> Self {
        Self::Null
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for ScriptValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for ScriptValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for ScriptValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}
