//! Operator parameters and captured placeholder values.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// A single operator parameter.
///
/// The set of kinds is closed: integer, float, string, integer list and
/// float list. Accessors never coerce between kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Int(i64),
    Float(f32),
    Str(String),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
}

impl Parameter {
    /// Name of the variant, used in type mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Parameter::Int(_) => "int",
            Parameter::Float(_) => "float",
            Parameter::Str(_) => "string",
            Parameter::Ints(_) => "int list",
            Parameter::Floats(_) => "float list",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Parameter::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Parameter::Ints(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for Parameter {
    fn from(value: i64) -> Self {
        Parameter::Int(value)
    }
}

impl From<f32> for Parameter {
    fn from(value: f32) -> Self {
        Parameter::Float(value)
    }
}

impl From<&str> for Parameter {
    fn from(value: &str) -> Self {
        Parameter::Str(value.to_string())
    }
}

impl From<Vec<i64>> for Parameter {
    fn from(value: Vec<i64>) -> Self {
        Parameter::Ints(value)
    }
}

impl From<Vec<f32>> for Parameter {
    fn from(value: Vec<f32>) -> Self {
        Parameter::Floats(value)
    }
}

/// Text form used by the template and graph format.
///
/// Floats always carry a `.` or an exponent so they read back as floats.
impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Int(v) => write!(f, "{v}"),
            Parameter::Float(v) => write!(f, "{v:?}"),
            Parameter::Str(v) => f.write_str(v),
            Parameter::Ints(values) => {
                let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "({})", items.join(","))
            }
            Parameter::Floats(values) => {
                let items: Vec<String> = values.iter().map(|v| format!("{v:?}")).collect();
                write!(f, "({})", items.join(","))
            }
        }
    }
}

/// Look up `key` in a parameter map, failing on a missing key.
pub(crate) fn lookup<'a>(map: &'a BTreeMap<String, Parameter>, key: &str) -> Result<&'a Parameter> {
    map.get(key)
        .ok_or_else(|| Error::MissingParameter(key.to_string()))
}

fn type_error(key: &str, expected: &'static str, actual: &Parameter) -> Error {
    Error::ParameterType {
        key: key.to_string(),
        expected,
        actual: actual.kind(),
    }
}

/// Placeholder values bound by the matcher for one matched subgraph.
///
/// Read-only for rewrites; typed lookups fail on a missing name or a kind
/// mismatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Captures {
    values: BTreeMap<String, Parameter>,
}

impl Captures {
    /// Create an empty capture set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`.
    ///
    /// Returns `false` if `name` is already bound to a different value; the
    /// existing binding is kept.
    pub fn bind(&mut self, name: &str, value: &Parameter) -> bool {
        match self.values.get(name) {
            Some(existing) => existing == value,
            None => {
                self.values.insert(name.to_string(), value.clone());
                true
            }
        }
    }

    /// Get the raw parameter bound to `name`.
    pub fn get(&self, name: &str) -> Result<&Parameter> {
        lookup(&self.values, name)
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        let value = self.get(name)?;
        value.as_int().ok_or_else(|| type_error(name, "int", value))
    }

    pub fn ints(&self, name: &str) -> Result<&[i64]> {
        let value = self.get(name)?;
        value
            .as_ints()
            .ok_or_else(|| type_error(name, "int list", value))
    }

    /// Number of bound placeholders.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Parameter)> for Captures {
    fn from_iter<I: IntoIterator<Item = (K, Parameter)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_lookup() {
        let captures: Captures = [
            ("dims", Parameter::Ints(vec![0, 2, 1])),
            ("dim0", Parameter::Int(1)),
        ]
        .into_iter()
        .collect();

        assert_eq!(captures.ints("dims").unwrap(), &[0, 2, 1]);
        assert_eq!(captures.int("dim0").unwrap(), 1);
    }

    #[test]
    fn test_missing_key_fails_closed() {
        let captures = Captures::new();
        let err = captures.int("dim0").unwrap_err();
        assert!(matches!(err, Error::MissingParameter(ref k) if k == "dim0"));
    }

    #[test]
    fn test_kind_mismatch_fails_closed() {
        let captures: Captures = [("dims", Parameter::Int(3))].into_iter().collect();
        let err = captures.ints("dims").unwrap_err();
        match err {
            Error::ParameterType {
                key,
                expected,
                actual,
            } => {
                assert_eq!(key, "dims");
                assert_eq!(expected, "int list");
                assert_eq!(actual, "int");
            }
            other => panic!("unexpected error: {other}"),
        }

        // No coercion from float to int either
        let captures: Captures = [("dim0", Parameter::Float(1.0))].into_iter().collect();
        assert!(captures.int("dim0").is_err());
    }

    #[test]
    fn test_bind_rejects_conflicting_values() {
        let mut captures = Captures::new();
        assert!(captures.bind("dims", &Parameter::Ints(vec![1, 0])));
        assert!(captures.bind("dims", &Parameter::Ints(vec![1, 0])));
        assert!(!captures.bind("dims", &Parameter::Ints(vec![0, 1])));
        assert_eq!(captures.ints("dims").unwrap(), &[1, 0]);
        assert_eq!(captures.len(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(Parameter::Int(-1).to_string(), "-1");
        assert_eq!(Parameter::Float(1.0).to_string(), "1.0");
        assert_eq!(Parameter::Ints(vec![0, 2, 1]).to_string(), "(0,2,1)");
        assert_eq!(Parameter::Ints(vec![]).to_string(), "()");
        assert_eq!(Parameter::Floats(vec![0.5, 2.0]).to_string(), "(0.5,2.0)");
        assert_eq!(Parameter::from("nearest").to_string(), "nearest");
    }
}
