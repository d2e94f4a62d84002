//! Free variables and their bindings.
//!
//! A [`Parameter`] is an unassigned placeholder that may appear in a leaf's
//! duration or operands, or in an alignment policy. Identity is the
//! generated [`ParameterId`]; two parameters with the same display name are
//! still distinct.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::define_id_type;
use crate::models::Time;

define_id_type!(
    /// Process-unique parameter identity.
    u64,
    ParameterId,
    "p"
);

// Monotonic for the life of the process, never reset.
static NEXT_PARAMETER_ID: AtomicU64 = AtomicU64::new(0);

/// A named free variable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Parameter {
    id: ParameterId,
    name: String,
}

impl Parameter {
    /// Create a fresh parameter with a new identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ParameterId::new(NEXT_PARAMETER_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
        }
    }

    pub fn id(&self) -> ParameterId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A value slot that is either concrete or still parametric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Parameter(Parameter),
}

impl ParameterValue {
    /// The free variable held by this slot, if any.
    pub fn as_parameter(&self) -> Option<&Parameter> {
        match self {
            ParameterValue::Parameter(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.as_parameter().is_none()
    }

    /// The value as an integer time, when it is one.
    pub fn as_time(&self) -> Option<Time> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Substitute this slot from `bindings`. Unbound slots are returned as-is.
    pub fn resolve(&self, bindings: &Bindings) -> ParameterValue {
        match self {
            ParameterValue::Parameter(p) => bindings
                .get(p)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            other => other.clone(),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Parameter(p) => write!(f, "{}", p),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        ParameterValue::Int(i64::from(v))
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<Parameter> for ParameterValue {
    fn from(p: Parameter) -> Self {
        ParameterValue::Parameter(p)
    }
}

impl From<&Parameter> for ParameterValue {
    fn from(p: &Parameter) -> Self {
        ParameterValue::Parameter(p.clone())
    }
}

/// Mapping from free variables to values or to other free variables.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<Parameter, ParameterValue>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `parameter` to `value`, builder style.
    pub fn bind(mut self, parameter: &Parameter, value: impl Into<ParameterValue>) -> Self {
        self.insert(parameter, value);
        self
    }

    pub fn insert(&mut self, parameter: &Parameter, value: impl Into<ParameterValue>) {
        self.values.insert(parameter.clone(), value.into());
    }

    pub fn get(&self, parameter: &Parameter) -> Option<&ParameterValue> {
        self.values.get(parameter)
    }

    pub fn contains(&self, parameter: &Parameter) -> bool {
        self.values.contains_key(parameter)
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_with_same_name_are_distinct() {
        let a = Parameter::new("dur");
        let b = Parameter::new("dur");
        assert_ne!(a, b);
        assert_eq!(a.name(), b.name());
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_resolve_binds_only_matching_parameter() {
        let a = Parameter::new("a");
        let b = Parameter::new("b");
        let bindings = Bindings::new().bind(&a, 160);

        assert_eq!(ParameterValue::from(&a).resolve(&bindings), ParameterValue::Int(160));
        assert_eq!(
            ParameterValue::from(&b).resolve(&bindings),
            ParameterValue::Parameter(b.clone())
        );
        assert_eq!(ParameterValue::Int(3).resolve(&bindings), ParameterValue::Int(3));
    }

    #[test]
    fn test_resolve_to_other_parameter() {
        let a = Parameter::new("a");
        let c = Parameter::new("c");
        let bindings = Bindings::new().bind(&a, &c);
        let resolved = ParameterValue::from(&a).resolve(&bindings);
        assert_eq!(resolved.as_parameter(), Some(&c));
        assert!(!resolved.is_assigned());
    }

    #[test]
    fn test_as_time_only_for_integers() {
        assert_eq!(ParameterValue::Int(40).as_time(), Some(40));
        assert_eq!(ParameterValue::Float(40.0).as_time(), None);
        assert_eq!(ParameterValue::from(Parameter::new("x")).as_time(), None);
    }
}
