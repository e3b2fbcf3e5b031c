use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::Date;

/// A typed job parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    String(String),
    Long(i64),
    Double(f64),
    Date(Date),
    Bool(bool),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::String(v) => write!(f, "{v}"),
            ParameterValue::Long(v) => write!(f, "{v}"),
            ParameterValue::Double(v) => write!(f, "{v}"),
            ParameterValue::Date(v) => write!(f, "{v}"),
            ParameterValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl ParameterValue {
    fn type_tag(&self) -> &'static str {
        match self {
            ParameterValue::String(_) => "string",
            ParameterValue::Long(_) => "long",
            ParameterValue::Double(_) => "double",
            ParameterValue::Date(_) => "date",
            ParameterValue::Bool(_) => "bool",
        }
    }
}

/// An ordered mapping of parameter name to typed value.
///
/// Job parameters are both the input to a run and the identity key that
/// distinguishes one run from another of the same job: launching twice with
/// equal parameters resolves to the same job instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobParameters {
    params: BTreeMap<String, ParameterValue>,
}

impl JobParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.params.get(name)
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.params.get(name) {
            Some(ParameterValue::String(v)) => Some(v),
            _ => None,
        }
    }

    pub fn get_long(&self, name: &str) -> Option<i64> {
        match self.params.get(name) {
            Some(ParameterValue::Long(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_date(&self, name: &str) -> Option<Date> {
        match self.params.get(name) {
            Some(ParameterValue::Date(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.params.get(name) {
            Some(ParameterValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.params.iter()
    }

    /// Canonical identity string for this parameter set.
    ///
    /// Deterministic for equal parameter sets regardless of insertion order;
    /// the type tag keeps `Long(1)` distinct from `String("1")`.
    pub fn identity(&self) -> String {
        let mut parts = Vec::with_capacity(self.params.len());
        for (name, value) in &self.params {
            parts.push(format!("{name}:{}={value}", value.type_tag()));
        }
        parts.join("&")
    }
}

/// Fluent builder for [`JobParameters`].
#[derive(Default)]
pub struct JobParametersBuilder {
    params: BTreeMap<String, ParameterValue>,
}

impl JobParametersBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn string(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params
            .insert(name.to_string(), ParameterValue::String(value.into()));
        self
    }

    pub fn long(mut self, name: &str, value: i64) -> Self {
        self.params
            .insert(name.to_string(), ParameterValue::Long(value));
        self
    }

    pub fn double(mut self, name: &str, value: f64) -> Self {
        self.params
            .insert(name.to_string(), ParameterValue::Double(value));
        self
    }

    pub fn date(mut self, name: &str, value: Date) -> Self {
        self.params
            .insert(name.to_string(), ParameterValue::Date(value));
        self
    }

    pub fn flag(mut self, name: &str, value: bool) -> Self {
        self.params
            .insert(name.to_string(), ParameterValue::Bool(value));
        self
    }

    pub fn build(self) -> JobParameters {
        JobParameters {
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::JobParametersBuilder;

    #[test]
    fn identity_is_independent_of_insertion_order() {
        let a = JobParametersBuilder::new()
            .string("region", "emea")
            .long("cycle", 7)
            .build();
        let b = JobParametersBuilder::new()
            .long("cycle", 7)
            .string("region", "emea")
            .build();

        assert_eq!(a, b);
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn identity_distinguishes_value_types() {
        let long = JobParametersBuilder::new().long("cycle", 1).build();
        let string = JobParametersBuilder::new().string("cycle", "1").build();

        assert_ne!(long.identity(), string.identity());
    }

    #[test]
    fn typed_getters() {
        let params = JobParametersBuilder::new()
            .string("region", "emea")
            .long("cycle", 7)
            .flag("dry_run", false)
            .build();

        assert_eq!(params.get_string("region"), Some("emea"));
        assert_eq!(params.get_long("cycle"), Some(7));
        assert_eq!(params.get_bool("dry_run"), Some(false));
        assert_eq!(params.get_long("region"), None);
        assert_eq!(params.len(), 3);
    }
}
