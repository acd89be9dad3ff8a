//! Parameter values and per-session parameter assignments.
//!
//! Values are a tagged union keyed by [`ParameterKind`], checked when they
//! enter an assignment through [`ParameterAssignment::set`]. Composition
//! goes through [`ParameterAssignment::to_config_object`], which is
//! permissive: one entry per schema parameter, in schema order, with
//! missing or malformed values replaced by the declared default.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::record::{is_hex_color, AnimationRecord, ParameterKind, ParameterSpec};
use crate::ParamError;

/// Largest magnitude at which every integer is exactly representable in f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

// ---------------------------------------------------------------------------
// ParamValue
// ---------------------------------------------------------------------------

/// One concrete parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Color(String),
    Number(f64),
    Boolean(bool),
    Choice(String),
}

impl ParamValue {
    pub fn color(hex: impl Into<String>) -> Self {
        ParamValue::Color(hex.into())
    }

    pub fn choice(option: impl Into<String>) -> Self {
        ParamValue::Choice(option.into())
    }

    pub fn kind(&self) -> ParameterKind {
        match self {
            ParamValue::Color(_) => ParameterKind::Color,
            ParamValue::Number(_) => ParameterKind::Number,
            ParamValue::Boolean(_) => ParameterKind::Boolean,
            ParamValue::Choice(_) => ParameterKind::Choice,
        }
    }

    /// Interpret a loosely typed JSON value as `kind`.
    ///
    /// Numbers and booleans are also accepted in string form, since that is
    /// how form controls report them.
    pub fn from_json(kind: ParameterKind, value: &Value) -> Option<Self> {
        match (kind, value) {
            (ParameterKind::Color, Value::String(s)) => {
                let s = s.trim();
                is_hex_color(s).then(|| ParamValue::Color(s.to_string()))
            }
            (ParameterKind::Number, Value::Number(n)) => {
                n.as_f64().filter(|f| f.is_finite()).map(ParamValue::Number)
            }
            (ParameterKind::Boolean, Value::Bool(b)) => Some(ParamValue::Boolean(*b)),
            (ParameterKind::Choice, Value::String(s)) => Some(ParamValue::Choice(s.clone())),
            (kind, Value::String(s)) => Self::parse(kind, s),
            _ => None,
        }
    }

    /// Parse the textual form of a value of `kind`.
    pub fn parse(kind: ParameterKind, raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match kind {
            ParameterKind::Color => is_hex_color(raw).then(|| ParamValue::Color(raw.to_string())),
            ParameterKind::Number => raw
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(ParamValue::Number),
            ParameterKind::Boolean => match raw {
                "true" | "1" | "on" => Some(ParamValue::Boolean(true)),
                "false" | "0" | "off" => Some(ParamValue::Boolean(false)),
                _ => None,
            },
            ParameterKind::Choice => Some(ParamValue::Choice(raw.to_string())),
        }
    }

    /// JSON form injected into composed documents. Integral numbers are
    /// written without a fractional part (`30`, not `30.0`).
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Color(s) | ParamValue::Choice(s) => Value::String(s.clone()),
            ParamValue::Boolean(b) => Value::Bool(*b),
            ParamValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
                    Value::from(*n as i64)
                } else {
                    Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null)
                }
            }
        }
    }

    /// Well-formed for `spec` regardless of bounds: right kind, finite,
    /// syntactically valid color.
    fn is_well_formed_for(&self, spec: &ParameterSpec) -> bool {
        match self {
            _ if self.kind() != spec.kind => false,
            ParamValue::Number(n) => n.is_finite(),
            ParamValue::Color(c) => is_hex_color(c),
            _ => true,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Color(s) | ParamValue::Choice(s) => f.write_str(s),
            ParamValue::Boolean(b) => write!(f, "{b}"),
            ParamValue::Number(_) => write!(f, "{}", self.to_json()),
        }
    }
}

// ---------------------------------------------------------------------------
// ParameterAssignment
// ---------------------------------------------------------------------------

/// Concrete values chosen for a record's parameters during one viewing
/// session. Never written back to the content store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterAssignment {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterAssignment {
    /// An empty assignment; composing with it uses every default.
    pub fn new() -> Self {
        Self::default()
    }

    /// One entry per schema parameter, each set to its default.
    pub fn from_defaults(record: &AnimationRecord) -> Self {
        let values = record
            .parameters
            .iter()
            .map(|spec| (spec.id.clone(), spec.default_value.clone()))
            .collect();
        Self { values }
    }

    /// Builder-style unchecked insert.
    pub fn with(mut self, id: impl Into<String>, value: ParamValue) -> Self {
        self.values.insert(id.into(), value);
        self
    }

    /// Unchecked insert. Use [`set`](Self::set) when the value comes from a user.
    pub fn insert(&mut self, id: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        self.values.insert(id.into(), value)
    }

    /// Checked update against the record's schema.
    pub fn set(
        &mut self,
        record: &AnimationRecord,
        id: &str,
        value: ParamValue,
    ) -> Result<(), ParamError> {
        let spec = lookup(record, id)?;
        spec.check(&value)?;
        self.values.insert(spec.id.clone(), value);
        Ok(())
    }

    /// Checked update from the textual form a control reports.
    pub fn set_raw(&mut self, record: &AnimationRecord, id: &str, raw: &str) -> Result<(), ParamError> {
        let spec = lookup(record, id)?;
        let value = ParamValue::parse(spec.kind, raw).ok_or_else(|| ParamError::Unparseable {
            id: spec.id.clone(),
            raw: raw.to_string(),
            kind: spec.kind,
        })?;
        self.set(record, id, value)
    }

    /// Strict check of every entry against the record's schema.
    pub fn validate(&self, record: &AnimationRecord) -> Result<(), ParamError> {
        for (id, value) in &self.values {
            lookup(record, id)?.check(value)?;
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ParamValue> {
        self.values.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<ParamValue> {
        self.values.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value composition will use for `spec`.
    pub fn resolve(&self, spec: &ParameterSpec) -> ParamValue {
        match self.values.get(&spec.id) {
            Some(value) if value.is_well_formed_for(spec) => value.clone(),
            Some(value) => {
                debug!(param = %spec.id, value = %value, "malformed value, using default");
                spec.default_value.clone()
            }
            None => spec.default_value.clone(),
        }
    }

    /// Flat `{paramId: value}` object in schema order. Entries whose id is
    /// not in the schema are left out.
    pub fn to_config_object(&self, record: &AnimationRecord) -> Map<String, Value> {
        record
            .parameters
            .iter()
            .map(|spec| (spec.id.clone(), self.resolve(spec).to_json()))
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, ParamValue)> for ParameterAssignment {
    fn from_iter<T: IntoIterator<Item = (K, ParamValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

fn lookup<'a>(record: &'a AnimationRecord, id: &str) -> Result<&'a ParameterSpec, ParamError> {
    record
        .parameter(id)
        .ok_or_else(|| ParamError::UnknownParameter { id: id.to_string() })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> AnimationRecord {
        AnimationRecord::new("birds", "Birds")
            .with_parameter(ParameterSpec::color("color1", "Primary", "#ff0000"))
            .with_parameter(ParameterSpec::number("quantity", "Quantity", 5.0).with_range(1.0, 10.0, 1.0))
            .with_parameter(ParameterSpec::boolean("wings", "Wings", true))
            .with_parameter(ParameterSpec::choice("mode", "Mode", ["flock", "swarm"], "flock"))
    }

    #[test]
    fn from_defaults_has_one_entry_per_spec() {
        let a = ParameterAssignment::from_defaults(&record());
        assert_eq!(a.len(), 4);
        assert_eq!(a.get("quantity"), Some(&ParamValue::Number(5.0)));
    }

    #[test]
    fn set_checks_bounds() {
        let rec = record();
        let mut a = ParameterAssignment::from_defaults(&rec);
        let err = a.set(&rec, "quantity", ParamValue::Number(11.0)).unwrap_err();
        assert!(matches!(err, ParamError::OutOfRange { .. }));
        assert_eq!(a.get("quantity"), Some(&ParamValue::Number(5.0)));
        a.set(&rec, "quantity", ParamValue::Number(10.0)).unwrap();
        assert_eq!(a.get("quantity"), Some(&ParamValue::Number(10.0)));
    }

    #[test]
    fn set_rejects_unknown_parameter() {
        let rec = record();
        let mut a = ParameterAssignment::new();
        let err = a.set(&rec, "speed", ParamValue::Number(1.0)).unwrap_err();
        assert_eq!(err, ParamError::UnknownParameter { id: "speed".into() });
    }

    #[test]
    fn set_raw_parses_by_kind() {
        let rec = record();
        let mut a = ParameterAssignment::new();
        a.set_raw(&rec, "quantity", "7.5").unwrap();
        a.set_raw(&rec, "wings", "false").unwrap();
        a.set_raw(&rec, "color1", "#00ff00").unwrap();
        a.set_raw(&rec, "mode", "swarm").unwrap();
        assert_eq!(a.get("quantity"), Some(&ParamValue::Number(7.5)));
        assert_eq!(a.get("wings"), Some(&ParamValue::Boolean(false)));
        let err = a.set_raw(&rec, "quantity", "lots").unwrap_err();
        assert!(matches!(err, ParamError::Unparseable { .. }));
        let err = a.set_raw(&rec, "mode", "orbit").unwrap_err();
        assert!(matches!(err, ParamError::NotAnOption { .. }));
    }

    #[test]
    fn config_object_follows_schema_order_and_fills_defaults() {
        let rec = record();
        let a = ParameterAssignment::new()
            .with("mode", ParamValue::choice("swarm"))
            .with("stray", ParamValue::Number(1.0));
        let obj = a.to_config_object(&rec);
        let keys: Vec<_> = obj.keys().cloned().collect();
        assert_eq!(keys, vec!["color1", "quantity", "wings", "mode"]);
        assert_eq!(
            Value::Object(obj),
            json!({"color1": "#ff0000", "quantity": 5, "wings": true, "mode": "swarm"})
        );
    }

    #[test]
    fn resolve_replaces_malformed_values() {
        let rec = record();
        let a = ParameterAssignment::new()
            .with("color1", ParamValue::color("red"))
            .with("quantity", ParamValue::Number(f64::NAN))
            .with("wings", ParamValue::Number(1.0));
        assert_eq!(a.to_config_object(&rec), ParameterAssignment::from_defaults(&rec).to_config_object(&rec));
    }

    #[test]
    fn resolve_passes_out_of_range_numbers_through() {
        let rec = record();
        let a = ParameterAssignment::new().with("quantity", ParamValue::Number(50.0));
        assert_eq!(a.to_config_object(&rec)["quantity"], json!(50));
    }

    #[test]
    fn number_json_form() {
        assert_eq!(ParamValue::Number(30.0).to_json(), json!(30));
        assert_eq!(ParamValue::Number(1.5).to_json(), json!(1.5));
        assert_eq!(ParamValue::Number(-2.0).to_json(), json!(-2));
        assert_eq!(ParamValue::Number(0.25).to_string(), "0.25");
    }

    #[test]
    fn from_json_accepts_string_forms() {
        assert_eq!(
            ParamValue::from_json(ParameterKind::Number, &json!("2.5")),
            Some(ParamValue::Number(2.5))
        );
        assert_eq!(
            ParamValue::from_json(ParameterKind::Boolean, &json!("true")),
            Some(ParamValue::Boolean(true))
        );
        assert_eq!(ParamValue::from_json(ParameterKind::Color, &json!(12)), None);
    }

    #[test]
    fn validate_reports_first_problem() {
        let rec = record();
        let a = ParameterAssignment::new().with("color1", ParamValue::color("#12"));
        assert!(matches!(a.validate(&rec), Err(ParamError::InvalidColor { .. })));
        assert!(ParameterAssignment::from_defaults(&rec).validate(&rec).is_ok());
    }
}
