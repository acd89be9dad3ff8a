//! Animation records and their parameter schemas.
//!
//! A record is validated when it is built or deserialized; everything
//! downstream (compositor, host, sessions) can rely on:
//! - non-blank `id` and `name`
//! - unique parameter ids
//! - every parameter default well-formed for its kind and inside its bounds
//!
//! Store rows are loosely typed. [`RecordRow`] accepts what the content
//! table actually holds and normalizes it before validation.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::params::ParamValue;
use crate::{ParamError, RecordError};

// ---------------------------------------------------------------------------
// Category / Complexity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Category {
    #[default]
    Background,
    Interactive,
    Particle,
    #[serde(rename = "WebGL")]
    WebGl,
    Text,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Background,
        Category::Interactive,
        Category::Particle,
        Category::WebGl,
        Category::Text,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Background => "Background",
            Category::Interactive => "Interactive",
            Category::Particle => "Particle",
            Category::WebGl => "WebGL",
            Category::Text => "Text",
        }
    }

    /// Case-insensitive lookup by label.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Complexity {
    Simple,
    #[default]
    Medium,
    High,
}

impl Complexity {
    pub const ALL: [Complexity; 3] = [Complexity::Simple, Complexity::Medium, Complexity::High];

    pub fn label(self) -> &'static str {
        match self {
            Complexity::Simple => "Simple",
            Complexity::Medium => "Medium",
            Complexity::High => "High",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// ParameterKind / ParameterSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Color,
    Number,
    Boolean,
    #[serde(alias = "select")]
    Choice,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParameterKind::Color => "color",
            ParameterKind::Number => "number",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Choice => "choice",
        })
    }
}

/// One tunable control of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameterSpec", into = "RawParameterSpec")]
pub struct ParameterSpec {
    pub id: String,
    pub label: String,
    pub kind: ParameterKind,
    pub default_value: ParamValue,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub options: Vec<String>,
}

impl ParameterSpec {
    fn base(id: impl Into<String>, label: impl Into<String>, default_value: ParamValue) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: default_value.kind(),
            default_value,
            min: None,
            max: None,
            step: None,
            options: Vec::new(),
        }
    }

    pub fn color(id: impl Into<String>, label: impl Into<String>, default: impl Into<String>) -> Self {
        Self::base(id, label, ParamValue::Color(default.into()))
    }

    pub fn number(id: impl Into<String>, label: impl Into<String>, default: f64) -> Self {
        Self::base(id, label, ParamValue::Number(default))
    }

    pub fn boolean(id: impl Into<String>, label: impl Into<String>, default: bool) -> Self {
        Self::base(id, label, ParamValue::Boolean(default))
    }

    pub fn choice<I, S>(
        id: impl Into<String>,
        label: impl Into<String>,
        options: I,
        default: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = Self::base(id, label, ParamValue::Choice(default.into()));
        spec.options = options.into_iter().map(Into::into).collect();
        spec
    }

    /// Set the inclusive numeric range and slider step.
    pub fn with_range(mut self, min: f64, max: f64, step: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self.step = Some(step);
        self
    }

    /// Strict check of one value against this spec: kind, finiteness,
    /// color syntax, numeric bounds and choice membership.
    pub fn check(&self, value: &ParamValue) -> Result<(), ParamError> {
        if value.kind() != self.kind {
            return Err(ParamError::KindMismatch {
                id: self.id.clone(),
                expected: self.kind,
                got: value.kind(),
            });
        }
        match value {
            ParamValue::Number(n) => {
                if !n.is_finite() {
                    return Err(ParamError::NonFinite { id: self.id.clone() });
                }
                let below = self.min.is_some_and(|min| *n < min);
                let above = self.max.is_some_and(|max| *n > max);
                if below || above {
                    return Err(ParamError::OutOfRange {
                        id: self.id.clone(),
                        value: *n,
                        bounds: self.bounds_label(),
                    });
                }
            }
            ParamValue::Color(c) => {
                if !is_hex_color(c) {
                    return Err(ParamError::InvalidColor {
                        id: self.id.clone(),
                        value: c.clone(),
                    });
                }
            }
            ParamValue::Choice(c) => {
                if !self.options.iter().any(|o| o == c) {
                    return Err(ParamError::NotAnOption {
                        id: self.id.clone(),
                        value: c.clone(),
                    });
                }
            }
            ParamValue::Boolean(_) => {}
        }
        Ok(())
    }

    fn bounds_label(&self) -> String {
        let fmt_bound = |b: Option<f64>, open: &str| b.map_or(open.to_string(), |v| v.to_string());
        format!("[{}, {}]", fmt_bound(self.min, "-inf"), fmt_bound(self.max, "inf"))
    }

    /// Validate the declaration itself, including its default.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.id.trim().is_empty() {
            return Err(RecordError::InvalidParameter {
                id: self.id.clone(),
                reason: "empty id".into(),
            });
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(RecordError::InvalidParameter {
                    id: self.id.clone(),
                    reason: format!("min {min} exceeds max {max}"),
                });
            }
        }
        if let Some(step) = self.step {
            if !step.is_finite() || step <= 0.0 {
                return Err(RecordError::InvalidParameter {
                    id: self.id.clone(),
                    reason: format!("step must be positive, got {step}"),
                });
            }
        }
        if self.kind == ParameterKind::Choice && self.options.is_empty() {
            return Err(RecordError::InvalidParameter {
                id: self.id.clone(),
                reason: "choice parameter without options".into(),
            });
        }
        self.check(&self.default_value)
            .map_err(|source| RecordError::InvalidDefault {
                id: self.id.clone(),
                source,
            })
    }
}

/// Wire shape of a parameter spec: `{id, label, type, default, min?, max?, step?, options?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawParameterSpec {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    #[serde(rename = "default")]
    pub default_value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl TryFrom<RawParameterSpec> for ParameterSpec {
    type Error = RecordError;

    fn try_from(raw: RawParameterSpec) -> Result<Self, Self::Error> {
        let default_value = ParamValue::from_json(raw.kind, &raw.default_value).ok_or_else(|| {
            RecordError::InvalidParameter {
                id: raw.id.clone(),
                reason: format!("default {} is not a {} value", raw.default_value, raw.kind),
            }
        })?;
        let spec = ParameterSpec {
            id: raw.id,
            label: raw.label,
            kind: raw.kind,
            default_value,
            min: raw.min,
            max: raw.max,
            step: raw.step,
            options: raw.options,
        };
        spec.validate()?;
        Ok(spec)
    }
}

impl From<ParameterSpec> for RawParameterSpec {
    fn from(spec: ParameterSpec) -> Self {
        RawParameterSpec {
            id: spec.id,
            label: spec.label,
            kind: spec.kind,
            default_value: spec.default_value.to_json(),
            min: spec.min,
            max: spec.max,
            step: spec.step,
            options: spec.options,
        }
    }
}

/// `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`.
pub fn is_hex_color(s: &str) -> bool {
    match s.strip_prefix('#') {
        Some(hex) => {
            matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

// ---------------------------------------------------------------------------
// AnimationRecord
// ---------------------------------------------------------------------------

/// One motion primitive as stored in the content table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordRow")]
pub struct AnimationRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub complexity: Complexity,
    /// Body markup.
    #[serde(rename = "html")]
    pub markup: String,
    /// Stylesheet body.
    #[serde(rename = "css")]
    pub style: String,
    /// Executable logic; reads the injected configuration global.
    #[serde(rename = "js")]
    pub script: String,
    /// Script URLs loaded in order before `script` runs.
    #[serde(rename = "cdnLinks")]
    pub external_resources: Vec<String>,
    #[serde(rename = "config")]
    pub parameters: Vec<ParameterSpec>,
}

impl AnimationRecord {
    /// A blank record. Chain `with_*` calls, then [`validated`](Self::validated).
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: Category::default(),
            complexity: Complexity::default(),
            markup: String::new(),
            style: String::new(),
            script: String::new(),
            external_resources: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = markup.into();
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    pub fn with_resource(mut self, url: impl Into<String>) -> Self {
        self.external_resources.push(url.into());
        self
    }

    pub fn with_parameter(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    /// Run [`validate`](Self::validate) and hand the record back.
    pub fn validated(self) -> Result<Self, RecordError> {
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        if self.id.trim().is_empty() {
            return Err(RecordError::MissingField("id"));
        }
        if self.name.trim().is_empty() {
            return Err(RecordError::MissingField("name"));
        }
        let mut seen = HashSet::new();
        for spec in &self.parameters {
            spec.validate()?;
            if !seen.insert(spec.id.as_str()) {
                return Err(RecordError::DuplicateParameter {
                    id: spec.id.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn parameter(&self, id: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.id == id)
    }
}

// ---------------------------------------------------------------------------
// RecordRow: loosely typed store row
// ---------------------------------------------------------------------------

/// A content-table row as it comes off the wire. Older schemas used
/// `html_code` / `cdn_urls` / `config_json` style column names; those are
/// accepted as aliases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordRow {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub complexity: Option<String>,
    #[serde(default, alias = "html_code", alias = "htmlCode")]
    pub html: Option<String>,
    #[serde(default, alias = "css_code", alias = "cssCode")]
    pub css: Option<String>,
    #[serde(default, alias = "js_code", alias = "jsCode")]
    pub js: Option<String>,
    #[serde(default, alias = "cdnLinks", alias = "cdn_urls")]
    pub cdn_links: Option<Value>,
    #[serde(default, alias = "config_json", alias = "configParams")]
    pub config: Option<Value>,
}

impl TryFrom<RecordRow> for AnimationRecord {
    type Error = RecordError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let id = row.id.unwrap_or_default().trim().to_string();
        let category = row
            .category
            .as_deref()
            .and_then(Category::from_label)
            .unwrap_or_default();
        let complexity = row
            .complexity
            .as_deref()
            .and_then(Complexity::from_label)
            .unwrap_or_default();
        let parameters = row
            .config
            .as_ref()
            .map(|v| parse_parameter_list(&id, v))
            .unwrap_or_default();

        let record = AnimationRecord {
            name: row.name.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            category,
            complexity,
            markup: row.html.unwrap_or_default(),
            style: row.css.unwrap_or_default(),
            script: row.js.unwrap_or_default(),
            external_resources: row
                .cdn_links
                .as_ref()
                .map(parse_resource_list)
                .unwrap_or_default(),
            parameters,
            id,
        };
        record.validate()?;
        Ok(record)
    }
}

/// External script URLs from a JSON array, a JSON array encoded as text, or
/// a newline-separated list. Blank entries are dropped.
pub fn parse_resource_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Value::String(text) => parse_resource_text(text),
        _ => Vec::new(),
    }
}

/// Text form of [`parse_resource_list`].
pub fn parse_resource_text(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.starts_with('[') {
        return serde_json::from_str::<Value>(text)
            .map(|v| parse_resource_list(&v))
            .unwrap_or_default();
    }
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Parameter specs from a JSON array (or JSON text). Entries that do not
/// form a valid spec are skipped with a warning.
fn parse_parameter_list(record_id: &str, value: &Value) -> Vec<ParameterSpec> {
    let items = match value {
        Value::Array(items) => items.clone(),
        Value::String(text) => match serde_json::from_str::<Value>(text.trim()) {
            Ok(Value::Array(items)) => items,
            _ => {
                warn!(record = record_id, "parameter config is not a JSON array; ignoring");
                return Vec::new();
            }
        },
        _ => return Vec::new(),
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<ParameterSpec>(item) {
            Ok(spec) => Some(spec),
            Err(err) => {
                warn!(record = record_id, index, error = %err, "skipping invalid parameter spec");
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fluid_grid() -> AnimationRecord {
        AnimationRecord::new("fluid-grid", "Fluid Grid")
            .with_category(Category::Background)
            .with_markup(r#"<canvas id="fluid"></canvas>"#)
            .with_parameter(ParameterSpec::color("lineColor", "Line Color", "#3b82f6"))
            .with_parameter(
                ParameterSpec::number("resolution", "Grid Resolution", 30.0).with_range(10.0, 80.0, 5.0),
            )
    }

    #[test]
    fn valid_record_passes() {
        assert!(fluid_grid().validated().is_ok());
    }

    #[test]
    fn missing_name_is_rejected() {
        let err = AnimationRecord::new("x", "  ").validate().unwrap_err();
        assert!(matches!(err, RecordError::MissingField("name")));
    }

    #[test]
    fn missing_id_is_rejected() {
        let err = AnimationRecord::new("", "X").validate().unwrap_err();
        assert!(matches!(err, RecordError::MissingField("id")));
    }

    #[test]
    fn empty_markup_is_not_an_error() {
        assert!(AnimationRecord::new("blank", "Blank").validate().is_ok());
    }

    #[test]
    fn duplicate_parameter_rejected() {
        let record = fluid_grid().with_parameter(ParameterSpec::color("lineColor", "Again", "#fff"));
        let err = record.validate().unwrap_err();
        assert!(matches!(err, RecordError::DuplicateParameter { ref id } if id == "lineColor"));
    }

    #[test]
    fn default_outside_range_rejected() {
        let record = AnimationRecord::new("a", "A")
            .with_parameter(ParameterSpec::number("speed", "Speed", 12.0).with_range(0.0, 10.0, 1.0));
        let err = record.validate().unwrap_err();
        assert!(matches!(err, RecordError::InvalidDefault { .. }));
    }

    #[test]
    fn choice_default_must_be_an_option() {
        let spec = ParameterSpec::choice("mode", "Mode", ["wave", "pulse"], "spiral");
        assert!(spec.validate().is_err());
        let spec = ParameterSpec::choice("mode", "Mode", ["wave", "pulse"], "pulse");
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn check_rejects_kind_mismatch() {
        let spec = ParameterSpec::color("c", "C", "#000");
        let err = spec.check(&ParamValue::Number(1.0)).unwrap_err();
        assert_eq!(
            err,
            ParamError::KindMismatch {
                id: "c".into(),
                expected: ParameterKind::Color,
                got: ParameterKind::Number,
            }
        );
    }

    #[test]
    fn hex_colors() {
        assert!(is_hex_color("#fff"));
        assert!(is_hex_color("#3b82f6"));
        assert!(is_hex_color("#3b82f6cc"));
        assert!(!is_hex_color("3b82f6"));
        assert!(!is_hex_color("#3b82f"));
        assert!(!is_hex_color("#zzzzzz"));
    }

    #[test]
    fn category_labels_round_trip() {
        for c in Category::ALL {
            assert_eq!(Category::from_label(c.label()), Some(c));
        }
        assert_eq!(Category::from_label("webgl"), Some(Category::WebGl));
        assert_eq!(Category::from_label("Sparkles"), None);
    }

    #[test]
    fn row_normalizes_unknown_enums() {
        let record: AnimationRecord = serde_json::from_value(json!({
            "id": "x",
            "name": "X",
            "category": "Nonsense",
            "complexity": null,
            "html": null
        }))
        .unwrap();
        assert_eq!(record.category, Category::Background);
        assert_eq!(record.complexity, Complexity::Medium);
        assert_eq!(record.markup, "");
    }

    #[test]
    fn row_accepts_legacy_column_names() {
        let record: AnimationRecord = serde_json::from_value(json!({
            "id": "x",
            "name": "X",
            "html_code": "<div></div>",
            "cdn_urls": "https://a.example/one.js\n\nhttps://a.example/two.js",
            "config_json": "[{\"id\":\"speed\",\"label\":\"Speed\",\"type\":\"number\",\"default\":1}]"
        }))
        .unwrap();
        assert_eq!(record.markup, "<div></div>");
        assert_eq!(
            record.external_resources,
            vec!["https://a.example/one.js", "https://a.example/two.js"]
        );
        assert_eq!(record.parameters.len(), 1);
        assert_eq!(record.parameters[0].default_value, ParamValue::Number(1.0));
    }

    #[test]
    fn row_skips_invalid_parameter_specs() {
        let record: AnimationRecord = serde_json::from_value(json!({
            "id": "x",
            "name": "X",
            "config": [
                {"id": "ok", "label": "Ok", "type": "color", "default": "#123456"},
                {"label": "no id", "type": "color", "default": "#000"},
                {"id": "bad", "label": "Bad", "type": "number", "default": "fast"}
            ]
        }))
        .unwrap();
        let ids: Vec<_> = record.parameters.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["ok"]);
    }

    #[test]
    fn row_without_name_fails() {
        let result = serde_json::from_value::<AnimationRecord>(json!({"id": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn select_is_an_alias_for_choice() {
        let spec: ParameterSpec = serde_json::from_value(json!({
            "id": "mode", "label": "Mode", "type": "select",
            "default": "wave", "options": ["wave", "pulse"]
        }))
        .unwrap();
        assert_eq!(spec.kind, ParameterKind::Choice);
    }

    #[test]
    fn record_serializes_to_store_shape() {
        let value = serde_json::to_value(fluid_grid()).unwrap();
        assert_eq!(value["html"], json!(r#"<canvas id="fluid"></canvas>"#));
        assert_eq!(value["config"][0]["type"], json!("color"));
        assert_eq!(value["config"][1]["default"], json!(30));
        let back: AnimationRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, fluid_grid());
    }

    #[test]
    fn resource_text_accepts_json_array() {
        assert_eq!(
            parse_resource_text(r#"["https://cdn.example/three.js", " "]"#),
            vec!["https://cdn.example/three.js"]
        );
        assert!(parse_resource_text("  ").is_empty());
    }
}
