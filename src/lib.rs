//! # Motion Compositor
//!
//! Deterministic compositor that turns a stored motion primitive
//! (markup, style, script, external script URLs, parameter schema) plus a
//! live parameter assignment into one self-contained HTML document, and a
//! preview host that mounts such documents into isolated frames.
//!
//! The compositor never fails on partial input: missing or malformed
//! parameter values fall back to their declared defaults. Structural
//! problems with a record are rejected when the record is constructed.

pub mod compose;
pub mod gallery;
pub mod host;
pub mod params;
pub mod record;
pub mod sandbox;
pub mod session;
pub mod store;
pub mod utils;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use params::{ParamValue, ParameterAssignment};
pub use record::{AnimationRecord, Category, Complexity, ParameterKind, ParameterSpec};

/// Global identifier the injected configuration object is assigned to.
/// Existing primitive scripts read `window.VANTA_CONFIG` at startup.
pub const DEFAULT_CONFIG_GLOBAL: &str = "VANTA_CONFIG";

/// Console prefix used by the script error boundary.
pub const DEFAULT_DIAGNOSTIC_LABEL: &str = "Motion Runtime Error";

/// `channel` field of every message a composed document posts to its parent.
pub const FRAME_MESSAGE_CHANNEL: &str = "motion-compositor";

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic reported by a hosted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, context: Option<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            message: message.into(),
            context,
        }
    }

    pub fn warning(message: impl Into<String>, context: Option<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
            context,
        }
    }
}

// ---------------------------------------------------------------------------
// ComposeOptions
// ---------------------------------------------------------------------------

/// Describes HOW to compose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Click-through card variant: every element is made non-interactive
    /// for pointer purposes.
    pub thumbnail_mode: bool,
    /// Global the serialized assignment is assigned to. Must be a plain JS
    /// identifier; anything else falls back to [`DEFAULT_CONFIG_GLOBAL`].
    pub config_global: String,
    /// Emit the full-bleed `html, body` reset ahead of the record's styles.
    pub base_styles: bool,
    /// Prefix for errors logged by the script error boundary.
    pub diagnostic_label: String,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            thumbnail_mode: false,
            config_global: DEFAULT_CONFIG_GLOBAL.to_string(),
            base_styles: true,
            diagnostic_label: DEFAULT_DIAGNOSTIC_LABEL.to_string(),
        }
    }
}

impl ComposeOptions {
    /// Defaults with `thumbnail_mode` enabled.
    pub fn thumbnail() -> Self {
        Self {
            thumbnail_mode: true,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// ComposedDocument
// ---------------------------------------------------------------------------

/// The sealed output of the compositor.
///
/// Immutable once produced. Two documents are equal exactly when their text
/// is byte-identical, which is what the preview host uses to decide whether
/// a remount is needed. Serialized as the bare document text; the
/// fingerprint is always recomputed on the way back in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ComposedDocument {
    html: String,
    fingerprint: String,
}

impl ComposedDocument {
    pub(crate) fn new(html: String) -> Self {
        let fingerprint = utils::fingerprint(&html);
        Self { html, fingerprint }
    }

    /// Full document text.
    pub fn as_str(&self) -> &str {
        &self.html
    }

    pub fn into_string(self) -> String {
        self.html
    }

    /// Hex SHA-256 of the document text.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// First eight hex digits of the fingerprint, for logs and frame keys.
    pub fn short_fingerprint(&self) -> &str {
        self.fingerprint.get(..8).unwrap_or(self.fingerprint.as_str())
    }

    pub fn len(&self) -> usize {
        self.html.len()
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}

impl From<String> for ComposedDocument {
    fn from(html: String) -> Self {
        Self::new(html)
    }
}

impl From<ComposedDocument> for String {
    fn from(document: ComposedDocument) -> Self {
        document.html
    }
}

impl fmt::Display for ComposedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.html)
    }
}

impl AsRef<str> for ComposedDocument {
    fn as_ref(&self) -> &str {
        &self.html
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structural problems with an animation record, raised at construction.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Duplicate parameter id `{id}`")]
    DuplicateParameter { id: String },

    #[error("Invalid parameter `{id}`: {reason}")]
    InvalidParameter { id: String, reason: String },

    #[error("Invalid default for parameter `{id}`: {source}")]
    InvalidDefault {
        id: String,
        #[source]
        source: ParamError,
    },
}

/// Strict validation failures for a single parameter value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("Unknown parameter `{id}`")]
    UnknownParameter { id: String },

    #[error("Parameter `{id}` expects a {expected} value, got {got}")]
    KindMismatch {
        id: String,
        expected: ParameterKind,
        got: ParameterKind,
    },

    #[error("Value {value} for `{id}` is outside {bounds}")]
    OutOfRange {
        id: String,
        value: f64,
        bounds: String,
    },

    #[error("Value for `{id}` must be finite")]
    NonFinite { id: String },

    #[error("`{value}` is not one of the options for `{id}`")]
    NotAnOption { id: String, value: String },

    #[error("`{value}` is not a hex color (parameter `{id}`)")]
    InvalidColor { id: String, value: String },

    #[error("Cannot read `{raw}` as a {kind} value for `{id}`")]
    Unparseable {
        id: String,
        raw: String,
        kind: ParameterKind,
    },
}

/// Errors raised by a content store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Animation `{0}` not found")]
    NotFound(String),

    #[error("Invalid record at index {index}: {message}")]
    InvalidRow { index: usize, message: String },

    #[error("Invalid record: {0}")]
    Invalid(#[from] RecordError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors raised by the preview host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("Preview host has been disposed")]
    Disposed,
}

/// Umbrella error for callers driving records, assignments and hosts together.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Host(#[from] HostError),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compose a record and a parameter assignment into a live-preview document.
///
/// Missing assignment entries are filled from each spec's default, so the
/// call never fails. The same inputs always produce byte-identical output.
pub fn compose(
    record: &AnimationRecord,
    assignment: &ParameterAssignment,
    options: &ComposeOptions,
) -> ComposedDocument {
    compose::compose_document(record, assignment, options)
}

/// Compose the human-readable variant used for copy/download.
///
/// Functionally identical to [`compose`] with `thumbnail_mode = false`;
/// only formatting differs.
pub fn compose_exportable(record: &AnimationRecord, assignment: &ParameterAssignment) -> String {
    compose::compose_export(record, assignment, &ComposeOptions::default())
}
