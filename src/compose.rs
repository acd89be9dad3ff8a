//! Core composition logic.
//!
//! Turns `(record, assignment, options)` into one standalone HTML document:
//! 1. Structural shell with encoding and viewport declarations
//! 2. Inline stylesheet: base reset, the record's styles, thumbnail pointer rule
//! 3. External script tags, in listed order, ahead of every inline script
//! 4. Body markup
//! 5. Trailing script: injected configuration global, then the record's
//!    script inside an error-guarded closure
//!
//! **Single emission flow.** The preview and export variants are written by
//! the same function and differ only in layout, so a copied export runs the
//! same primitive the live preview shows.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use serde_json::Value;
use tracing::{debug, warn};

use crate::params::ParameterAssignment;
use crate::record::AnimationRecord;
use crate::utils;
use crate::{ComposeOptions, ComposedDocument, DEFAULT_CONFIG_GLOBAL, FRAME_MESSAGE_CHANNEL};

/// Full-bleed reset every primitive is written against.
pub const BASE_STYLE_RULE: &str =
    "html, body { margin: 0; padding: 0; height: 100%; width: 100%; overflow: hidden; background: #000; }";

/// Declarations applied to every element in thumbnail mode.
pub const POINTER_SUPPRESSION: &str =
    "pointer-events: none !important; cursor: default; -webkit-user-select: none; user-select: none;";

/// Selectors that always receive [`POINTER_SUPPRESSION`] in thumbnail mode.
const THUMBNAIL_BASE_SELECTORS: [&str; 5] = ["html", "body", "*", "*::before", "*::after"];

/// Re-fits a global three.js style `renderer`/`camera` pair on resize.
const RESIZE_BRIDGE: [&str; 9] = [
    "window.addEventListener(\"resize\", function () {",
    "  if (typeof renderer !== \"undefined\" && renderer.setSize) {",
    "    renderer.setSize(window.innerWidth, window.innerHeight);",
    "  }",
    "  if (typeof camera !== \"undefined\" && camera.aspect) {",
    "    camera.aspect = window.innerWidth / window.innerHeight;",
    "    camera.updateProjectionMatrix();",
    "  }",
    "});",
];

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Compose the live-preview variant.
#[tracing::instrument(skip_all, fields(record = %record.id, thumbnail = options.thumbnail_mode))]
pub fn compose_document(
    record: &AnimationRecord,
    assignment: &ParameterAssignment,
    options: &ComposeOptions,
) -> ComposedDocument {
    let html = render(record, assignment, options, Layout::Compact);
    let document = ComposedDocument::new(html);
    debug!(
        bytes = document.len(),
        fingerprint = document.short_fingerprint(),
        "composed document"
    );
    document
}

/// Compose the human-readable export variant. `thumbnail_mode` is ignored.
#[tracing::instrument(skip_all, fields(record = %record.id))]
pub fn compose_export(
    record: &AnimationRecord,
    assignment: &ParameterAssignment,
    options: &ComposeOptions,
) -> String {
    let options = ComposeOptions {
        thumbnail_mode: false,
        ..options.clone()
    };
    render(record, assignment, &options, Layout::Pretty)
}

// ---------------------------------------------------------------------------
// Document writer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// No indentation; fragments verbatim.
    Compact,
    /// Two-space structural indentation, pretty JSON and CSS.
    Pretty,
}

struct DocumentWriter {
    out: String,
    layout: Layout,
    depth: usize,
}

impl DocumentWriter {
    fn new(layout: Layout) -> Self {
        Self {
            out: String::with_capacity(4096),
            layout,
            depth: 0,
        }
    }

    fn indent(&mut self) {
        if self.layout == Layout::Pretty {
            for _ in 0..self.depth {
                self.out.push_str("  ");
            }
        }
    }

    fn line(&mut self, text: &str) {
        self.indent();
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn open(&mut self, text: &str) {
        self.line(text);
        self.depth += 1;
    }

    fn close(&mut self, text: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    /// Multi-line text where leading whitespace is insignificant (CSS, JSON).
    /// Each line gets the current indentation in pretty layout.
    fn block(&mut self, text: &str) {
        for line in text.lines() {
            if line.trim().is_empty() {
                self.out.push('\n');
            } else {
                self.line(line);
            }
        }
    }

    /// Author-supplied markup or script, written exactly as given.
    fn verbatim(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn finish(self) -> String {
        self.out
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(
    record: &AnimationRecord,
    assignment: &ParameterAssignment,
    options: &ComposeOptions,
    layout: Layout,
) -> String {
    let mut w = DocumentWriter::new(layout);

    w.line("<!DOCTYPE html>");
    w.open("<html lang=\"en\">");

    w.open("<head>");
    w.line("<meta charset=\"UTF-8\">");
    w.line("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">");
    w.line(&format!("<title>{}</title>", utils::escape_html_text(&record.name)));
    write_styles(&mut w, record, options);
    for url in &record.external_resources {
        w.line(&external_script_tag(url));
    }
    w.close("</head>");

    w.open("<body>");
    w.verbatim(record.markup.trim());
    write_trailing_script(&mut w, record, assignment, options);
    w.close("</body>");

    w.close("</html>");
    w.finish()
}

fn write_styles(w: &mut DocumentWriter, record: &AnimationRecord, options: &ComposeOptions) {
    w.open("<style>");
    if options.base_styles {
        match w.layout {
            Layout::Compact => w.line(BASE_STYLE_RULE),
            Layout::Pretty => w.block(&expand_rule(BASE_STYLE_RULE)),
        }
    }
    let style = record.style.trim();
    if !style.is_empty() {
        match w.layout {
            Layout::Compact => w.verbatim(&utils::escape_inline_style(style)),
            Layout::Pretty => w.block(&utils::escape_inline_style(&pretty_css(style))),
        }
    }
    if options.thumbnail_mode {
        w.line(&thumbnail_rule(&record.markup));
    }
    w.close("</style>");
}

fn write_trailing_script(
    w: &mut DocumentWriter,
    record: &AnimationRecord,
    assignment: &ParameterAssignment,
    options: &ComposeOptions,
) {
    let global = config_global(options);
    let config = Value::Object(assignment.to_config_object(record));
    let config_json = match w.layout {
        Layout::Compact => serde_json::to_string(&config),
        Layout::Pretty => serde_json::to_string_pretty(&config),
    }
    .unwrap_or_else(|_| "{}".to_string());
    let label = utils::escape_js_string(&options.diagnostic_label);
    let script = utils::escape_inline_script(&utils::strip_module_statements(&record.script));

    w.open("<script>");
    w.block(&format!(
        "window.{global} = {};",
        utils::escape_json_for_script(&config_json)
    ));
    w.open("(function () {");
    w.open("var __motionReport = function (kind, detail) {");
    w.open("try {");
    w.open("if (window.parent && window.parent !== window) {");
    w.line(&format!(
        "window.parent.postMessage({{ channel: \"{FRAME_MESSAGE_CHANNEL}\", kind: kind, detail: String(detail) }}, \"*\");"
    ));
    w.close("}");
    w.close("} catch (_) {}");
    w.close("};");
    w.line("window.addEventListener(\"error\", function (event) { __motionReport(\"script-error\", event.message); });");
    w.line("window.addEventListener(\"load\", function () { __motionReport(\"ready\", \"\"); });");
    w.open("try {");
    w.verbatim(&script);
    w.block(&RESIZE_BRIDGE.join("\n"));
    w.close("} catch (err) {");
    w.depth += 1;
    w.line(&format!("console.error(\"{label}:\", err);"));
    w.line("__motionReport(\"script-error\", err && err.message ? err.message : err);");
    w.close("}");
    w.close("})();");
    w.close("</script>");
}

/// `<script src>` for one external resource. Load failures are posted to
/// the parent frame; there is no retry.
fn external_script_tag(url: &str) -> String {
    format!(
        "<script src=\"{}\" onerror=\"if (window.parent !== window) {{ window.parent.postMessage({{ channel: '{FRAME_MESSAGE_CHANNEL}', kind: 'resource-error', detail: this.src }}, '*'); }}\"></script>",
        utils::escape_html_attr(url)
    )
}

fn config_global(options: &ComposeOptions) -> &str {
    if utils::is_js_identifier(&options.config_global) {
        &options.config_global
    } else {
        warn!(
            requested = %options.config_global,
            "config global is not a JS identifier; using {DEFAULT_CONFIG_GLOBAL}"
        );
        DEFAULT_CONFIG_GLOBAL
    }
}

/// Pointer-suppression rule covering the document root, every element, and
/// by name every element the markup declares.
pub fn thumbnail_rule(markup: &str) -> String {
    let mut selectors: Vec<String> = THUMBNAIL_BASE_SELECTORS.iter().map(|s| s.to_string()).collect();
    for name in utils::element_names(markup) {
        if name != "html" && name != "body" {
            selectors.push(name);
        }
    }
    format!("{} {{ {} }}", selectors.join(", "), POINTER_SUPPRESSION)
}

/// Expand a one-line `selector { a; b; }` rule into one declaration per line.
fn expand_rule(rule: &str) -> String {
    let Some((selector, rest)) = rule.split_once('{') else {
        return rule.to_string();
    };
    let body = rest.trim_end().trim_end_matches('}');
    let mut out = format!("{} {{\n", selector.trim());
    for decl in body.split(';').map(str::trim).filter(|d| !d.is_empty()) {
        out.push_str("  ");
        out.push_str(decl);
        out.push_str(";\n");
    }
    out.push('}');
    out
}

/// Re-print a stylesheet for reading. Falls back to the dedented source
/// when it does not parse.
fn pretty_css(css: &str) -> String {
    let printed = StyleSheet::parse(css, ParserOptions::default())
        .ok()
        .and_then(|sheet| sheet.to_css(PrinterOptions::default()).ok())
        .map(|result| result.code);
    match printed {
        Some(code) => code.trim_end().to_string(),
        None => {
            debug!("stylesheet did not parse; exporting as written");
            dedent(css)
        }
    }
}

/// Remove the common leading whitespace of all non-blank lines.
fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|l| if l.len() >= margin { &l[margin..] } else { l.trim_start() })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
