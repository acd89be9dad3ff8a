//! Utility functions for the compositor.
//!
//! - Escaping for raw-text elements (`<script>`, `<style>`) and attributes
//! - JS string escaping (injection-safe)
//! - Module statement stripping for classic-script execution
//! - Content fingerprints

use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// Raw-text element escaping
// ---------------------------------------------------------------------------

fn script_close_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</(script)").expect("static regex"))
}

fn style_close_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</(style)").expect("static regex"))
}

/// Neutralize `</script` sequences so text can sit inside an inline `<script>`.
///
/// `<\/script` is equivalent inside JS string, template and regex literals,
/// and inside JSON strings.
pub fn escape_inline_script(s: &str) -> String {
    script_close_re().replace_all(s, "<\\/$1").into_owned()
}

/// Neutralize `</style` sequences so text can sit inside an inline `<style>`.
pub fn escape_inline_style(s: &str) -> String {
    style_close_re().replace_all(s, "<\\/$1").into_owned()
}

/// Escape a string for a double-quoted HTML attribute value.
pub fn escape_html_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Escape a string for HTML text content (e.g. `<title>`).
pub fn escape_html_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Escape a string for safe embedding inside a JS double-quoted string literal.
pub fn escape_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '<' => out.push_str("\\u003c"),
            c => out.push(c),
        }
    }
    out
}

/// Make serialized JSON safe to sit inside an inline `<script>`.
///
/// `<` only ever occurs inside JSON string literals, where `\u003c` means
/// the same thing, so `</script` and `<!--` can never reach the HTML
/// tokenizer.
pub fn escape_json_for_script(json: &str) -> String {
    json.replace('<', "\\u003c")
}

/// Whether `s` is usable as a plain JS global identifier.
pub fn is_js_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

// ---------------------------------------------------------------------------
// Module statement stripping
// ---------------------------------------------------------------------------

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*import[ \t]+(?:\{[^}]*\}[^;\n]*|[^;\n]*);?[ \t]*\r?\n?")
            .expect("static regex")
    })
}

fn export_list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^[ \t]*export\s*\{[^}]*\}(\s*from\s*["'][^"']*["'])?\s*;?[ \t]*\r?\n?"#)
            .expect("static regex")
    })
}

fn export_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^([ \t]*)export\s+(default\s+)?").expect("static regex"))
}

/// Turn an ES-module-flavoured snippet into something a classic `<script>`
/// can run: static `import` statements (with or without a trailing `;`; only
/// a braced specifier list may span lines) and `export { .. }` lists are removed,
/// `export` / `export default` keywords in front of declarations are dropped.
/// The result is trimmed.
pub fn strip_module_statements(js: &str) -> String {
    let without_imports = import_re().replace_all(js, "");
    let without_lists = export_list_re().replace_all(&without_imports, "");
    let without_keywords = export_keyword_re().replace_all(&without_lists, "$1");
    without_keywords.trim().to_string()
}

// ---------------------------------------------------------------------------
// Markup scanning
// ---------------------------------------------------------------------------

fn open_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([A-Za-z][A-Za-z0-9-]*)").expect("static regex"))
}

/// Every distinct element name opened in `markup`, lowercased and sorted.
pub fn element_names(markup: &str) -> Vec<String> {
    let mut names: Vec<String> = open_tag_re()
        .captures_iter(markup)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_ascii_lowercase()))
        .collect();
    names.sort();
    names.dedup();
    names
}

// ---------------------------------------------------------------------------
// Fingerprints
// ---------------------------------------------------------------------------

/// SHA-256 of `content`, hex-encoded.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
