//! Isolation policy for hosted documents.
//!
//! A composed document only ever runs in a frame whose `sandbox` attribute
//! grants script execution and nothing that would let it reach the host
//! page: no same-origin access and no top-level navigation. The token set
//! is closed, so those capabilities cannot be requested at all.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils;
use crate::ComposedDocument;

/// Capabilities a hosted document may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxToken {
    Scripts,
    Forms,
    Popups,
    Modals,
    PointerLock,
}

impl SandboxToken {
    pub fn as_str(self) -> &'static str {
        match self {
            SandboxToken::Scripts => "allow-scripts",
            SandboxToken::Forms => "allow-forms",
            SandboxToken::Popups => "allow-popups",
            SandboxToken::Modals => "allow-modals",
            SandboxToken::PointerLock => "allow-pointer-lock",
        }
    }
}

impl fmt::Display for SandboxToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the embedding `<iframe>` element itself takes pointer input.
///
/// The thumbnail stylesheet only reaches elements inside the frame; the
/// frame element is hit-tested by the parent page, so a gallery card needs
/// [`FrameInteraction::ClickThrough`] to receive its own clicks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameInteraction {
    #[default]
    Interactive,
    ClickThrough,
}

const FRAME_STYLE: &str = "border: 0; width: 100%; height: 100%; display: block;";

/// The set of capabilities granted to a frame. Defaults to scripts only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxPolicy {
    tokens: BTreeSet<SandboxToken>,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            tokens: BTreeSet::from([SandboxToken::Scripts]),
        }
    }
}

impl SandboxPolicy {
    /// Grant an additional capability.
    pub fn allow(mut self, token: SandboxToken) -> Self {
        self.tokens.insert(token);
        self
    }

    pub fn allows(&self, token: SandboxToken) -> bool {
        self.tokens.contains(&token)
    }

    pub fn tokens(&self) -> impl Iterator<Item = SandboxToken> + '_ {
        self.tokens.iter().copied()
    }

    /// Space-separated value for the frame's `sandbox` attribute.
    pub fn attribute_value(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `<iframe>` element that loads `document` inline under this policy.
    ///
    /// The document text is attribute-escaped into `srcdoc`, so the frame
    /// gets an opaque origin and no network fetch for the document itself.
    pub fn frame_markup(
        &self,
        document: &ComposedDocument,
        title: &str,
        interaction: FrameInteraction,
    ) -> String {
        let extra = match interaction {
            FrameInteraction::Interactive => "",
            FrameInteraction::ClickThrough => " tabindex=\"-1\"",
        };
        let style = match interaction {
            FrameInteraction::Interactive => FRAME_STYLE.to_string(),
            FrameInteraction::ClickThrough => format!("{FRAME_STYLE} pointer-events: none;"),
        };
        format!(
            "<iframe title=\"{}\" sandbox=\"{}\" srcdoc=\"{}\" data-fingerprint=\"{}\" loading=\"eager\" referrerpolicy=\"no-referrer\"{extra} style=\"{style}\"></iframe>",
            utils::escape_html_attr(title),
            self.attribute_value(),
            utils::escape_html_attr(document.as_str()),
            document.short_fingerprint(),
        )
    }
}
