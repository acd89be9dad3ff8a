//! Isolated preview host.
//!
//! Mounts one composed document at a time into an isolation context
//! supplied by an [`IsolationBackend`]. Every distinct document gets a fresh
//! context identified by a [`MountTicket`]; the previous context is disposed
//! before the next one is created, so no timers, frames or GPU state from an
//! earlier mount survive a replacement. Assigning a document equal to the
//! current one is a no-op.
//!
//! Lifecycle signals coming back from a context (load complete, posted frame
//! messages) carry the ticket they were issued for. Signals for any ticket
//! other than the current one are stale and dropped.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::sandbox::{FrameInteraction, SandboxPolicy};
use crate::{ComposedDocument, Diagnostic, HostError, FRAME_MESSAGE_CHANNEL};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Identifies one isolation context for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MountTicket(u64);

impl MountTicket {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MountTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Creates and destroys isolation contexts.
///
/// `dispose_context` is called exactly once for every ticket passed to
/// `create_context`, and must also cancel a load that is still in flight.
pub trait IsolationBackend {
    fn create_context(&mut self, ticket: MountTicket, document: &ComposedDocument, policy: &SandboxPolicy);
    fn dispose_context(&mut self, ticket: MountTicket);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// Nothing mounted yet.
    Empty,
    /// A context exists and its document is loading.
    Mounting,
    /// The current context reported load completion.
    Ready,
    /// Torn down; further assignments are rejected.
    Disposed,
}

/// Lifecycle notifications delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Mounting { ticket: MountTicket, fingerprint: String },
    Ready { ticket: MountTicket },
    Replaced { previous: MountTicket, next: MountTicket },
    Diagnostic { ticket: MountTicket, diagnostic: Diagnostic },
    Disposed,
}

/// Result of [`PreviewHost::assign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOutcome {
    /// Same document as the current mount; nothing was touched.
    Unchanged,
    /// A fresh context was created under this ticket.
    Mounting(MountTicket),
}

/// A message a hosted document posted to its parent frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSignal {
    Ready,
    ScriptError(String),
    ResourceError(String),
}

#[derive(Debug, Deserialize)]
struct FrameMessage {
    channel: String,
    kind: String,
    #[serde(default)]
    detail: String,
}

impl FrameSignal {
    /// Decode a posted message. Messages from other channels or of unknown
    /// kind yield `None`.
    pub fn parse(payload: &str) -> Option<Self> {
        let message: FrameMessage = serde_json::from_str(payload).ok()?;
        if message.channel != FRAME_MESSAGE_CHANNEL {
            return None;
        }
        match message.kind.as_str() {
            "ready" => Some(FrameSignal::Ready),
            "script-error" => Some(FrameSignal::ScriptError(message.detail)),
            "resource-error" => Some(FrameSignal::ResourceError(message.detail)),
            _ => None,
        }
    }
}

struct Mounted {
    ticket: MountTicket,
    document: ComposedDocument,
}

// ---------------------------------------------------------------------------
// PreviewHost
// ---------------------------------------------------------------------------

pub struct PreviewHost<B: IsolationBackend> {
    backend: B,
    policy: SandboxPolicy,
    current: Option<Mounted>,
    state: HostState,
    next_ticket: u64,
    stale_signals: u64,
    diagnostics: Vec<Diagnostic>,
    subscribers: Vec<UnboundedSender<HostEvent>>,
}

impl<B: IsolationBackend> PreviewHost<B> {
    /// Host with the default scripts-only policy.
    pub fn new(backend: B) -> Self {
        Self::with_policy(backend, SandboxPolicy::default())
    }

    pub fn with_policy(backend: B, policy: SandboxPolicy) -> Self {
        Self {
            backend,
            policy,
            current: None,
            state: HostState::Empty,
            next_ticket: 1,
            stale_signals: 0,
            diagnostics: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Receive every lifecycle event from now on. The channel closes when
    /// the host is disposed.
    pub fn subscribe(&mut self) -> UnboundedReceiver<HostEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Mount `document`, replacing whatever is mounted. Last write wins.
    pub fn assign(&mut self, document: ComposedDocument) -> Result<AssignOutcome, HostError> {
        if self.state == HostState::Disposed {
            return Err(HostError::Disposed);
        }
        if let Some(mounted) = &self.current {
            if mounted.document == document {
                debug!(ticket = %mounted.ticket, "document unchanged; keeping context");
                return Ok(AssignOutcome::Unchanged);
            }
        }

        let ticket = MountTicket(self.next_ticket);
        self.next_ticket += 1;

        if let Some(previous) = self.current.take() {
            self.backend.dispose_context(previous.ticket);
            debug!(previous = %previous.ticket, next = %ticket, "replaced context");
            self.emit(HostEvent::Replaced {
                previous: previous.ticket,
                next: ticket,
            });
        }

        self.diagnostics.clear();
        self.backend.create_context(ticket, &document, &self.policy);
        info!(
            %ticket,
            fingerprint = document.short_fingerprint(),
            bytes = document.len(),
            "mounting document"
        );
        self.emit(HostEvent::Mounting {
            ticket,
            fingerprint: document.fingerprint().to_string(),
        });
        self.current = Some(Mounted { ticket, document });
        self.state = HostState::Mounting;
        Ok(AssignOutcome::Mounting(ticket))
    }

    /// The backend finished loading the context for `ticket`.
    /// Returns `false` when the ticket is stale.
    pub fn context_loaded(&mut self, ticket: MountTicket) -> bool {
        if !self.is_current(ticket) {
            self.note_stale(ticket, "load");
            return false;
        }
        if self.state == HostState::Mounting {
            self.state = HostState::Ready;
            self.emit(HostEvent::Ready { ticket });
        }
        true
    }

    /// Route a message posted by the document in `ticket`'s context.
    pub fn handle_frame_message(&mut self, ticket: MountTicket, payload: &str) -> Option<FrameSignal> {
        let signal = FrameSignal::parse(payload)?;
        if !self.is_current(ticket) {
            self.note_stale(ticket, "message");
            return None;
        }
        match &signal {
            FrameSignal::Ready => {
                self.context_loaded(ticket);
            }
            FrameSignal::ScriptError(detail) => {
                warn!(%ticket, %detail, "script error in hosted document");
                self.report(ticket, Diagnostic::error(detail.clone(), Some("script".into())));
            }
            FrameSignal::ResourceError(url) => {
                warn!(%ticket, %url, "external resource failed to load");
                self.report(
                    ticket,
                    Diagnostic::error(format!("Failed to load {url}"), Some("resource".into())),
                );
            }
        }
        Some(signal)
    }

    /// Tear down the current context. Idempotent.
    pub fn dispose(&mut self) {
        if self.state == HostState::Disposed {
            return;
        }
        if let Some(mounted) = self.current.take() {
            self.backend.dispose_context(mounted.ticket);
            debug!(ticket = %mounted.ticket, "disposed context");
        }
        self.state = HostState::Disposed;
        self.emit(HostEvent::Disposed);
        self.subscribers.clear();
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn current_ticket(&self) -> Option<MountTicket> {
        self.current.as_ref().map(|m| m.ticket)
    }

    pub fn current_document(&self) -> Option<&ComposedDocument> {
        self.current.as_ref().map(|m| &m.document)
    }

    /// Diagnostics reported by the current mount.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Signals dropped because their ticket was no longer current.
    pub fn stale_signals(&self) -> u64 {
        self.stale_signals
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn is_current(&self, ticket: MountTicket) -> bool {
        self.current.as_ref().is_some_and(|m| m.ticket == ticket)
    }

    fn note_stale(&mut self, ticket: MountTicket, what: &str) {
        self.stale_signals += 1;
        warn!(%ticket, current = ?self.current_ticket(), "ignoring stale {what} signal");
    }

    fn report(&mut self, ticket: MountTicket, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic.clone());
        self.emit(HostEvent::Diagnostic { ticket, diagnostic });
    }

    fn emit(&mut self, event: HostEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl<B: IsolationBackend> Drop for PreviewHost<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ---------------------------------------------------------------------------
// FrameMarkupBackend
// ---------------------------------------------------------------------------

/// Backend that renders each live context as sandboxed `<iframe>` markup,
/// for embedding a preview into a static page.
#[derive(Debug, Default)]
pub struct FrameMarkupBackend {
    title: String,
    interaction: FrameInteraction,
    frames: BTreeMap<MountTicket, String>,
}

impl FrameMarkupBackend {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            interaction: FrameInteraction::Interactive,
            frames: BTreeMap::new(),
        }
    }

    /// Frames that let pointer input fall through to the embedding card.
    pub fn click_through(mut self) -> Self {
        self.interaction = FrameInteraction::ClickThrough;
        self
    }

    /// Markup of the context for `ticket`, if it is still live.
    pub fn frame(&self, ticket: MountTicket) -> Option<&str> {
        self.frames.get(&ticket).map(String::as_str)
    }

    pub fn live_contexts(&self) -> usize {
        self.frames.len()
    }
}

impl IsolationBackend for FrameMarkupBackend {
    fn create_context(&mut self, ticket: MountTicket, document: &ComposedDocument, policy: &SandboxPolicy) {
        self.frames
            .insert(ticket, policy.frame_markup(document, &self.title, self.interaction));
    }

    fn dispose_context(&mut self, ticket: MountTicket) {
        self.frames.remove(&ticket);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        created: Vec<MountTicket>,
        disposed: Vec<MountTicket>,
    }

    impl IsolationBackend for Recorder {
        fn create_context(&mut self, ticket: MountTicket, _: &ComposedDocument, _: &SandboxPolicy) {
            self.created.push(ticket);
        }

        fn dispose_context(&mut self, ticket: MountTicket) {
            self.disposed.push(ticket);
        }
    }

    fn doc(text: &str) -> ComposedDocument {
        ComposedDocument::new(text.to_string())
    }

    #[test]
    fn equal_document_is_a_no_op() {
        let mut host = PreviewHost::new(Recorder::default());
        let first = host.assign(doc("a")).unwrap();
        assert!(matches!(first, AssignOutcome::Mounting(_)));
        assert_eq!(host.assign(doc("a")).unwrap(), AssignOutcome::Unchanged);
        assert_eq!(host.backend().created.len(), 1);
        assert!(host.backend().disposed.is_empty());
    }

    #[test]
    fn replacement_disposes_before_creating() {
        let mut host = PreviewHost::new(Recorder::default());
        host.assign(doc("a")).unwrap();
        host.assign(doc("b")).unwrap();
        let backend = host.backend();
        assert_eq!(backend.created, vec![MountTicket(1), MountTicket(2)]);
        assert_eq!(backend.disposed, vec![MountTicket(1)]);
    }

    #[test]
    fn stale_load_is_ignored() {
        let mut host = PreviewHost::new(Recorder::default());
        let AssignOutcome::Mounting(t1) = host.assign(doc("a")).unwrap() else {
            panic!("expected mount");
        };
        host.assign(doc("b")).unwrap();
        assert!(!host.context_loaded(t1));
        assert_eq!(host.state(), HostState::Mounting);
        assert_eq!(host.stale_signals(), 1);
    }

    #[test]
    fn frame_signal_parsing() {
        assert_eq!(
            FrameSignal::parse(r#"{"channel":"motion-compositor","kind":"ready","detail":""}"#),
            Some(FrameSignal::Ready)
        );
        assert_eq!(
            FrameSignal::parse(r#"{"channel":"motion-compositor","kind":"script-error","detail":"boom"}"#),
            Some(FrameSignal::ScriptError("boom".into()))
        );
        assert_eq!(FrameSignal::parse(r#"{"channel":"other","kind":"ready"}"#), None);
        assert_eq!(FrameSignal::parse("not json"), None);
    }

    #[test]
    fn dispose_is_idempotent_and_rejects_assign() {
        let mut host = PreviewHost::new(Recorder::default());
        host.assign(doc("a")).unwrap();
        host.dispose();
        host.dispose();
        assert_eq!(host.backend().disposed, vec![MountTicket(1)]);
        assert_eq!(host.assign(doc("b")), Err(HostError::Disposed));
    }

    #[test]
    fn markup_backend_keeps_only_live_frame() {
        let mut host = PreviewHost::new(FrameMarkupBackend::new("Preview"));
        host.assign(doc("<p>a</p>")).unwrap();
        let AssignOutcome::Mounting(t2) = host.assign(doc("<p>b</p>")).unwrap() else {
            panic!("expected mount");
        };
        assert_eq!(host.backend().live_contexts(), 1);
        let frame = host.backend().frame(t2).unwrap();
        assert!(frame.contains("srcdoc=\"&lt;p&gt;b&lt;/p&gt;\""));
        assert!(!frame.contains("pointer-events: none"));
    }

    #[test]
    fn click_through_backend_disables_frame_hit_testing() {
        let mut host = PreviewHost::new(FrameMarkupBackend::new("Card").click_through());
        let AssignOutcome::Mounting(ticket) = host.assign(doc("<p>a</p>")).unwrap() else {
            panic!("expected mount");
        };
        let frame = host.backend().frame(ticket).unwrap();
        assert!(frame.contains("pointer-events: none;\""));
    }
}
