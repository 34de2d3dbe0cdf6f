pub mod decoder;
pub mod transport;

use futures::StreamExt;
use log::{ debug, warn };
use std::fmt::Display;
use std::sync::Arc;

use self::decoder::Utf8StreamDecoder;
use self::transport::RelayTransport;
use crate::config::context::StaticContext;
use crate::models::chat::{ ChatMessage, ChatRequest };

pub const FALLBACK_MESSAGE: &str =
    "Sorry, I'm having trouble connecting right now. Please try again in a moment.";

pub const SUGGESTIONS: [&str; 3] = [
    "What skills do you have?",
    "Tell me about your projects",
    "Your experience",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending,
    Streaming,
}

/// How the last exchange ended. Both outcomes leave the widget Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Committed,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    pub messages: Vec<ChatMessage>,
    pub input: String,
    pub loading: bool,
    pub streamed: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub ctrl: bool,
    pub meta: bool,
}

impl KeyEvent {
    pub fn plain(key: Key) -> Self {
        Self { key, ctrl: false, meta: false }
    }

    pub fn with_ctrl(key: Key) -> Self {
        Self { key, ctrl: true, meta: false }
    }

    pub fn with_meta(key: Key) -> Self {
        Self { key, ctrl: false, meta: true }
    }
}

/// Presentation hook. Called whenever the history or the streaming buffer
/// changes so the message list can be scrolled to its newest entry.
pub trait WidgetView: Send {
    fn scroll_to_bottom(&mut self, state: &ConversationState);
}

pub struct NoopView;

impl WidgetView for NoopView {
    fn scroll_to_bottom(&mut self, _state: &ConversationState) {}
}

pub struct ChatWidget {
    transport: Arc<dyn RelayTransport>,
    context: StaticContext,
    view: Box<dyn WidgetView>,
    state: ConversationState,
    phase: Phase,
    last_outcome: Option<Outcome>,
    decoder: Utf8StreamDecoder,
    open: bool,
    minimized: bool,
}

impl ChatWidget {
    pub fn new(transport: Arc<dyn RelayTransport>, context: StaticContext) -> Self {
        Self {
            transport,
            context,
            view: Box::new(NoopView),
            state: ConversationState::default(),
            phase: Phase::Idle,
            last_outcome: None,
            decoder: Utf8StreamDecoder::default(),
            open: false,
            minimized: false,
        }
    }

    pub fn with_view(mut self, view: Box<dyn WidgetView>) -> Self {
        self.view = view;
        self
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    fn notify(&mut self) {
        self.view.scroll_to_bottom(&self.state);
    }

    /// The input field is only editable between exchanges.
    pub fn input_enabled(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Ignored while a reply is pending.
    pub fn set_input(&mut self, text: impl Into<String>) {
        if !self.input_enabled() {
            return;
        }
        self.state.input = text.into();
    }

    /// Returns whether a suggestion was placed in the input.
    pub fn use_suggestion(&mut self, index: usize) -> bool {
        if !self.input_enabled() {
            return false;
        }
        match SUGGESTIONS.get(index) {
            Some(text) => {
                self.state.input = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Idle → Sending. Appends the user turn and returns the request to post,
    /// or `None` (leaving everything untouched) while an exchange is in flight
    /// or the input is blank.
    pub fn begin_submit(&mut self) -> Option<ChatRequest> {
        if self.phase != Phase::Idle || self.state.input.trim().is_empty() {
            return None;
        }

        let content = std::mem::take(&mut self.state.input);
        self.state.messages.push(ChatMessage::user(content));
        self.state.loading = true;
        self.state.streamed.clear();
        self.decoder = Utf8StreamDecoder::default();
        self.phase = Phase::Sending;
        self.notify();

        Some(ChatRequest {
            messages: self.state.messages.clone(),
            context: Some(self.context.as_str().to_string()),
        })
    }

    pub fn push_chunk(&mut self, bytes: &[u8]) {
        if self.phase == Phase::Idle {
            return;
        }
        self.phase = Phase::Streaming;
        let text = self.decoder.decode(bytes);
        self.state.streamed.push_str(&text);
        self.notify();
    }

    /// End of stream: the accumulated text becomes the model's turn.
    pub fn commit(&mut self) {
        if self.phase == Phase::Idle {
            return;
        }
        let tail = self.decoder.finish();
        self.state.streamed.push_str(&tail);
        let reply = std::mem::take(&mut self.state.streamed);
        self.state.messages.push(ChatMessage::model(reply));
        self.finish(Outcome::Committed);
    }

    /// Any failure: the partial reply is dropped and the fallback message is
    /// appended in its place.
    pub fn fail(&mut self, err: &dyn Display) {
        if self.phase == Phase::Idle {
            return;
        }
        warn!("Chat error: {}", err);
        self.decoder = Utf8StreamDecoder::default();
        self.state.streamed.clear();
        self.state.messages.push(ChatMessage::model(FALLBACK_MESSAGE));
        self.finish(Outcome::Failed);
    }

    fn finish(&mut self, outcome: Outcome) {
        self.state.loading = false;
        self.phase = Phase::Idle;
        self.last_outcome = Some(outcome);
        self.notify();
    }

    /// Runs one full exchange with the relay. Returns `None` when the submit
    /// was a no-op.
    pub async fn submit(&mut self) -> Option<Outcome> {
        let request = self.begin_submit()?;
        let transport = Arc::clone(&self.transport);

        let mut stream = match transport.send(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                self.fail(&e);
                return self.last_outcome;
            }
        };

        self.phase = Phase::Streaming;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => self.push_chunk(&bytes),
                Err(e) => {
                    self.fail(&e);
                    return self.last_outcome;
                }
            }
        }
        debug!("Chat stream finished ({} bytes)", self.state.streamed.len());
        self.commit();
        self.last_outcome
    }

    pub fn toggle_open(&mut self) {
        self.open = !self.open;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn toggle_minimized(&mut self) {
        self.minimized = !self.minimized;
    }

    /// Ctrl/Cmd+I toggles the widget, Escape closes it. Returns whether the
    /// event was consumed.
    pub fn handle_key(&mut self, event: KeyEvent) -> bool {
        match event.key {
            Key::Char(c) if (event.ctrl || event.meta) && c.eq_ignore_ascii_case(&'i') => {
                self.toggle_open();
                true
            }
            Key::Escape if self.open => {
                self.close();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::transport::{ ByteStream, TransportError };
    use async_trait::async_trait;
    use std::sync::atomic::{ AtomicUsize, Ordering };
    use std::sync::Mutex;

    struct ScriptedTransport {
        chunks: Vec<Vec<u8>>,
        drop_after: Option<usize>,
        reject: bool,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn replying(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks
                    .iter()
                    .map(|c| c.as_bytes().to_vec())
                    .collect(),
                drop_after: None,
                reject: false,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RelayTransport for ScriptedTransport {
        async fn send(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.reject {
                return Err(TransportError::Status { status: 500, message: "nope".into() });
            }
            let mut items: Vec<Result<Vec<u8>, TransportError>> = self.chunks
                .iter()
                .cloned()
                .map(Ok)
                .collect();
            if let Some(n) = self.drop_after {
                items.truncate(n);
                items.push(Err(TransportError::Dropped("reset".into())));
            }
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    struct CountingView(Arc<AtomicUsize>);

    impl WidgetView for CountingView {
        fn scroll_to_bottom(&mut self, _state: &ConversationState) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn widget(transport: &Arc<ScriptedTransport>) -> ChatWidget {
        let dyn_transport: Arc<dyn RelayTransport> = transport.clone();
        ChatWidget::new(dyn_transport, StaticContext::new("CTX"))
    }

    #[tokio::test]
    async fn successful_exchange_commits_streamed_text() {
        let transport = Arc::new(ScriptedTransport::replying(&["I ", "know ", "Go."]));
        let mut widget = widget(&transport);
        widget.set_input("What skills do you have?");

        assert_eq!(widget.submit().await, Some(Outcome::Committed));
        assert_eq!(
            widget.state().messages,
            vec![ChatMessage::user("What skills do you have?"), ChatMessage::model("I know Go.")]
        );
        assert_eq!(widget.state().streamed, "");
        assert!(!widget.state().loading);
        assert_eq!(widget.phase(), Phase::Idle);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].context.as_deref(), Some("CTX"));
        assert_eq!(requests[0].messages, vec![ChatMessage::user("What skills do you have?")]);
    }

    #[tokio::test]
    async fn prior_history_is_sent_and_kept() {
        let transport = Arc::new(ScriptedTransport::replying(&["second"]));
        let mut widget = widget(&transport);
        widget.set_input("one");
        widget.submit().await;
        widget.set_input("two");
        widget.submit().await;

        let messages = &widget.state().messages;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2], ChatMessage::user("two"));
        assert_eq!(messages[3], ChatMessage::model("second"));
        assert_eq!(transport.requests.lock().unwrap()[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn dropped_stream_appends_single_fallback() {
        let mut scripted = ScriptedTransport::replying(&["partial ", "answer"]);
        scripted.drop_after = Some(1);
        let transport = Arc::new(scripted);
        let mut widget = widget(&transport);
        widget.set_input("hi");

        assert_eq!(widget.submit().await, Some(Outcome::Failed));
        assert_eq!(
            widget.state().messages,
            vec![ChatMessage::user("hi"), ChatMessage::model(FALLBACK_MESSAGE)]
        );
        assert_eq!(widget.state().streamed, "");
    }

    #[tokio::test]
    async fn error_status_appends_fallback() {
        let mut scripted = ScriptedTransport::replying(&[]);
        scripted.reject = true;
        let transport = Arc::new(scripted);
        let mut widget = widget(&transport);
        widget.set_input("hi");

        assert_eq!(widget.submit().await, Some(Outcome::Failed));
        assert_eq!(widget.state().messages.len(), 2);
        assert_eq!(widget.state().messages[1].content, FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn blank_input_is_a_no_op() {
        let transport = Arc::new(ScriptedTransport::replying(&["x"]));
        let mut widget = widget(&transport);
        widget.set_input("   \n");
        assert_eq!(widget.submit().await, None);
        assert!(widget.state().messages.is_empty());
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn submit_while_in_flight_is_a_no_op() {
        let transport = Arc::new(ScriptedTransport::replying(&[]));
        let mut widget = widget(&transport);
        widget.set_input("first");
        assert!(widget.begin_submit().is_some());
        assert_eq!(widget.phase(), Phase::Sending);
        assert_eq!(widget.state().input, "");

        widget.set_input("second");
        assert!(widget.begin_submit().is_none());
        widget.push_chunk(b"par");
        assert_eq!(widget.phase(), Phase::Streaming);
        assert!(widget.begin_submit().is_none());
        assert_eq!(widget.state().messages.len(), 1);
        assert_eq!(widget.state().input, "");

        widget.commit();
        assert_eq!(widget.state().messages[1], ChatMessage::model("par"));
        widget.set_input("second");
        assert!(widget.begin_submit().is_some());
    }

    #[test]
    fn input_is_locked_while_a_reply_is_pending() {
        let transport = Arc::new(ScriptedTransport::replying(&[]));
        let mut widget = widget(&transport);
        assert!(widget.input_enabled());
        widget.set_input("first");
        widget.begin_submit();
        assert!(!widget.input_enabled());

        widget.set_input("typed while sending");
        assert!(!widget.use_suggestion(1));
        assert_eq!(widget.state().input, "");

        widget.push_chunk(b"x");
        widget.set_input("typed while streaming");
        assert!(!widget.use_suggestion(0));
        assert_eq!(widget.state().input, "");

        widget.fail(&"reset");
        assert!(widget.input_enabled());
        assert!(widget.use_suggestion(1));
        assert_eq!(widget.state().input, SUGGESTIONS[1]);
    }

    #[test]
    fn chunks_split_inside_a_character_render_cleanly() {
        let transport = Arc::new(ScriptedTransport::replying(&[]));
        let mut widget = widget(&transport);
        widget.set_input("hi");
        widget.begin_submit();
        let bytes = "café".as_bytes();
        widget.push_chunk(&bytes[..4]);
        assert_eq!(widget.state().streamed, "caf");
        widget.push_chunk(&bytes[4..]);
        assert_eq!(widget.state().streamed, "café");
    }

    #[test]
    fn view_is_notified_on_every_change() {
        let count = Arc::new(AtomicUsize::new(0));
        let transport = Arc::new(ScriptedTransport::replying(&[]));
        let mut widget = widget(&transport).with_view(Box::new(CountingView(count.clone())));
        widget.set_input("hi");
        widget.begin_submit();
        widget.push_chunk(b"a");
        widget.push_chunk(b"b");
        widget.commit();
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn keyboard_shortcuts_only_touch_visibility() {
        let transport = Arc::new(ScriptedTransport::replying(&[]));
        let mut widget = widget(&transport);
        widget.set_input("draft");

        assert!(widget.handle_key(KeyEvent::with_meta(Key::Char('i'))));
        assert!(widget.is_open());
        assert!(widget.handle_key(KeyEvent::plain(Key::Escape)));
        assert!(!widget.is_open());
        assert!(!widget.handle_key(KeyEvent::plain(Key::Escape)));
        assert!(widget.handle_key(KeyEvent::with_ctrl(Key::Char('I'))));
        assert!(!widget.handle_key(KeyEvent::plain(Key::Char('i'))));
        assert!(widget.is_open());
        assert_eq!(widget.state().input, "draft");
    }

    #[test]
    fn minimizing_keeps_the_conversation() {
        let transport = Arc::new(ScriptedTransport::replying(&[]));
        let mut widget = widget(&transport);
        widget.toggle_open();
        widget.set_input("draft");
        assert!(!widget.is_minimized());

        widget.toggle_minimized();
        assert!(widget.is_minimized());
        assert!(widget.is_open());
        assert_eq!(widget.state().input, "draft");

        widget.toggle_minimized();
        assert!(!widget.is_minimized());
    }

    #[test]
    fn suggestions_fill_the_input() {
        let transport = Arc::new(ScriptedTransport::replying(&[]));
        let mut widget = widget(&transport);
        assert!(widget.use_suggestion(0));
        assert_eq!(widget.state().input, SUGGESTIONS[0]);
        assert!(!widget.use_suggestion(SUGGESTIONS.len()));
    }
}
