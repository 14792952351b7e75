use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chat_widget::client::ChatBackend;
use chat_widget::message::{Message, Sender};
use chat_widget::widget::{
    BusyState, ChatWidget, HeadlessView, Outcome, SelectedFile, SkipReason, UiEvent,
    WidgetSettings,
};
use chat_widget::{Error, Result};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    List,
    Post(String),
    Upload(String),
}

/// In-memory backend that records every call.
#[derive(Debug, Default)]
struct FakeBackend {
    store: Mutex<Vec<Message>>,
    calls: Mutex<Vec<Call>>,
    fail_list: AtomicBool,
    fail_post: AtomicBool,
    fail_upload: AtomicBool,
    /// When set, writes wait for a notification before answering.
    gate: Option<Arc<Notify>>,
}

impl FakeBackend {
    fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            store: Mutex::new(messages),
            ..Self::default()
        }
    }

    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn wait_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }

    fn failure() -> Error {
        Error::Status {
            status: 500,
            message: "boom".into(),
        }
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn list_messages(&self) -> Result<Vec<Message>> {
        self.record(Call::List);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::failure());
        }
        Ok(self.store.lock().unwrap().clone())
    }

    async fn post_message(&self, content: &str) -> Result<()> {
        self.record(Call::Post(content.to_string()));
        self.wait_gate().await;
        if self.fail_post.load(Ordering::SeqCst) {
            return Err(Self::failure());
        }
        self.store.lock().unwrap().push(Message::user_text(content));
        Ok(())
    }

    async fn upload_image(&self, file: &SelectedFile) -> Result<()> {
        self.record(Call::Upload(file.name.clone()));
        self.wait_gate().await;
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(Self::failure());
        }
        self.store
            .lock()
            .unwrap()
            .push(Message::user_image(format!("/uploads/{}", file.name)));
        Ok(())
    }
}

type Widget = ChatWidget<FakeBackend, HeadlessView>;

fn widget(backend: FakeBackend) -> Widget {
    ChatWidget::new(backend, HeadlessView::new(), WidgetSettings::default())
}

fn hi_message() -> Message {
    serde_json::from_str(
        r#"{"sender":"user","type":"text","content":"hi","timestamp":"2024-01-01T00:00:00Z"}"#,
    )
    .unwrap()
}

#[tokio::test]
async fn empty_load_keeps_placeholder() {
    let w = widget(FakeBackend::default());
    assert_eq!(w.attach().await, Outcome::Completed);

    let doc = w.view().snapshot();
    assert!(doc.placeholder_visible);
    assert!(doc.blocks.is_empty());
    assert_eq!(doc.scroll_count, 0);
}

#[tokio::test]
async fn single_user_message_renders_one_block() {
    let w = widget(FakeBackend::with_messages(vec![hi_message()]));
    w.attach().await;

    let doc = w.view().snapshot();
    assert!(!doc.placeholder_visible);
    assert_eq!(doc.blocks.len(), 1);
    let block = &doc.blocks[0];
    assert!(block.contains("👤"));
    assert!(block.contains(r#"<span class="message-username">You</span>"#));
    assert!(block.contains(r#"<div class="message-text">hi</div>"#));
    assert_eq!(doc.scroll_count, 1);
}

#[tokio::test]
async fn blocks_follow_server_order() {
    let messages = vec![
        Message::user_text("first"),
        Message::bot_text("second"),
        Message::user_image("/uploads/third.png"),
    ];
    let w = widget(FakeBackend::with_messages(messages));
    w.attach().await;

    let blocks = w.view().snapshot().blocks;
    assert_eq!(blocks.len(), 3);
    assert!(blocks[0].contains("first"));
    assert!(blocks[1].contains("🤖") && blocks[1].contains("second"));
    assert!(blocks[2].contains(r#"<img src="/uploads/third.png""#));
}

#[tokio::test]
async fn script_text_renders_literally() {
    let w = widget(FakeBackend::with_messages(vec![Message::bot_text(
        "<script>alert(1)</script>",
    )]));
    w.attach().await;

    let block = &w.view().snapshot().blocks[0];
    assert!(block.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(!block.contains("<script>"));
}

#[tokio::test]
async fn successful_send_clears_input_and_reloads() {
    let w = widget(FakeBackend::default());
    w.attach().await;
    w.view().type_text("  hello  ");

    assert_eq!(w.send_message().await, Outcome::Completed);

    assert_eq!(
        w.backend().calls(),
        [Call::List, Call::Post("hello".into()), Call::List]
    );
    let doc = w.view().snapshot();
    assert_eq!(doc.input, "");
    assert!(!doc.busy_visible);
    assert!(doc.send_enabled);
    assert!(doc.input_focused);
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(w.messages().len(), 1);
    assert_eq!(w.busy_state(), BusyState::Idle);
}

#[tokio::test]
async fn each_send_adds_exactly_one_message() {
    let w = widget(FakeBackend::with_messages(vec![hi_message()]));
    w.attach().await;

    for (i, text) in ["a", "b", "c"].into_iter().enumerate() {
        w.view().type_text(text);
        w.send_message().await;
        assert_eq!(w.messages().len(), i + 2);
        assert_eq!(w.view().snapshot().blocks.len(), i + 2);
    }
}

#[tokio::test]
async fn failed_send_keeps_input_and_restores_controls() {
    let backend = FakeBackend::default();
    backend.fail_post.store(true, Ordering::SeqCst);
    let w = widget(backend);
    w.attach().await;
    w.view().type_text("hello");

    assert_eq!(w.send_message().await, Outcome::Failed);

    let doc = w.view().snapshot();
    assert_eq!(doc.input, "hello");
    assert!(!doc.busy_visible);
    assert!(doc.send_enabled);
    assert!(doc.input_focused);
    // no reload after a failed write
    assert_eq!(w.backend().count(|c| *c == Call::List), 1);
}

#[tokio::test]
async fn blank_input_makes_no_request() {
    let w = widget(FakeBackend::default());
    for input in ["", "   ", "\n\t "] {
        w.view().type_text(input);
        assert_eq!(
            w.send_message().await,
            Outcome::Skipped(SkipReason::EmptyInput)
        );
    }
    assert!(w.backend().calls().is_empty());
}

#[tokio::test]
async fn upload_without_file_changes_nothing() {
    let w = widget(FakeBackend::default());
    let before = w.view().snapshot();

    assert_eq!(
        w.handle_image_upload().await,
        Outcome::Skipped(SkipReason::NoFile)
    );

    assert!(w.backend().calls().is_empty());
    assert_eq!(w.view().snapshot(), before);
}

#[tokio::test]
async fn successful_upload_reloads_and_clears_selection() {
    let w = widget(FakeBackend::default());
    w.attach().await;
    w.view()
        .select_file(SelectedFile::new("cat.png", vec![0x89, b'P', b'N', b'G']));

    let dispatch = w.handle_event(UiEvent::FileChanged).await;
    assert_eq!(dispatch.outcome, Some(Outcome::Completed));

    assert_eq!(
        w.backend().calls(),
        [Call::List, Call::Upload("cat.png".into()), Call::List]
    );
    let doc = w.view().snapshot();
    assert_eq!(doc.selected_file, None);
    assert!(!doc.busy_visible);
    assert!(doc.send_enabled);
    assert_eq!(doc.blocks.len(), 1);
    assert!(doc.blocks[0].contains(r#"<img src="/uploads/cat.png""#));
}

#[tokio::test]
async fn failed_upload_still_clears_selection() {
    let backend = FakeBackend::default();
    backend.fail_upload.store(true, Ordering::SeqCst);
    let w = widget(backend);
    w.view().select_file(SelectedFile::new("cat.png", vec![1]));

    assert_eq!(w.handle_image_upload().await, Outcome::Failed);

    let doc = w.view().snapshot();
    assert_eq!(doc.selected_file, None);
    assert!(!doc.busy_visible);
    assert!(doc.send_enabled);
    assert!(doc.input_focused);
}

#[tokio::test]
async fn failed_reload_leaves_rendering_untouched() {
    let w = widget(FakeBackend::with_messages(vec![hi_message()]));
    w.attach().await;
    let before = w.view().snapshot();

    w.backend().fail_list.store(true, Ordering::SeqCst);
    assert_eq!(w.load_messages().await, Outcome::Failed);

    assert_eq!(w.view().snapshot(), before);
    assert_eq!(w.messages(), vec![hi_message()]);
}

#[tokio::test]
async fn send_completes_even_when_reload_fails() {
    let w = widget(FakeBackend::with_messages(vec![hi_message()]));
    w.attach().await;
    let blocks_before = w.view().snapshot().blocks;

    w.backend().fail_list.store(true, Ordering::SeqCst);
    w.view().type_text("hello");
    assert_eq!(w.send_message().await, Outcome::Completed);

    assert_eq!(w.backend().count(|c| *c == Call::List), 2);
    let doc = w.view().snapshot();
    assert_eq!(doc.input, "");
    assert_eq!(doc.blocks, blocks_before);
    assert!(doc.send_enabled);
    assert!(!doc.busy_visible);
    assert_eq!(w.messages(), vec![hi_message()]);
}

#[tokio::test]
async fn enter_sends_and_shift_enter_does_not() {
    let w = widget(FakeBackend::default());
    w.view().type_text("line one");

    let dispatch = w.handle_event(UiEvent::key("Enter", true)).await;
    assert!(!dispatch.prevent_default);
    assert_eq!(dispatch.outcome, None);
    assert!(w.backend().calls().is_empty());

    let dispatch = w.handle_event(UiEvent::key("a", false)).await;
    assert_eq!(dispatch.outcome, None);

    let dispatch = w.handle_event(UiEvent::key("Enter", false)).await;
    assert!(dispatch.prevent_default);
    assert_eq!(dispatch.outcome, Some(Outcome::Completed));
    assert_eq!(w.backend().count(|c| matches!(c, Call::Post(_))), 1);
}

#[tokio::test]
async fn input_grows_up_to_max_height() {
    let w = widget(FakeBackend::default());

    w.view().type_text("short");
    w.handle_event(UiEvent::Input).await;
    assert_eq!(w.view().snapshot().input_height, Some(44));

    w.view().type_text(&"line\n".repeat(10));
    w.handle_event(UiEvent::Input).await;
    assert_eq!(w.view().snapshot().input_height, Some(120));
}

#[tokio::test]
async fn append_image_message_bypasses_reload() {
    let w = widget(FakeBackend::default());
    w.append_image_message(Sender::Bot, "/uploads/direct.png");

    let doc = w.view().snapshot();
    assert_eq!(doc.blocks.len(), 1);
    assert!(doc.blocks[0].contains("🤖"));
    assert!(doc.blocks[0].contains(r#"<img src="/uploads/direct.png""#));
    assert!(w.messages().is_empty());
    assert!(w.backend().calls().is_empty());
}

#[tokio::test]
async fn disposed_widget_ignores_events() {
    let w = widget(FakeBackend::default());
    w.dispose();
    w.view().type_text("hello");

    let dispatch = w.handle_event(UiEvent::SendClicked).await;
    assert_eq!(dispatch.outcome, None);
    assert_eq!(
        w.load_messages().await,
        Outcome::Skipped(SkipReason::Disposed)
    );
    assert!(w.backend().calls().is_empty());
}

async fn wait_until_busy(w: &Widget) {
    while w.busy_state() != BusyState::Busy {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn second_send_while_busy_is_skipped() {
    let gate = Arc::new(Notify::new());
    let w = Arc::new(widget(FakeBackend::gated(Arc::clone(&gate))));
    w.view().type_text("first");

    let in_flight = tokio::spawn({
        let w = Arc::clone(&w);
        async move { w.send_message().await }
    });
    wait_until_busy(&w).await;

    let doc = w.view().snapshot();
    assert!(doc.busy_visible);
    assert!(!doc.send_enabled);

    assert_eq!(w.send_message().await, Outcome::Skipped(SkipReason::Busy));
    w.view().select_file(SelectedFile::new("x.png", vec![1]));
    assert_eq!(
        w.handle_image_upload().await,
        Outcome::Skipped(SkipReason::Busy)
    );
    // cleared even though nothing was uploaded
    assert_eq!(w.view().snapshot().selected_file, None);

    gate.notify_one();
    assert_eq!(in_flight.await.unwrap(), Outcome::Completed);
    assert_eq!(w.backend().count(|c| matches!(c, Call::Post(_))), 1);
    assert_eq!(w.backend().count(|c| matches!(c, Call::Upload(_))), 0);
    assert_eq!(w.busy_state(), BusyState::Idle);
    let doc = w.view().snapshot();
    assert!(!doc.busy_visible);
    assert_eq!(doc.selected_file, None);
}

#[tokio::test]
async fn completion_after_dispose_does_not_touch_view() {
    let gate = Arc::new(Notify::new());
    let w = Arc::new(widget(FakeBackend::gated(Arc::clone(&gate))));
    w.view().type_text("hello");

    let in_flight = tokio::spawn({
        let w = Arc::clone(&w);
        async move { w.send_message().await }
    });
    wait_until_busy(&w).await;

    w.dispose();
    gate.notify_one();
    assert_eq!(in_flight.await.unwrap(), Outcome::Completed);

    let doc = w.view().snapshot();
    assert_eq!(doc.input, "hello");
    assert!(doc.blocks.is_empty());
    assert_eq!(w.backend().count(|c| *c == Call::List), 0);
    assert_eq!(w.busy_state(), BusyState::Idle);
}
