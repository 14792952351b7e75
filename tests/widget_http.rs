//! Widget driven against the real backend over HTTP.

use std::sync::Arc;

use chat_widget::client::{ChatBackend, HttpBackend};
use chat_widget::llm::EchoResponder;
use chat_widget::message::MessageKind;
use chat_widget::server::router;
use chat_widget::widget::{ChatWidget, HeadlessView, Outcome, SelectedFile, UiEvent, WidgetSettings};
use chat_widget::{AppState, Error};

async fn spawn_backend() -> (String, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(Arc::new(EchoResponder), dir.path());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    (format!("http://{addr}"), dir)
}

#[tokio::test]
async fn send_and_upload_round_trip_through_server() {
    let (base, _dir) = spawn_backend().await;
    let backend = HttpBackend::new(&base).unwrap();
    let widget = ChatWidget::new(backend, HeadlessView::new(), WidgetSettings::default());

    assert_eq!(widget.attach().await, Outcome::Completed);
    assert!(widget.view().snapshot().placeholder_visible);

    widget.view().type_text("pothole on Main St");
    let dispatch = widget.handle_event(UiEvent::key("Enter", false)).await;
    assert_eq!(dispatch.outcome, Some(Outcome::Completed));

    let doc = widget.view().snapshot();
    assert_eq!(doc.input, "");
    assert!(!doc.placeholder_visible);
    assert_eq!(doc.blocks.len(), 2);
    assert!(doc.blocks[1].contains("You said: pothole on Main St"));

    widget
        .view()
        .select_file(SelectedFile::new("street.jpg", vec![0xFF, 0xD8, 0xFF]));
    let dispatch = widget.handle_event(UiEvent::FileChanged).await;
    assert_eq!(dispatch.outcome, Some(Outcome::Completed));

    let messages = widget.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2].kind, MessageKind::Image);
    assert!(messages[2].content.starts_with("/uploads/web_"));
    assert!(messages[2].content.ends_with(".jpg"));
    assert_eq!(widget.view().snapshot().selected_file, None);
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let (base, _dir) = spawn_backend().await;
    let backend = HttpBackend::new(&base).unwrap();

    match backend.post_message("").await {
        Err(Error::Status { status, message }) => {
            assert_eq!(status, 400);
            assert!(message.contains("Message content is required"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_backend_fails_quietly() {
    // bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpBackend::new(format!("http://{addr}")).unwrap();
    let widget = ChatWidget::new(backend, HeadlessView::new(), WidgetSettings::default());
    widget.view().type_text("hello");

    assert_eq!(widget.attach().await, Outcome::Failed);
    assert_eq!(widget.send_message().await, Outcome::Failed);

    let doc = widget.view().snapshot();
    assert_eq!(doc.input, "hello");
    assert!(doc.send_enabled);
    assert!(!doc.busy_visible);
    assert!(doc.placeholder_visible);
}
