//! Chat widget server and terminal client
//!
//! `serve` runs the backend; `history`, `send` and `upload` drive a headless
//! chat widget against a running backend and print the conversation.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use dotenvy::dotenv;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use chat_widget::client::HttpBackend;
use chat_widget::config::{AppConfig, Cli, Command};
use chat_widget::server;
use chat_widget::widget::{
    ChatWidget, HeadlessView, Outcome, Renderer, SelectedFile, UiEvent,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Arc::new(AppConfig::load_from_cli(&cli).context("Configuration error")?);

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => server::start_server(config).await,
        Command::History => run_widget(&config, None).await,
        Command::Send { text } => run_widget(&config, Some(Action::Send(text))).await,
        Command::Upload { path } => {
            let file = SelectedFile::from_path(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            run_widget(&config, Some(Action::Upload(file))).await
        }
    }
}

/// Initialize tracing (M-LOG-STRUCTURED)
fn init_tracing(json: bool) {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

enum Action {
    Send(String),
    Upload(SelectedFile),
}

/// Attach a headless widget, perform `action`, print the conversation.
async fn run_widget(config: &AppConfig, action: Option<Action>) -> anyhow::Result<()> {
    let backend =
        HttpBackend::with_timeout(&config.widget.base_url, config.widget.request_timeout())?;
    let settings = config.widget.settings();
    let renderer = settings.renderer.clone();
    let widget = ChatWidget::new(backend, HeadlessView::new(), settings);

    if widget.attach().await == Outcome::Failed {
        bail!("Could not load messages from {}", config.widget.base_url);
    }

    let outcome = match action {
        None => None,
        Some(Action::Send(text)) => {
            widget.view().type_text(&text);
            widget.handle_event(UiEvent::SendClicked).await.outcome
        }
        Some(Action::Upload(file)) => {
            widget.view().select_file(file);
            widget.handle_event(UiEvent::FileChanged).await.outcome
        }
    };
    widget.dispose();

    print_transcript(&renderer, &widget.messages());

    match outcome {
        Some(Outcome::Failed) => bail!("Request failed; see log for details"),
        Some(Outcome::Skipped(reason)) => bail!("Nothing sent: {reason:?}"),
        _ => Ok(()),
    }
}

fn print_transcript(renderer: &Renderer, messages: &[chat_widget::message::Message]) {
    if messages.is_empty() {
        println!("(no messages yet)");
        return;
    }
    for msg in messages {
        let body = if msg.is_image() {
            format!("[image] {}", msg.content)
        } else {
            msg.content.clone()
        };
        println!(
            "[{}] {} {}: {}",
            renderer.format_time(&msg.timestamp),
            msg.sender.avatar(),
            msg.sender.display_name(),
            body
        );
    }
}
