use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::llm::LlmSettings;
use crate::widget::{Renderer, WidgetSettings};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Backend URL the widget talks to
    #[arg(long, env = "CHAT_BASE_URL")]
    pub base_url: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the chat backend (default)
    Serve,
    /// Print the conversation
    History,
    /// Send a text message and print the conversation
    Send {
        /// Message text
        text: String,
    },
    /// Upload an image and print the conversation
    Upload {
        /// Image file to upload
        path: PathBuf,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub widget: WidgetConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Directory uploaded images are stored in and served from.
    pub uploads_dir: PathBuf,
    /// Page title.
    pub title: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WidgetConfig {
    pub base_url: String,
    pub max_input_height: u32,
    /// Offset applied to message times, in minutes east of UTC.
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Unset means canned replies.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub text_model: String,
    pub vision_model: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl WidgetConfig {
    pub fn settings(&self) -> WidgetSettings {
        WidgetSettings {
            max_input_height: self.max_input_height,
            renderer: Renderer::with_offset_minutes(self.utc_offset_minutes),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl LlmConfig {
    /// `None` when no base URL is configured.
    pub fn settings(&self) -> Option<LlmSettings> {
        let base_url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        Some(LlmSettings {
            base_url: base_url.to_string(),
            api_key: self.api_key.clone().filter(|k| !k.trim().is_empty()),
            text_model: self.text_model.clone(),
            vision_model: self.vision_model.clone(),
            system_prompt: self.system_prompt.clone(),
        })
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::load_from_cli(&cli)
    }

    /// Priority: CLI flag > `CHAT_` env > `--config` file > `./config.*` > defaults.
    pub fn load_from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.port", 5000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.uploads_dir", "images")?
            .set_default("server.title", "Chat")?
            .set_default("widget.base_url", "http://127.0.0.1:5000")?
            .set_default("widget.max_input_height", 120)?
            .set_default("widget.utc_offset_minutes", 0)?
            .set_default("llm.text_model", "llama3.2")?
            .set_default("llm.vision_model", "llava")?;

        builder = builder.add_source(File::with_name("config").required(false));
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path));
        }

        // E.g. CHAT_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("CHAT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(url) = &cli.base_url {
            builder = builder.set_override("widget.base_url", url.as_str())?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}
