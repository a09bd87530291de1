pub mod adapters;
pub mod config;
pub mod dispatcher;
pub mod service;
pub mod telegram;
pub mod telemetry;

pub use config::{BotConfig, ConfigError, TelegramMode};
pub use dispatcher::{ActionSink, Dispatcher};
pub use service::{AppState, build_router, create_app_state};
pub use telegram::{TelegramClient, TelegramError};
pub use telemetry::{LogFormat, init_tracing};
