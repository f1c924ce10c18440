pub mod auth;
pub mod handlers;
pub mod notify;
pub mod server;

pub use notify::{start_notification_bridge, NotificationSink, NotifyError, WebhookSink};
pub use server::{start, AppState, ServerConfig, ServerHandle};
