//! Exchange-rate bot: command routing, reply formatting and Telegram handlers.

pub mod commands;
pub mod format;
pub mod handlers;
pub mod selection;

pub use handlers::{BotState, handle_inline_query, handle_message};
