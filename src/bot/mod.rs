//! Bot module for handling VK conversations
//!
//! - `commands`: Recognises commands, keyboard labels and profile links
//! - `dispatcher`: Owns the collaborators and runs the long-poll loop
//! - `message_handler`: Review commands: search, cards and lists
//! - `dialogue_manager`: Dialogue state transitions and the deletion flow
//! - `ui_builder`: Creates keyboards and formats messages

pub mod commands;
pub mod dialogue_manager;
pub mod dispatcher;
pub mod message_handler;
pub mod ui_builder;

pub use commands::{parse_command, Command};
pub use dispatcher::{Conversation, Dispatcher};
