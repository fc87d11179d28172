//! VK API access: profile client, candidate search, message sending and the
//! Bots Long Poll transport.

pub mod client;
pub mod keyboard;
pub mod longpoll;
pub mod photos;
pub mod types;

pub use client::{Messenger, OutgoingMessage, SocialApi, VkClient};
pub use keyboard::{ButtonColor, Keyboard};
pub use longpoll::LongPollClient;
pub use types::{IncomingMessage, PhotoRef, SearchQuery, VkUser};

/// Public profile link for a VK user id
pub fn profile_url(user_id: i64) -> String {
    format!("{}{}", crate::config::PROFILE_URL_PREFIX, user_id)
}
