//! HTTP client for the VK API.
//!
//! One `VkClient` wraps one access token. The bot runs two of them: a user
//! token for profile, photo and search calls (`SocialApi`) and a community
//! token for sending messages (`Messenger`) and the long-poll transport.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::keyboard::Keyboard;
use super::photos::select_best_photos;
use super::types::{
    ApiEnvelope, ItemsPage, LongPollServer, PhotoRef, SearchQuery, VkPhoto, VkUser,
};
use crate::config::VkConfig;
use crate::errors::VkError;

const PROFILE_FIELDS: &str = "city,bdate,sex,has_photo,last_seen";
const SEARCH_FIELDS: &str = "city,bdate,sex,last_seen";

/// Read side of the social network: profiles, photos and candidate search
#[async_trait]
pub trait SocialApi: Send + Sync {
    /// Profile of a single user, `None` if VK knows no such user
    async fn get_profile(&self, user_id: i64) -> Result<Option<VkUser>, VkError>;

    /// Up to `limit` most liked profile photos of a user
    async fn best_photos(&self, owner_id: i64, limit: usize) -> Result<Vec<PhotoRef>, VkError>;

    /// One page of `users.search`
    async fn search_users(&self, query: &SearchQuery) -> Result<Vec<VkUser>, VkError>;
}

/// A reply to a chat user
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub peer_id: i64,
    pub text: String,
    pub keyboard: Option<Keyboard>,
    /// Attachment references, sent comma-joined
    pub attachments: Vec<String>,
}

impl OutgoingMessage {
    pub fn text(peer_id: i64, text: impl Into<String>) -> Self {
        Self {
            peer_id,
            text: text.into(),
            keyboard: None,
            attachments: Vec::new(),
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Write side of the chat transport
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), VkError>;
}

/// Token-bound VK API client
#[derive(Clone)]
pub struct VkClient {
    http: reqwest::Client,
    api_url: String,
    api_version: String,
    token: String,
}

impl VkClient {
    pub fn new(
        api_url: &str,
        api_version: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, VkError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let mut api_url = api_url.to_string();
        if !api_url.ends_with('/') {
            api_url.push('/');
        }
        Ok(Self {
            http,
            api_url,
            api_version: api_version.to_string(),
            token: token.to_string(),
        })
    }

    /// Client for profile, photo and search calls
    pub fn user_client(config: &VkConfig) -> Result<Self, VkError> {
        Self::new(
            &config.api_url,
            &config.api_version,
            &config.user_token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Client for community calls: messages and long poll
    pub fn group_client(config: &VkConfig) -> Result<Self, VkError> {
        Self::new(
            &config.api_url,
            &config.api_version,
            &config.group_token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Call an API method and unwrap the response envelope
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, VkError> {
        debug!(method = method, "Calling VK API");

        let body = self
            .http
            .get(format!("{}{}", self.api_url, method))
            .query(params)
            .query(&[("access_token", &self.token), ("v", &self.api_version)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let envelope: ApiEnvelope<T> = serde_json::from_str(&body)?;
        match (envelope.response, envelope.error) {
            (_, Some(error)) => Err(VkError::Api {
                code: error.error_code,
                message: error.error_msg,
            }),
            (Some(response), None) => Ok(response),
            (None, None) => Err(VkError::UnexpectedResponse(format!(
                "{method} returned neither response nor error"
            ))),
        }
    }

    /// Id of the community that owns this client's token
    pub async fn resolve_group_id(&self) -> Result<i64, VkError> {
        #[derive(Deserialize)]
        struct Group {
            id: i64,
        }

        // Older API versions return a bare array, newer ones wrap it
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum GroupsResponse {
            Wrapped { groups: Vec<Group> },
            Bare(Vec<Group>),
        }

        let groups = match self.call::<GroupsResponse>("groups.getById", &[]).await? {
            GroupsResponse::Wrapped { groups } => groups,
            GroupsResponse::Bare(groups) => groups,
        };
        groups
            .first()
            .map(|group| group.id)
            .ok_or_else(|| VkError::UnexpectedResponse("groups.getById returned no groups".into()))
    }

    /// Long-poll server coordinates for a community
    pub async fn get_long_poll_server(&self, group_id: i64) -> Result<LongPollServer, VkError> {
        self.call("groups.getLongPollServer", &[("group_id", group_id.to_string())])
            .await
    }

    async fn get_photos(&self, owner_id: i64) -> Result<Vec<VkPhoto>, VkError> {
        let page: ItemsPage<VkPhoto> = self
            .call(
                "photos.get",
                &[
                    ("owner_id", owner_id.to_string()),
                    ("album_id", "profile".to_string()),
                    ("extended", "1".to_string()),
                    ("photo_sizes", "1".to_string()),
                ],
            )
            .await?;
        Ok(page.items)
    }
}

#[async_trait]
impl SocialApi for VkClient {
    async fn get_profile(&self, user_id: i64) -> Result<Option<VkUser>, VkError> {
        let users: Vec<VkUser> = self
            .call(
                "users.get",
                &[
                    ("user_ids", user_id.to_string()),
                    ("fields", PROFILE_FIELDS.to_string()),
                ],
            )
            .await?;
        Ok(users.into_iter().next())
    }

    async fn best_photos(&self, owner_id: i64, limit: usize) -> Result<Vec<PhotoRef>, VkError> {
        let photos = self.get_photos(owner_id).await?;
        Ok(select_best_photos(&photos, limit))
    }

    async fn search_users(&self, query: &SearchQuery) -> Result<Vec<VkUser>, VkError> {
        let page: ItemsPage<VkUser> = self
            .call(
                "users.search",
                &[
                    ("count", query.count.to_string()),
                    ("offset", query.offset.to_string()),
                    ("age_from", query.age_from.to_string()),
                    ("age_to", query.age_to.to_string()),
                    ("city_id", query.city_id.to_string()),
                    ("sex", query.sex.to_string()),
                    ("status", query.status.to_string()),
                    ("has_photo", u8::from(query.has_photo).to_string()),
                    ("fields", SEARCH_FIELDS.to_string()),
                ],
            )
            .await?;
        debug!(total = page.count, returned = page.items.len(), "users.search page received");
        Ok(page.items)
    }
}

#[async_trait]
impl Messenger for VkClient {
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), VkError> {
        let mut params = vec![
            ("peer_id", message.peer_id.to_string()),
            ("message", message.text),
            ("random_id", rand::random::<i32>().to_string()),
        ];
        if let Some(keyboard) = &message.keyboard {
            params.push(("keyboard", keyboard.to_json()));
        }
        if !message.attachments.is_empty() {
            params.push(("attachment", message.attachments.join(",")));
        }

        let _message_id: serde_json::Value = self.call("messages.send", &params).await?;
        Ok(())
    }
}
