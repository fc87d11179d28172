//! Wire types for the VK API methods the bot consumes.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Standard VK response envelope: either `response` or `error` is present
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub response: Option<T>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error_code: i64,
    pub error_msg: String,
}

/// `{ count, items }` page returned by list methods
#[derive(Debug, Deserialize)]
pub struct ItemsPage<T> {
    #[serde(default)]
    pub count: i64,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: i64,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastSeen {
    /// Unix timestamp of the last visit
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub platform: Option<i64>,
}

/// A VK user as returned by `users.get` and `users.search`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VkUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// 0 = unknown, 1 = female, 2 = male
    #[serde(default)]
    pub sex: i16,
    /// `D.M.YYYY` or `D.M` when the year is hidden
    #[serde(default)]
    pub bdate: Option<String>,
    #[serde(default)]
    pub city: Option<City>,
    #[serde(default)]
    pub last_seen: Option<LastSeen>,
}

impl VkUser {
    /// Last-seen timestamp, 0 when VK did not report one
    pub fn last_seen_time(&self) -> i64 {
        self.last_seen.as_ref().map(|seen| seen.time).unwrap_or(0)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Age in full years on `today`, if the birth date includes a year
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        let birth = NaiveDate::parse_from_str(self.bdate.as_deref()?, "%d.%m.%Y").ok()?;
        let mut age = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        Some(age)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PhotoSize {
    #[serde(default, rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl PhotoSize {
    /// Longest side of this rendition
    pub fn longest_side(&self) -> u32 {
        self.width.max(self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Likes {
    #[serde(default)]
    pub count: i64,
}

/// One item of `photos.get` with `extended=1`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VkPhoto {
    pub id: i64,
    pub owner_id: i64,
    #[serde(default = "Vec::new")]
    pub sizes: Vec<PhotoSize>,
    #[serde(default)]
    pub likes: Option<Likes>,
}

/// A selected photo, ready to be attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef {
    pub owner_id: i64,
    pub photo_id: i64,
    /// URL of the largest rendition
    pub url: String,
    pub likes: i64,
}

impl PhotoRef {
    /// Attachment reference accepted by `messages.send`
    pub fn attachment(&self) -> String {
        format!("photo{}_{}", self.owner_id, self.photo_id)
    }
}

/// Parameters for one `users.search` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub city_id: i64,
    /// Gender to search for
    pub sex: i16,
    pub age_from: u32,
    pub age_to: u32,
    pub status: u32,
    pub has_photo: bool,
    pub count: u32,
    pub offset: u32,
}

/// Server coordinates returned by `groups.getLongPollServer`
#[derive(Debug, Clone, Deserialize)]
pub struct LongPollServer {
    pub key: String,
    pub server: String,
    #[serde(deserialize_with = "string_or_number")]
    pub ts: String,
}

/// A text message delivered by the long-poll server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub from_id: i64,
    pub peer_id: i64,
    pub text: String,
    /// VK client language, when reported
    pub lang_id: Option<i64>,
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
